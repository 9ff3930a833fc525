use std::fmt::Display;

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Minimum number of characters (after trimming) a submission needs before it
/// is worth sending to the model.
pub const MIN_TEXT_CHARS: usize = 100;

/// Body of a `POST /evaluate-text` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextEvaluationRequest {
    /// Full text of the thesis.
    pub text: String,
}

/// Analysis and partial score produced by one of the three virtual evaluators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(on(String, into))]
pub struct EvaluatorScore {
    /// Display name of the evaluator, eg. "Evaluator 1 - Methodology".
    pub name:     String,
    /// Free-text analysis written by the evaluator.
    pub analysis: String,
    /// Partial score, never negative.
    pub score:    f64,
}

/// Consolidated verdict of the evaluation panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(on(String, into))]
pub struct FinalVerdict {
    /// Integrated summary of the three analyses.
    pub summary:         String,
    /// Final grade in `[0, 10]`.
    pub final_score:     f64,
    /// Actionable recommendations for the author.
    pub recommendations: String,
}

/// Complete evaluation report returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(on(String, into))]
pub struct EvaluationResult {
    /// Methodology evaluator.
    pub evaluator_1:   EvaluatorScore,
    /// Academic writing and citation-format evaluator.
    pub evaluator_2:   EvaluatorScore,
    /// Originality and plagiarism-risk evaluator.
    pub evaluator_3:   EvaluatorScore,
    /// Panel verdict.
    pub final_verdict: FinalVerdict,
    /// Whether the evaluation completed.
    #[builder(default = true)]
    pub success:       bool,
    /// Additional human-readable status message.
    pub message:       Option<String>,
}

impl EvaluationResult {
    /// Returns the three evaluators in rubric order.
    pub fn evaluators(&self) -> [&EvaluatorScore; 3] {
        [&self.evaluator_1, &self.evaluator_2, &self.evaluator_3]
    }

    /// Sum of the three partial scores.
    pub fn component_total(&self) -> f64 {
        self.evaluators().iter().map(|e| e.score).sum()
    }
}

/// Document formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentKind {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
    /// Plain text in one of the supported encodings.
    Txt,
}

impl DocumentKind {
    /// Every supported kind, in the order they are advertised.
    pub const ALL: [DocumentKind; 3] = [DocumentKind::Pdf, DocumentKind::Docx, DocumentKind::Txt];

    /// File extension (with leading dot) that selects this kind.
    pub fn extension(self) -> &'static str {
        match self {
            DocumentKind::Pdf => ".pdf",
            DocumentKind::Docx => ".docx",
            DocumentKind::Txt => ".txt",
        }
    }

    /// Picks a kind from the suffix of `file_name`, ignoring case.
    pub fn from_filename(file_name: &str) -> Option<Self> {
        let extension = file_extension(file_name)?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.extension() == extension)
    }
}

impl Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Pdf => write!(f, "PDF"),
            DocumentKind::Docx => write!(f, "DOCX"),
            DocumentKind::Txt => write!(f, "TXT"),
        }
    }
}

/// Lower-cased extension of `file_name` including the leading dot, if any.
pub fn file_extension(file_name: &str) -> Option<String> {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (stem, extension) = base.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(format!(".{}", extension.to_ascii_lowercase()))
}

/// Body returned by every failing HTTP route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Short description of what went wrong.
    pub message: String,
    /// Underlying error, when there is more to say.
    pub detail:  Option<String>,
    /// Stable machine-readable error tag.
    pub kind:    String,
}

/// Liveness report served at `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Always `"online"` while the process serves requests.
    pub status:         String,
    /// Service name.
    pub service:        String,
    /// Crate version.
    pub version:        String,
    /// Whether an upstream API key is present. Never the key itself.
    pub api_configured: bool,
}
