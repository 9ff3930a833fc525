#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Renders the evaluation rubric and the submitted thesis into one prompt.
//!
//! The rubric lives in `prompts/evaluation.md` and is part of the evaluation
//! contract: editing it changes how theses are scored, so every edit must bump
//! [`RUBRIC_VERSION`].

/// Version of the embedded rubric and formatting instructions.
pub const RUBRIC_VERSION: &str = "2024.1";

/// Minimum length requested for each analysis and for the recommendations.
pub const ANALYSIS_MIN_CHARS: usize = 200;

/// Minimum length requested for the verdict summary.
pub const SUMMARY_MIN_CHARS: usize = 300;

/// Scoring dimensions described by the rubric, with their maximum points.
/// Only the first three map to evaluator fields in the reply.
pub const RUBRIC_DIMENSIONS: [(&str, f64); 4] = [
    ("Methodology", 3.0),
    ("Academic writing and ABNT compliance", 2.0),
    ("Originality and plagiarism risk", 2.0),
    ("Overall scientific coherence", 3.0),
];

/// Returns the system instruction sent ahead of the prompt.
pub fn system_message() -> &'static str {
    include_str!("prompts/system.md").trim_end()
}

/// Builds the user prompt for `text`. The text is embedded verbatim after the
/// rubric and response format, followed only by the closing instruction.
pub fn build(text: &str) -> String {
    format!(
        include_str!("prompts/evaluation.md"),
        ANALYSIS_MIN_CHARS = ANALYSIS_MIN_CHARS,
        SUMMARY_MIN_CHARS = SUMMARY_MIN_CHARS,
        THESIS_TEXT = text,
    )
}
