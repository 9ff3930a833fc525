#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Error contract shared by every stage of an evaluation.

use std::time::Duration;

use thiserror::Error;

use crate::types::DocumentKind;

/// Maximum number of characters of an upstream payload kept for diagnostics.
pub const EXCERPT_LIMIT: usize = 500;

/// Everything that can go wrong between receiving a thesis and returning its
/// evaluation.
#[derive(Error, Debug)]
pub enum EvaluationError {
    /// The upstream credential (or another required setting) is missing.
    #[error("evaluation service is not configured: {0}")]
    Configuration(String),

    /// The declared file name has an extension we do not handle.
    #[error("unsupported file type `{extension}`; accepted extensions: {accepted}")]
    UnsupportedType {
        /// Extension as declared by the uploader (may be empty).
        extension: String,
        /// Comma-separated list of accepted extensions.
        accepted:  String,
    },

    /// A plain-text upload could not be decoded with any supported encoding.
    #[error("could not decode text file with any of: {tried}")]
    Decode {
        /// Encodings that were attempted, in order.
        tried: String,
    },

    /// The document decoded fine but holds too little text to evaluate.
    #[error(
        "document is empty or contains too little text for evaluation ({found} characters, at \
         least {required} required)"
    )]
    InsufficientContent {
        /// Characters found after trimming.
        found:    usize,
        /// Minimum accepted.
        required: usize,
    },

    /// Text extraction from a structured document failed.
    #[error("could not extract text from {kind} document: {reason}")]
    Extraction {
        /// Kind of document being read.
        kind:   DocumentKind,
        /// What went wrong.
        reason: String,
    },

    /// The upstream service could not be reached.
    #[error("could not reach the evaluation service: {0}")]
    Network(#[source] reqwest::Error),

    /// The upstream service did not answer in time.
    #[error(
        "evaluation service did not answer within {}s; the text may be too long",
        .after.as_secs_f64()
    )]
    Timeout {
        /// Timeout that was exceeded.
        after: Duration,
    },

    /// The upstream service answered with a non-success status.
    #[error("evaluation service rejected the request with status {status}: {body}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body:   String,
    },

    /// The upstream envelope did not contain a completion message.
    #[error("evaluation service returned an unexpected response: {0}")]
    MalformedUpstreamResponse(String),

    /// The completion content is not valid JSON.
    #[error("evaluation reply is not valid JSON ({reason}); content begins with: {excerpt}")]
    ResponseParse {
        /// Parser error message.
        reason:  String,
        /// First characters of the offending content.
        excerpt: String,
    },

    /// A required field is missing or has the wrong shape.
    #[error("evaluation reply field `{field}` {problem}")]
    Schema {
        /// Dotted path of the field, eg. `evaluator_2` or `final_verdict.summary`.
        field:   String,
        /// What is wrong with it.
        problem: String,
    },

    /// A score could not be turned into a usable number.
    #[error("evaluation reply field `{field}` has an unusable numeric value: {value}")]
    ValueCoercion {
        /// Dotted path of the field.
        field: String,
        /// The value as received.
        value: String,
    },
}

/// Coarse grouping of [`EvaluationError`] used to pick a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The server lacks configuration to perform evaluations.
    Configuration,
    /// The submitted document or text cannot be used.
    ClientInput,
    /// The upstream service is unreachable, slow, or refused the request.
    Upstream,
    /// The upstream service answered, but not in the agreed format.
    Contract,
}

impl ErrorClass {
    /// Human-readable headline for responses in this class.
    pub fn summary(self) -> &'static str {
        match self {
            ErrorClass::Configuration => "the server is not configured to run evaluations",
            ErrorClass::ClientInput => "the submitted document could not be used",
            ErrorClass::Upstream => "the evaluation service is unavailable",
            ErrorClass::Contract => "the evaluation service returned an unexpected reply",
        }
    }
}

impl EvaluationError {
    /// Returns the class this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            EvaluationError::Configuration(_) => ErrorClass::Configuration,
            EvaluationError::UnsupportedType { .. }
            | EvaluationError::Decode { .. }
            | EvaluationError::InsufficientContent { .. }
            | EvaluationError::Extraction { .. } => ErrorClass::ClientInput,
            EvaluationError::Network(_)
            | EvaluationError::Timeout { .. }
            | EvaluationError::Upstream { .. } => ErrorClass::Upstream,
            EvaluationError::MalformedUpstreamResponse(_)
            | EvaluationError::ResponseParse { .. }
            | EvaluationError::Schema { .. }
            | EvaluationError::ValueCoercion { .. } => ErrorClass::Contract,
        }
    }

    /// Stable snake-case tag naming the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            EvaluationError::Configuration(_) => "configuration",
            EvaluationError::UnsupportedType { .. } => "unsupported_type",
            EvaluationError::Decode { .. } => "decode",
            EvaluationError::InsufficientContent { .. } => "insufficient_content",
            EvaluationError::Extraction { .. } => "extraction",
            EvaluationError::Network(_) => "network",
            EvaluationError::Timeout { .. } => "timeout",
            EvaluationError::Upstream { .. } => "upstream",
            EvaluationError::MalformedUpstreamResponse(_) => "malformed_upstream_response",
            EvaluationError::ResponseParse { .. } => "response_parse",
            EvaluationError::Schema { .. } => "schema",
            EvaluationError::ValueCoercion { .. } => "value_coercion",
        }
    }

    /// Shorthand for a [`EvaluationError::Schema`] error.
    pub(crate) fn schema(field: impl Into<String>, problem: impl Into<String>) -> Self {
        EvaluationError::Schema {
            field:   field.into(),
            problem: problem.into(),
        }
    }

    /// Shorthand for an [`EvaluationError::Extraction`] error.
    pub(crate) fn extraction(kind: DocumentKind, reason: impl Into<String>) -> Self {
        EvaluationError::Extraction {
            kind,
            reason: reason.into(),
        }
    }
}

/// Returns at most the first [`EXCERPT_LIMIT`] characters of `content`.
pub fn excerpt(content: &str) -> String {
    match content.char_indices().nth(EXCERPT_LIMIT) {
        Some((cut, _)) => content[..cut].to_string(),
        None => content.to_string(),
    }
}
