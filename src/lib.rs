//! # veritas
//!
//! Evaluates academic theses with a panel of three virtual evaluators. A
//! document is reduced to text, sent to an OpenAI-compatible chat-completions
//! service together with a fixed rubric, and the reply is validated and
//! reconciled before it reaches the caller.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Upstream chat-completions client
pub mod client;
/// Process-wide settings
pub mod config;
/// The error contract shared by every component
pub mod error;
/// Orchestrates one evaluation end to end
pub mod evaluator;
/// Text extraction for PDF, DOCX, and plain-text uploads
pub mod extract;
/// The evaluation rubric and prompt rendering
pub mod prompt;
/// Validation and score reconciliation of model replies
pub mod reconcile;
/// Terminal rendering of evaluation results
pub mod report;
/// HTTP routes and the serve loop
pub mod server;
/// Structs and enums shared across modules and the wire
pub mod types;
/// Request-scoped upload staging
pub mod upload;
