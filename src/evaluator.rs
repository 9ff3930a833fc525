#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! One evaluation, end to end: prompt, upstream call, reconciliation.

use std::{sync::Arc, time::Instant};

use crate::{
    client::ChatClient,
    config::Settings,
    error::EvaluationError,
    prompt,
    reconcile,
    types::EvaluationResult,
};

/// Evaluates thesis text against the embedded rubric.
///
/// Cheap to clone; clones share the underlying HTTP connection pool.
#[derive(Clone)]
pub struct Evaluator {
    /// Upstream chat client.
    client: ChatClient,
}

impl Evaluator {
    /// Wraps an existing client.
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    /// Builds an evaluator (and its client) from `settings`.
    pub fn from_settings(settings: Arc<Settings>) -> Result<Self, EvaluationError> {
        Ok(Self::new(ChatClient::new(settings)?))
    }

    /// Returns the settings the evaluator runs with.
    pub fn settings(&self) -> &Settings {
        self.client.settings()
    }

    /// Evaluates `text`, which is sent verbatim.
    ///
    /// Exactly one upstream request is made. Any failure along the way is
    /// returned as-is so callers can decide how to present it.
    pub async fn evaluate(&self, text: &str) -> Result<EvaluationResult, EvaluationError> {
        let started = Instant::now();
        tracing::info!(
            chars = text.chars().count(),
            model = self.settings().model(),
            rubric = prompt::RUBRIC_VERSION,
            "starting evaluation"
        );

        let prompt = prompt::build(text);
        let content = self.client.complete(&prompt).await.inspect_err(|err| {
            tracing::error!(kind = err.kind(), "upstream call failed: {err}");
        })?;
        let result = reconcile::reconcile(&content).inspect_err(|err| {
            tracing::error!(kind = err.kind(), "evaluation reply rejected: {err}");
        })?;

        tracing::info!(
            final_score = result.final_verdict.final_score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "evaluation finished"
        );
        Ok(result)
    }
}
