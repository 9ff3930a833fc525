#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Client for the upstream chat-completions service.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_openai::{
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
    },
};
use reqwest::Client;
use serde_json::Value;
use tokio::time::timeout;

use crate::{
    config::Settings,
    error::{EvaluationError, excerpt},
    prompt,
};

/// Sends evaluation prompts to the configured chat-completions endpoint.
///
/// One call makes exactly one HTTP request; there are no retries. Dropping the
/// future returned by [`ChatClient::complete`] aborts the request.
#[derive(Clone)]
pub struct ChatClient {
    /// Shared reqwest HTTP client.
    http:     Client,
    /// Immutable process configuration.
    settings: Arc<Settings>,
}

impl ChatClient {
    /// Creates a client for the endpoint, model, and timeout in `settings`.
    pub fn new(settings: Arc<Settings>) -> Result<Self, EvaluationError> {
        let http = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|err| {
                EvaluationError::Configuration(format!("could not build HTTP client: {err}"))
            })?;
        Ok(Self { http, settings })
    }

    /// Returns the settings this client was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Sends `prompt` and returns the completion content with any Markdown
    /// code fence removed.
    pub async fn complete(&self, prompt: &str) -> Result<String, EvaluationError> {
        if !self.settings.api_configured() {
            return Err(EvaluationError::Configuration(
                "PERPLEXITY_API_KEY is not set".to_string(),
            ));
        }

        let request = self.chat_request(prompt).map_err(|err| {
            EvaluationError::Configuration(format!("could not assemble chat request: {err}"))
        })?;

        let limit = self.settings.timeout();
        let started = Instant::now();
        let body = match timeout(limit, self.exchange(&request)).await {
            Ok(body) => body?,
            Err(_) => return Err(EvaluationError::Timeout { after: limit }),
        };
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = body.len(),
            "received upstream response"
        );

        completion_content(&body)
    }

    /// Assembles the system + user message request.
    #[allow(deprecated)]
    fn chat_request(&self, prompt: &str) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt::system_message())
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into(),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(self.settings.model())
            .messages(messages)
            .temperature(self.settings.temperature())
            .max_tokens(self.settings.max_tokens())
            .build()
    }

    /// Performs the HTTP exchange and returns the raw response body.
    async fn exchange(&self, request: &CreateChatCompletionRequest) -> Result<String, EvaluationError> {
        let limit = self.settings.timeout();
        let response = self
            .http
            .post(self.settings.api_url())
            .bearer_auth(self.settings.api_key().trim())
            .json(request)
            .send()
            .await
            .map_err(|err| transport_error(err, limit))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| transport_error(err, limit))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "upstream rejected evaluation request");
            return Err(EvaluationError::Upstream {
                status: status.as_u16(),
                body:   excerpt(&body),
            });
        }
        Ok(body)
    }
}

/// Classifies a reqwest failure as a timeout or a network error.
fn transport_error(err: reqwest::Error, limit: Duration) -> EvaluationError {
    if err.is_timeout() {
        EvaluationError::Timeout { after: limit }
    } else {
        EvaluationError::Network(err)
    }
}

/// Pulls `choices[0].message.content` out of a chat-completions response body
/// and strips a surrounding Markdown code fence.
pub fn completion_content(body: &str) -> Result<String, EvaluationError> {
    let envelope: Value = serde_json::from_str(body).map_err(|err| {
        EvaluationError::MalformedUpstreamResponse(format!(
            "response body is not JSON ({err}): {}",
            excerpt(body)
        ))
    })?;

    let content = envelope
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            EvaluationError::MalformedUpstreamResponse(
                "response has no choices[0].message.content".to_string(),
            )
        })?;

    Ok(strip_code_fence(content).to_string())
}

/// Removes a leading ```` ```json ```` / ```` ``` ```` and a trailing
/// ```` ``` ````, then trims.
pub fn strip_code_fence(content: &str) -> &str {
    let mut content = content.trim();
    if let Some(rest) = content.strip_prefix("```json") {
        content = rest;
    }
    if let Some(rest) = content.strip_prefix("```") {
        content = rest;
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest;
    }
    content.trim()
}
