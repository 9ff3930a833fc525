#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Process-wide settings, read once at startup and immutable afterwards.

use std::{path::PathBuf, str::FromStr, time::Duration};

use bon::Builder;
use itertools::Itertools;

/// Default chat-completions endpoint.
pub const DEFAULT_API_URL: &str = "https://api.perplexity.ai/chat/completions";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "llama-3.1-sonar-large-128k-online";

/// Default timeout for one upstream evaluation call, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default sampling temperature; kept low to reduce output variance.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Default output-token ceiling for the evaluation reply.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Default upload ceiling in megabytes.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 10;

/// Default comma-separated list of accepted upload extensions.
const DEFAULT_ALLOWED_FILE_TYPES: &str = ".pdf,.docx,.txt";

/// Default comma-separated list of allowed CORS origins.
const DEFAULT_ALLOWED_ORIGINS: &str =
    "http://localhost:8000,http://127.0.0.1:8000,http://localhost:3000,http://127.0.0.1:3000";

/// Immutable configuration shared by the evaluation client and the HTTP
/// boundary.
#[derive(Clone, Builder)]
#[builder(on(String, into))]
pub struct Settings {
    /// Bearer credential for the upstream API. Empty means unconfigured.
    #[builder(default)]
    api_key:            String,
    /// Fully qualified chat-completions URL.
    #[builder(default = DEFAULT_API_URL.to_string())]
    api_url:            String,
    /// Model identifier sent with each request.
    #[builder(default = DEFAULT_MODEL.to_string())]
    model:              String,
    /// Timeout bounding one whole upstream call.
    #[builder(default = Duration::from_secs(DEFAULT_TIMEOUT_SECS))]
    timeout:            Duration,
    /// Sampling temperature.
    #[builder(default = DEFAULT_TEMPERATURE)]
    temperature:        f32,
    /// Output-token ceiling.
    #[builder(default = DEFAULT_MAX_TOKENS)]
    max_tokens:         u32,
    /// Upload ceiling in megabytes.
    #[builder(default = DEFAULT_MAX_FILE_SIZE_MB)]
    max_file_size_mb:   u64,
    /// Accepted upload extensions, lower-cased with a leading dot.
    #[builder(default = split_list(DEFAULT_ALLOWED_FILE_TYPES))]
    allowed_file_types: Vec<String>,
    /// Origins allowed to call the API from a browser.
    #[builder(default = split_list(DEFAULT_ALLOWED_ORIGINS))]
    allowed_origins:    Vec<String>,
    /// Directory holding the static frontend.
    #[builder(default = PathBuf::from("frontend"), into)]
    frontend_dir:       PathBuf,
    /// Address the HTTP server binds to.
    #[builder(default = "0.0.0.0".to_string())]
    host:               String,
    /// Port the HTTP server binds to.
    #[builder(default = 8000)]
    port:               u16,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_configured", &self.api_configured())
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_file_size_mb", &self.max_file_size_mb)
            .field("allowed_file_types", &self.allowed_file_types)
            .finish_non_exhaustive()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::builder().build()
    }
}

impl Settings {
    /// Reads settings from the process environment. Call `dotenvy::dotenv()`
    /// first to pick up a `.env` file.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable lookup; unset or blank
    /// variables fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let allowed_file_types = split_list(
            read("ALLOWED_FILE_TYPES")
                .as_deref()
                .unwrap_or(DEFAULT_ALLOWED_FILE_TYPES),
        )
        .into_iter()
        .map(|ext| normalize_extension(&ext))
        .collect();

        Settings::builder()
            .api_key(read("PERPLEXITY_API_KEY").unwrap_or_default())
            .api_url(read("PERPLEXITY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()))
            .model(read("PERPLEXITY_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()))
            .timeout(Duration::from_secs(parse_or(
                "VERITAS_TIMEOUT_SECS",
                read("VERITAS_TIMEOUT_SECS"),
                DEFAULT_TIMEOUT_SECS,
            )))
            .temperature(parse_or(
                "VERITAS_TEMPERATURE",
                read("VERITAS_TEMPERATURE"),
                DEFAULT_TEMPERATURE,
            ))
            .max_tokens(parse_or("VERITAS_MAX_TOKENS", read("VERITAS_MAX_TOKENS"), DEFAULT_MAX_TOKENS))
            .max_file_size_mb(parse_or(
                "MAX_FILE_SIZE_MB",
                read("MAX_FILE_SIZE_MB"),
                DEFAULT_MAX_FILE_SIZE_MB,
            ))
            .allowed_file_types(allowed_file_types)
            .allowed_origins(split_list(
                read("ALLOWED_ORIGINS")
                    .as_deref()
                    .unwrap_or(DEFAULT_ALLOWED_ORIGINS),
            ))
            .frontend_dir(read("VERITAS_FRONTEND_DIR").unwrap_or_else(|| "frontend".to_string()))
            .host(read("VERITAS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()))
            .port(parse_or("VERITAS_PORT", read("VERITAS_PORT"), 8000))
            .build()
    }

    /// Returns the API key used for upstream requests.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Whether a non-blank API key is present.
    pub fn api_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Returns the chat-completions URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Returns the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the upstream call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the sampling temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Returns the output-token ceiling.
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Returns the upload ceiling in megabytes.
    pub fn max_file_size_mb(&self) -> u64 {
        self.max_file_size_mb
    }

    /// Returns the upload ceiling in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Returns the accepted upload extensions.
    pub fn allowed_file_types(&self) -> &[String] {
        &self.allowed_file_types
    }

    /// Whether uploads named `file_name` are accepted.
    pub fn is_allowed_file(&self, file_name: &str) -> bool {
        crate::types::file_extension(file_name)
            .is_some_and(|ext| self.allowed_file_types.iter().any(|allowed| *allowed == ext))
    }

    /// Returns the allowed CORS origins.
    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    /// Returns the static frontend directory.
    pub fn frontend_dir(&self) -> &std::path::Path {
        &self.frontend_dir
    }

    /// Returns the bind address as `host:port`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns a copy bound to `host` and `port` where given.
    pub fn with_bind_address(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    /// Multi-line description of the effective configuration. The API key is
    /// reported only as present or absent.
    pub fn describe(&self) -> String {
        [
            format!("api key configured: {}", self.api_configured()),
            format!("api url:            {}", self.api_url),
            format!("model:              {}", self.model),
            format!("timeout:            {}s", self.timeout.as_secs()),
            format!("temperature:        {}", self.temperature),
            format!("max tokens:         {}", self.max_tokens),
            format!("max file size:      {} MB", self.max_file_size_mb),
            format!("allowed file types: {}", self.allowed_file_types.iter().join(", ")),
            format!("allowed origins:    {}", self.allowed_origins.iter().join(", ")),
            format!("frontend dir:       {}", self.frontend_dir.display()),
            format!("bind address:       {}", self.bind_address()),
        ]
        .join("\n")
    }
}

/// Splits a comma-separated list, dropping blank entries.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Lower-cases an extension and makes sure it starts with a dot.
fn normalize_extension(ext: &str) -> String {
    let ext = ext.to_ascii_lowercase();
    if ext.starts_with('.') { ext } else { format!(".{ext}") }
}

/// Parses `value`, falling back to `default` (with a warning) when it is
/// missing or malformed.
fn parse_or<T: FromStr + Copy>(name: &str, value: Option<String>, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value `{raw}` for {name}; using the default");
            default
        }),
    }
}
