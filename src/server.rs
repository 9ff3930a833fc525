#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! HTTP boundary: routes, error mapping, and the serve loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::{HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use itertools::Itertools;
use serde_json::{Value, json};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::{
    config::Settings,
    error::{ErrorClass, EvaluationError},
    evaluator::Evaluator,
    extract,
    types::{
        DocumentKind, ErrorResponse, EvaluationResult, HealthReport, MIN_TEXT_CHARS,
        TextEvaluationRequest, file_extension,
    },
    upload::{StagedUpload, UploadError, format_size},
};

/// Name reported by `/health` and `/api`.
pub const SERVICE_NAME: &str = "Veritas.AI thesis evaluation";

/// Multipart field carrying the uploaded document.
const FILE_FIELD: &str = "file";

/// Room left in the request body limit for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Process configuration.
    settings:  Arc<Settings>,
    /// Evaluation pipeline.
    evaluator: Evaluator,
}

impl AppState {
    /// Builds the state, including the upstream client, from `settings`.
    pub fn new(settings: Arc<Settings>) -> Result<Self, EvaluationError> {
        let evaluator = Evaluator::from_settings(Arc::clone(&settings))?;
        Ok(Self {
            settings,
            evaluator,
        })
    }
}

/// Failures surfaced to HTTP callers.
#[derive(Debug)]
pub enum ApiError {
    /// Failure inside the evaluation pipeline.
    Evaluation(EvaluationError),
    /// The request itself is malformed.
    BadRequest(String),
    /// The upload exceeds the configured size limit.
    PayloadTooLarge {
        /// Limit in bytes.
        limit:    u64,
        /// Bytes received before the limit tripped, when known.
        received: Option<u64>,
    },
    /// Unexpected server-side failure.
    Internal(String),
}

impl From<EvaluationError> for ApiError {
    fn from(err: EvaluationError) -> Self {
        ApiError::Evaluation(err)
    }
}

impl ApiError {
    /// Status code returned for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Evaluation(err) => match (err.class(), err) {
                (_, EvaluationError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
                (ErrorClass::Configuration, _) => StatusCode::INTERNAL_SERVER_ERROR,
                (ErrorClass::ClientInput, _) => StatusCode::BAD_REQUEST,
                (ErrorClass::Upstream | ErrorClass::Contract, _) => StatusCode::BAD_GATEWAY,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body returned for this error.
    pub fn body(&self) -> ErrorResponse {
        let (message, detail, kind) = match self {
            ApiError::Evaluation(err) => (
                err.class().summary().to_string(),
                Some(err.to_string()),
                err.kind(),
            ),
            ApiError::BadRequest(message) => (message.clone(), None, "bad_request"),
            ApiError::PayloadTooLarge { limit, received } => (
                match received {
                    Some(received) => format!(
                        "file exceeds the maximum size of {} (received {})",
                        format_size(*limit),
                        format_size(*received)
                    ),
                    None => format!("file exceeds the maximum size of {}", format_size(*limit)),
                },
                None,
                "payload_too_large",
            ),
            ApiError::Internal(detail) => (
                "internal server error".to_string(),
                Some(detail.clone()),
                "internal",
            ),
        };
        ErrorResponse {
            success: false,
            message,
            detail,
            kind: kind.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), kind = %body.kind, detail = ?body.detail, "{}", body.message);
        } else {
            tracing::warn!(status = status.as_u16(), kind = %body.kind, detail = ?body.detail, "{}", body.message);
        }
        (status, Json(body)).into_response()
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::TooLarge { limit, received } => ApiError::PayloadTooLarge {
                limit,
                received: Some(received),
            },
            UploadError::Io(err) => ApiError::Internal(err.to_string()),
            UploadError::Multipart(err) => multipart_error(err, None),
        }
    }
}

/// Maps a multipart stream failure; body-limit hits become 413.
fn multipart_error(err: MultipartError, limit: Option<u64>) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge {
            limit:    limit.unwrap_or_default(),
            received: None,
        }
    } else {
        ApiError::BadRequest(format!("invalid multipart body: {}", err.body_text()))
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let settings = Arc::clone(&state.settings);
    let body_limit = usize::try_from(settings.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let mut app = Router::new()
        .route("/evaluate-text", post(evaluate_text))
        .route("/evaluate-file", post(evaluate_file))
        .route("/health", get(health))
        .route("/api", get(api_index));

    let frontend = settings.frontend_dir();
    if frontend.is_dir() {
        tracing::info!("Serving frontend from {}", frontend.display());
        app = app
            .nest_service("/static", ServeDir::new(frontend))
            .route_service("/", ServeFile::new(frontend.join("index.html")));
    } else {
        tracing::warn!("Frontend directory {} not found; serving API only", frontend.display());
    }

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&settings))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "request",
                id = %Uuid::new_v4(),
                method = %request.method(),
                uri = %request.uri(),
            )
        }))
        .with_state(state)
}

/// CORS policy allowing the configured origins with any method and header.
fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins = settings
        .allowed_origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("Ignoring invalid CORS origin {origin:?}: {err}");
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// `POST /evaluate-text`.
async fn evaluate_text(
    State(state): State<AppState>,
    payload: Result<Json<TextEvaluationRequest>, JsonRejection>,
) -> Result<Json<EvaluationResult>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge {
                limit:    state.settings.max_upload_bytes(),
                received: None,
            }
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    })?;

    if request.text.trim().chars().count() < MIN_TEXT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "text must contain at least {MIN_TEXT_CHARS} characters"
        )));
    }

    Ok(Json(state.evaluator.evaluate(&request.text).await?))
}

/// `POST /evaluate-file`.
async fn evaluate_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<EvaluationResult>, ApiError> {
    let limit = state.settings.max_upload_bytes();
    let mut multipart = multipart.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let (file_name, mut staged) = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|err| multipart_error(err, Some(limit)))?
            .ok_or_else(|| ApiError::BadRequest(format!("missing `{FILE_FIELD}` field")))?;
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_owned)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("uploaded file has no name".to_string()))?;
        if !state.settings.is_allowed_file(&file_name) {
            return Err(EvaluationError::UnsupportedType {
                extension: file_extension(&file_name).unwrap_or_default(),
                accepted:  state.settings.allowed_file_types().iter().join(", "),
            }
            .into());
        }

        let staged = StagedUpload::stage(field, limit).await.map_err(|err| match err {
            UploadError::Multipart(err) => multipart_error(err, Some(limit)),
            other => other.into(),
        })?;
        break (file_name, staged);
    };

    tracing::info!(file = %file_name, size = %format_size(staged.len()), "received upload");
    let bytes = staged.read().await?;
    drop(staged);

    let name = file_name.clone();
    let extracted = tokio::task::spawn_blocking(move || extract::extract(&bytes, &name))
        .await
        .map_err(|err| ApiError::Internal(format!("extraction task failed: {err}")))??;

    let mut result = state.evaluator.evaluate(&extracted.text).await?;
    result.message = Some(upload_message(&file_name, extracted.kind));
    Ok(Json(result))
}

/// Success message attached to file evaluations.
fn upload_message(file_name: &str, kind: DocumentKind) -> String {
    format!("file {file_name} ({kind}) processed successfully")
}

/// `GET /health`.
async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status:         "online".to_string(),
        service:        SERVICE_NAME.to_string(),
        version:        env!("CARGO_PKG_VERSION").to_string(),
        api_configured: state.settings.api_configured(),
    })
}

/// `GET /api`.
async fn api_index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Evaluates academic theses with a panel of three virtual evaluators",
        "accepted_file_types": state.settings.allowed_file_types(),
        "max_file_size_mb": state.settings.max_file_size_mb(),
        "endpoints": {
            "evaluate_text": "POST /evaluate-text",
            "evaluate_file": "POST /evaluate-file",
            "health": "GET /health",
            "index": "GET /api",
        },
    }))
}

/// Binds to the configured address and serves until Ctrl-C.
pub async fn serve(settings: Settings) -> Result<()> {
    let settings = Arc::new(settings);
    if !settings.api_configured() {
        tracing::warn!("PERPLEXITY_API_KEY is not set; evaluations will fail until it is");
    }

    let state = AppState::new(Arc::clone(&settings)).context("Failed to build evaluator")?;
    let address = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Could not listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
