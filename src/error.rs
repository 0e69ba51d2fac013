//! Error types and the JSON error envelope returned to callers.
//!
//! Every failure stage of an extraction request maps to one [`ExtractError`]
//! variant. The envelope always carries an `error` key; diagnostic keys
//! (`details`, `status`, `raw`, `raw_text`, `clean_text`, `merged_parts_text`,
//! `exception`) are added for the stages that have them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{error, warn};

/// The upstream API an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    /// Generative Language API (API key).
    GenAi,
    /// Vertex AI (OAuth bearer).
    Vertex,
}

impl Upstream {
    fn request_failed(self) -> &'static str {
        match self {
            Upstream::GenAi => "Google AI API Error",
            Upstream::Vertex => "Request to Vertex AI failed",
        }
    }

    fn status_error(self) -> &'static str {
        match self {
            Upstream::GenAi => "Google AI API error",
            Upstream::Vertex => "Vertex AI error",
        }
    }
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Upstream::GenAi => write!(f, "genai"),
            Upstream::Vertex => write!(f, "vertex"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Use POST method")]
    MethodNotAllowed,

    #[error("Invalid multipart form: {0}")]
    InvalidForm(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("File 'file' not found in form-data")]
    MissingFile,

    #[error("Missing Authorization header")]
    MissingAuthorization,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("{0} is not set")]
    MissingConfig(&'static str),

    #[error("JWT public key is not configured")]
    JwtKeyMissing,

    #[error("Failed to get access token: {0}")]
    AccessToken(String),

    #[error("GCS upload failed: {0}")]
    UploadFailed(String),

    #[error("{upstream} request failed: {details}")]
    UpstreamRequest { upstream: Upstream, details: String },

    #[error("{upstream} returned HTTP {status}")]
    UpstreamStatus {
        upstream: Upstream,
        status: u16,
        details: String,
    },

    #[error("Vertex AI stream error: {0}")]
    UpstreamStream(String),

    #[error("Error reading stream: {0}")]
    StreamRead(String),

    #[error("Invalid response from model")]
    InvalidResponse { raw: Value },

    #[error("Model did not return valid JSON: {exception}")]
    InvalidJson {
        raw_text: String,
        clean_text: String,
        merged_parts_text: Option<String>,
        exception: String,
    },
}

impl ExtractError {
    /// HTTP status sent to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ExtractError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ExtractError::InvalidForm(_) | ExtractError::MissingFile => StatusCode::BAD_REQUEST,
            ExtractError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ExtractError::MissingAuthorization
            | ExtractError::TokenExpired
            | ExtractError::InvalidToken => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for the failing stage, used in logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            ExtractError::MethodNotAllowed => "method",
            ExtractError::InvalidForm(_) => "form",
            ExtractError::PayloadTooLarge(_) => "payload_too_large",
            ExtractError::MissingFile => "missing_file",
            ExtractError::MissingAuthorization => "missing_auth",
            ExtractError::TokenExpired => "token_expired",
            ExtractError::InvalidToken => "invalid_token",
            ExtractError::MissingConfig(_) | ExtractError::JwtKeyMissing => "config",
            ExtractError::AccessToken(_) => "access_token",
            ExtractError::UploadFailed(_) => "upload",
            ExtractError::UpstreamRequest { .. } => "upstream_request",
            ExtractError::UpstreamStatus { .. } => "upstream_status",
            ExtractError::UpstreamStream(_) => "upstream_stream",
            ExtractError::StreamRead(_) => "stream_read",
            ExtractError::InvalidResponse { .. } => "invalid_response",
            ExtractError::InvalidJson { .. } => "invalid_json",
        }
    }

    /// The JSON error envelope.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        let mut put = |key: &str, value: Value| {
            body.insert(key.to_string(), value);
        };

        match self {
            ExtractError::InvalidForm(details) => {
                put("error", json!("Invalid multipart form"));
                put("details", json!(details));
            }
            ExtractError::PayloadTooLarge(details) => {
                put("error", json!("Request body too large"));
                put("details", json!(details));
            }
            ExtractError::AccessToken(details) => {
                put("error", json!("Failed to get access token"));
                put("details", json!(details));
            }
            ExtractError::UploadFailed(details) => {
                put("error", json!("GCS upload failed"));
                put("details", json!(details));
            }
            ExtractError::UpstreamRequest { upstream, details } => {
                put("error", json!(upstream.request_failed()));
                put("details", json!(details));
            }
            ExtractError::UpstreamStatus {
                upstream,
                status,
                details,
            } => {
                put("error", json!(upstream.status_error()));
                put("status", json!(status));
                put("details", json!(details));
            }
            ExtractError::UpstreamStream(details) => {
                put("error", json!("Vertex AI stream error"));
                put("details", json!(details));
            }
            ExtractError::StreamRead(details) => {
                put("error", json!("Error reading stream"));
                put("details", json!(details));
            }
            ExtractError::InvalidResponse { raw } => {
                put("error", json!("Invalid response from model"));
                put("raw", raw.clone());
            }
            ExtractError::InvalidJson {
                raw_text,
                clean_text,
                merged_parts_text,
                exception,
            } => {
                put("error", json!("Model did not return valid JSON"));
                put("clean_text", json!(clean_text));
                put("raw_text", json!(raw_text));
                if let Some(merged) = merged_parts_text {
                    put("merged_parts_text", json!(merged));
                }
                put("exception", json!(exception));
            }
            other => put("error", json!(other.to_string())),
        }

        Value::Object(body)
    }
}

impl IntoResponse for ExtractError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(stage = self.stage(), error = %self, "Extraction failed");
        } else {
            warn!(stage = self.stage(), error = %self, "Request rejected");
        }
        (status, Json(self.to_body())).into_response()
    }
}

/// Errors raised while building the application at startup.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Failed to load JWT public key: {0}")]
    JwtKey(#[from] crate::auth::KeyError),
}
