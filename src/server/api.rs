//! Document extraction HTTP API.
//!
//! - POST /v1/extract         inline document, Generative Language API key
//! - POST /v1/extract/stream  staged document, Vertex AI streaming
//! - POST /v1/extract/secure  bearer JWT, inline document to Vertex AI
//! - GET  /health
//! - GET  /metrics

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::assemble::parse_model_json;
use crate::auth::{bearer_token, JwtVerifier};
use crate::config::Config;
use crate::error::{ExtractError, StartupError, Upstream};
use crate::gemini::{
    GcpCredentials, GeminiClient, GenerateContentRequest, GenerationSettings, Part, UpstreamAuth,
};
use crate::metrics::Metrics;
use crate::server::form::{
    ExtractionForm, AUTHENTICATED_SYSTEM_INSTRUCTION, INLINE_SYSTEM_INSTRUCTION,
};
use crate::server::streaming::extract_stream;
use crate::storage::StagingBucket;

/// Application state shared across handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub gemini: GeminiClient,
    pub credentials: GcpCredentials,
    pub staging: StagingBucket,
    pub verifier: Option<JwtVerifier>,
    pub metrics: Metrics,
    pub start_time: Instant,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self, StartupError> {
        let gemini = GeminiClient::new(Duration::from_secs(config.server.upstream_timeout_secs))?;
        let credentials = GcpCredentials::from_config(&config.vertex);
        let staging = StagingBucket::gcs(config.storage.bucket.clone());
        let verifier = JwtVerifier::from_config(&config.auth)?;
        let metrics = Metrics::new()?;

        Ok(Self {
            config: Arc::new(config),
            gemini,
            credentials,
            staging,
            verifier,
            metrics,
            start_time: Instant::now(),
        })
    }

    /// Replace the staging bucket, e.g. with an in-memory store.
    pub fn with_staging(mut self, staging: StagingBucket) -> Self {
        self.staging = staging;
        self
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route(
            "/v1/extract",
            post(extract_inline).fallback(method_not_allowed),
        )
        .route(
            "/v1/extract/stream",
            post(extract_stream).fallback(method_not_allowed),
        )
        .route(
            "/v1/extract/secure",
            post(extract_secure).fallback(method_not_allowed),
        )
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}

// ─── Response Types ────────────────────────────────────────────────────────

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub variants: VariantStatus,
}

/// Which extraction variants have the configuration they need.
#[derive(Debug, Serialize)]
pub struct VariantStatus {
    pub inline: bool,
    pub streaming: bool,
    pub authenticated: bool,
}

/// What a successful handler produced.
pub(crate) enum Reply {
    Extracted(Value),
    Ping,
}

/// Count the outcome and turn it into a response.
pub(crate) fn respond(
    state: &AppState,
    variant: &'static str,
    result: Result<Reply, ExtractError>,
) -> Response {
    match result {
        Ok(Reply::Extracted(value)) => {
            state.metrics.record(variant, "ok");
            info!(variant, "Extraction succeeded");
            (StatusCode::OK, Json(value)).into_response()
        }
        Ok(Reply::Ping) => {
            state.metrics.record(variant, "ping");
            (StatusCode::OK, Json(json!({"message": "ping received"}))).into_response()
        }
        Err(e) => {
            state.metrics.record(variant, e.stage());
            e.into_response()
        }
    }
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn method_not_allowed() -> ExtractError {
    ExtractError::MethodNotAllowed
}

#[instrument(skip_all, fields(variant = "inline", request_id = %Uuid::new_v4()))]
async fn extract_inline(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let result = run_inline(&state, multipart).await;
    respond(&state, "inline", result)
}

async fn run_inline(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Reply, ExtractError> {
    let form = ExtractionForm::from_multipart(multipart).await?;
    let file = form.require_file()?;
    let api_key = state.config.genai.require_api_key()?;

    info!(
        file_name = %file.file_name,
        mime_type = %file.mime_type,
        bytes = file.bytes.len(),
        model = %state.config.genai.model,
        "Inline extraction request"
    );

    let request = GenerateContentRequest::new(
        form.system_instruction_or(INLINE_SYSTEM_INSTRUCTION),
        form.prompt(),
        Part::inline_data(&file.mime_type, &file.bytes),
        GenerationSettings::inline(),
    );

    let started = Instant::now();
    let text = state
        .gemini
        .generate_content(
            Upstream::GenAi,
            &state.config.genai.endpoint(),
            UpstreamAuth::ApiKey(api_key),
            &request,
        )
        .await;
    state.metrics.observe_upstream("inline", started.elapsed());

    parse_model_json(&text?, None).map(Reply::Extracted)
}

#[instrument(skip_all, fields(variant = "secure", request_id = %Uuid::new_v4()))]
async fn extract_secure(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let result = run_secure(&state, &headers, multipart).await;
    respond(&state, "secure", result)
}

async fn run_secure(
    state: &AppState,
    headers: &HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Reply, ExtractError> {
    let token = bearer_token(headers)?;
    let form = ExtractionForm::from_multipart(multipart).await?;
    if form.is_ping() {
        info!("Ping received");
        return Ok(Reply::Ping);
    }

    let verifier = state.verifier.as_ref().ok_or(ExtractError::JwtKeyMissing)?;
    let claims = verifier.verify(token)?;
    let file = form.require_file()?;

    let vertex = &state.config.vertex;
    let endpoint = vertex.endpoint(&vertex.auth_location, "generateContent")?;

    info!(
        sub = ?claims.sub,
        file_name = %file.file_name,
        mime_type = %file.mime_type,
        bytes = file.bytes.len(),
        model = %vertex.model,
        location = %vertex.auth_location,
        "Authenticated extraction request"
    );

    let access_token = state.credentials.access_token().await?;
    let request = GenerateContentRequest::new(
        form.system_instruction_or(AUTHENTICATED_SYSTEM_INSTRUCTION),
        form.prompt(),
        Part::inline_data(&file.mime_type, &file.bytes),
        GenerationSettings::authenticated(),
    );

    let started = Instant::now();
    let text = state
        .gemini
        .generate_content(
            Upstream::Vertex,
            &endpoint,
            UpstreamAuth::Bearer(&access_token),
            &request,
        )
        .await;
    state.metrics.observe_upstream("secure", started.elapsed());

    parse_model_json(&text?, None).map(Reply::Extracted)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let config = &state.config;
    let vertex_ready = config.vertex.project_id.is_some();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        variants: VariantStatus {
            inline: config.genai.api_key.is_some(),
            streaming: vertex_ready,
            authenticated: vertex_ready && state.verifier.is_some(),
        },
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
