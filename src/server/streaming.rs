//! Streaming extraction: stage the document, stream the model's answer back
//! in chunks, and reassemble it before parsing.
//!
//! The caller still receives one JSON body. Streaming only applies between
//! this service and Vertex AI, where it keeps long generations from hitting
//! a single-response timeout.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::response::Response;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::assemble::{assemble_stream, parse_model_json};
use crate::error::ExtractError;
use crate::gemini::{GenerateContentRequest, GenerationSettings, Part, UpstreamAuth};
use crate::server::api::{respond, AppState, Reply};
use crate::server::form::{ExtractionForm, STREAMING_SYSTEM_INSTRUCTION};
use crate::storage::StagingBucket;

#[instrument(skip_all, fields(variant = "stream", request_id = %Uuid::new_v4()))]
pub async fn extract_stream(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let result = run_stream(&state, multipart).await;
    respond(&state, "stream", result)
}

async fn run_stream(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Reply, ExtractError> {
    let form = ExtractionForm::from_multipart(multipart).await?;
    let file = form.require_file()?;

    let vertex = &state.config.vertex;
    let endpoint = vertex.endpoint(&vertex.location, "streamGenerateContent")?;
    let access_token = state.credentials.access_token().await?;

    let object_name = StagingBucket::object_name(&file.file_name);
    info!(
        file_name = %file.file_name,
        object = %object_name,
        mime_type = %file.mime_type,
        bytes = file.bytes.len(),
        bucket = state.staging.bucket(),
        "Streaming extraction request"
    );
    let file_uri = state
        .staging
        .upload(&object_name, file.bytes.clone(), &state.credentials)
        .await?;

    let request = GenerateContentRequest::new(
        form.system_instruction_or(STREAMING_SYSTEM_INSTRUCTION),
        form.prompt(),
        Part::file_data(&file.mime_type, &file_uri),
        GenerationSettings::streaming(),
    );

    let started = Instant::now();
    let assembled = async {
        let response = state
            .gemini
            .stream_generate_content(&endpoint, UpstreamAuth::Bearer(&access_token), &request)
            .await?;
        assemble_stream(response.framing, response.body).await
    }
    .await;
    state.metrics.observe_upstream("stream", started.elapsed());
    let assembled = assembled?;

    info!(
        chunks = assembled.chunks,
        raw_lines = assembled.raw_lines,
        text_len = assembled.accumulated_text.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Model stream reassembled"
    );

    parse_model_json(
        &assembled.accumulated_text,
        Some(&assembled.merged_parts_text),
    )
    .map(Reply::Extracted)
}
