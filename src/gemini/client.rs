//! Outbound calls to the Generative Language API and Vertex AI.

use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::assemble::Framing;
use crate::error::{ExtractError, Upstream};
use crate::gemini::types::{GenerateContentRequest, GenerateContentResponse};

/// An open `streamGenerateContent` response body.
pub struct ModelStream {
    pub framing: Framing,
    pub body: BoxStream<'static, reqwest::Result<Bytes>>,
}

/// How a request authenticates with the upstream API.
#[derive(Debug, Clone, Copy)]
pub enum UpstreamAuth<'a> {
    /// `x-goog-api-key` header (Generative Language API).
    ApiKey(&'a SecretString),
    /// OAuth bearer token (Vertex AI).
    Bearer(&'a SecretString),
}

impl UpstreamAuth<'_> {
    fn apply(self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            UpstreamAuth::ApiKey(key) => builder.header("x-goog-api-key", key.expose_secret()),
            UpstreamAuth::Bearer(token) => builder.bearer_auth(token.expose_secret()),
        }
    }
}

/// Thin wrapper over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pdf-extractor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// Non-streaming `generateContent`. Returns the first candidate's answer text.
    pub async fn generate_content(
        &self,
        upstream: Upstream,
        endpoint: &str,
        auth: UpstreamAuth<'_>,
        request: &GenerateContentRequest<'_>,
    ) -> Result<String, ExtractError> {
        let started = Instant::now();
        let response = auth
            .apply(self.http.post(endpoint))
            .json(request)
            .send()
            .await
            .map_err(|e| ExtractError::UpstreamRequest {
                upstream,
                details: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExtractError::UpstreamRequest {
                upstream,
                details: e.to_string(),
            })?;

        if status != StatusCode::OK {
            return Err(ExtractError::UpstreamStatus {
                upstream,
                status: status.as_u16(),
                details: body,
            });
        }

        let raw: Value = serde_json::from_str(&body).map_err(|_| ExtractError::InvalidResponse {
            raw: Value::String(body.clone()),
        })?;
        let parsed = GenerateContentResponse::deserialize(&raw)
            .map_err(|_| ExtractError::InvalidResponse { raw: raw.clone() })?;

        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                candidate_tokens = usage.candidates_token_count,
                total_tokens = usage.total_token_count,
                "Token usage"
            );
        }

        let text = parsed
            .first_candidate_text()
            .ok_or(ExtractError::InvalidResponse { raw })?;

        info!(
            upstream = %upstream,
            elapsed_ms = started.elapsed().as_millis() as u64,
            text_len = text.len(),
            finish_reason = parsed.candidates.first().and_then(|c| c.finish_reason.as_deref()),
            "Model response received"
        );
        Ok(text)
    }

    /// `streamGenerateContent` with server-sent events. Returns the raw body
    /// stream, framed per its content type, once the upstream has answered 200.
    pub async fn stream_generate_content(
        &self,
        endpoint: &str,
        auth: UpstreamAuth<'_>,
        request: &GenerateContentRequest<'_>,
    ) -> Result<ModelStream, ExtractError> {
        let upstream = Upstream::Vertex;
        let response = auth
            .apply(self.http.post(endpoint))
            .query(&[("alt", "sse")])
            .json(request)
            .send()
            .await
            .map_err(|e| ExtractError::UpstreamRequest {
                upstream,
                details: e.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let details = response
                .text()
                .await
                .unwrap_or_else(|_| "<no response>".to_string());
            return Err(ExtractError::UpstreamStatus {
                upstream,
                status: status.as_u16(),
                details,
            });
        }

        let framing = Framing::from_content_type(
            response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        debug!(framing = ?framing, "Stream opened");
        Ok(ModelStream {
            framing,
            body: response.bytes_stream().boxed(),
        })
    }
}
