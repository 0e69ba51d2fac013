//! Shared helpers: a mock Gemini / Vertex AI upstream and an app launcher.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use pdf_extractor::config::Config;
use pdf_extractor::server::api::{build_router, AppState};

pub const PUBLIC_KEY: &str = include_str!("../fixtures/jwt-public.pem");
pub const PRIVATE_KEY: &str = include_str!("../fixtures/jwt-private.pem");
pub const OTHER_PRIVATE_KEY: &str = include_str!("../fixtures/other-private.pem");

pub const API_KEY: &str = "test-api-key";
pub const ACCESS_TOKEN: &str = "test-access-token";

/// What the mock upstream answers with.
#[derive(Clone)]
pub enum MockReply {
    Json(StatusCode, Value),
    Text(StatusCode, String),
    /// Body chunks sent one at a time as `text/event-stream`.
    Chunks(Vec<String>),
}

/// A request the mock upstream received.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    reply: MockReply,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

pub struct MockUpstream {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockUpstream {
    pub async fn start(reply: MockReply) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            reply,
            requests: requests.clone(),
        };
        let app = Router::new().fallback(mock_handler).with_state(state);
        let addr = serve(app).await;
        Self {
            url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests()
            .pop()
            .expect("mock upstream received no request")
    }
}

async fn mock_handler(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.requests.lock().unwrap().push(Recorded {
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    });

    match state.reply {
        MockReply::Json(status, value) => (status, Json(value)).into_response(),
        MockReply::Text(status, text) => (status, text).into_response(),
        MockReply::Chunks(chunks) => {
            let stream = futures::stream::iter(
                chunks
                    .into_iter()
                    .map(|c| Ok::<_, Infallible>(Bytes::from(c))),
            );
            (
                [(header::CONTENT_TYPE, "text/event-stream")],
                Body::from_stream(stream),
            )
                .into_response()
        }
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Configuration pointing every upstream at `upstream_url`, with all
/// variants configured.
pub fn test_config(upstream_url: &str) -> Config {
    config_with(upstream_url, &[])
}

/// Like [`test_config`], with `overrides` applied on top. An empty value
/// unsets the variable.
pub fn config_with(upstream_url: &str, overrides: &[(&str, &str)]) -> Config {
    let base = [
        ("GOOGLE_CLOUD_API_KEY", API_KEY),
        ("GENAI_BASE_URL", upstream_url),
        ("PROJECT_ID", "test-project"),
        ("VERTEX_BASE_URL", upstream_url),
        ("GOOGLE_ACCESS_TOKEN", ACCESS_TOKEN),
        ("JWT_PUBLIC_KEY", PUBLIC_KEY),
    ];
    Config::from_lookup(|name| {
        overrides
            .iter()
            .chain(base.iter())
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    })
}

/// Serve the app on an ephemeral port and return its base URL.
pub async fn spawn_app(state: AppState) -> String {
    let addr = serve(build_router(Arc::new(state))).await;
    format!("http://{addr}")
}

/// A generateContent response whose first candidate says `text`.
pub fn model_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 1200, "candidatesTokenCount": 40, "totalTokenCount": 1240}
    })
}

/// One server-sent event carrying a chunk with the given text parts.
pub fn sse_chunk(parts: &[&str]) -> String {
    let parts: Vec<Value> = parts.iter().map(|t| json!({"text": t})).collect();
    let chunk = json!({"candidates": [{"content": {"role": "model", "parts": parts}}]});
    format!("data: {chunk}\r\n\r\n")
}

pub fn pdf_form() -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(b"%PDF-1.7 test document".to_vec())
        .file_name("invoice.pdf")
        .mime_str("application/pdf")
        .unwrap();
    reqwest::multipart::Form::new().part("file", part)
}

pub fn sign_token(private_key: &str, exp_offset_secs: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let claims = json!({
        "iss": "external-backend",
        "aud": "cloud-run",
        "sub": "backend-service",
        "exp": now + exp_offset_secs,
    });
    let key = EncodingKey::from_rsa_pem(private_key.as_bytes()).unwrap();
    encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
}
