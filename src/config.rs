//! Runtime configuration for pdf-extractor.
//!
//! Server knobs come from the command line (with environment fallbacks).
//! Upstream settings (Gemini, Vertex AI, staging bucket, JWT verification)
//! are read from environment variables only. Missing upstream settings do
//! not stop the server from starting; the affected endpoint reports them
//! at request time instead.

use std::path::PathBuf;

use clap::Parser;
use secrecy::SecretString;

use crate::error::ExtractError;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pdf-extractor",
    about = "Document extraction gateway for Gemini / Vertex AI"
)]
pub struct Cli {
    /// HTTP listen address.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// Largest accepted request body in bytes.
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 32 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Timeout for a single upstream model call, in seconds.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 300)]
    pub upstream_timeout_secs: u64,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Generative Language API (API-key, inline documents).
    pub genai: GenAiConfig,

    /// Vertex AI (streaming and authenticated endpoints).
    pub vertex: VertexConfig,

    /// Object storage used to stage documents for streaming.
    pub storage: StorageConfig,

    /// Bearer JWT verification.
    pub auth: AuthConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,

    /// Maximum request body size in bytes.
    pub max_upload_bytes: usize,

    /// Upstream request timeout in seconds.
    pub upstream_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            max_upload_bytes: 32 * 1024 * 1024,
            upstream_timeout_secs: 300,
        }
    }
}

impl From<&Cli> for ServerConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            listen: cli.listen.clone(),
            max_upload_bytes: cli.max_upload_bytes,
            upstream_timeout_secs: cli.upstream_timeout_secs,
        }
    }
}

/// Generative Language API settings.
#[derive(Debug, Clone)]
pub struct GenAiConfig {
    /// API key (`GOOGLE_CLOUD_API_KEY`).
    pub api_key: Option<SecretString>,

    /// Model name.
    pub model: String,

    /// Base URL, overridable for testing.
    pub base_url: String,
}

impl Default for GenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash-lite".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

impl GenAiConfig {
    /// `generateContent` URL for the configured model.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// The API key, or the error reported to callers when it is unset.
    pub fn require_api_key(&self) -> Result<&SecretString, ExtractError> {
        self.api_key
            .as_ref()
            .ok_or(ExtractError::MissingConfig("GOOGLE_CLOUD_API_KEY"))
    }
}

/// Vertex AI settings.
#[derive(Debug, Clone)]
pub struct VertexConfig {
    /// GCP project id.
    pub project_id: Option<String>,

    /// Region used by the streaming endpoint.
    pub location: String,

    /// Region used by the authenticated endpoint.
    pub auth_location: String,

    /// Model name.
    pub model: String,

    /// Base URL override. When unset the regional host is derived from the location.
    pub base_url: Option<String>,

    /// Static bearer token used instead of Application Default Credentials.
    pub access_token: Option<SecretString>,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: "us-central1".to_string(),
            auth_location: "asia-southeast1".to_string(),
            model: "gemini-2.5-flash".to_string(),
            base_url: None,
            access_token: None,
        }
    }
}

impl VertexConfig {
    /// Publisher-model URL for `method` (`generateContent`, `streamGenerateContent`).
    pub fn endpoint(&self, location: &str, method: &str) -> Result<String, ExtractError> {
        let project_id = self
            .project_id
            .as_deref()
            .ok_or(ExtractError::MissingConfig("PROJECT_ID"))?;
        let base = match &self.base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{location}-aiplatform.googleapis.com"),
        };
        Ok(format!(
            "{base}/v1/projects/{project_id}/locations/{location}/publishers/google/models/{model}:{method}",
            model = self.model,
        ))
    }
}

/// Staging bucket settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Bucket that receives uploaded documents before streaming generation.
    pub bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "edii-ocr".to_string(),
        }
    }
}

/// JWT verification settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PEM file holding the RSA public key.
    pub public_key_path: PathBuf,

    /// Inline PEM; takes precedence over `public_key_path`.
    pub public_key_pem: Option<String>,

    /// Expected `iss` claim.
    pub issuer: String,

    /// Expected `aud` claim.
    pub audience: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            public_key_path: PathBuf::from("/secrets/jwt-public.pem"),
            public_key_pem: None,
            issuer: "external-backend".to_string(),
            audience: "cloud-run".to_string(),
        }
    }
}

impl Config {
    /// Read upstream configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup, falling back to
    /// defaults for anything unset or blank.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Config::default();

        Self {
            server: defaults.server,
            genai: GenAiConfig {
                api_key: var("GOOGLE_CLOUD_API_KEY").map(SecretString::from),
                model: var("GENAI_MODEL_NAME").unwrap_or(defaults.genai.model),
                base_url: var("GENAI_BASE_URL").unwrap_or(defaults.genai.base_url),
            },
            vertex: VertexConfig {
                project_id: var("PROJECT_ID"),
                location: var("LOCATION").unwrap_or(defaults.vertex.location),
                auth_location: var("AUTH_LOCATION").unwrap_or(defaults.vertex.auth_location),
                model: var("MODEL_NAME").unwrap_or(defaults.vertex.model),
                base_url: var("VERTEX_BASE_URL"),
                access_token: var("GOOGLE_ACCESS_TOKEN").map(SecretString::from),
            },
            storage: StorageConfig {
                bucket: var("BUCKET_NAME").unwrap_or(defaults.storage.bucket),
            },
            auth: AuthConfig {
                public_key_path: var("JWT_PUBLIC_KEY_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.auth.public_key_path),
                public_key_pem: var("JWT_PUBLIC_KEY"),
                issuer: var("JWT_ISSUER").unwrap_or(defaults.auth.issuer),
                audience: var("JWT_AUDIENCE").unwrap_or(defaults.auth.audience),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let cfg = Config::from_lookup(|_| None);
        assert_eq!(cfg.genai.model, "gemini-2.5-flash-lite");
        assert_eq!(cfg.vertex.model, "gemini-2.5-flash");
        assert_eq!(cfg.vertex.location, "us-central1");
        assert_eq!(cfg.vertex.auth_location, "asia-southeast1");
        assert_eq!(cfg.storage.bucket, "edii-ocr");
        assert_eq!(cfg.auth.issuer, "external-backend");
        assert_eq!(cfg.auth.audience, "cloud-run");
        assert!(cfg.genai.api_key.is_none());
        assert!(cfg.vertex.project_id.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("GOOGLE_CLOUD_API_KEY", "key-123"),
            ("PROJECT_ID", "my-project"),
            ("LOCATION", "europe-west4"),
            ("MODEL_NAME", "gemini-2.5-pro"),
            ("BUCKET_NAME", "staging"),
            ("JWT_AUDIENCE", "api"),
        ]));
        assert_eq!(
            cfg.genai.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("key-123".to_string())
        );
        assert_eq!(cfg.vertex.project_id.as_deref(), Some("my-project"));
        assert_eq!(cfg.vertex.location, "europe-west4");
        assert_eq!(cfg.vertex.model, "gemini-2.5-pro");
        assert_eq!(cfg.storage.bucket, "staging");
        assert_eq!(cfg.auth.audience, "api");
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let cfg = Config::from_lookup(lookup(&[("MODEL_NAME", "  "), ("PROJECT_ID", "")]));
        assert_eq!(cfg.vertex.model, "gemini-2.5-flash");
        assert!(cfg.vertex.project_id.is_none());
    }

    #[test]
    fn test_vertex_endpoint() {
        let cfg = Config::from_lookup(lookup(&[("PROJECT_ID", "p1")]));
        let url = cfg
            .vertex
            .endpoint("us-central1", "streamGenerateContent")
            .unwrap();
        assert_eq!(
            url,
            "https://us-central1-aiplatform.googleapis.com/v1/projects/p1/locations/us-central1/publishers/google/models/gemini-2.5-flash:streamGenerateContent"
        );
    }

    #[test]
    fn test_vertex_endpoint_with_base_override() {
        let cfg = Config::from_lookup(lookup(&[
            ("PROJECT_ID", "p1"),
            ("VERTEX_BASE_URL", "http://127.0.0.1:9000/"),
        ]));
        let url = cfg
            .vertex
            .endpoint("asia-southeast1", "generateContent")
            .unwrap();
        assert_eq!(
            url,
            "http://127.0.0.1:9000/v1/projects/p1/locations/asia-southeast1/publishers/google/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_vertex_endpoint_requires_project() {
        let cfg = Config::default();
        let err = cfg.vertex.endpoint("us-central1", "generateContent").unwrap_err();
        assert!(matches!(err, ExtractError::MissingConfig("PROJECT_ID")));
    }

    #[test]
    fn test_genai_endpoint() {
        let cfg = Config::default();
        assert_eq!(
            cfg.genai.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-lite:generateContent"
        );
        assert!(matches!(
            cfg.genai.require_api_key(),
            Err(ExtractError::MissingConfig("GOOGLE_CLOUD_API_KEY"))
        ));
    }
}
