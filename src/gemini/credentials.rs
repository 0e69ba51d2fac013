//! Google Cloud credentials for Vertex AI and Cloud Storage calls.

use std::fmt;

use axum::http::Extensions;
use google_cloud_auth::credentials::{Builder, CacheableResource, Credentials};
use secrecy::SecretString;
use tracing::{debug, warn};

use crate::config::VertexConfig;
use crate::error::ExtractError;

/// Where bearer tokens for Google APIs come from.
#[derive(Clone)]
pub enum GcpCredentials {
    /// Application Default Credentials via the Google auth SDK.
    Sdk(Credentials),
    /// A fixed token supplied through configuration.
    Static(SecretString),
    /// No credentials could be built at startup. Holds the reason.
    Unavailable(String),
}

impl fmt::Debug for GcpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcpCredentials::Sdk(_) => write!(f, "GcpCredentials::Sdk"),
            GcpCredentials::Static(_) => write!(f, "GcpCredentials::Static([redacted])"),
            GcpCredentials::Unavailable(reason) => {
                write!(f, "GcpCredentials::Unavailable({reason})")
            }
        }
    }
}

impl GcpCredentials {
    /// Prefer a configured static token, otherwise Application Default Credentials.
    pub fn from_config(config: &VertexConfig) -> Self {
        if let Some(token) = &config.access_token {
            debug!("Using static Google access token from configuration");
            return GcpCredentials::Static(token.clone());
        }
        match Builder::default().build() {
            Ok(creds) => GcpCredentials::Sdk(creds),
            Err(e) => {
                warn!(error = %e, "Google Application Default Credentials unavailable");
                GcpCredentials::Unavailable(e.to_string())
            }
        }
    }

    /// Fetch a bearer token for `https://www.googleapis.com/auth/cloud-platform`.
    pub async fn access_token(&self) -> Result<SecretString, ExtractError> {
        match self {
            GcpCredentials::Static(token) => Ok(token.clone()),
            GcpCredentials::Unavailable(reason) => Err(ExtractError::AccessToken(reason.clone())),
            GcpCredentials::Sdk(creds) => {
                let headers = creds
                    .headers(Extensions::default())
                    .await
                    .map_err(|e| ExtractError::AccessToken(e.to_string()))?;
                let headers = match headers {
                    CacheableResource::New { data, .. } => data,
                    // Only returned when an entity tag is passed in the extensions.
                    CacheableResource::NotModified => {
                        return Err(ExtractError::AccessToken(
                            "credentials returned NotModified without an entity tag".to_string(),
                        ))
                    }
                };
                headers
                    .get("Authorization")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))
                    .map(|token| SecretString::from(token.to_string()))
                    .ok_or_else(|| {
                        ExtractError::AccessToken(format!(
                            "expected a Bearer Authorization header, found: {:?}",
                            headers.keys().collect::<Vec<_>>()
                        ))
                    })
            }
        }
    }
}
