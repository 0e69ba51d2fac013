//! Bearer JWT verification for the authenticated endpoint.
//!
//! Tokens are RS256-signed by an external backend. They must carry a
//! non-expired `exp` and the configured `iss` and `aud`.

use std::fmt;

use axum::http::{header, HeaderMap};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::error::ExtractError;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid RSA public key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
}

/// Claims of a verified token.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub exp: u64,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Verifies bearer tokens against one RSA public key.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("iss", &self.validation.iss)
            .field("aud", &self.validation.aud)
            .finish()
    }
}

impl JwtVerifier {
    pub fn from_pem(pem: &[u8], issuer: &str, audience: &str) -> Result<Self, KeyError> {
        let key = DecodingKey::from_rsa_pem(pem)?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        Ok(Self { key, validation })
    }

    /// Load the key named by the configuration.
    ///
    /// An inline PEM wins over the key file. A missing key file is not an
    /// error: the authenticated endpoint then answers 500 until one is
    /// provided. An unreadable or malformed key is an error.
    pub fn from_config(config: &AuthConfig) -> Result<Option<Self>, KeyError> {
        let pem = match &config.public_key_pem {
            Some(pem) => pem.clone().into_bytes(),
            None => match std::fs::read(&config.public_key_path) {
                Ok(pem) => pem,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(
                        path = %config.public_key_path.display(),
                        "JWT public key not found; authenticated endpoint disabled"
                    );
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            },
        };
        let verifier = Self::from_pem(&pem, &config.issuer, &config.audience)?;
        info!(issuer = %config.issuer, audience = %config.audience, "JWT verifier loaded");
        Ok(Some(verifier))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ExtractError> {
        match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => {
                debug!(sub = ?data.claims.sub, "Bearer token verified");
                Ok(data.claims)
            }
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(ExtractError::TokenExpired),
                _ => {
                    debug!(error = %e, "Bearer token rejected");
                    Err(ExtractError::InvalidToken)
                }
            },
        }
    }
}

/// The token from an `Authorization` header.
///
/// `Bearer <token>` is the expected form; a value without the scheme is
/// taken as the token itself.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ExtractError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(ExtractError::MissingAuthorization)?
        .to_str()
        .map_err(|_| ExtractError::InvalidToken)?
        .trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim();
    if token.is_empty() {
        return Err(ExtractError::MissingAuthorization);
    }
    Ok(token)
}
