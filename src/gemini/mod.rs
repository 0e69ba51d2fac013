//! Gemini model access.
//!
//! - [`types`]: `generateContent` request and response bodies
//! - [`client`]: HTTP calls to the Generative Language API and Vertex AI
//! - [`credentials`]: bearer tokens for Google Cloud APIs

pub mod client;
pub mod credentials;
pub mod types;

pub use client::{GeminiClient, ModelStream, UpstreamAuth};
pub use credentials::GcpCredentials;
pub use types::{GenerateContentRequest, GenerationSettings, Part};
