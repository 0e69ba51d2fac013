//! pdf-extractor: document extraction gateway for Gemini.
//!
//! Accepts an uploaded document and a prompt over HTTP, sends the document
//! to a Gemini model, and returns the model's JSON extraction. Three
//! variants share one router:
//!   inline         document bytes in the request, API key
//!   streaming      document staged in GCS, Vertex AI streamed answer
//!   authenticated  bearer JWT required, document inline to Vertex AI

pub mod assemble;
pub mod auth;
pub mod config;
pub mod error;
pub mod gemini;
pub mod metrics;
pub mod server;
pub mod storage;
