//! HTTP server for document extraction.
//!
//! - [`api`]: Router, shared state, and the inline and authenticated handlers
//! - [`form`]: Multipart form parsing and default prompts
//! - [`streaming`]: The staged, streamed extraction handler

pub mod api;
pub mod form;
pub mod streaming;
