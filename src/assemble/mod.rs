//! Turning model output into the JSON returned to callers.
//!
//! - [`lines`]: byte chunks to complete text lines, for line-framed bodies
//! - [`stream`]: reassembly of streamed generation chunks into one text blob
//!
//! Both the streamed and non-streamed paths end in [`parse_model_json`],
//! which strips Markdown code fences and parses what is left.

pub mod lines;
pub mod stream;

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ExtractError;

pub use lines::LineSplitter;
pub use stream::{assemble_stream, AssembledText, Framing, StreamAssembler};

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json|```").expect("code fence pattern is valid"));

/// Remove every ```` ```json ```` and ```` ``` ```` marker and trim the result.
pub fn clean_json_text(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

/// Clean `raw_text` and parse it as JSON.
///
/// `merged_parts_text` is the alternative reassembly produced by the
/// streaming path; it is only echoed back in the error envelope.
pub fn parse_model_json(
    raw_text: &str,
    merged_parts_text: Option<&str>,
) -> Result<Value, ExtractError> {
    let clean_text = clean_json_text(raw_text);
    serde_json::from_str(&clean_text).map_err(|e| ExtractError::InvalidJson {
        raw_text: raw_text.to_string(),
        clean_text,
        merged_parts_text: merged_parts_text.map(str::to_string),
        exception: e.to_string(),
    })
}
