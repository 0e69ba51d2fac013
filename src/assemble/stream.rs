//! Reassembly of a streamed `streamGenerateContent` response.
//!
//! With `?alt=sse` the body is a server-sent event stream, decoded by
//! `eventsource-stream`; each event's `data` is one generation chunk.
//! Without it the body is a JSON array of chunks or newline-delimited JSON,
//! read line by line. Either way each payload is a generation chunk or
//! something else entirely. Chunk text is concatenated into two views of
//! the answer:
//!
//! - `accumulated_text`: the first answer part of each chunk, plus any
//!   payload that was not valid JSON, verbatim. This is what gets parsed.
//! - `merged_parts_text`: every answer part of each chunk. Only reported back
//!   when parsing fails, to help diagnose multi-part chunks.

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use tracing::{debug, trace};

use crate::assemble::lines::LineSplitter;
use crate::error::ExtractError;
use crate::gemini::types::GenerateContentResponse;

/// How a streamed response body is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `text/event-stream`: one chunk per event.
    EventStream,
    /// JSON array or newline-delimited JSON: one chunk per line.
    Lines,
}

impl Framing {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.trim_start().starts_with("text/event-stream") => Framing::EventStream,
            _ => Framing::Lines,
        }
    }
}

/// The text reassembled from a finished stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledText {
    pub accumulated_text: String,
    pub merged_parts_text: String,
    /// Number of payloads that parsed as generation chunks.
    pub chunks: usize,
    /// Number of non-JSON payloads appended verbatim.
    pub raw_lines: usize,
}

/// Single-pass accumulator over the payloads of a streamed response.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    out: AssembledText,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the `data` of one server-sent event.
    pub fn push_event_data(&mut self, data: &str) -> Result<(), ExtractError> {
        self.push_payload(data.trim(), data)
    }

    /// Consume one line of a JSON-array or newline-delimited body.
    pub fn push_line(&mut self, raw: &str) -> Result<(), ExtractError> {
        self.push_payload(strip_array_framing(raw.trim()), raw)
    }

    fn push_payload(&mut self, payload: &str, raw: &str) -> Result<(), ExtractError> {
        if payload.is_empty() {
            return Ok(());
        }
        match serde_json::from_str::<GenerateContentResponse>(payload) {
            Ok(chunk) => self.push_chunk(chunk),
            Err(e) => {
                trace!(error = %e, "Appending non-JSON stream payload verbatim");
                self.out.accumulated_text.push_str(raw);
                self.out.raw_lines += 1;
                Ok(())
            }
        }
    }

    fn push_chunk(&mut self, chunk: GenerateContentResponse) -> Result<(), ExtractError> {
        if let Some(error) = chunk.error {
            return Err(ExtractError::UpstreamStream(error.to_string()));
        }
        self.out.chunks += 1;

        let Some(candidate) = chunk.candidates.first() else {
            return Ok(());
        };
        if let Some(text) = candidate.first_part_text() {
            self.out.accumulated_text.push_str(text);
        }
        if let Some(text) = candidate.text() {
            self.out.merged_parts_text.push_str(&text);
        }
        if let Some(reason) = &candidate.finish_reason {
            debug!(finish_reason = %reason, chunks = self.out.chunks, "Stream finished");
        }
        Ok(())
    }

    pub fn finish(self) -> AssembledText {
        self.out
    }
}

/// Strip the `[`, `,` and `]` that surround chunks when the upstream sends a
/// JSON array.
fn strip_array_framing(payload: &str) -> &str {
    payload
        .trim_start_matches(['[', ','])
        .trim_end_matches([']', ','])
        .trim()
}

/// Drive a byte stream to completion and reassemble its text.
pub async fn assemble_stream<S, B, E>(
    framing: Framing,
    stream: S,
) -> Result<AssembledText, ExtractError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut assembler = StreamAssembler::new();

    match framing {
        Framing::EventStream => {
            let mut events = std::pin::pin!(stream.eventsource());
            while let Some(event) = events.next().await {
                let event = event.map_err(|e| ExtractError::StreamRead(e.to_string()))?;
                assembler.push_event_data(&event.data)?;
            }
        }
        Framing::Lines => {
            let mut stream = std::pin::pin!(stream);
            let mut splitter = LineSplitter::new();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| ExtractError::StreamRead(e.to_string()))?;
                for line in splitter.push(chunk.as_ref()) {
                    assembler.push_line(&line)?;
                }
            }
            if let Some(rest) = splitter.finish() {
                assembler.push_line(&rest)?;
            }
        }
    }

    let assembled = assembler.finish();
    debug!(
        framing = ?framing,
        chunks = assembled.chunks,
        raw_lines = assembled.raw_lines,
        text_len = assembled.accumulated_text.len(),
        "Stream reassembled"
    );
    Ok(assembled)
}
