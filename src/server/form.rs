//! `multipart/form-data` parsing for the extraction endpoints.
//!
//! Fields: `file` (the document), `prompt`, and `system_instruction`.
//! Unknown fields are drained and ignored. A missing file is not a parse
//! error; the handlers decide when it matters, so the authenticated
//! endpoint can answer a ping without one.

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::http::StatusCode;
use bytes::Bytes;
use tracing::debug;

use crate::error::ExtractError;

pub const DEFAULT_PROMPT: &str = "Extract dokumen ini";

/// Prompt value that makes the authenticated endpoint answer without work.
pub const PING_PROMPT: &str = "--ping--";

pub const INLINE_SYSTEM_INSTRUCTION: &str =
    "Keluaran HARUS berupa 1 objek JSON valid. Gunakan nilai kosong '' jika data tidak ditemukan.";

pub const STREAMING_SYSTEM_INSTRUCTION: &str =
    "Keluaran HARUS berupa 1 objek JSON valid. Gunakan nilai kosong \"\" jika data tidak ditemukan.";

pub const AUTHENTICATED_SYSTEM_INSTRUCTION: &str =
    "Keluaran HARUS berupa **satu objek JSON valid**. Gunakan nilai kosong \"\" jika data tidak ditemukan.";

const DEFAULT_FILE_NAME: &str = "document";
const DEFAULT_MIME_TYPE: &str = "application/pdf";
const OCTET_STREAM: &str = "application/octet-stream";

/// The uploaded document.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub bytes: Bytes,
    pub file_name: String,
    pub mime_type: String,
}

/// A parsed extraction request.
#[derive(Debug, Clone, Default)]
pub struct ExtractionForm {
    pub file: Option<UploadedFile>,
    prompt: Option<String>,
    system_instruction: Option<String>,
}

impl ExtractionForm {
    /// Read every field of the form.
    pub async fn from_multipart(
        multipart: Result<Multipart, MultipartRejection>,
    ) -> Result<Self, ExtractError> {
        let mut multipart = multipart.map_err(|e| form_error(e.status(), e.body_text()))?;
        let mut form = ExtractionForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| form_error(e.status(), e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let file_name = field
                        .file_name()
                        .map(str::to_string)
                        .filter(|n| !n.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
                    let mime_type = resolve_mime_type(field.content_type(), &file_name);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| form_error(e.status(), e.body_text()))?;
                    if form.file.is_some() {
                        debug!(file_name = %file_name, "Ignoring extra file field");
                        continue;
                    }
                    form.file = Some(UploadedFile {
                        bytes,
                        file_name,
                        mime_type,
                    });
                }
                "prompt" | "system_instruction" => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| form_error(e.status(), e.body_text()))?;
                    if name == "prompt" {
                        form.prompt = Some(value);
                    } else {
                        form.system_instruction = Some(value);
                    }
                }
                other => {
                    // Drain so the next field can be read.
                    let _ = field
                        .bytes()
                        .await
                        .map_err(|e| form_error(e.status(), e.body_text()))?;
                    debug!(field = other, "Ignoring unknown form field");
                }
            }
        }

        Ok(form)
    }

    pub fn prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or(DEFAULT_PROMPT)
    }

    /// The caller's system instruction, or `default` when none was sent.
    pub fn system_instruction_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.system_instruction.as_deref().unwrap_or(default)
    }

    pub fn is_ping(&self) -> bool {
        self.prompt() == PING_PROMPT
    }

    /// The document, or `MissingFile`.
    pub fn require_file(&self) -> Result<&UploadedFile, ExtractError> {
        self.file.as_ref().ok_or(ExtractError::MissingFile)
    }
}

/// A body over the upload limit keeps its 413; anything else is a bad form.
fn form_error(status: StatusCode, details: String) -> ExtractError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ExtractError::PayloadTooLarge(details)
    } else {
        ExtractError::InvalidForm(details)
    }
}

/// MIME type for an uploaded part.
///
/// The part's declared type wins unless it is absent or the generic
/// `application/octet-stream`, in which case the file extension is consulted.
fn resolve_mime_type(declared: Option<&str>, file_name: &str) -> String {
    let declared = declared.map(str::trim).filter(|m| !m.is_empty());
    match declared {
        Some(mime) if !mime.eq_ignore_ascii_case(OCTET_STREAM) => mime.to_string(),
        _ => mime_guess::from_path(file_name)
            .first_raw()
            .or(declared)
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string(),
    }
}
