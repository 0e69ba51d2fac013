//! Request and response shapes for the Gemini `generateContent` family.
//!
//! The same JSON body is accepted by the Generative Language API and by
//! Vertex AI publisher models, so both endpoints share these types.

use std::borrow::Cow;

use base64::{prelude::BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
}

/// Base64 document bytes embedded in the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob<'a> {
    pub mime_type: Cow<'a, str>,
    pub data: String,
}

/// A document staged in object storage, referenced by URI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData<'a> {
    pub mime_type: Cow<'a, str>,
    pub file_uri: Cow<'a, str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Part<'a> {
    Text(Cow<'a, str>),
    InlineData(Blob<'a>),
    FileData(FileData<'a>),
}

impl<'a> Part<'a> {
    pub fn text(text: &'a str) -> Self {
        Part::Text(Cow::Borrowed(text))
    }

    /// Embed `bytes` as base64 inline data.
    pub fn inline_data(mime_type: &'a str, bytes: &[u8]) -> Self {
        Part::InlineData(Blob {
            mime_type: Cow::Borrowed(mime_type),
            data: BASE64_STANDARD.encode(bytes),
        })
    }

    pub fn file_data(mime_type: &'a str, file_uri: &'a str) -> Self {
        Part::FileData(FileData {
            mime_type: Cow::Borrowed(mime_type),
            file_uri: Cow::Borrowed(file_uri),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content<'a> {
    pub role: Role,
    pub parts: Vec<Part<'a>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: i32,
}

/// Sampling and output settings sent as `generationConfig`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
    pub response_mime_type: &'static str,
}

impl GenerationSettings {
    /// Settings for the API-key endpoint with inline documents.
    pub fn inline() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.95,
            max_output_tokens: 65535,
            candidate_count: None,
            seed: None,
            thinking_config: None,
            response_mime_type: "application/json",
        }
    }

    /// Settings for the staged-document streaming endpoint.
    pub fn streaming() -> Self {
        Self {
            temperature: 0.0,
            ..Self::inline()
        }
    }

    /// Deterministic settings for the authenticated endpoint: one candidate,
    /// fixed seed, thinking disabled.
    pub fn authenticated() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            max_output_tokens: 20480,
            candidate_count: Some(1),
            seed: Some(42),
            thinking_config: Some(ThinkingConfig { thinking_budget: 0 }),
            response_mime_type: "application/json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    pub contents: Vec<Content<'a>>,
    pub system_instruction: Content<'a>,
    pub generation_config: GenerationSettings,
}

impl<'a> GenerateContentRequest<'a> {
    /// A single-turn request: the prompt followed by the document part.
    pub fn new(
        system_instruction: &'a str,
        prompt: &'a str,
        document: Part<'a>,
        generation_config: GenerationSettings,
    ) -> Self {
        Self {
            contents: vec![Content {
                role: Role::User,
                parts: vec![Part::text(prompt), document],
            }],
            system_instruction: Content {
                role: Role::System,
                parts: vec![Part::text(system_instruction)],
            },
            generation_config,
        }
    }
}

// ─── Responses ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub thought: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl Candidate {
    fn answer_parts(&self) -> impl Iterator<Item = &str> {
        self.content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
    }

    /// Text of the first answer part.
    pub fn first_part_text(&self) -> Option<&str> {
        self.answer_parts().next()
    }

    /// All answer parts joined together.
    pub fn text(&self) -> Option<String> {
        let mut parts = self.answer_parts().peekable();
        parts.peek()?;
        Some(parts.collect())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: Option<u32>,
    #[serde(default)]
    pub candidates_token_count: Option<u32>,
    #[serde(default)]
    pub total_token_count: Option<u32>,
}

/// A full response, or one chunk of a streamed response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    pub model_version: Option<String>,
    /// Error object some streams emit in place of a chunk.
    #[serde(default)]
    pub error: Option<Value>,
}

impl GenerateContentResponse {
    /// Answer text of the first candidate, thought parts excluded.
    pub fn first_candidate_text(&self) -> Option<String> {
        self.candidates.first().and_then(Candidate::text)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_inline_request_shape() {
        let request = GenerateContentRequest::new(
            "one JSON object",
            "Extract this",
            Part::inline_data("application/pdf", b"%PDF-1.7"),
            GenerationSettings::inline(),
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"text": "Extract this"},
                        {"inlineData": {"mimeType": "application/pdf", "data": "JVBERi0xLjc="}}
                    ]
                }],
                "systemInstruction": {"role": "system", "parts": [{"text": "one JSON object"}]},
                "generationConfig": {
                    "temperature": 0.1f32,
                    "topP": 0.95f32,
                    "maxOutputTokens": 65535,
                    "responseMimeType": "application/json"
                }
            })
        );
    }

    #[test]
    fn test_file_data_part() {
        let part = Part::file_data("application/pdf", "gs://bucket/abc_doc.pdf");
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({"fileData": {"mimeType": "application/pdf", "fileUri": "gs://bucket/abc_doc.pdf"}})
        );
    }

    #[test]
    fn test_authenticated_settings() {
        let value = serde_json::to_value(GenerationSettings::authenticated()).unwrap();
        assert_eq!(value["candidateCount"], 1);
        assert_eq!(value["seed"], 42);
        assert_eq!(value["maxOutputTokens"], 20480);
        assert_eq!(value["thinkingConfig"], json!({"thinkingBudget": 0}));
        assert_eq!(value["topP"], 1.0);
    }

    #[test]
    fn test_first_candidate_text_skips_thoughts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "{\"a\": "},
                    {"text": "1}"}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}
        }))
        .unwrap();
        assert_eq!(response.first_candidate_text().as_deref(), Some("{\"a\": 1}"));
        assert_eq!(response.candidates[0].first_part_text(), Some("{\"a\": "));
        assert_eq!(
            response.usage_metadata.as_ref().and_then(|u| u.prompt_token_count),
            Some(10)
        );
    }

    #[test]
    fn test_missing_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert!(response.first_candidate_text().is_none());
    }
}
