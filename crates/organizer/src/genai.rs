//! Generative model client.
//!
//! Defines the [`GenerativeModel`] trait and the HTTP implementation that
//! calls a `generateContent`-style endpoint. A request is one user turn
//! made of text and file parts; the response is a single text blob that
//! the enrichment job expects to parse as JSON. The endpoint enforces no
//! schema, so malformed output is a hard [`Error::Parse`] for the caller.
//!
//! One attempt per call — failure handling everywhere in this job is
//! "observe and report", never retry.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;
use organizer_core::Error;

use crate::config::ModelConfig;
use crate::warehouse::ProductEnrichment;

/// One part of a model request: prompt text, a storage file reference, or
/// inline bytes.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub file_uri: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn file(file_uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Part::FileData {
            file_data: FileData {
                file_uri: file_uri.into(),
                mime_type: mime_type.into(),
            },
        }
    }

    pub fn inline_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            },
        }
    }
}

/// One user turn sent to the model.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub role: String,
    pub parts: Vec<Part>,
}

impl GenerateRequest {
    pub fn user(parts: Vec<Part>) -> Self {
        GenerateRequest {
            role: "user".to_string(),
            parts,
        }
    }
}

/// Trait for model backends. The HTTP implementation talks to the real
/// endpoint; tests script responses.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Produce the response text for one request.
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

/// Client for a `generateContent`-style HTTP endpoint.
pub struct HttpModel {
    client: reqwest::Client,
    url: String,
}

impl HttpModel {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            config.endpoint.trim_end_matches('/'),
            config.model
        );
        Ok(HttpModel { client, url })
    }
}

#[async_trait]
impl GenerativeModel for HttpModel {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let body = serde_json::json!({
            "contents": [request],
            "generationConfig": {
                "maxOutputTokens": 2048,
                "temperature": 0.4,
                "topP": 1,
                "topK": 32,
                "responseMimeType": "application/json",
            },
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .context("model endpoint unreachable")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("model endpoint error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        extract_text(&json)
    }
}

/// Pull `candidates[0].content.parts[0].text` out of a response.
fn extract_text(json: &serde_json::Value) -> Result<String> {
    json.pointer("/candidates/0/content/parts/0/text")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .context("model response missing candidates[0].content.parts[0].text")
}

/// Parse the model's text blob as a [`ProductEnrichment`].
///
/// The endpoint enforces no schema; non-JSON text or missing fields are a
/// [`Error::Parse`], fatal to the attempt that produced them.
pub fn parse_enrichment(text: &str) -> std::result::Result<ProductEnrichment, Error> {
    serde_json::from_str(text).map_err(|e| Error::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_serialize_to_wire_shapes() {
        let request = GenerateRequest::user(vec![
            Part::text("describe this"),
            Part::file("gs://catalog/sku42.png", "image/png"),
            Part::inline_bytes("image/png", b"abc"),
        ]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["parts"][0]["text"], "describe this");
        assert_eq!(json["parts"][1]["fileData"]["fileUri"], "gs://catalog/sku42.png");
        assert_eq!(json["parts"][1]["fileData"]["mimeType"], "image/png");
        assert_eq!(json["parts"][2]["inlineData"]["data"], "YWJj");
    }

    #[test]
    fn extract_text_walks_candidates() {
        let json = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "{\"a\":1}"}]}}]
        });
        assert_eq!(extract_text(&json).unwrap(), "{\"a\":1}");
        assert!(extract_text(&serde_json::json!({"candidates": []})).is_err());
    }

    #[test]
    fn parse_enrichment_accepts_expected_schema() {
        let parsed = parse_enrichment(
            r#"{"title":"T","description":"D","categories":["a"],"tags":["b"]}"#,
        )
        .unwrap();
        assert_eq!(parsed.title, "T");
        assert_eq!(parsed.tags, vec!["b"]);
    }

    #[test]
    fn parse_enrichment_rejects_non_json_and_missing_fields() {
        assert!(matches!(
            parse_enrichment("the model ignored the format"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_enrichment(r#"{"title":"T"}"#),
            Err(Error::Parse(_))
        ));
    }
}
