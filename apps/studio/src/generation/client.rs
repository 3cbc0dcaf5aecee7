//! Image generation client — the single point of entry for calls to the card service.
//!
//! The service is an opaque capability: a JSON request in, one or more image
//! references out. Jobs make exactly one attempt; a failure marks the cell errored
//! and the user re-triggers generation explicitly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::generation::request::GenerationRequest;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Generation service returned no images")]
    EmptyResult,

    #[error("Generation task aborted: {0}")]
    Aborted(String),
}

/// The generator trait. Implement this to swap the backend (or mock it in tests)
/// without touching the scheduler.
///
/// Carried by the scheduler as `Arc<dyn ImageGenerator>`.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns at least one image reference, or an error.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<String>, GenerationError>;
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationErrorBody {
    detail: serde_json::Value,
}

/// HTTP backend posting JSON to the card generation endpoint.
#[derive(Clone)]
pub struct HttpImageGenerator {
    client: Client,
    endpoint: String,
}

impl HttpImageGenerator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, GenerationError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<String>, GenerationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let images = parse_response(status.as_u16(), &body)?;

        debug!(
            "Generation succeeded: model={}, images={}",
            request.model,
            images.len()
        );
        Ok(images)
    }
}

/// Interprets a service reply. Non-2xx bodies carry `{"detail": ...}`.
fn parse_response(status: u16, body: &str) -> Result<Vec<String>, GenerationError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<GenerationErrorBody>(body)
            .map(|e| match e.detail {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_else(|_| body.to_string());
        warn!("Generation service returned {status}: {message}");
        return Err(GenerationError::Api { status, message });
    }

    let parsed: GenerationResponse = serde_json::from_str(body)?;
    if parsed.images.is_empty() {
        return Err(GenerationError::EmptyResult);
    }
    Ok(parsed.images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_success() {
        let images = parse_response(200, r#"{"images": ["a.png", "b.png"]}"#).unwrap();
        assert_eq!(images, vec!["a.png".to_string(), "b.png".to_string()]);
    }

    #[test]
    fn test_parse_response_empty_images_is_error() {
        assert!(matches!(
            parse_response(200, r#"{"images": []}"#),
            Err(GenerationError::EmptyResult)
        ));
        assert!(matches!(
            parse_response(200, r#"{}"#),
            Err(GenerationError::EmptyResult)
        ));
    }

    #[test]
    fn test_parse_response_error_detail() {
        match parse_response(500, r#"{"detail": "model offline"}"#) {
            Err(GenerationError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "model offline");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_response_non_json_error_body() {
        match parse_response(502, "Bad Gateway") {
            Err(GenerationError::Api { message, .. }) => assert_eq!(message, "Bad Gateway"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_response_garbage_success_body() {
        assert!(matches!(
            parse_response(200, "<html>"),
            Err(GenerationError::Parse(_))
        ));
    }
}
