use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::error::{ServiceError, check_status};

/// Thin client for an Ollama-compatible server. Each adapter owns one,
/// pointed at its own base URL and model.
#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>, // base64 encoded
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, prompt: &str, images: Vec<String>) -> Result<String, ServiceError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            images,
            stream: false,
        };

        let started = std::time::Instant::now();
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;
        let response = check_status("ollama generate", response).await?;

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Protocol(format!("unreadable generate response: {}", e)))?;

        let elapsed = started.elapsed().as_millis() as u64;
        debug!(model = %self.model, duration_ms = elapsed, "Generation complete");
        if elapsed > 30_000 {
            warn!(model = %self.model, duration_ms = elapsed, slow = true, "Slow generation");
        }
        Ok(result.response)
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let request = EmbedRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .http
            .post(format!("{}/api/embed", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;
        let response = check_status("ollama embed", response).await?;

        let result: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Protocol(format!("unreadable embed response: {}", e)))?;

        result
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceError::Protocol("embed response carried no vector".to_string()))
    }
}
