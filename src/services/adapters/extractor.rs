use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::{ServiceError, check_status};
use crate::services::storage::ObjectStore;

/// Pulls plain text out of a stored file.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// An empty string means the file holds no extractable text.
    async fn extract(&self, storage_path: &str, mime_type: &str) -> Result<String, ServiceError>;
}

/// Whisper-compatible transcription endpoint.
pub struct WhisperTranscriber {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct TextResponse {
    text: String,
}

fn audio_extension(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        "audio/flac" => "flac",
        "audio/aac" => "aac",
        "audio/mp4" => "m4a",
        "audio/webm" => "webm",
        _ => "wav",
    }
}

impl WhisperTranscriber {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: "whisper-1".to_string(),
            timeout,
        }
    }

    pub async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<String, ServiceError> {
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(format!("audio.{}", audio_extension(mime_type)))
            .mime_str(mime_type)
            .map_err(|e| ServiceError::Protocol(format!("bad audio mime type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "json");

        let response = self
            .http
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;
        let response = check_status("whisper", response).await?;

        let result: TextResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Protocol(format!("unreadable transcription: {}", e)))?;
        Ok(result.text.trim().to_string())
    }
}

/// External document-to-text service for office formats.
pub struct RemoteExtractor {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl RemoteExtractor {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.to_string(),
            timeout,
        }
    }

    pub async fn extract(&self, data: Vec<u8>, mime_type: &str) -> Result<String, ServiceError> {
        let part = reqwest::multipart::Part::bytes(data)
            .file_name("document")
            .mime_str(mime_type)
            .map_err(|e| ServiceError::Protocol(format!("bad document mime type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;
        let response = check_status("extractor", response).await?;

        let result: TextResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Protocol(format!("unreadable extraction: {}", e)))?;
        Ok(result.text)
    }
}

/// Plain text and PDF are handled in-process; audio goes to the
/// transcriber and other formats to the remote extractor.
pub struct DocumentExtractor {
    store: Arc<dyn ObjectStore>,
    transcriber: Option<WhisperTranscriber>,
    remote: Option<RemoteExtractor>,
}

impl DocumentExtractor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        transcriber: Option<WhisperTranscriber>,
        remote: Option<RemoteExtractor>,
    ) -> Self {
        Self {
            store,
            transcriber,
            remote,
        }
    }
}

pub fn pdf_text(data: &[u8]) -> Result<String, ServiceError> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| ServiceError::Protocol(format!("unreadable pdf: {}", e)))?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Ok(String::new());
    }
    doc.extract_text(&pages)
        .map(|text| text.trim().to_string())
        .map_err(|e| ServiceError::Protocol(format!("pdf text extraction failed: {}", e)))
}

#[async_trait]
impl TextExtractor for DocumentExtractor {
    async fn extract(&self, storage_path: &str, mime_type: &str) -> Result<String, ServiceError> {
        if mime_type.starts_with("audio/") {
            let transcriber = self
                .transcriber
                .as_ref()
                .ok_or(ServiceError::NotConfigured("transcriber"))?;
            let audio = self.store.get(storage_path).await?;
            return transcriber.transcribe(audio, mime_type).await;
        }

        if mime_type.starts_with("text/") {
            let data = self.store.get(storage_path).await?;
            return Ok(String::from_utf8_lossy(&data).into_owned());
        }

        if mime_type == "application/pdf" {
            let data = self.store.get(storage_path).await?;
            let text = tokio::task::spawn_blocking(move || pdf_text(&data))
                .await
                .map_err(|e| ServiceError::Protocol(format!("pdf worker panicked: {}", e)))??;
            debug!("Extracted {} chars from pdf {}", text.len(), storage_path);
            return Ok(text);
        }

        match &self.remote {
            Some(remote) => {
                let data = self.store.get(storage_path).await?;
                remote.extract(data, mime_type).await
            }
            None => {
                warn!(
                    "No extractor for {} ({}); storing empty text",
                    storage_path, mime_type
                );
                Ok(String::new())
            }
        }
    }
}
