use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;

use super::error::ServiceError;
use super::ollama::OllamaClient;
use crate::services::storage::ObjectStore;

const DESCRIBE_PROMPT: &str = "Describe this image in detail. Mention the main objects, people, \
     animals, scenery and any visible text.";

/// Produces a free-text description of an image.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn describe(&self, storage_path: &str) -> Result<String, ServiceError>;
}

/// Vision LLM served by Ollama (llava and friends). Image bytes are read
/// from the object store and sent inline.
pub struct OllamaVision {
    client: OllamaClient,
    store: Arc<dyn ObjectStore>,
}

impl OllamaVision {
    pub fn new(client: OllamaClient, store: Arc<dyn ObjectStore>) -> Self {
        Self { client, store }
    }
}

#[async_trait]
impl VisionAnalyzer for OllamaVision {
    async fn describe(&self, storage_path: &str) -> Result<String, ServiceError> {
        let bytes = self.store.get(storage_path).await?;
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let description = self
            .client
            .generate(DESCRIBE_PROMPT, vec![image_b64])
            .await?;
        Ok(description.trim().to_string())
    }
}
