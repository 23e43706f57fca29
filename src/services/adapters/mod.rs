pub mod embedder;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod ollama;
pub mod thumbnail;
pub mod vector_index;
pub mod vision;

pub use embedder::{Embedder, OllamaEmbedder};
pub use error::ServiceError;
pub use extractor::{DocumentExtractor, RemoteExtractor, TextExtractor, WhisperTranscriber};
pub use llm::{OllamaTextGenerator, TextGenerator};
pub use ollama::OllamaClient;
pub use thumbnail::{MediaThumbnailer, Thumbnailer};
pub use vector_index::{MemoryVectorIndex, QdrantIndex, ScoredId, VectorIndex};
pub use vision::{OllamaVision, VisionAnalyzer};

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ModelConfig;
use crate::services::storage::ObjectStore;

/// Every external collaborator the pipeline talks to. Optional adapters are
/// `None` when their endpoint is not configured.
#[derive(Clone)]
pub struct Adapters {
    pub object_store: Arc<dyn ObjectStore>,
    pub vision: Option<Arc<dyn VisionAnalyzer>>,
    pub text: Option<Arc<dyn TextGenerator>>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub vector_index: Arc<dyn VectorIndex>,
    pub extractor: Arc<dyn TextExtractor>,
    pub thumbnailer: Option<Arc<dyn Thumbnailer>>,
}

impl Adapters {
    pub fn from_config(models: &ModelConfig, object_store: Arc<dyn ObjectStore>) -> Self {
        let timeout = models.timeout;

        let vision = models.vision_url.as_deref().map(|url| {
            info!("👁️  Vision model: {} at {}", models.vision_model, url);
            Arc::new(OllamaVision::new(
                OllamaClient::new(url, &models.vision_model, timeout),
                object_store.clone(),
            )) as Arc<dyn VisionAnalyzer>
        });
        if vision.is_none() {
            warn!("⚠️  VISION_MODEL_URL not set: image analysis will fail");
        }

        let text = models.llm_url.as_deref().map(|url| {
            info!("📝 Text model: {} at {}", models.llm_model, url);
            Arc::new(OllamaTextGenerator::new(OllamaClient::new(
                url,
                &models.llm_model,
                timeout,
            ))) as Arc<dyn TextGenerator>
        });

        let embedder = models.embed_url.as_deref().map(|url| {
            info!("🧮 Embedding model: {} at {}", models.embed_model, url);
            Arc::new(OllamaEmbedder::new(OllamaClient::new(
                url,
                &models.embed_model,
                timeout,
            ))) as Arc<dyn Embedder>
        });

        let vector_index: Arc<dyn VectorIndex> = match models.vector_index_url.as_deref() {
            Some(url) => {
                info!("🧭 Vector index: {}", url);
                Arc::new(QdrantIndex::new(url, timeout))
            }
            None => {
                warn!("⚠️  VECTOR_INDEX_URL not set: using in-memory vector index");
                Arc::new(MemoryVectorIndex::new())
            }
        };

        let extractor = Arc::new(DocumentExtractor::new(
            object_store.clone(),
            models
                .transcribe_url
                .as_deref()
                .map(|url| WhisperTranscriber::new(url, timeout)),
            models
                .extractor_url
                .as_deref()
                .map(|url| RemoteExtractor::new(url, timeout)),
        ));

        Self {
            vision,
            text,
            embedder,
            vector_index,
            extractor,
            thumbnailer: Some(Arc::new(MediaThumbnailer::new(object_store.clone()))),
            object_store,
        }
    }
}
