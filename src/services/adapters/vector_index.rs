use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

use super::error::{ServiceError, check_status};

pub const COLLECTION: &str = "files";

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredId {
    pub id: String,
    pub score: f32,
}

/// Per-file embedding storage with nearest-neighbour search.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, id: &str, vector: Vec<f32>, payload: Value) -> Result<(), ServiceError>;

    async fn fetch(&self, id: &str) -> Result<Option<Vec<f32>>, ServiceError>;

    /// Results are ordered by score, highest first, and never include
    /// `exclude_ids`.
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: f32,
        exclude_ids: &[String],
    ) -> Result<Vec<ScoredId>, ServiceError>;

    async fn delete(&self, id: &str) -> Result<(), ServiceError>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Process-local index used when no vector service is configured.
#[derive(Default)]
pub struct MemoryVectorIndex {
    points: DashMap<String, (Vec<f32>, Value)>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, id: &str, vector: Vec<f32>, payload: Value) -> Result<(), ServiceError> {
        self.points.insert(id.to_string(), (vector, payload));
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Vec<f32>>, ServiceError> {
        Ok(self.points.get(id).map(|entry| entry.value().0.clone()))
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: f32,
        exclude_ids: &[String],
    ) -> Result<Vec<ScoredId>, ServiceError> {
        let mut hits: Vec<ScoredId> = self
            .points
            .iter()
            .filter(|entry| !exclude_ids.contains(entry.key()))
            .map(|entry| ScoredId {
                id: entry.key().clone(),
                score: cosine_similarity(vector, &entry.value().0),
            })
            .filter(|hit| hit.score >= min_score)
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.points.remove(id);
        Ok(())
    }
}

/// Qdrant over its REST API. The collection is created on first upsert
/// with the dimension of that vector and cosine distance.
pub struct QdrantIndex {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    collection_ready: OnceCell<()>,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct QdrantPoint {
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

#[derive(Deserialize)]
struct QdrantHit {
    id: Value,
    score: f32,
}

fn point_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl QdrantIndex {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            collection_ready: OnceCell::new(),
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, COLLECTION, suffix)
    }

    async fn ensure_collection(&self, dimension: usize) -> Result<(), ServiceError> {
        self.collection_ready
            .get_or_try_init(|| async {
                let existing = self
                    .http
                    .get(self.url(""))
                    .timeout(self.timeout)
                    .send()
                    .await?;
                if existing.status().is_success() {
                    return Ok::<(), ServiceError>(());
                }

                let body = json!({ "vectors": { "size": dimension, "distance": "Cosine" } });
                let created = self
                    .http
                    .put(self.url(""))
                    .timeout(self.timeout)
                    .json(&body)
                    .send()
                    .await?;
                check_status("qdrant create collection", created).await?;
                info!("🧭 Created vector collection '{}' (dim {})", COLLECTION, dimension);
                Ok(())
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, id: &str, vector: Vec<f32>, payload: Value) -> Result<(), ServiceError> {
        self.ensure_collection(vector.len()).await?;

        let body = json!({ "points": [{ "id": id, "vector": vector, "payload": payload }] });
        let response = self
            .http
            .put(self.url("/points?wait=true"))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        check_status("qdrant upsert", response).await?;
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Vec<f32>>, ServiceError> {
        let body = json!({ "ids": [id], "with_vector": true, "with_payload": false });
        let response = self
            .http
            .post(self.url("/points"))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status("qdrant fetch", response).await?;

        let parsed: QdrantResponse<Vec<QdrantPoint>> = response
            .json()
            .await
            .map_err(|e| ServiceError::Protocol(format!("unreadable qdrant fetch: {}", e)))?;
        Ok(parsed.result.into_iter().next().and_then(|p| p.vector))
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: f32,
        exclude_ids: &[String],
    ) -> Result<Vec<ScoredId>, ServiceError> {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "score_threshold": min_score,
            "with_payload": false,
        });
        if !exclude_ids.is_empty() {
            body["filter"] = json!({ "must_not": [{ "has_id": exclude_ids }] });
        }

        let response = self
            .http
            .post(self.url("/points/search"))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = check_status("qdrant search", response).await?;

        let parsed: QdrantResponse<Vec<QdrantHit>> = response
            .json()
            .await
            .map_err(|e| ServiceError::Protocol(format!("unreadable qdrant search: {}", e)))?;

        let mut hits: Vec<ScoredId> = parsed
            .result
            .into_iter()
            .map(|hit| ScoredId {
                id: point_id(&hit.id),
                score: hit.score,
            })
            .filter(|hit| hit.score >= min_score && !exclude_ids.contains(&hit.id))
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let body = json!({ "points": [id] });
        let response = self
            .http
            .post(self.url("/points/delete?wait=true"))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status("qdrant delete", response).await?;
        Ok(())
    }
}
