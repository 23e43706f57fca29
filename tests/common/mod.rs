#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use sea_orm::{ConnectOptions, Database};
use serde_json::Value;
use smart_file_manager::config::SecurityConfig;
use smart_file_manager::infrastructure::database::run_migrations;
use smart_file_manager::models::{FileCategory, FileRecord, Job};
use smart_file_manager::services::adapters::{
    Adapters, Embedder, MemoryVectorIndex, ServiceError, TextExtractor, TextGenerator,
    Thumbnailer, VisionAnalyzer,
};
use smart_file_manager::services::metadata_store::MetadataStore;
use smart_file_manager::services::overflow::{MemoryOverflowQueue, OverflowQueue};
use smart_file_manager::services::pipeline::Dispatcher;
use smart_file_manager::services::queue::JobQueue;
use smart_file_manager::services::storage::ObjectStore;
use smart_file_manager::{AppState, create_app};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};
use tower::ServiceExt;

pub const QUEUE_CAPACITY: usize = 1000;

// ---- mock adapters ------------------------------------------------------

#[derive(Default)]
pub struct MockObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn get(&self, path: &str) -> Result<Vec<u8>, ServiceError> {
        self.objects
            .lock()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| ServiceError::Protocol(format!("no object at {}", path)))
    }

    async fn put(&self, path: &str, data: Vec<u8>, _content_type: &str) -> Result<(), ServiceError> {
        self.objects.lock().await.insert(path.to_string(), data);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, ServiceError> {
        Ok(self.objects.lock().await.contains_key(path))
    }
}

/// What a scripted adapter call does.
#[derive(Clone)]
pub enum Behaviour {
    Reply(String),
    Transport,
    Protocol,
}

impl Behaviour {
    fn run(&self) -> Result<String, ServiceError> {
        match self {
            Behaviour::Reply(text) => Ok(text.clone()),
            Behaviour::Transport => Err(ServiceError::Transport("connection refused".into())),
            Behaviour::Protocol => Err(ServiceError::Protocol("400 Bad Request".into())),
        }
    }
}

pub struct MockVision {
    pub behaviour: std::sync::Mutex<Behaviour>,
    pub calls: AtomicUsize,
}

impl MockVision {
    pub fn replying(description: &str) -> Self {
        Self {
            behaviour: std::sync::Mutex::new(Behaviour::Reply(description.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, behaviour: Behaviour) {
        if let Ok(mut b) = self.behaviour.lock() {
            *b = behaviour;
        }
    }
}

#[async_trait]
impl VisionAnalyzer for MockVision {
    async fn describe(&self, _storage_path: &str) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behaviour = self.behaviour.lock().map(|b| b.clone()).unwrap();
        behaviour.run()
    }
}

pub struct MockText {
    pub folder: std::sync::Mutex<Behaviour>,
}

impl MockText {
    pub fn suggesting(folder: &str) -> Self {
        Self {
            folder: std::sync::Mutex::new(Behaviour::Reply(folder.to_string())),
        }
    }
}

#[async_trait]
impl TextGenerator for MockText {
    async fn summarize(&self, text: &str) -> Result<String, ServiceError> {
        let first = text.split('.').next().unwrap_or_default().trim();
        Ok(format!("Summary: {}.", first))
    }

    async fn suggest_folder(
        &self,
        _filename: &str,
        _description: &str,
        _category: &str,
    ) -> Result<String, ServiceError> {
        let behaviour = self.folder.lock().map(|b| b.clone()).unwrap();
        behaviour.run()
    }
}

/// Bag-of-keywords embedding: texts sharing keywords point the same way.
pub struct KeywordEmbedder;

pub const KEYWORDS: &[&str] = &[
    "sunset", "beach", "dog", "cat", "invoice", "report", "mountain", "car",
];

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let lowered = text.to_lowercase();
        let mut vector: Vec<f32> = KEYWORDS
            .iter()
            .map(|k| lowered.matches(k).count() as f32)
            .collect();
        vector.push(0.1);
        Ok(vector)
    }
}

/// Returns canned text per storage path; audio needs a transcriber.
pub struct MockExtractor {
    pub texts: HashMap<String, String>,
    pub transcriber: bool,
}

#[async_trait]
impl TextExtractor for MockExtractor {
    async fn extract(&self, storage_path: &str, mime_type: &str) -> Result<String, ServiceError> {
        if mime_type.starts_with("audio/") && !self.transcriber {
            return Err(ServiceError::NotConfigured("transcriber"));
        }
        Ok(self.texts.get(storage_path).cloned().unwrap_or_default())
    }
}

pub struct MockThumbnailer;

#[async_trait]
impl Thumbnailer for MockThumbnailer {
    async fn generate(&self, file: &FileRecord) -> Result<Option<String>, ServiceError> {
        match file.category {
            FileCategory::Image | FileCategory::Video => {
                Ok(Some(format!("thumbnails/{}.jpg", file.id)))
            }
            _ => Ok(None),
        }
    }
}

// ---- environment --------------------------------------------------------

pub struct TestEnv {
    pub app: Router,
    pub store: MetadataStore,
    pub queue: JobQueue,
    pub dispatcher: Dispatcher,
    pub overflow: Arc<MemoryOverflowQueue>,
    pub vector_index: Arc<MemoryVectorIndex>,
    pub vision: Arc<MockVision>,
    pub text: Arc<MockText>,
    receiver: Mutex<mpsc::Receiver<Job>>,
}

pub struct EnvOptions {
    pub vision: bool,
    pub text: bool,
    pub embedder: bool,
    pub transcriber: bool,
    pub jwt_secret: Option<String>,
    pub extracted: HashMap<String, String>,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            vision: true,
            text: true,
            embedder: true,
            transcriber: true,
            jwt_secret: None,
            extracted: HashMap::new(),
        }
    }
}

pub async fn memory_store() -> MetadataStore {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    run_migrations(&db).await.unwrap();
    MetadataStore::connect(db).await.unwrap()
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_options(EnvOptions::default()).await
    }

    pub async fn with_options(options: EnvOptions) -> Self {
        let store = memory_store().await;

        let overflow = Arc::new(MemoryOverflowQueue::new());
        let vector_index = Arc::new(MemoryVectorIndex::new());
        let vision = Arc::new(MockVision::replying(
            "A dog running on the beach at sunset",
        ));
        let text = Arc::new(MockText::suggesting("\"/Photos/Pets\""));

        let adapters = Adapters {
            object_store: Arc::new(MockObjectStore::default()),
            vision: options
                .vision
                .then(|| vision.clone() as Arc<dyn VisionAnalyzer>),
            text: options.text.then(|| text.clone() as Arc<dyn TextGenerator>),
            embedder: options
                .embedder
                .then(|| Arc::new(KeywordEmbedder) as Arc<dyn Embedder>),
            vector_index: vector_index.clone(),
            extractor: Arc::new(MockExtractor {
                texts: options.extracted,
                transcriber: options.transcriber,
            }),
            thumbnailer: Some(Arc::new(MockThumbnailer)),
        };

        let (queue, receiver) = JobQueue::new(
            QUEUE_CAPACITY,
            overflow.clone() as Arc<dyn OverflowQueue>,
            3,
        );
        let dispatcher = Dispatcher::new(store.clone(), queue.clone(), adapters.clone());

        let app = create_app(AppState {
            store: store.clone(),
            queue: queue.clone(),
            adapters,
            security: SecurityConfig {
                jwt_secret: options.jwt_secret,
                allowed_origins: Vec::new(),
            },
            started_at: chrono::Utc::now(),
        });

        Self {
            app,
            store,
            queue,
            dispatcher,
            overflow,
            vector_index,
            vision,
            text,
            receiver: Mutex::new(receiver),
        }
    }

    /// Run queued jobs, including retries parked in the overflow queue
    /// (their backoff is skipped), until nothing is left. Returns the
    /// number of jobs run.
    pub async fn drain(&self) -> usize {
        let mut receiver = self.receiver.lock().await;
        let mut processed = 0;
        for _ in 0..100 {
            let mut progressed = false;
            while let Ok(job) = receiver.try_recv() {
                self.dispatcher.dispatch(job).await;
                processed += 1;
                progressed = true;
            }
            while let Some(raw) = self.overflow.pop().await.unwrap() {
                let mut job = Job::from_wire(&raw).unwrap();
                job.not_before = None;
                self.dispatcher.dispatch(job).await;
                processed += 1;
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
        processed
    }

    /// Jobs currently waiting in the in-memory channel, without running them.
    pub async fn take_queued(&self) -> Vec<Job> {
        let mut receiver = self.receiver.lock().await;
        let mut jobs = Vec::new();
        while let Ok(job) = receiver.try_recv() {
            jobs.push(job);
        }
        jobs
    }

    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.request_with(method, uri, body, None).await
    }

    pub async fn request_with(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Register a file over HTTP and return its id.
    pub async fn upload(&self, body: Value) -> String {
        let (status, json) = self.request("POST", "/api/files", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "upload failed: {}", json);
        json["id"].as_str().unwrap().to_string()
    }
}

pub fn image_body(name: &str, hash: &str) -> Value {
    serde_json::json!({
        "filename": name,
        "mime_type": "image/jpeg",
        "size_bytes": 1024,
        "content_hash": hash,
        "storage_path": format!("/s/{}", name),
        "folder_path": "/"
    })
}
