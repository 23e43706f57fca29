use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::info;

/// Redis list holding serialized jobs.
pub const OVERFLOW_KEY: &str = "pending_jobs";

/// FIFO of serialized jobs that did not fit in the in-memory queue.
///
/// Entries are opaque strings; whatever is pushed back after a pop is
/// byte-identical to what was popped.
#[async_trait]
pub trait OverflowQueue: Send + Sync {
    /// Append to the tail.
    async fn push(&self, raw: String) -> Result<()>;

    /// Return an entry to the head, ahead of everything else.
    async fn push_front(&self, raw: String) -> Result<()>;

    /// Take the head entry, if any. Never waits for an entry to appear.
    async fn pop(&self) -> Result<Option<String>>;

    async fn len(&self) -> Result<usize>;
}

pub struct RedisOverflowQueue {
    connection: ConnectionManager,
    key: String,
}

impl RedisOverflowQueue {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        info!(
            "📮 Overflow queue: redis list '{}' at {}",
            OVERFLOW_KEY,
            redis_url.replace(|c: char| c.is_ascii_alphanumeric(), "*")
        );
        Ok(Self {
            connection,
            key: OVERFLOW_KEY.to_string(),
        })
    }
}

#[async_trait]
impl OverflowQueue for RedisOverflowQueue {
    async fn push(&self, raw: String) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: usize = conn.rpush(&self.key, raw).await?;
        Ok(())
    }

    async fn push_front(&self, raw: String) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: usize = conn.lpush(&self.key, raw).await?;
        Ok(())
    }

    async fn pop(&self) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.lpop(&self.key, None).await?;
        Ok(raw)
    }

    async fn len(&self) -> Result<usize> {
        let mut conn = self.connection.clone();
        let len: usize = conn.llen(&self.key).await?;
        Ok(len)
    }
}

/// Process-local overflow used when Redis is not configured. Entries do
/// not survive a restart.
#[derive(Default)]
pub struct MemoryOverflowQueue {
    entries: Mutex<VecDeque<String>>,
}

impl MemoryOverflowQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<String> {
        self.entries.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl OverflowQueue for MemoryOverflowQueue {
    async fn push(&self, raw: String) -> Result<()> {
        self.entries.lock().await.push_back(raw);
        Ok(())
    }

    async fn push_front(&self, raw: String) -> Result<()> {
        self.entries.lock().await.push_front(raw);
        Ok(())
    }

    async fn pop(&self) -> Result<Option<String>> {
        Ok(self.entries.lock().await.pop_front())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.lock().await.len())
    }
}
