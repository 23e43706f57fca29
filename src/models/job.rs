use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// How the `organize` stage picks a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrganizeStrategy {
    #[default]
    ByType,
    ByDate,
    ByContent,
    #[serde(alias = "ai")]
    Smart,
}

impl OrganizeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizeStrategy::ByType => "by_type",
            OrganizeStrategy::ByDate => "by_date",
            OrganizeStrategy::ByContent => "by_content",
            OrganizeStrategy::Smart => "smart",
        }
    }
}

/// A pipeline stage together with the payload it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    AnalyzeImage,
    ExtractText,
    SummarizeDoc,
    Thumbnail,
    Embed,
    Dedup,
    Organize { strategy: OrganizeStrategy },
}

impl Stage {
    pub fn tag(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::AnalyzeImage => "analyze_image",
            Stage::ExtractText => "extract_text",
            Stage::SummarizeDoc => "summarize_doc",
            Stage::Thumbnail => "thumbnail",
            Stage::Embed => "embed",
            Stage::Dedup => "dedup",
            Stage::Organize { .. } => "organize",
        }
    }
}

/// A unit of background work: run `stage` against `file_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub file_id: String,
    #[serde(flatten)]
    pub stage: Stage,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Times the job was parked because an earlier stage had not written
    /// its input yet. Does not count against `max_retries`.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub deferrals: u32,
    /// Earliest time a retried job may run again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl Job {
    pub fn new(file_id: impl Into<String>, stage: Stage, max_retries: u32) -> Self {
        Self {
            file_id: file_id.into(),
            stage,
            retry_count: 0,
            max_retries,
            deferrals: 0,
            not_before: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.not_before.is_none_or(|at| at <= now)
    }

    pub fn to_wire(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_wire(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
