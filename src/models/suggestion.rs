use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::suggestions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Duplicate,
    Similar,
    Organization,
}

impl SuggestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionKind::Duplicate => "duplicate",
            SuggestionKind::Similar => "similar",
            SuggestionKind::Organization => "organization",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "duplicate" => Some(SuggestionKind::Duplicate),
            "similar" => Some(SuggestionKind::Similar),
            "organization" => Some(SuggestionKind::Organization),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Rejected,
    Applied,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Accepted => "accepted",
            SuggestionStatus::Rejected => "rejected",
            SuggestionStatus::Applied => "applied",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SuggestionStatus::Pending),
            "accepted" => Some(SuggestionStatus::Accepted),
            "rejected" => Some(SuggestionStatus::Rejected),
            "applied" => Some(SuggestionStatus::Applied),
            _ => None,
        }
    }

    /// Rejected and applied are terminal.
    pub fn can_transition_to(&self, next: SuggestionStatus) -> bool {
        use SuggestionStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted) | (Pending, Rejected) | (Pending, Applied) | (Accepted, Applied) | (Accepted, Rejected)
        )
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Suggestion {
    pub id: String,
    pub file_id: String,
    pub kind: SuggestionKind,
    pub status: SuggestionStatus,
    pub suggested_value: String,
    pub reason: Option<String>,
    pub confidence: f64,
    pub sibling_ids: Vec<String>,
    pub scores: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<suggestions::Model> for Suggestion {
    type Error = String;

    fn try_from(model: suggestions::Model) -> Result<Self, Self::Error> {
        let kind = SuggestionKind::parse(&model.kind)
            .ok_or_else(|| format!("unknown suggestion kind '{}'", model.kind))?;
        let status = SuggestionStatus::parse(&model.status)
            .ok_or_else(|| format!("unknown suggestion status '{}'", model.status))?;

        Ok(Self {
            id: model.id,
            file_id: model.file_id,
            kind,
            status,
            suggested_value: model.suggested_value,
            reason: model.reason,
            confidence: model.confidence,
            sibling_ids: serde_json::from_value(model.sibling_ids).unwrap_or_default(),
            scores: serde_json::from_value(model.scores).unwrap_or_default(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Values for a new suggestion row.
#[derive(Debug, Clone)]
pub struct NewSuggestion {
    pub file_id: String,
    pub kind: SuggestionKind,
    pub status: SuggestionStatus,
    pub suggested_value: String,
    pub reason: Option<String>,
    pub confidence: f64,
    pub sibling_ids: Vec<String>,
    pub scores: Vec<f32>,
}

impl NewSuggestion {
    pub fn new(file_id: impl Into<String>, kind: SuggestionKind, suggested_value: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            kind,
            status: SuggestionStatus::Pending,
            suggested_value: suggested_value.into(),
            reason: None,
            confidence: 0.0,
            sibling_ids: Vec::new(),
            scores: Vec::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_siblings(mut self, sibling_ids: Vec<String>, scores: Vec<f32>) -> Self {
        self.sibling_ids = sibling_ids;
        self.scores = scores;
        self
    }

    pub fn with_status(mut self, status: SuggestionStatus) -> Self {
        self.status = status;
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestionFilter {
    pub file_id: Option<String>,
    pub kind: Option<SuggestionKind>,
    pub status: Option<SuggestionStatus>,
}
