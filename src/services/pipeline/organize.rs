use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{Dispatcher, StageError, StageResult};
use crate::models::{
    FileRecord, NewSuggestion, OrganizeStrategy, SuggestionKind, SuggestionStatus,
};
use crate::services::adapters::ServiceError;
use crate::utils::validation::normalize_folder_path;

const CONTENT_RULES: &[(&str, &[&str])] = &[
    ("/People", &["person", "people", "man", "woman", "child", "face"]),
    ("/Animals", &["animal", "dog", "cat", "bird", "horse", "pet"]),
    ("/Food", &["food", "fruit", "meal"]),
    ("/Nature", &["landscape", "nature", "mountain", "beach", "tree", "forest", "sky", "sunset"]),
    ("/Architecture", &["building", "architecture", "house", "city", "bridge"]),
    ("/Documents", &["text", "document", "sign"]),
];
const CONTENT_DEFAULT: &str = "/Content";

/// Folder chosen by `by_content`: the first rule matching any detected object.
pub fn content_folder(objects: &[String]) -> &'static str {
    CONTENT_RULES
        .iter()
        .find(|(_, terms)| objects.iter().any(|o| terms.contains(&o.as_str())))
        .map(|(folder, _)| *folder)
        .unwrap_or(CONTENT_DEFAULT)
}

/// Folder chosen by `by_date`: `/YYYY/MM` of the upload time.
pub fn date_folder(uploaded_at: DateTime<Utc>) -> String {
    uploaded_at.format("/%Y/%m").to_string()
}

/// Turn a raw model answer into a folder path, or `None` when nothing usable
/// remains.
pub fn clean_suggestion(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let trimmed = line
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '`'))
        .trim_end_matches('.');
    let path = normalize_folder_path(trimmed).ok()?;
    (path != "/").then_some(path)
}

pub(super) async fn run(d: &Dispatcher, file: &FileRecord, strategy: OrganizeStrategy) -> StageResult {
    let folder = match strategy {
        OrganizeStrategy::ByType => file.category.type_folder().to_string(),
        OrganizeStrategy::ByDate => date_folder(file.uploaded_at),
        OrganizeStrategy::ByContent => content_folder(&file.detected_objects).to_string(),
        OrganizeStrategy::Smart => smart_folder(d, file).await?,
    };

    d.store.ensure_folder(&folder).await?;
    d.store.update_folder(&file.id, &folder).await?;
    info!(
        "📁 Organized {} into {} ({})",
        file.id,
        folder,
        strategy.as_str()
    );
    Ok(())
}

async fn smart_folder(d: &Dispatcher, file: &FileRecord) -> Result<String, StageError> {
    let fallback = content_folder(&file.detected_objects).to_string();
    let Some(generator) = d.adapters.text.as_ref() else {
        warn!("No folder suggester configured; organizing by content");
        return Ok(fallback);
    };

    let description = file.description.as_deref().unwrap_or_default();
    let raw = match generator
        .suggest_folder(file.display_name(), description, file.category.as_str())
        .await
    {
        Ok(raw) => raw,
        Err(ServiceError::NotConfigured(_)) => return Ok(fallback),
        Err(e) => return Err(e.into()),
    };

    let Some(folder) = clean_suggestion(&raw) else {
        warn!("Unusable folder suggestion {:?}; organizing by content", raw);
        return Ok(fallback);
    };

    d.store
        .create_suggestion(
            NewSuggestion::new(&file.id, SuggestionKind::Organization, &folder)
                .with_reason(format!(
                    "Suggested for {} file '{}'",
                    file.category.as_str(),
                    file.display_name()
                ))
                .with_confidence(0.7)
                .with_status(SuggestionStatus::Applied),
        )
        .await?;
    Ok(folder)
}
