use tracing::info;

use super::{Dispatcher, StageError, StageResult, tags};
use crate::models::{FileRecord, Stage};

pub(super) async fn run(d: &Dispatcher, file: &FileRecord) -> StageResult {
    let vision = d
        .adapters
        .vision
        .as_ref()
        .ok_or_else(|| StageError::Fatal("vision analyzer is not configured".to_string()))?;
    let path = file
        .storage_path
        .as_deref()
        .ok_or_else(|| StageError::Fatal("file has no storage path".to_string()))?;

    let description = vision.describe(path).await?;
    let description = description.trim();
    if description.is_empty() {
        return Err(StageError::Fatal(
            "vision analyzer returned an empty description".to_string(),
        ));
    }

    let objects = tags::extract_objects(description);
    d.store.update_description(&file.id, description).await?;
    d.store.update_objects(&file.id, &objects).await?;
    info!("🖼️ Described image {} ({} objects)", file.id, objects.len());

    d.queue.submit(&file.id, Stage::Embed).await;
    Ok(())
}
