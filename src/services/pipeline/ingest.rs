use tracing::{debug, info, warn};

use super::{Dispatcher, StageResult, routing};
use crate::models::{FileCategory, FileRecord, FileStatus};
use crate::services::queue::EnqueueOutcome;

/// Classify the file, move it to `processing` and queue its stages.
pub(super) async fn run(d: &Dispatcher, file: &FileRecord) -> StageResult {
    if file.status == FileStatus::Completed {
        debug!("File already completed; skipping ingest");
        return Ok(());
    }

    d.store
        .update_status(&file.id, FileStatus::Processing, Some("ingest"))
        .await?;

    let category = FileCategory::classify(&file.mime_type, &file.filename);
    if category != file.category {
        d.store.update_category(&file.id, category).await?;
    }

    let stages = routing::stages_for(category);
    info!(
        "📥 Ingesting {} as {} ({} stages)",
        file.display_name(),
        category.as_str(),
        stages.len()
    );
    for stage in stages {
        let tag = stage.tag();
        if d.queue.submit(&file.id, stage).await == EnqueueOutcome::Dropped {
            warn!("Could not queue {} for {}", tag, file.id);
        }
    }
    Ok(())
}
