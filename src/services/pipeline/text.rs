use tracing::{debug, info};

use super::{Dispatcher, StageError, StageResult};
use crate::models::file::effective_mime;
use crate::models::{FileRecord, FileStatus, Stage};

pub(super) async fn extract(d: &Dispatcher, file: &FileRecord) -> StageResult {
    let path = file
        .storage_path
        .as_deref()
        .ok_or_else(|| StageError::Fatal("file has no storage path".to_string()))?;
    let mime = effective_mime(&file.mime_type, &file.filename);

    let text = d.adapters.extractor.extract(path, &mime).await?;
    d.store.update_ocr_text(&file.id, &text).await?;
    info!("📄 Extracted {} characters from {}", text.chars().count(), file.id);
    Ok(())
}

/// Summarise extracted text into the description. Runs concurrently with
/// `extract_text`, so missing text parks the job until extraction lands.
pub(super) async fn summarize(d: &Dispatcher, file: &FileRecord) -> StageResult {
    let Some(text) = file.ocr_text.as_deref() else {
        if file.status == FileStatus::Failed {
            debug!("Extraction failed; nothing to summarise");
            return Ok(());
        }
        return Err(StageError::NotReady("text not extracted yet".to_string()));
    };
    if text.trim().is_empty() {
        debug!("No text to summarise");
        return Ok(());
    }
    let Some(generator) = d.adapters.text.as_ref() else {
        debug!("No summarizer configured");
        return Ok(());
    };

    let summary = generator.summarize(text).await?;
    let summary = summary.trim();
    if summary.is_empty() {
        return Ok(());
    }
    d.store.update_description(&file.id, summary).await?;
    d.queue.submit(&file.id, Stage::Embed).await;
    Ok(())
}
