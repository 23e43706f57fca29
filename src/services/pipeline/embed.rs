use serde_json::json;
use tracing::debug;

use super::{Dispatcher, StageResult};
use crate::models::{FileCategory, FileRecord, Stage};
use crate::services::adapters::llm::truncate_chars;

const EMBED_INPUT_CHARS: usize = 8000;

/// Text embedded for a file: its description followed by extracted text.
pub fn embedding_text(file: &FileRecord) -> String {
    [file.description.as_deref(), file.ocr_text.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub(super) async fn run(d: &Dispatcher, file: &FileRecord) -> StageResult {
    let Some(embedder) = d.adapters.embedder.as_ref() else {
        debug!("No embedder configured");
        return Ok(());
    };
    let text = embedding_text(file);
    if text.is_empty() {
        debug!("Nothing to embed yet");
        return Ok(());
    }

    let vector = embedder.embed(truncate_chars(&text, EMBED_INPUT_CHARS)).await?;
    d.adapters
        .vector_index
        .upsert(
            &file.id,
            vector,
            json!({ "file_id": file.id, "category": file.category.as_str() }),
        )
        .await?;

    // The visual branch of dedup needs this vector; it may already have
    // run and skipped it.
    if file.category == FileCategory::Image {
        d.queue.submit(&file.id, Stage::Dedup).await;
    }
    Ok(())
}
