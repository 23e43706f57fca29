use tracing::info;

use super::{Dispatcher, StageResult};
use crate::models::{FileCategory, FileRecord, NewSuggestion, SuggestionKind};

pub const SIMILARITY_THRESHOLD: f32 = 0.85;
const SIMILAR_LIMIT: usize = 10;

pub(super) async fn run(d: &Dispatcher, file: &FileRecord) -> StageResult {
    let siblings: Vec<String> = d
        .store
        .find_by_hash(&file.content_hash)
        .await?
        .into_iter()
        .filter(|f| f.id != file.id)
        .map(|f| f.id)
        .collect();

    if !siblings.is_empty()
        && !d
            .store
            .has_open_suggestion(&file.id, SuggestionKind::Duplicate)
            .await?
    {
        let reason = format!(
            "{} other file(s) share content hash {}",
            siblings.len(),
            file.content_hash
        );
        d.store
            .create_suggestion(
                NewSuggestion::new(&file.id, SuggestionKind::Duplicate, "merge_or_delete")
                    .with_reason(reason)
                    .with_confidence(1.0)
                    .with_siblings(siblings, Vec::new()),
            )
            .await?;
        info!("🔁 Exact duplicate found for {}", file.id);
    }

    if file.category != FileCategory::Image {
        return Ok(());
    }
    let Some(vector) = d.adapters.vector_index.fetch(&file.id).await? else {
        return Ok(());
    };
    let hits = d
        .adapters
        .vector_index
        .search(
            &vector,
            SIMILAR_LIMIT,
            SIMILARITY_THRESHOLD,
            std::slice::from_ref(&file.id),
        )
        .await?;
    if hits.is_empty()
        || d
            .store
            .has_open_suggestion(&file.id, SuggestionKind::Similar)
            .await?
    {
        return Ok(());
    }

    let (ids, scores): (Vec<String>, Vec<f32>) = hits.into_iter().map(|h| (h.id, h.score)).unzip();
    d.store
        .create_suggestion(
            NewSuggestion::new(&file.id, SuggestionKind::Similar, "review_similar")
                .with_reason(format!("{} visually similar image(s)", ids.len()))
                .with_confidence(f64::from(SIMILARITY_THRESHOLD))
                .with_siblings(ids, scores),
        )
        .await?;
    info!("🔍 Similar images found for {}", file.id);
    Ok(())
}
