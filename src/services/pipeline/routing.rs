use crate::models::{FileCategory, Stage};

/// Stages queued by `ingest` for a file of the given category.
pub fn stages_for(category: FileCategory) -> Vec<Stage> {
    match category {
        FileCategory::Image => vec![
            Stage::AnalyzeImage,
            Stage::Thumbnail,
            Stage::Embed,
            Stage::Dedup,
        ],
        FileCategory::Document | FileCategory::Audio => vec![
            Stage::ExtractText,
            Stage::SummarizeDoc,
            Stage::Embed,
            Stage::Dedup,
        ],
        FileCategory::Video => vec![Stage::Thumbnail, Stage::Embed, Stage::Dedup],
        FileCategory::Generic => vec![Stage::Dedup],
    }
}
