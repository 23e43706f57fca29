use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Broad content family of a file, derived from its MIME type (or its
/// extension when the MIME type is missing or generic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Document,
    Video,
    Audio,
    Generic,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Image => "image",
            FileCategory::Document => "document",
            FileCategory::Video => "video",
            FileCategory::Audio => "audio",
            FileCategory::Generic => "generic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "image" => Some(FileCategory::Image),
            "document" => Some(FileCategory::Document),
            "video" => Some(FileCategory::Video),
            "audio" => Some(FileCategory::Audio),
            "generic" | "other" => Some(FileCategory::Generic),
            _ => None,
        }
    }

    /// Classify a file. Generic MIME types fall back to the extension.
    pub fn classify(mime_type: &str, filename: &str) -> Self {
        let effective = effective_mime(mime_type, filename);
        let Ok(parsed) = effective.parse::<mime::Mime>() else {
            return FileCategory::Generic;
        };

        match (parsed.type_(), parsed.subtype().as_str()) {
            (mime::IMAGE, _) => FileCategory::Image,
            (mime::VIDEO, _) => FileCategory::Video,
            (mime::AUDIO, _) => FileCategory::Audio,
            (mime::TEXT, _) => FileCategory::Document,
            (mime::APPLICATION, "pdf" | "msword") => FileCategory::Document,
            (mime::APPLICATION, sub) if sub.starts_with("vnd.") => FileCategory::Document,
            _ => FileCategory::Generic,
        }
    }

    /// Target folder of the `by_type` organize strategy.
    pub fn type_folder(&self) -> &'static str {
        match self {
            FileCategory::Image => "/Images",
            FileCategory::Document => "/Documents",
            FileCategory::Video => "/Videos",
            FileCategory::Audio => "/Audio",
            FileCategory::Generic => "/Other",
        }
    }

    /// Whether every result field this category requires before the file may
    /// be marked completed has been written.
    pub fn mandatory_results_written(&self, file: &FileRecord) -> bool {
        match self {
            FileCategory::Image => file.description.is_some(),
            FileCategory::Document | FileCategory::Audio => file.ocr_text.is_some(),
            FileCategory::Video | FileCategory::Generic => true,
        }
    }
}

/// MIME type used for routing: the declared one unless it is empty or
/// `application/octet-stream`, in which case the extension decides.
pub fn effective_mime(mime_type: &str, filename: &str) -> String {
    let declared = mime_type.trim().to_lowercase();
    if !declared.is_empty() && declared != "application/octet-stream" {
        return declared;
    }

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    let guessed = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    };
    guessed.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Some(FileStatus::Pending),
            "processing" => Some(FileStatus::Processing),
            "completed" => Some(FileStatus::Completed),
            "failed" => Some(FileStatus::Failed),
            _ => None,
        }
    }

    /// Statuses from which a file may move into `self`.
    ///
    /// `pending` is reachable from anywhere because an explicit reprocess
    /// request restarts the pipeline.
    pub fn predecessors(&self) -> &'static [FileStatus] {
        match self {
            FileStatus::Pending => &[
                FileStatus::Pending,
                FileStatus::Processing,
                FileStatus::Completed,
                FileStatus::Failed,
            ],
            FileStatus::Processing => &[
                FileStatus::Pending,
                FileStatus::Processing,
                FileStatus::Failed,
            ],
            FileStatus::Completed => &[FileStatus::Processing],
            FileStatus::Failed => &[FileStatus::Pending, FileStatus::Processing],
        }
    }

    pub fn can_transition_to(&self, next: FileStatus) -> bool {
        next.predecessors().contains(self)
    }
}

/// A file record as stored in the metadata store.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FileRecord {
    pub id: String,
    pub content_hash: String,
    pub filename: String,
    pub current_name: Option<String>,
    pub mime_type: String,
    pub size_bytes: i64,
    pub category: FileCategory,
    pub storage_path: Option<String>,
    pub thumbnail_path: Option<String>,
    pub status: FileStatus,
    pub stage: Option<String>,
    pub description: Option<String>,
    pub ocr_text: Option<String>,
    pub detected_objects: Vec<String>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub folder_path: String,
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub uploader_id: Option<String>,
    pub owner_id: Option<String>,
}

impl FileRecord {
    /// Name shown to users: the renamed value when present.
    pub fn display_name(&self) -> &str {
        self.current_name.as_deref().unwrap_or(&self.filename)
    }
}

/// Values for a new file row.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub content_hash: String,
    pub storage_path: Option<String>,
    pub folder_path: String,
    pub metadata: Value,
    pub tags: Vec<String>,
    pub uploader_id: Option<String>,
    pub owner_id: Option<String>,
}

impl NewFile {
    pub fn category(&self) -> FileCategory {
        FileCategory::classify(&self.mime_type, &self.filename)
    }
}

/// Optional filters shared by listing and search.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct FileFilter {
    pub folder: Option<String>,
    pub category: Option<FileCategory>,
    pub status: Option<FileStatus>,
}

impl FileFilter {
    pub fn matches(&self, file: &FileRecord) -> bool {
        self.folder.as_ref().is_none_or(|f| *f == file.folder_path)
            && self.category.is_none_or(|c| c == file.category)
            && self.status.is_none_or(|s| s == file.status)
    }
}
