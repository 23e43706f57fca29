use async_trait::async_trait;
use image::ImageOutputFormat;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::info;

use super::error::ServiceError;
use crate::models::{FileCategory, FileRecord};
use crate::services::storage::ObjectStore;

/// Thumbnail dimension (max width or height)
const THUMB_SIZE: u32 = 256;

/// Renders a small JPEG preview and stores it next to the file bytes.
#[async_trait]
pub trait Thumbnailer: Send + Sync {
    /// Returns the storage path of the thumbnail, or `None` when the file
    /// kind has no preview.
    async fn generate(&self, file: &FileRecord) -> Result<Option<String>, ServiceError>;
}

pub struct MediaThumbnailer {
    store: Arc<dyn ObjectStore>,
}

impl MediaThumbnailer {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

pub fn thumbnail_path(file_id: &str) -> String {
    format!("thumbnails/{}.jpg", file_id)
}

/// Downscale an encoded image to fit `THUMB_SIZE` and re-encode it as JPEG.
pub fn render_jpeg_thumbnail(data: &[u8]) -> Result<Vec<u8>, ServiceError> {
    let img = image::load_from_memory(data)
        .map_err(|e| ServiceError::Protocol(format!("failed to load image: {}", e)))?;

    // JPEG has no alpha channel
    let thumbnail = image::DynamicImage::ImageRgb8(img.thumbnail(THUMB_SIZE, THUMB_SIZE).to_rgb8());

    let mut out = Vec::new();
    thumbnail
        .write_to(&mut std::io::Cursor::new(&mut out), ImageOutputFormat::Jpeg(80))
        .map_err(|e| ServiceError::Protocol(format!("failed to encode thumbnail: {}", e)))?;
    Ok(out)
}

fn video_extension(mime_type: &str) -> &'static str {
    match mime_type {
        "video/x-matroska" => ".mkv",
        "video/x-msvideo" | "video/avi" => ".avi",
        "video/quicktime" => ".mov",
        "video/webm" => ".webm",
        "video/mpeg" => ".mpg",
        _ => ".mp4",
    }
}

async fn first_video_frame(data: &[u8], mime_type: &str) -> Result<Vec<u8>, ServiceError> {
    let io_err = |e: std::io::Error| ServiceError::Protocol(format!("temp file: {}", e));

    let mut input_file = tempfile::Builder::new()
        .suffix(video_extension(mime_type))
        .tempfile()
        .map_err(io_err)?;
    input_file.write_all(data).map_err(io_err)?;
    let input_path = input_file.into_temp_path();

    let output_file = NamedTempFile::with_suffix(".png").map_err(io_err)?;
    let output_path = output_file.path().to_path_buf();

    let output = tokio::process::Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(input_path.as_os_str())
        .arg("-frames:v")
        .arg("1")
        .arg(&output_path)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ServiceError::NotConfigured("ffmpeg"),
            _ => ServiceError::Transport(format!("ffmpeg failed to start: {}", e)),
        })?;

    if !output.status.success() {
        return Err(ServiceError::Protocol(format!(
            "ffmpeg failed: {}",
            String::from_utf8_lossy(&output.stderr)
                .lines()
                .last()
                .unwrap_or_default()
        )));
    }

    tokio::fs::read(&output_path).await.map_err(io_err)
}

#[async_trait]
impl Thumbnailer for MediaThumbnailer {
    async fn generate(&self, file: &FileRecord) -> Result<Option<String>, ServiceError> {
        let Some(storage_path) = file.storage_path.as_deref() else {
            return Ok(None);
        };

        let frame = match file.category {
            FileCategory::Image => self.store.get(storage_path).await?,
            FileCategory::Video => {
                let data = self.store.get(storage_path).await?;
                first_video_frame(&data, &file.mime_type).await?
            }
            _ => return Ok(None),
        };

        let jpeg = tokio::task::spawn_blocking(move || render_jpeg_thumbnail(&frame))
            .await
            .map_err(|e| ServiceError::Protocol(format!("thumbnail worker panicked: {}", e)))??;

        let path = thumbnail_path(&file.id);
        self.store.put(&path, jpeg, "image/jpeg").await?;
        info!("🖼️  Thumbnail stored for {} at {}", file.id, path);
        Ok(Some(path))
    }
}
