use std::path::Path;
use thiserror::Error;

/// Maximum length of a stored file name, in bytes
pub const MAX_FILENAME_LEN: usize = 255;

/// Maximum length of a folder path, in bytes
pub const MAX_FOLDER_PATH_LEN: usize = 1024;

#[derive(Debug, Error, PartialEq)]
#[error("{message}")]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Strip any directory component and replace reserved characters.
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    let name = Path::new(filename.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(ValidationError::new(
            "INVALID_FILENAME",
            "filename cannot be empty",
        ));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path components stripped from filename: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';')
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    Ok(truncate_utf8(sanitized, MAX_FILENAME_LEN))
}

/// Canonical form of a POSIX folder path: leading slash, no empty, `.` or
/// `..` segments, no trailing slash (except the root itself).
pub fn normalize_folder_path(path: &str) -> Result<String, ValidationError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(
            "INVALID_PATH",
            "folder path cannot be empty",
        ));
    }
    if trimmed.chars().any(|c| c.is_control() || c == '\\') {
        return Err(ValidationError::new(
            "INVALID_PATH",
            format!("folder path '{}' contains invalid characters", trimmed),
        ));
    }

    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        match segment.trim() {
            "" => continue,
            "." | ".." => {
                return Err(ValidationError::new(
                    "INVALID_PATH",
                    format!("folder path '{}' must not contain relative segments", trimmed),
                ));
            }
            s => segments.push(s),
        }
    }

    let normalized = format!("/{}", segments.join("/"));
    if normalized.len() > MAX_FOLDER_PATH_LEN {
        return Err(ValidationError::new("INVALID_PATH", "folder path is too long"));
    }
    Ok(normalized)
}

/// Parent of a normalized folder path; the root has none.
pub fn parent_folder(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    match path.rsplit_once('/') {
        Some(("", _)) => Some("/".to_string()),
        Some((parent, _)) => Some(parent.to_string()),
        None => None,
    }
}

/// Last segment of a normalized folder path.
pub fn folder_name(path: &str) -> String {
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "/".to_string(),
    }
}

pub fn validate_content_hash(hash: &str) -> Result<(), ValidationError> {
    if hash.trim().is_empty() {
        return Err(ValidationError::new(
            "INVALID_HASH",
            "content_hash cannot be empty",
        ));
    }
    if hash.len() > 128 || hash.chars().any(char::is_whitespace) {
        return Err(ValidationError::new(
            "INVALID_HASH",
            "content_hash must be a single token of at most 128 characters",
        ));
    }
    Ok(())
}

fn truncate_utf8(value: String, max: usize) -> String {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}
