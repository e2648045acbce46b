use anyhow::{Result, anyhow};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::path::Path;

/// Maximum upload size: 40 KiB
pub const MAX_UPLOAD_SIZE: usize = 40 * 1024;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates the client filename's extension against the endpoint's expected
/// one, case-insensitively. `expected` includes the leading dot.
pub fn validate_extension(filename: &str, expected: &str) -> Result<()> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();

    if ext == expected {
        return Ok(());
    }

    Err(anyhow!(ValidationError {
        code: "INVALID_EXTENSION",
        message: format!("Expected a '{}' file, got '{}'", expected, filename),
    }))
}

/// Validates upload size against the maximum limit
pub fn validate_upload_size(size: usize, max_size: usize) -> Result<()> {
    if size > max_size {
        return Err(anyhow!(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "Upload of {} bytes exceeds maximum allowed {} bytes ({} KB)",
                size,
                max_size,
                max_size / 1024
            ),
        }));
    }
    Ok(())
}

/// Derives the filename presented to the client for a converted download:
/// the stem of the original upload name with the new extension substituted.
pub fn download_filename(original: &str, new_ext: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("item");
    format!("{}{}", stem, new_ext)
}

/// Builds an attachment Content-Disposition with an ASCII fallback plus a
/// percent-encoded UTF-8 variant, so non-ASCII stems survive the header.
pub fn attachment_disposition(filename: &str) -> String {
    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .take(64)
        .collect::<String>();
    let fallback_filename = if ascii_filename.is_empty() {
        "item"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    )
}
