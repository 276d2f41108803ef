//! Image attachments, encoded inline as `data:` URIs.

use std::fmt;
use std::path::Path;

use base64::Engine as _;
use tracing::debug;

pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

const SUPPORTED: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
];

#[derive(Debug)]
pub enum ImageError {
    UnsupportedType(String),
    TooLarge(u64),
    Io(std::io::Error),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::UnsupportedType(ext) if ext.is_empty() => {
                write!(f, "Please select an image file (png, jpg, gif or webp).")
            }
            ImageError::UnsupportedType(ext) => write!(
                f,
                "Unsupported image type '.{ext}'. Please select a png, jpg, gif or webp file."
            ),
            ImageError::TooLarge(size) => write!(
                f,
                "Image too large ({:.1} MB). Images must be smaller than 10MB.",
                *size as f64 / (1024.0 * 1024.0)
            ),
            ImageError::Io(err) => write!(f, "Could not read image: {err}"),
        }
    }
}

impl std::error::Error for ImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ImageError {
    fn from(err: std::io::Error) -> Self {
        ImageError::Io(err)
    }
}

/// MIME type for a supported image extension, case-insensitively.
pub fn mime_for_path(path: &Path) -> Result<&'static str, ImageError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    SUPPORTED
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .ok_or(ImageError::UnsupportedType(ext))
}

pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Read an image from disk and return it as a `data:` URI.
pub async fn encode_image_file(path: &Path) -> Result<String, ImageError> {
    let mime = mime_for_path(path)?;

    let size = tokio::fs::metadata(path).await?.len();
    if size > MAX_IMAGE_BYTES {
        return Err(ImageError::TooLarge(size));
    }

    let bytes = tokio::fs::read(path).await?;
    debug!(path = %path.display(), bytes = bytes.len(), mime, "Encoded image attachment");
    Ok(to_data_uri(mime, &bytes))
}
