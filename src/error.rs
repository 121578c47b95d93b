//! Error types for the snapshot pipeline.

use thiserror::Error;

/// Result type alias using SnapshotError.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Main error type for model loading, capture and packaging.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The file extension is not one of the supported model formats.
    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    /// The payload could not be decoded into a usable scene.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The underlying file payload is missing or unreadable.
    #[error("Read error: {0}")]
    Read(String),

    /// A rendered frame could not be read back or encoded.
    #[error("Capture error: {0}")]
    Capture(String),

    /// Failed to write a ZIP archive.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Failed to decode or encode an image.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error while writing downloads or reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse JSON configuration.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SnapshotError {
    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Whether this error came from the payload itself (as opposed to the host).
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
