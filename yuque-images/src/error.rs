// ABOUTME: Custom error types for Yuque image processing with skip classification
// ABOUTME: Distinguishes not-applicable images from genuine fetch and metadata failures

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("URL is not hosted on a supported Yuque CDN host")]
    UnsupportedHost,

    #[error("Image format '{0}' is intentionally left untouched")]
    ExcludedFormat(String),

    #[error("Failed to fetch image metadata: {0}")]
    MetadataFetch(String),

    #[error("Invalid image metadata: {0}")]
    InvalidMetadata(String),

    #[error("Failed to build blur-up placeholder: {0}")]
    Placeholder(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl TransformError {
    /// True for classifications that mean "not applicable" rather than a
    /// genuine failure. Skipped images are expected and not worth a warning.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            TransformError::UnsupportedHost | TransformError::ExcludedFormat(_)
        )
    }

    /// True when the error came from talking to the CDN.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            TransformError::MetadataFetch(_) | TransformError::Placeholder(_)
        )
    }
}

impl From<reqwest::Error> for TransformError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransformError::MetadataFetch(format!("request timed out: {}", err))
        } else {
            TransformError::MetadataFetch(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TransformError {
    fn from(err: serde_json::Error) -> Self {
        TransformError::InvalidMetadata(format!("malformed image info response: {}", err))
    }
}
