// ABOUTME: Blur-up placeholder generation for responsive images
// ABOUTME: Fetches a tiny CDN variant and encodes it as an inline data URI

use crate::constants::{oss, planner};
use crate::error::TransformError;
use crate::image_url::append_oss_query;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Fetches the 20 px variant of an image and encodes it for inline use as a
/// blur-up background.
pub struct PlaceholderGenerator {
    client: reqwest::Client,
}

impl PlaceholderGenerator {
    /// Shares the caller's HTTP client so one transform run uses a single
    /// connection pool.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a self-contained `data:{mime};base64,{payload}` string for the
    /// image at `base_url`.
    pub async fn generate(&self, base_url: &str) -> Result<String, TransformError> {
        let url = append_oss_query(
            base_url,
            &format!("{}{}", oss::RESIZE_PREFIX, planner::PLACEHOLDER_WIDTH),
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransformError::Placeholder(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransformError::Placeholder(format!(
                "HTTP {} fetching {}",
                response.status(),
                url
            )));
        }

        let mime = response
            .headers()
            .get("content-type")
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or("image/png")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransformError::Placeholder(e.to_string()))?;

        Ok(format!("data:{};base64,{}", mime, BASE64.encode(&bytes)))
    }
}
