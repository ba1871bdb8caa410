// ABOUTME: Remote image metadata retrieval from the Yuque CDN
// ABOUTME: Prefers the OSS image-info endpoint and falls back to header-only dimension decoding

use crate::constants::{oss, timeouts};
use crate::error::TransformError;
use crate::image_url::append_oss_query;
use serde::Deserialize;
use std::time::Duration;

/// Intrinsic properties of a remote image, treated as read-only input by the
/// size planner.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    /// Embedded DPI density, when the CDN reports one
    pub density: Option<f64>,
    /// Encoded file size in bytes, when the CDN reports one
    pub file_size: Option<u64>,
}

impl ImageMetadata {
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Width and height must be positive and yield a finite aspect ratio.
    pub fn validate(&self) -> Result<(), TransformError> {
        if self.width == 0 {
            return Err(TransformError::InvalidMetadata("width is zero".to_string()));
        }
        if self.height == 0 {
            return Err(TransformError::InvalidMetadata("height is zero".to_string()));
        }
        let ratio = self.aspect_ratio();
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(TransformError::InvalidMetadata(format!(
                "aspect ratio {} is not usable",
                ratio
            )));
        }
        Ok(())
    }
}

/// OSS wraps every info field in an object with a string `value`.
#[derive(Debug, Deserialize)]
struct OssValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct OssImageInfo {
    #[serde(rename = "ImageWidth")]
    image_width: Option<OssValue>,
    #[serde(rename = "ImageHeight")]
    image_height: Option<OssValue>,
    #[serde(rename = "FileSize")]
    file_size: Option<OssValue>,
    #[serde(rename = "XResolution")]
    x_resolution: Option<OssValue>,
}

impl OssImageInfo {
    fn into_metadata(self) -> Result<ImageMetadata, TransformError> {
        let width = parse_dimension(self.image_width, "ImageWidth")?;
        let height = parse_dimension(self.image_height, "ImageHeight")?;

        let metadata = ImageMetadata {
            width,
            height,
            density: self.x_resolution.and_then(|r| parse_resolution(&r.value)),
            file_size: self.file_size.and_then(|s| s.value.parse().ok()),
        };
        metadata.validate()?;
        Ok(metadata)
    }
}

fn parse_dimension(field: Option<OssValue>, name: &str) -> Result<u32, TransformError> {
    let field =
        field.ok_or_else(|| TransformError::InvalidMetadata(format!("{} missing", name)))?;
    field.value.parse().map_err(|_| {
        TransformError::InvalidMetadata(format!("{} '{}' is not a number", name, field.value))
    })
}

/// OSS reports resolution as a rational like `"72/1"`; plain numbers appear too.
fn parse_resolution(value: &str) -> Option<f64> {
    let density = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.trim().parse().ok()?,
    };
    (density.is_finite() && density > 0.0).then_some(density)
}

/// Fetches intrinsic image metadata over HTTP.
pub struct MetadataFetcher {
    client: reqwest::Client,
}

impl MetadataFetcher {
    pub fn new(timeout: Duration) -> Result<Self, TransformError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("yuque-images/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(timeouts::MAX_REDIRECTS))
            .build()
            .map_err(|e| TransformError::MetadataFetch(format!("client setup: {}", e)))?;
        Ok(Self { client })
    }

    /// Borrow the underlying client for sibling fetchers so a transform run
    /// shares one connection pool.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Retrieve width/height (and density/file size when available) for the
    /// image at `base_url`.
    ///
    /// The OSS info endpoint is tried first. When it responds but the payload
    /// is unusable, the raw bytes are fetched once and only the header is
    /// decoded. Transport errors propagate directly; no retries.
    pub async fn fetch(&self, base_url: &str) -> Result<ImageMetadata, TransformError> {
        let info_url = append_oss_query(base_url, oss::INFO_QUERY);
        let response = self.client.get(&info_url).send().await?;

        if response.status().is_success() {
            match response.json::<OssImageInfo>().await {
                Ok(info) => return info.into_metadata(),
                Err(e) => {
                    log::debug!(
                        "image info endpoint returned unusable payload for {}: {}",
                        base_url,
                        e
                    );
                }
            }
        } else {
            log::debug!(
                "image info endpoint answered {} for {}",
                response.status(),
                base_url
            );
        }

        self.fetch_by_decoding(base_url).await
    }

    async fn fetch_by_decoding(&self, base_url: &str) -> Result<ImageMetadata, TransformError> {
        let response = self.client.get(base_url).send().await?;
        if !response.status().is_success() {
            return Err(TransformError::MetadataFetch(format!(
                "HTTP {} fetching {}",
                response.status(),
                base_url
            )));
        }

        let bytes = response.bytes().await?;
        let file_size = Some(bytes.len() as u64);

        let reader = image::ImageReader::new(std::io::Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| TransformError::InvalidMetadata(format!("unreadable image: {}", e)))?;
        let (width, height) = reader.into_dimensions().map_err(|e| {
            TransformError::InvalidMetadata(format!("could not decode dimensions: {}", e))
        })?;

        let metadata = ImageMetadata {
            width,
            height,
            density: None,
            file_size,
        };
        metadata.validate()?;
        Ok(metadata)
    }
}
