// ABOUTME: Caller-facing transform options with serde support and validation
// ABOUTME: The serialized form of these options is the cache key hash input

use crate::constants::planner;
use serde::{Deserialize, Serialize};

/// WebP generation knob: plain on/off, or on with an explicit quality hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WebpMode {
    Toggle(bool),
    Quality { quality: u8 },
}

impl WebpMode {
    pub fn is_enabled(&self) -> bool {
        match self {
            WebpMode::Toggle(enabled) => *enabled,
            WebpMode::Quality { .. } => true,
        }
    }

    pub fn quality(&self) -> Option<u8> {
        match self {
            WebpMode::Toggle(_) => None,
            WebpMode::Quality { quality } => Some(*quality),
        }
    }
}

impl Default for WebpMode {
    fn default() -> Self {
        WebpMode::Toggle(true)
    }
}

/// Options controlling how qualifying images are rewritten.
///
/// Instances are never mutated during a run; per-image width overrides are
/// derived into a separate value so concurrent tasks share nothing mutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Maximum display width for images without an explicit style width
    pub max_width: u32,
    /// WebP variant generation
    pub with_webp: WebpMode,
    /// Extra CSS appended to the wrapper element
    pub wrapper_style: String,
    /// Background color shown behind the image while it loads
    pub background_color: String,
    /// Wrap images not already inside a link in a link to the original
    pub link_images_to_original: bool,
    /// Derive the display width from the image's embedded DPI density
    pub size_by_pixel_density: bool,
    /// Override for the generated `sizes` attribute
    pub sizes: Option<String>,
    /// Bound on metadata and placeholder fetches, in seconds
    pub timeout_secs: u64,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            max_width: planner::DEFAULT_MAX_WIDTH,
            with_webp: WebpMode::default(),
            wrapper_style: String::new(),
            background_color: "white".to_string(),
            link_images_to_original: true,
            size_by_pixel_density: false,
            sizes: None,
            timeout_secs: 10,
        }
    }
}

impl TransformOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_width == 0 {
            return Err("max_width must be positive".to_string());
        }
        if let Some(quality) = self.with_webp.quality() {
            if quality == 0 || quality > 100 {
                return Err(format!("webp quality must be in 1..=100, got {}", quality));
            }
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = TransformOptions::default();
        assert_eq!(options.max_width, 746);
        assert!(options.with_webp.is_enabled());
        assert_eq!(options.with_webp.quality(), None);
        assert_eq!(options.background_color, "white");
        assert!(options.link_images_to_original);
        assert!(!options.size_by_pixel_density);
        assert_eq!(options.sizes, None);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_webp_mode_from_bool() {
        let mode: WebpMode = serde_json::from_str("false").unwrap();
        assert_eq!(mode, WebpMode::Toggle(false));
        assert!(!mode.is_enabled());
    }

    #[test]
    fn test_webp_mode_from_quality_table() {
        let mode: WebpMode = serde_json::from_str(r#"{"quality": 80}"#).unwrap();
        assert_eq!(mode, WebpMode::Quality { quality: 80 });
        assert!(mode.is_enabled());
        assert_eq!(mode.quality(), Some(80));
    }

    #[test]
    fn test_options_deserialize_partial() {
        let options: TransformOptions =
            serde_json::from_str(r#"{"max_width": 960, "with_webp": {"quality": 75}}"#).unwrap();
        assert_eq!(options.max_width, 960);
        assert_eq!(options.with_webp.quality(), Some(75));
        // Unspecified fields keep their defaults
        assert_eq!(options.background_color, "white");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut options = TransformOptions {
            max_width: 0,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        options.max_width = 746;
        options.with_webp = WebpMode::Quality { quality: 0 };
        assert!(options.validate().is_err());

        options.with_webp = WebpMode::Quality { quality: 101 };
        assert!(options.validate().is_err());

        options.with_webp = WebpMode::Quality { quality: 100 };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_serialization_is_stable_for_hashing() {
        let options = TransformOptions::default();
        let first = serde_json::to_string(&options).unwrap();
        let second = serde_json::to_string(&options).unwrap();
        assert_eq!(first, second);
    }
}
