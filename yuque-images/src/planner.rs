// ABOUTME: Responsive size planning from intrinsic image metadata
// ABOUTME: Computes scale breakpoints, presentation dimensions, sizes/srcset, and variant URLs

use crate::constants::{oss, planner};
use crate::error::TransformError;
use crate::image_url::{append_oss_query, ImageStyles};
use crate::metadata::ImageMetadata;
use crate::options::TransformOptions;

/// Per-call planning inputs, derived once per image and never shared.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerOptions {
    /// Maximum display width for this image
    pub max_width: u32,
    /// Caller-supplied `sizes` attribute, overriding the computed one
    pub sizes_override: Option<String>,
    /// Derive the display width from the image's embedded DPI density
    pub use_pixel_density: bool,
    /// WebP variant generation for this image
    pub webp: WebpVariant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebpVariant {
    Disabled,
    Enabled { quality: Option<u8> },
}

impl PlannerOptions {
    /// Derive the effective planning inputs for one image from the shared
    /// transform options and the image's style overrides.
    ///
    /// An explicit style width takes precedence over the configured default
    /// width; the shared options are never mutated.
    pub fn derive(options: &TransformOptions, styles: &ImageStyles) -> Self {
        let max_width = styles
            .width()
            .filter(|w| *w > 0)
            .unwrap_or(options.max_width);

        let webp = if options.with_webp.is_enabled() {
            WebpVariant::Enabled {
                quality: options.with_webp.quality(),
            }
        } else {
            WebpVariant::Disabled
        };

        Self {
            max_width,
            sizes_override: options.sizes.clone(),
            use_pixel_density: options.size_by_pixel_density,
            webp,
        }
    }
}

/// Builds the per-breakpoint variant URLs for one asset.
///
/// The WebP quality hint is already gated on file size by the planner; a
/// `None` quality simply omits the quality transform step.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantUrls {
    base_url: String,
    webp_enabled: bool,
    webp_quality: Option<u8>,
}

impl VariantUrls {
    /// Standard variant: the asset resized to `width` pixels.
    pub fn standard(&self, width: u32) -> String {
        append_oss_query(
            &self.base_url,
            &format!("{}{}", oss::RESIZE_PREFIX, width),
        )
    }

    /// WebP variant, `None` when WebP generation is disabled.
    pub fn webp(&self, width: u32) -> Option<String> {
        if !self.webp_enabled {
            return None;
        }
        let mut url = self.standard(width);
        url.push_str(oss::WEBP_STEP);
        if let Some(quality) = self.webp_quality {
            url.push_str(&format!("{}{}", oss::QUALITY_PREFIX, quality));
        }
        Some(url)
    }
}

/// The computed sizing plan for one image: the single source of truth for
/// everything the HTML assembler emits about dimensions and variants.
#[derive(Debug, Clone, PartialEq)]
pub struct SizingPlan {
    pub aspect_ratio: f64,
    pub presentation_width: u32,
    pub presentation_height: u32,
    pub sizes: String,
    /// Ascending, de-duplicated; the final entry is the intrinsic width
    pub breakpoints: Vec<u32>,
    pub urls: VariantUrls,
}

impl SizingPlan {
    /// `srcset` candidates for the standard variants, one per breakpoint.
    pub fn srcset(&self) -> String {
        self.breakpoints
            .iter()
            .map(|w| format!("{} {}w", self.urls.standard(*w), w))
            .collect::<Vec<_>>()
            .join(",\n")
    }

    /// `srcset` candidates for the WebP variants, `None` when disabled.
    pub fn webp_srcset(&self) -> Option<String> {
        self.breakpoints
            .iter()
            .map(|w| self.urls.webp(*w).map(|url| format!("{} {}w", url, w)))
            .collect::<Option<Vec<_>>>()
            .map(|entries| entries.join(",\n"))
    }

    /// Padding percentage reserving the image's aspect ratio before it loads.
    pub fn padding_bottom_percent(&self) -> f64 {
        100.0 / self.aspect_ratio
    }
}

/// Compute the sizing plan for one image.
///
/// Fails with `InvalidMetadata` when the metadata cannot support planning;
/// the caller is expected to skip the image, not abort the document.
pub fn plan(
    metadata: &ImageMetadata,
    base_url: &str,
    options: &PlannerOptions,
) -> Result<SizingPlan, TransformError> {
    metadata.validate()?;
    if options.max_width == 0 {
        return Err(TransformError::InvalidMetadata(
            "display max width is zero".to_string(),
        ));
    }

    let width = metadata.width;
    let height = metadata.height;
    let aspect_ratio = metadata.aspect_ratio();

    let pixel_ratio = if options.use_pixel_density {
        metadata
            .density
            .filter(|d| *d > 0.0)
            .map(|d| d / planner::BASE_DENSITY)
            .unwrap_or(1.0)
    } else {
        1.0
    };

    let presentation_width = options
        .max_width
        .min((width as f64 / pixel_ratio).round() as u32)
        .max(1);
    let presentation_height =
        (presentation_width as f64 * height as f64 / width as f64).round() as u32;

    let sizes = options.sizes_override.clone().unwrap_or_else(|| {
        format!(
            "(max-width: {}px) 100vw, {}px",
            presentation_width, presentation_width
        )
    });

    // Scale the intrinsic width through the fixed step set, keep everything
    // below the intrinsic width, and always offer the full resolution last.
    let mut breakpoints: Vec<u32> = planner::RESCALE_STEPS
        .iter()
        .map(|step| (width as f64 * step).round() as u32)
        .filter(|w| *w > 0 && *w < width)
        .collect();
    breakpoints.push(width);
    breakpoints.sort_unstable();
    breakpoints.dedup();

    let (webp_enabled, webp_quality) = match options.webp {
        WebpVariant::Disabled => (false, None),
        WebpVariant::Enabled { quality } => {
            // The quality hint only pays off on images large enough to notice
            let eligible = metadata
                .file_size
                .map(|size| size > planner::WEBP_QUALITY_MIN_FILE_SIZE)
                .unwrap_or(false);
            (true, quality.filter(|_| eligible))
        }
    };

    Ok(SizingPlan {
        aspect_ratio,
        presentation_width,
        presentation_height,
        sizes,
        breakpoints,
        urls: VariantUrls {
            base_url: base_url.to_string(),
            webp_enabled,
            webp_quality,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(width: u32, height: u32) -> ImageMetadata {
        ImageMetadata {
            width,
            height,
            density: None,
            file_size: Some(50000),
        }
    }

    fn default_planner_options() -> PlannerOptions {
        PlannerOptions::derive(&TransformOptions::default(), &ImageStyles::default())
    }

    const BASE: &str = "https://cdn.nlark.com/yuque/0/1/x.png";

    #[test]
    fn test_worked_example() {
        let plan = plan(&metadata(1200, 600), BASE, &default_planner_options()).unwrap();

        assert_eq!(plan.breakpoints, vec![300, 600, 900, 1200]);
        assert_eq!(plan.presentation_width, 746);
        assert_eq!(plan.presentation_height, 373);
        assert_eq!(plan.aspect_ratio, 2.0);
        assert_eq!(plan.sizes, "(max-width: 746px) 100vw, 746px");
    }

    #[test]
    fn test_breakpoints_strictly_ascending_and_terminal() {
        for width in [1u32, 2, 3, 17, 100, 746, 1200, 4096, 10000] {
            let plan = plan(&metadata(width, width), BASE, &default_planner_options()).unwrap();

            assert!(!plan.breakpoints.is_empty(), "width {}", width);
            assert_eq!(*plan.breakpoints.last().unwrap(), width);
            assert!(
                plan.breakpoints.windows(2).all(|w| w[0] < w[1]),
                "not strictly ascending for width {}: {:?}",
                width,
                plan.breakpoints
            );
            assert!(
                plan.breakpoints[..plan.breakpoints.len() - 1]
                    .iter()
                    .all(|b| *b < width),
                "non-terminal breakpoint >= intrinsic width for {}",
                width
            );
        }
    }

    #[test]
    fn test_presentation_width_caps() {
        let options = default_planner_options();

        // Wide image: capped at max_width
        let wide = plan(&metadata(3000, 1000), BASE, &options).unwrap();
        assert_eq!(wide.presentation_width, 746);

        // Narrow image: never upscaled past its intrinsic width
        let narrow = plan(&metadata(400, 300), BASE, &options).unwrap();
        assert_eq!(narrow.presentation_width, 400);
        assert_eq!(narrow.presentation_height, 300);
    }

    #[test]
    fn test_pixel_density_scaling() {
        let mut meta = metadata(1600, 800);
        meta.density = Some(144.0);

        let mut options = default_planner_options();
        options.use_pixel_density = true;
        options.max_width = 2000;

        // 144 dpi over the 72 dpi base halves the logical width
        let plan = plan(&meta, BASE, &options).unwrap();
        assert_eq!(plan.presentation_width, 800);
        assert_eq!(plan.presentation_height, 400);
    }

    #[test]
    fn test_pixel_density_ignored_when_disabled() {
        let mut meta = metadata(1600, 800);
        meta.density = Some(144.0);

        let mut options = default_planner_options();
        options.max_width = 2000;

        let plan = plan(&meta, BASE, &options).unwrap();
        assert_eq!(plan.presentation_width, 1600);
    }

    #[test]
    fn test_sizes_override() {
        let mut options = default_planner_options();
        options.sizes_override = Some("100vw".to_string());

        let plan = plan(&metadata(1200, 600), BASE, &options).unwrap();
        assert_eq!(plan.sizes, "100vw");
    }

    #[test]
    fn test_style_width_overrides_configured_default() {
        let base_options = TransformOptions::default();

        let styles = ImageStyles::from_fragment("width=300");
        let derived = PlannerOptions::derive(&base_options, &styles);
        assert_eq!(derived.max_width, 300);

        // Larger than the configured default wins too: no sentinel branching
        let styles = ImageStyles::from_fragment("width=1100&originWidth=1492");
        let derived = PlannerOptions::derive(&base_options, &styles);
        assert_eq!(derived.max_width, 1100);

        // A zero width is ignored rather than producing an unplannable image
        let styles = ImageStyles::from_fragment("width=0");
        let derived = PlannerOptions::derive(&base_options, &styles);
        assert_eq!(derived.max_width, 746);
    }

    #[test]
    fn test_variant_urls() {
        let plan = plan(&metadata(1200, 600), BASE, &default_planner_options()).unwrap();

        assert_eq!(
            plan.urls.standard(300),
            "https://cdn.nlark.com/yuque/0/1/x.png?x-oss-process=image/resize,w_300"
        );
        assert_eq!(
            plan.urls.webp(300).unwrap(),
            "https://cdn.nlark.com/yuque/0/1/x.png?x-oss-process=image/resize,w_300/format,webp"
        );
    }

    #[test]
    fn test_srcset_assembly() {
        let plan = plan(&metadata(1200, 600), BASE, &default_planner_options()).unwrap();
        let srcset = plan.srcset();

        let lines: Vec<&str> = srcset.split(",\n").collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with(" 300w"));
        assert!(lines[3].ends_with(" 1200w"));
        assert!(lines[3].contains("resize,w_1200"));
    }

    #[test]
    fn test_webp_quality_gate() {
        let mut options = default_planner_options();
        options.webp = WebpVariant::Enabled { quality: Some(80) };

        // Large file: quality hint applied to every WebP variant
        let large = plan(&metadata(1200, 600), BASE, &options).unwrap();
        let webp_srcset = large.webp_srcset().unwrap();
        assert!(webp_srcset.contains("/format,webp/quality,q_80"));

        // Small file: quality hint omitted even though one was supplied
        let mut small_meta = metadata(1200, 600);
        small_meta.file_size = Some(10000);
        let small = plan(&small_meta, BASE, &options).unwrap();
        let webp_srcset = small.webp_srcset().unwrap();
        assert!(webp_srcset.contains("/format,webp"));
        assert!(!webp_srcset.contains("quality"));

        // Unknown file size behaves like a small file
        let mut unknown_meta = metadata(1200, 600);
        unknown_meta.file_size = None;
        let unknown = plan(&unknown_meta, BASE, &options).unwrap();
        assert!(!unknown.webp_srcset().unwrap().contains("quality"));
    }

    #[test]
    fn test_webp_disabled() {
        let mut options = default_planner_options();
        options.webp = WebpVariant::Disabled;

        let plan = plan(&metadata(1200, 600), BASE, &options).unwrap();
        assert_eq!(plan.webp_srcset(), None);
        assert_eq!(plan.urls.webp(300), None);
    }

    #[test]
    fn test_invalid_metadata_rejected() {
        let zero_height = ImageMetadata {
            width: 1200,
            height: 0,
            density: None,
            file_size: None,
        };
        let result = plan(&zero_height, BASE, &default_planner_options());
        assert!(matches!(result, Err(TransformError::InvalidMetadata(_))));
    }

    #[test]
    fn test_padding_bottom_percent() {
        let plan = plan(&metadata(1200, 600), BASE, &default_planner_options()).unwrap();
        assert!((plan.padding_bottom_percent() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_base_url_with_existing_query() {
        let plan = plan(
            &metadata(1200, 600),
            "https://cdn.nlark.com/yuque/0/1/x.png?token=abc",
            &default_planner_options(),
        )
        .unwrap();
        assert_eq!(
            plan.urls.standard(300),
            "https://cdn.nlark.com/yuque/0/1/x.png?token=abc&x-oss-process=image/resize,w_300"
        );
    }
}
