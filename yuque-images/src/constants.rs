// ABOUTME: Centralized constants for Yuque image processing
// ABOUTME: Contains CDN hosts, OSS transform markers, planner defaults, and timeouts

/// Supported CDN hosts
pub mod hosts {
    /// Current Yuque asset host
    pub const CDN_HOST: &str = "cdn.nlark.com";

    /// Legacy Yuque asset host, still present in older documents
    pub const CDN_HOST_LEGACY: &str = "cdn.yuque.com";

    /// All hosts recognized as Yuque-hosted images
    pub const SUPPORTED_HOSTS: &[&str] = &[CDN_HOST, CDN_HOST_LEGACY];

    /// Environment variable adding extra hosts (comma separated)
    pub const EXTRA_HOSTS_ENV: &str = "YUQUE_IMAGES_EXTRA_HOSTS";
}

/// OSS image transform query syntax understood by the CDN
pub mod oss {
    /// Marker identifying a transform query on an asset URL
    pub const TRANSFORM_MARKER: &str = "x-oss-process";

    /// Query requesting image metadata as JSON
    pub const INFO_QUERY: &str = "x-oss-process=image/info";

    /// Query prefix requesting a width-constrained variant
    pub const RESIZE_PREFIX: &str = "x-oss-process=image/resize,w_";

    /// Transform step converting the variant to WebP
    pub const WEBP_STEP: &str = "/format,webp";

    /// Transform step prefix applying a WebP quality hint
    pub const QUALITY_PREFIX: &str = "/quality,q_";
}

/// Responsive size planning defaults
pub mod planner {
    /// Default maximum display width in pixels
    pub const DEFAULT_MAX_WIDTH: u32 = 746;

    /// Scale steps applied to the intrinsic width when generating breakpoints
    pub const RESCALE_STEPS: &[f64] = &[0.25, 0.5, 1.0, 1.5, 2.0, 3.0];

    /// Minimum file size (bytes) before a WebP quality hint is applied
    pub const WEBP_QUALITY_MIN_FILE_SIZE: u64 = 10000;

    /// Width of the blur-up placeholder variant
    pub const PLACEHOLDER_WIDTH: u32 = 20;

    /// DPI value treated as 1:1 pixel density
    pub const BASE_DENSITY: f64 = 72.0;
}

/// File extensions never rewritten (animations and vector assets)
pub mod formats {
    pub const EXCLUDED_EXTENSIONS: &[&str] = &["gif", "svg"];
}

/// Timeout configurations for remote fetches
pub mod timeouts {
    use std::time::Duration;

    /// Default timeout for metadata and placeholder requests
    pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

    /// Maximum redirects followed when talking to the CDN
    pub const MAX_REDIRECTS: usize = 3;
}

/// Result cache settings
pub mod cache {
    /// Prefix for every cache key written by this crate
    pub const KEY_PREFIX: &str = "yuque-images";

    /// Environment variable overriding the cache directory
    pub const CACHE_DIR_ENV: &str = "YUQUE_IMAGES_CACHE_DIR";

    /// Environment variable overriding the cache TTL
    pub const CACHE_TTL_ENV: &str = "YUQUE_IMAGES_CACHE_TTL";

    /// Default time-to-live for cached markup (24 hours)
    pub const DEFAULT_TTL_SECONDS: u64 = 24 * 60 * 60;
}
