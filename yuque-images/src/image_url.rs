// ABOUTME: Yuque image URL parsing and CDN host classification
// ABOUTME: Splits asset URLs from fragment-encoded style parameters and strips transform queries

use crate::constants::{formats, hosts, oss};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Per-image style overrides carried in the URL fragment using query syntax,
/// e.g. `...png#width=300&link=https%3A%2F%2Fexample.com&name=diagram`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageStyles {
    params: BTreeMap<String, String>,
}

impl ImageStyles {
    /// Decode a fragment as urlencoded key/value pairs. A duplicated key keeps
    /// its last occurrence, matching standard query-string semantics.
    pub fn from_fragment(fragment: &str) -> Self {
        let mut params = BTreeMap::new();
        for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
            params.insert(key.into_owned(), value.into_owned());
        }
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Explicit display width declared for this image
    pub fn width(&self) -> Option<u32> {
        self.get("width").and_then(|w| w.parse().ok())
    }

    /// Width the image had when it was inserted into the document
    pub fn origin_width(&self) -> Option<u32> {
        self.get("originWidth").and_then(|w| w.parse().ok())
    }

    /// Link target URL declared for this image
    pub fn link(&self) -> Option<&str> {
        self.get("link").filter(|l| !l.is_empty())
    }

    /// Target window for the declared link (`_blank` when unspecified)
    pub fn link_target(&self) -> &str {
        self.get("target").filter(|t| !t.is_empty()).unwrap_or("_blank")
    }

    /// Cache-key discriminator naming this image
    pub fn name(&self) -> Option<&str> {
        self.get("name").filter(|n| !n.is_empty())
    }
}

/// An image reference decomposed into its bare asset URL and style overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct YuqueImage {
    pub url: String,
    pub styles: ImageStyles,
}

impl YuqueImage {
    /// Split a raw markdown image URL into the canonical asset location and
    /// its fragment-encoded style parameters.
    ///
    /// Any pre-existing `x-oss-process` transform query is stripped back to
    /// the bare asset path, so parsing is idempotent: re-parsing a stripped
    /// URL yields the same base URL.
    pub fn parse(raw: &str) -> Self {
        let (before_fragment, fragment) = match raw.split_once('#') {
            Some((base, fragment)) => (base, Some(fragment)),
            None => (raw, None),
        };

        let url = if before_fragment.contains(oss::TRANSFORM_MARKER) {
            before_fragment
                .split_once('?')
                .map(|(base, _)| base)
                .unwrap_or(before_fragment)
        } else {
            before_fragment
        };

        Self {
            url: url.to_string(),
            styles: fragment.map(ImageStyles::from_fragment).unwrap_or_default(),
        }
    }

    /// File extension of the bare asset, lowercased.
    pub fn extension(&self) -> Option<String> {
        let path = self.url.split('?').next().unwrap_or(&self.url);
        let (_, ext) = path.rsplit_once('.')?;
        if ext.is_empty() || ext.contains('/') {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// True for formats intentionally left untouched (`.gif`, `.svg`).
    pub fn is_excluded_format(&self) -> bool {
        self.extension()
            .map(|ext| formats::EXCLUDED_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

/// Classifies URLs as Yuque-hosted or not.
///
/// The host component must match a supported CDN host exactly; a URL merely
/// *containing* a CDN host name elsewhere never qualifies.
pub struct UrlClassifier {
    allowed_hosts: HashSet<String>,
}

impl UrlClassifier {
    pub fn new() -> Self {
        let mut allowed_hosts: HashSet<String> = hosts::SUPPORTED_HOSTS
            .iter()
            .map(|h| h.to_string())
            .collect();

        // Extra hosts via environment, mainly for tests and self-hosted mirrors
        if let Ok(additional) = std::env::var(hosts::EXTRA_HOSTS_ENV) {
            for host in additional.split(',') {
                let host = host.trim();
                if !host.is_empty() {
                    allowed_hosts.insert(host.to_string());
                }
            }
        }

        Self { allowed_hosts }
    }

    pub fn is_supported(&self, raw: &str) -> bool {
        let Ok(parsed) = Url::parse(raw) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        match parsed.host_str() {
            Some(host) => self.allowed_hosts.contains(host),
            None => false,
        }
    }
}

impl Default for UrlClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Append an OSS transform query to an asset URL, respecting any query string
/// the URL already carries.
pub(crate) fn append_oss_query(base: &str, query: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base, separator, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_host_classification() {
        let classifier = UrlClassifier::new();

        assert!(classifier.is_supported("https://cdn.nlark.com/yuque/0/1/x.png"));
        assert!(classifier.is_supported("https://cdn.yuque.com/yuque/0/1/x.png"));
        assert!(!classifier.is_supported("https://example.com/x.png"));
        // Host must match exactly, not merely contain the CDN host name
        assert!(!classifier.is_supported("https://notcdn.nlark.com.evil.com/yuque/x.png"));
        assert!(!classifier.is_supported("https://evil.com/cdn.nlark.com/yuque/x.png"));
        assert!(!classifier.is_supported("ftp://cdn.nlark.com/yuque/x.png"));
        assert!(!classifier.is_supported("not a url"));
    }

    #[test]
    fn test_classification_ignores_fragment() {
        let classifier = UrlClassifier::new();
        assert!(classifier.is_supported("https://cdn.nlark.com/yuque/0/1/x.png#width=300&name=a"));
    }

    #[test]
    #[serial_test::serial]
    fn test_extra_hosts_env() {
        unsafe {
            std::env::set_var(hosts::EXTRA_HOSTS_ENV, "127.0.0.1, assets.internal.example");
        }

        let classifier = UrlClassifier::new();
        assert!(classifier.is_supported("http://127.0.0.1:8080/yuque/x.png"));
        assert!(classifier.is_supported("https://assets.internal.example/x.png"));
        assert!(!classifier.is_supported("https://example.com/x.png"));

        unsafe {
            std::env::remove_var(hosts::EXTRA_HOSTS_ENV);
        }
    }

    #[test]
    fn test_parse_with_fragment_params() {
        let image = YuqueImage::parse(
            "https://cdn.nlark.com/yuque/0/1/x.png#width=300&originWidth=1492&name=diagram",
        );
        assert_eq!(image.url, "https://cdn.nlark.com/yuque/0/1/x.png");
        assert_eq!(image.styles.width(), Some(300));
        assert_eq!(image.styles.origin_width(), Some(1492));
        assert_eq!(image.styles.name(), Some("diagram"));
        assert_eq!(image.styles.link(), None);
    }

    #[test]
    fn test_parse_without_fragment() {
        let image = YuqueImage::parse("https://cdn.nlark.com/yuque/0/1/x.png");
        assert_eq!(image.url, "https://cdn.nlark.com/yuque/0/1/x.png");
        assert!(image.styles.is_empty());
    }

    #[test]
    fn test_parse_strips_transform_query() {
        let image = YuqueImage::parse(
            "https://cdn.nlark.com/yuque/0/1/x.png?x-oss-process=image/resize,w_300#width=300",
        );
        assert_eq!(image.url, "https://cdn.nlark.com/yuque/0/1/x.png");
        assert_eq!(image.styles.width(), Some(300));
    }

    #[test]
    fn test_parse_keeps_unrelated_query() {
        let image = YuqueImage::parse("https://cdn.nlark.com/yuque/0/1/x.png?token=abc");
        assert_eq!(image.url, "https://cdn.nlark.com/yuque/0/1/x.png?token=abc");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = YuqueImage::parse(
            "https://cdn.nlark.com/yuque/0/1/x.png?x-oss-process=image/resize,w_20#name=a",
        );
        let second = YuqueImage::parse(&first.url);
        assert_eq!(first.url, second.url);
    }

    #[test]
    fn test_duplicate_fragment_key_last_wins() {
        let image = YuqueImage::parse("https://cdn.nlark.com/yuque/0/1/x.png#width=100&width=200");
        assert_eq!(image.styles.width(), Some(200));
    }

    #[test]
    fn test_fragment_values_are_url_decoded() {
        let image = YuqueImage::parse(
            "https://cdn.nlark.com/yuque/0/1/x.png#link=https%3A%2F%2Fexample.com%2Fdocs",
        );
        assert_eq!(image.styles.link(), Some("https://example.com/docs"));
        assert_eq!(image.styles.link_target(), "_blank");
    }

    #[test]
    fn test_excluded_formats() {
        assert!(YuqueImage::parse("https://cdn.nlark.com/yuque/0/1/anim.gif").is_excluded_format());
        assert!(YuqueImage::parse("https://cdn.nlark.com/yuque/0/1/logo.SVG").is_excluded_format());
        assert!(!YuqueImage::parse("https://cdn.nlark.com/yuque/0/1/x.png").is_excluded_format());
        assert!(!YuqueImage::parse("https://cdn.nlark.com/yuque/0/1/noext").is_excluded_format());
    }

    #[test]
    fn test_append_oss_query() {
        assert_eq!(
            append_oss_query("https://cdn.nlark.com/yuque/x.png", "x-oss-process=image/info"),
            "https://cdn.nlark.com/yuque/x.png?x-oss-process=image/info"
        );
        assert_eq!(
            append_oss_query("https://cdn.nlark.com/yuque/x.png?token=abc", "a=b"),
            "https://cdn.nlark.com/yuque/x.png?token=abc&a=b"
        );
    }

    #[test]
    fn test_extension_extraction() {
        let image = YuqueImage::parse("https://cdn.nlark.com/yuque/0/1/photo.JPEG");
        assert_eq!(image.extension(), Some("jpeg".to_string()));

        let no_ext = YuqueImage::parse("https://cdn.nlark.com/yuque/0.1/photo");
        assert_eq!(no_ext.extension(), None);
    }
}
