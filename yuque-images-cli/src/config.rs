// ABOUTME: TOML configuration loading and merging for the yuque-images CLI
// ABOUTME: Applies user-level then project-level files beneath command-line flags

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use yuque_images::{TransformOptions, WebpMode};

/// Optional settings from `yuque-images.toml`. Every field is optional;
/// unset fields fall back to the library defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default)]
    pub with_webp: Option<WebpMode>,
    #[serde(default)]
    pub wrapper_style: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub link_images_to_original: Option<bool>,
    #[serde(default)]
    pub size_by_pixel_density: Option<bool>,
    #[serde(default)]
    pub sizes: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    pub fn load() -> Result<Self> {
        Self::load_from_paths(&Self::config_paths())
    }

    /// Apply config files in order; later paths override earlier ones.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<Self> {
        let mut config = Config::default();
        for path in paths {
            if path.is_file() {
                config = config.merge(Self::load_from_file(path)?);
            }
        }
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        toml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse TOML config file: {}",
                path.as_ref().display()
            )
        })
    }

    /// Standard config locations in ascending precedence: user config first,
    /// then the project file in the working directory.
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("yuque-images").join("config.toml"));
        }

        if let Ok(current_dir) = std::env::current_dir() {
            paths.push(current_dir.join("yuque-images.toml"));
        }

        paths
    }

    /// Merge with another config, giving precedence to `other`.
    pub fn merge(self, other: Config) -> Config {
        Config {
            max_width: other.max_width.or(self.max_width),
            with_webp: other.with_webp.or(self.with_webp),
            wrapper_style: other.wrapper_style.or(self.wrapper_style),
            background_color: other.background_color.or(self.background_color),
            link_images_to_original: other.link_images_to_original.or(self.link_images_to_original),
            size_by_pixel_density: other.size_by_pixel_density.or(self.size_by_pixel_density),
            sizes: other.sizes.or(self.sizes),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            cache_dir: other.cache_dir.or(self.cache_dir),
        }
    }

    /// Resolve into full transform options over the library defaults.
    pub fn into_options(self) -> TransformOptions {
        let defaults = TransformOptions::default();
        TransformOptions {
            max_width: self.max_width.unwrap_or(defaults.max_width),
            with_webp: self.with_webp.unwrap_or(defaults.with_webp),
            wrapper_style: self.wrapper_style.unwrap_or(defaults.wrapper_style),
            background_color: self.background_color.unwrap_or(defaults.background_color),
            link_images_to_original: self
                .link_images_to_original
                .unwrap_or(defaults.link_images_to_original),
            size_by_pixel_density: self
                .size_by_pixel_density
                .unwrap_or(defaults.size_by_pixel_density),
            sizes: self.sizes.or(defaults.sizes),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
        }
    }
}
