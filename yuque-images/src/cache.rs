// ABOUTME: Result cache for rendered image markup keyed by image and options
// ABOUTME: Provides a file-backed implementation with hashed shard paths and TTL expiry

use crate::constants::cache as cache_constants;
use crate::error::TransformError;
use crate::image_url::YuqueImage;
use crate::options::TransformOptions;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// Asynchronous string cache for rendered markup.
///
/// A hit short-circuits metadata fetch and planning entirely; failures are
/// never stored.
#[async_trait]
pub trait HtmlCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn put(&self, key: &str, value: &str) -> Result<(), TransformError>;
}

/// Hash of the full transform options, the per-run half of every cache key.
pub fn options_hash(options: &TransformOptions) -> String {
    let serialized = serde_json::to_string(options).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Derive the cache key for one image under one options hash.
///
/// The discriminator is the image's `name` style parameter; anonymous images
/// fall back to a hash of their base URL so distinct images never share keys.
pub fn cache_key(image: &YuqueImage, options_hash: &str) -> String {
    let discriminator = match image.styles.name() {
        Some(name) => name.to_string(),
        None => {
            let mut hasher = Sha256::new();
            hasher.update(image.url.as_bytes());
            let digest = format!("{:x}", hasher.finalize());
            digest[..16].to_string()
        }
    };
    format!(
        "{}-{}-{}",
        cache_constants::KEY_PREFIX,
        discriminator,
        options_hash
    )
}

/// File-backed cache storing one rendered HTML fragment per key.
pub struct FileHtmlCache {
    cache_dir: PathBuf,
    max_age: Duration,
}

impl FileHtmlCache {
    /// Cache in the platform cache directory (or `YUQUE_IMAGES_CACHE_DIR`).
    pub fn new() -> Result<Self, TransformError> {
        let cache_dir = default_cache_directory()?;
        Self::at(cache_dir)
    }

    /// Cache rooted at an explicit directory.
    pub fn at<P: Into<PathBuf>>(dir: P) -> Result<Self, TransformError> {
        let cache_dir = dir.into();
        fs::create_dir_all(&cache_dir).map_err(|e| {
            TransformError::Cache(format!(
                "failed to create cache directory {:?}: {}",
                cache_dir, e
            ))
        })?;

        let max_age = Duration::from_secs(parse_duration_env(
            cache_constants::CACHE_TTL_ENV,
            cache_constants::DEFAULT_TTL_SECONDS,
        ));

        Ok(Self { cache_dir, max_age })
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        // First 2 chars shard the directory to keep it small
        let subdir = &hash[..2];
        let filename = &hash[2..];
        self.cache_dir.join(subdir).join(filename)
    }

    /// Remove every expired entry. Failures are only worth a debug line; the
    /// next sweep gets another chance.
    fn sweep_expired(&self) {
        let Ok(shards) = fs::read_dir(&self.cache_dir) else {
            return;
        };
        for shard in shards.flatten() {
            let shard_path = shard.path();
            if !shard_path.is_dir() {
                continue;
            }
            let Ok(entries) = fs::read_dir(&shard_path) else {
                continue;
            };
            for entry in entries.flatten() {
                let entry_path = entry.path();
                if entry_path.is_file() && !self.is_fresh(&entry_path) {
                    if let Err(e) = fs::remove_file(&entry_path) {
                        log::debug!("failed to remove expired cache entry {:?}: {}", entry_path, e);
                    }
                }
            }
        }
    }

    fn is_fresh(&self, path: &Path) -> bool {
        let Ok(metadata) = fs::metadata(path) else {
            return false;
        };
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age < self.max_age,
            // Clock went backwards; treat the entry as fresh
            Err(_) => true,
        }
    }
}

#[async_trait]
impl HtmlCache for FileHtmlCache {
    async fn get(&self, key: &str) -> Option<String> {
        let path = self.entry_path(key);
        if !self.is_fresh(&path) {
            log::debug!("cache miss: {}", key);
            return None;
        }
        match fs::read_to_string(&path) {
            Ok(value) => {
                log::debug!("cache hit: {}", key);
                Some(value)
            }
            Err(_) => None,
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), TransformError> {
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TransformError::Cache(format!(
                    "failed to create cache subdirectory {:?}: {}",
                    parent, e
                ))
            })?;
        }

        // Write to a temporary file first so readers never see partial markup
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, value).map_err(|e| {
            TransformError::Cache(format!("failed to write cache file {:?}: {}", temp_path, e))
        })?;
        fs::rename(&temp_path, &path).map_err(|e| {
            TransformError::Cache(format!(
                "failed to move cache file {:?} -> {:?}: {}",
                temp_path, path, e
            ))
        })?;

        // Opportunistic background cleanup so expired entries do not pile up
        let sweeper = Self {
            cache_dir: self.cache_dir.clone(),
            max_age: self.max_age,
        };
        tokio::spawn(async move {
            sweeper.sweep_expired();
        });

        Ok(())
    }
}

/// In-memory cache for embedders and tests.
#[derive(Default)]
pub struct MemoryHtmlCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryHtmlCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HtmlCache for MemoryHtmlCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), TransformError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn default_cache_directory() -> Result<PathBuf, TransformError> {
    if let Ok(custom_dir) = std::env::var(cache_constants::CACHE_DIR_ENV) {
        return Ok(PathBuf::from(custom_dir));
    }

    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| TransformError::Cache("cannot determine cache directory".to_string()))?
        .join("yuque-images");
    Ok(cache_dir)
}

fn parse_duration_env(env_var: &str, default_seconds: u64) -> u64 {
    let Ok(duration_str) = std::env::var(env_var) else {
        return default_seconds;
    };

    let duration_str = duration_str.to_lowercase();

    let (number_part, multiplier) = if duration_str.ends_with('h') {
        (duration_str.trim_end_matches('h'), 3600)
    } else if duration_str.ends_with('m') {
        (duration_str.trim_end_matches('m'), 60)
    } else if duration_str.ends_with('d') {
        (duration_str.trim_end_matches('d'), 24 * 3600)
    } else {
        (duration_str.as_str(), 1)
    };

    if let Ok(num) = number_part.parse::<u64>() {
        num * multiplier
    } else {
        default_seconds
    }
}
