// ABOUTME: Transform orchestrator tying together classification, fetching, planning, and assembly
// ABOUTME: Processes every discovered image concurrently with per-image error isolation

use crate::cache::{cache_key, options_hash, HtmlCache};
use crate::document::{self, ImageNode};
use crate::error::TransformError;
use crate::html::{self, RenderInputs};
use crate::image_url::{UrlClassifier, YuqueImage};
use crate::metadata::MetadataFetcher;
use crate::options::TransformOptions;
use crate::placeholder::PlaceholderGenerator;
use crate::planner::{self, PlannerOptions};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Result of transforming one document.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    pub document: String,
    /// Images rewritten to responsive markup
    pub replaced: usize,
    /// Images not applicable (foreign host or excluded format)
    pub skipped: usize,
    /// Images left untouched because fetching or planning failed
    pub failed: usize,
}

impl TransformOutcome {
    pub fn changed(&self) -> bool {
        self.replaced > 0
    }
}

/// Rewrites Yuque-hosted images in markdown documents.
///
/// One instance holds a single HTTP connection pool and immutable options;
/// it can transform any number of documents.
pub struct ImageTransformer {
    options: TransformOptions,
    options_hash: String,
    classifier: UrlClassifier,
    fetcher: MetadataFetcher,
    placeholder: PlaceholderGenerator,
    cache: Option<Arc<dyn HtmlCache>>,
}

impl ImageTransformer {
    pub fn new(options: TransformOptions) -> Result<Self, TransformError> {
        options.validate().map_err(TransformError::Configuration)?;

        let fetcher = MetadataFetcher::new(Duration::from_secs(options.timeout_secs))?;
        let placeholder = PlaceholderGenerator::new(fetcher.client().clone());

        Ok(Self {
            options_hash: options_hash(&options),
            options,
            classifier: UrlClassifier::new(),
            fetcher,
            placeholder,
            cache: None,
        })
    }

    /// Reuse previously rendered markup across runs.
    pub fn with_cache(mut self, cache: Arc<dyn HtmlCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Rewrite every qualifying image in `source`.
    ///
    /// Images are processed concurrently and joined before splicing; a
    /// failure on one image never aborts its siblings, and failed or
    /// non-qualifying images are left byte-for-byte untouched.
    pub async fn transform_document(&self, source: &str) -> TransformOutcome {
        let images = document::scan(source);

        let results = join_all(images.iter().map(|node| async move {
            let rendered = self.process_node(node).await;
            (node, rendered)
        }))
        .await;

        let mut replacements = Vec::new();
        let mut replaced = 0;
        let mut skipped = 0;
        let mut failed = 0;

        for (node, rendered) in results {
            match rendered {
                Ok(markup) => {
                    replacements.push((node.range.clone(), markup));
                    replaced += 1;
                }
                Err(err) if err.is_skip() => {
                    log::debug!("not rewriting {}: {}", node.url, err);
                    skipped += 1;
                }
                Err(err) => {
                    log::warn!("leaving {} untouched: {}", node.url, err);
                    failed += 1;
                }
            }
        }

        TransformOutcome {
            document: document::splice(source, replacements),
            replaced,
            skipped,
            failed,
        }
    }

    /// Full pipeline for one image node: classify, consult the cache, fetch
    /// metadata, plan sizes, build the placeholder, assemble markup, store.
    async fn process_node(&self, node: &ImageNode) -> Result<String, TransformError> {
        if !self.classifier.is_supported(&node.url) {
            return Err(TransformError::UnsupportedHost);
        }

        let image = YuqueImage::parse(&node.url);
        if image.is_excluded_format() {
            return Err(TransformError::ExcludedFormat(
                image.extension().unwrap_or_default(),
            ));
        }

        let key = cache_key(&image, &self.options_hash);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&key).await {
                return Ok(cached);
            }
        }

        let metadata = self.fetcher.fetch(&image.url).await?;

        let planner_options = PlannerOptions::derive(&self.options, &image.styles);
        let plan = planner::plan(&metadata, &image.url, &planner_options)?;

        let placeholder = self.placeholder.generate(&image.url).await?;

        let markup = html::render(
            &RenderInputs {
                plan: &plan,
                placeholder: &placeholder,
                original_url: &image.url,
                alt: node.alt.as_deref(),
                title: node.title.as_deref(),
                is_in_link: node.in_link,
                is_inline: node.inline,
                link: image.styles.link(),
                link_target: image.styles.link_target(),
            },
            &self.options,
        );

        if let Some(cache) = &self.cache {
            // A failed store only costs a recomputation next run
            if let Err(err) = cache.put(&key, &markup).await {
                log::warn!("failed to cache markup for {}: {}", image.url, err);
            }
        }

        Ok(markup)
    }
}
