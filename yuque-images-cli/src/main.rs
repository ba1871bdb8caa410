// ABOUTME: Command-line entry point for rewriting Yuque images in markdown files
// ABOUTME: Discovers markdown inputs, runs the transform, and writes results with a summary

use anyhow::{anyhow, bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use yuque_images::{FileHtmlCache, ImageTransformer, TransformOptions};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "yuque-images")]
#[command(about = "Rewrite Yuque CDN images in markdown as responsive HTML", long_about = None)]
#[command(version)]
struct Cli {
    /// Markdown files or directories to process
    #[arg(value_name = "PATH")]
    inputs: Vec<PathBuf>,

    /// Rewrite files in place
    #[arg(long)]
    write: bool,

    /// Write transformed copies into this directory
    #[arg(long, value_name = "DIR", conflicts_with = "write")]
    out_dir: Option<PathBuf>,

    /// Maximum display width in pixels
    #[arg(long)]
    max_width: Option<u32>,

    /// Disable WebP variant generation
    #[arg(long)]
    no_webp: bool,

    /// WebP quality hint (1-100), implies WebP generation
    #[arg(long, conflicts_with = "no_webp")]
    webp_quality: Option<u8>,

    /// Override the generated `sizes` attribute
    #[arg(long)]
    sizes: Option<String>,

    /// Do not wrap standalone images in a link to the original
    #[arg(long)]
    no_link_original: bool,

    /// Derive display width from embedded DPI density
    #[arg(long)]
    pixel_density: bool,

    /// Background color shown while the image loads
    #[arg(long)]
    background_color: Option<String>,

    /// Extra CSS appended to the wrapper element
    #[arg(long)]
    wrapper_style: Option<String>,

    /// Timeout for CDN requests, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Disable the rendered-markup cache
    #[arg(long)]
    no_cache: bool,

    /// Cache directory (defaults to the platform cache location)
    #[arg(long, value_name = "DIR", conflicts_with = "no_cache")]
    cache_dir: Option<PathBuf>,

    /// Explicit config file (skips the standard locations)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Suppress the progress bar and summary
    #[arg(long, short)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        let mut command = Cli::command();
        let name = command.get_name().to_string();
        clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
        return Ok(());
    }

    if cli.inputs.is_empty() {
        bail!("no inputs given; pass markdown files or directories");
    }

    let options = resolve_options(&cli)?;
    let files = discover_inputs(&cli.inputs)?;
    if files.is_empty() {
        bail!("no markdown files found under the given inputs");
    }
    log::debug!("discovered {} markdown file(s)", files.len());

    let mut transformer = ImageTransformer::new(options)?;
    if !cli.no_cache {
        let cache = match &cli.cache_dir {
            Some(dir) => FileHtmlCache::at(dir.clone())?,
            None => FileHtmlCache::new()?,
        };
        transformer = transformer.with_cache(Arc::new(cache));
    }

    if files.len() > 1 && !cli.write && cli.out_dir.is_none() {
        bail!("multiple files matched; pass --write or --out-dir to choose where results go");
    }

    let show_progress = !cli.quiet && std::io::stderr().is_terminal() && files.len() > 1;
    let progress = if show_progress {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:25.cyan/blue}] {pos}/{len}")
                .expect("static progress template is valid")
                .progress_chars("=>-"),
        );
        bar.set_message("Rewriting");
        Some(bar)
    } else {
        None
    };

    let mut replaced = 0;
    let mut skipped = 0;
    let mut failed = 0;
    let mut files_changed = 0;

    for file in &files {
        let source = std::fs::read_to_string(&file.path)
            .with_context(|| format!("Failed to read {}", file.path.display()))?;

        let outcome = transformer.transform_document(&source).await;
        replaced += outcome.replaced;
        skipped += outcome.skipped;
        failed += outcome.failed;
        if outcome.changed() {
            files_changed += 1;
        }

        if cli.write {
            if outcome.changed() {
                std::fs::write(&file.path, &outcome.document)
                    .with_context(|| format!("Failed to write {}", file.path.display()))?;
            }
        } else if let Some(out_dir) = &cli.out_dir {
            let target = out_dir.join(&file.relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(&target, &outcome.document)
                .with_context(|| format!("Failed to write {}", target.display()))?;
        } else {
            print!("{}", outcome.document);
        }

        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }

    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    if !cli.quiet && (cli.write || cli.out_dir.is_some()) {
        println!(
            "{} file(s) processed, {} changed: {} image(s) rewritten, {} skipped, {} failed",
            files.len(),
            files_changed,
            replaced,
            skipped,
            failed
        );
    }

    Ok(())
}

/// Layer the resolved options: library defaults, then config files, then flags.
fn resolve_options(cli: &Cli) -> Result<TransformOptions> {
    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load()?,
    };

    let mut options = config.into_options();

    if let Some(max_width) = cli.max_width {
        options.max_width = max_width;
    }
    if cli.no_webp {
        options.with_webp = yuque_images::WebpMode::Toggle(false);
    }
    if let Some(quality) = cli.webp_quality {
        options.with_webp = yuque_images::WebpMode::Quality { quality };
    }
    if let Some(sizes) = &cli.sizes {
        options.sizes = Some(sizes.clone());
    }
    if cli.no_link_original {
        options.link_images_to_original = false;
    }
    if cli.pixel_density {
        options.size_by_pixel_density = true;
    }
    if let Some(background_color) = &cli.background_color {
        options.background_color = background_color.clone();
    }
    if let Some(wrapper_style) = &cli.wrapper_style {
        options.wrapper_style = wrapper_style.clone();
    }
    if let Some(timeout_secs) = cli.timeout_secs {
        options.timeout_secs = timeout_secs;
    }

    options
        .validate()
        .map_err(|e| anyhow!("invalid options: {}", e))?;
    Ok(options)
}

/// A markdown file to process: its path plus the relative path used when
/// mirroring into an output directory.
#[derive(Debug, Clone, PartialEq)]
struct InputFile {
    path: PathBuf,
    relative: PathBuf,
}

/// Expand the given paths into markdown files; directories are recursed.
fn discover_inputs(inputs: &[PathBuf]) -> Result<Vec<InputFile>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            collect_markdown_files(input, input, &mut files)?;
        } else if input.is_file() {
            let relative = input
                .file_name()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("input has no file name: {}", input.display()))?;
            files.push(InputFile {
                path: input.clone(),
                relative,
            });
        } else {
            bail!("input does not exist: {}", input.display());
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files.dedup();
    Ok(files)
}

fn collect_markdown_files(root: &Path, dir: &Path, files: &mut Vec<InputFile>) -> Result<()> {
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            collect_markdown_files(root, &path, files)?;
        } else if is_markdown(&path) {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(path.as_path())
                .to_path_buf();
            files.push(InputFile { path, relative });
        }
    }
    Ok(())
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
        .unwrap_or(false)
}
