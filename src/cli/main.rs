//! Text behind image CLI
//!
//! `compose` runs the whole pipeline on one image; `serve` starts the web page;
//! the remaining commands manage the model cache.

use super::config::{CliConfigBuilder, OutputTarget};
use super::progress::IndicatifProgressReporter;
use crate::{
    cache::{format_size, ModelCache, CACHE_DIR_ENV},
    config::{FontChoice, DEFAULT_FONT_COLOR, DEFAULT_FONT_SIZE, DEFAULT_TEXT},
    download::{validate_model_url, ModelDownloader},
    models::{ModelSource, ModelSpec},
    pipeline::TextBehindPipeline,
    processor::{BackendType, BackgroundRemovalProcessor, ProcessorConfig},
    services::{ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, ProgressReporter},
    tracing_config::{init_cli_tracing, spans},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;

/// Put text behind the subject of a photo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "imgly-text-behind")]
pub struct Cli {
    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines (requires the tracing-json feature)
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Use custom cache directory
    #[arg(long, value_name = "PATH", global = true)]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Remove the background of an image and draw text behind its subject
    Compose(ComposeArgs),
    /// Serve the single-page web interface
    #[cfg(feature = "web")]
    Serve(ServeArgs),
    /// Download a model into the cache [default: https://huggingface.co/imgly/isnet-general-onnx]
    Download {
        /// Model repository URL
        url: Option<String>,
    },
    /// List cached models
    ListModels,
    /// Clear cached models
    ClearCache {
        /// Only remove this model id
        #[arg(long)]
        model: Option<String>,
    },
    /// Show the cache directory in use
    CacheDir,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Compose(_) => "compose",
            #[cfg(feature = "web")]
            Command::Serve(_) => "serve",
            Command::Download { .. } => "download",
            Command::ListModels => "list-models",
            Command::ClearCache { .. } => "clear-cache",
            Command::CacheDir => "cache-dir",
        }
    }
}

/// Model selection shared by `compose` and `serve`
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Model id, URL, or path to a model folder or .onnx file (optionally `name:variant`)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Model variant (fp32, fp16) [default: fp32 when available]
    #[arg(long)]
    pub variant: Option<String>,

    /// Inference backend
    #[arg(long, default_value_t = BackendType::Tract)]
    pub backend: BackendType,
}

#[derive(Args, Debug, Clone)]
pub struct ComposeArgs {
    /// Input JPEG or PNG image ("-" for stdin)
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Output PNG file ("-" for stdout) [default: text_behind_image.png]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Text drawn behind the subject
    #[arg(short, long, default_value = DEFAULT_TEXT)]
    pub text: String,

    /// Font (arial.ttf, times.ttf, georgia.ttf)
    #[arg(long, default_value_t = FontChoice::Arial)]
    pub font: FontChoice,

    /// Font size (10-200)
    #[arg(long, default_value_t = DEFAULT_FONT_SIZE)]
    pub font_size: u32,

    /// Font color as #RRGGBB
    #[arg(long, default_value = DEFAULT_FONT_COLOR)]
    pub font_color: String,

    /// Show a progress bar
    #[arg(long)]
    pub progress: bool,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[cfg(feature = "web")]
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:8501")]
    pub bind: std::net::SocketAddr,

    /// Maximum upload size in MiB
    #[arg(long, default_value_t = 200)]
    pub max_upload_mb: usize,

    #[command(flatten)]
    pub model: ModelArgs,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = init_cli_tracing(cli.verbose, cli.json_logs).context("Failed to initialize tracing")?;
    let span = spans::session(&session_id, cli.command.name());

    run(cli).instrument(span).await
}

async fn run(cli: Cli) -> Result<()> {
    let cache = match &cli.cache_dir {
        Some(dir) => ModelCache::with_custom_cache_dir(dir).context("Failed to create cache with custom directory")?,
        None => ModelCache::new().context("Failed to create model cache")?,
    };

    match &cli.command {
        Command::Compose(args) => compose(&cli, args, cache).await,
        #[cfg(feature = "web")]
        Command::Serve(args) => serve(&cli, args, cache).await,
        Command::Download { url } => download_model(cache, url.as_deref()).await,
        Command::ListModels => list_cached_models(&cache),
        Command::ClearCache { model } => clear_cache_models(&cache, model.as_deref()),
        Command::CacheDir => show_current_cache_dir(&cache),
    }
}

async fn compose(cli: &Cli, args: &ComposeArgs, cache: ModelCache) -> Result<()> {
    let request = CliConfigBuilder::compose_request(args).context("Invalid text options")?;
    let bytes = if args.input == "-" {
        ImageIOService::read_upload_from(tokio::io::stdin())
            .await
            .context("Failed to read image from stdin")?
    } else {
        ImageIOService::read_upload(&args.input).with_context(|| format!("Failed to read {}", args.input))?
    };

    let pipeline = build_pipeline(cli, &args.model, cache, args.progress).await?;
    let outcome = pipeline.run(&bytes, &request)?;

    if outcome.composite.metadata.font_fallback {
        warn!(
            "⚠️  Font '{}' not found, used the built-in {}px font",
            request.style.font,
            crate::fonts::FALLBACK_GLYPH_SIZE
        );
    }

    match CliConfigBuilder::output_target(args) {
        OutputTarget::Stdout => {
            ImageIOService::write_to(&outcome.png_bytes, tokio::io::stdout())
                .await
                .context("Failed to write image to stdout")?;
        },
        OutputTarget::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = tokio::fs::File::create(&path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            ImageIOService::write_to(&outcome.png_bytes, file)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                "💾 Saved {}x{} image to {}",
                outcome.original_dimensions.0,
                outcome.original_dimensions.1,
                path.display()
            );
        },
    }

    Ok(())
}

#[cfg(feature = "web")]
async fn serve(cli: &Cli, args: &ServeArgs, cache: ModelCache) -> Result<()> {
    let server_config = CliConfigBuilder::server_config(args).context("Invalid server options")?;
    let pipeline = build_pipeline(cli, &args.model, cache, false).await?;

    crate::web::serve(crate::web::AppState::new(pipeline), &server_config).await
}

/// Resolve the model, downloading the default one when missing, and wire the pipeline
async fn build_pipeline(cli: &Cli, model: &ModelArgs, cache: ModelCache, progress: bool) -> Result<TextBehindPipeline> {
    let config = CliConfigBuilder::processor_config(model, &cache, cli.cache_dir.as_deref())
        .context("Invalid model options")?;

    if config.backend_type == BackendType::Tract {
        ensure_model_available(&config, cache, model.model.as_deref())
            .await
            .context("Failed to ensure model is available")?;
    }

    info!("Backend: {}, Model: {}", config.backend_type, config.model_spec.source.display_name());
    let processor = BackgroundRemovalProcessor::new(config).context("Failed to create background removal processor")?;

    let reporter: Arc<dyn ProgressReporter> = if progress {
        Arc::new(IndicatifProgressReporter::new())
    } else if cli.verbose > 0 {
        Arc::new(ConsoleProgressReporter::new(true))
    } else {
        Arc::new(NoOpProgressReporter)
    };

    Ok(TextBehindPipeline::new(Arc::new(processor)).with_progress_reporter(reporter))
}

/// Ensure model is available in cache, downloading it when its URL is known
async fn ensure_model_available(config: &ProcessorConfig, cache: ModelCache, model_arg: Option<&str>) -> Result<()> {
    let ModelSpec {
        source: ModelSource::Downloaded(model_id),
        ..
    } = &config.model_spec
    else {
        return Ok(());
    };

    if cache.is_model_cached(model_id) {
        return Ok(());
    }

    let url = match model_arg.filter(|arg| arg.starts_with("http")) {
        Some(url) => url.to_string(),
        None if *model_id == ModelCache::get_default_model_id() => ModelCache::get_default_model_url().to_string(),
        None => anyhow::bail!(
            "Model '{}' not found in cache. Run `imgly-text-behind download <URL>` first, or `list-models` to see available models.",
            model_id
        ),
    };

    eprintln!("📦 Model not cached. Downloading {}...", url);
    let downloader = ModelDownloader::new(cache).context("Failed to create model downloader")?;
    let downloaded_id = downloader
        .download_model(&url, true)
        .await
        .context("Failed to download model")?;

    if downloaded_id != *model_id {
        anyhow::bail!(
            "Downloaded model ID '{}' doesn't match expected '{}'",
            downloaded_id,
            model_id
        );
    }
    eprintln!("✅ Model downloaded successfully!");
    Ok(())
}

async fn download_model(cache: ModelCache, url: Option<&str>) -> Result<()> {
    let model_url = url.unwrap_or(ModelCache::get_default_model_url());
    validate_model_url(model_url).context("Invalid model URL")?;

    println!("📦 Downloading model from: {}", model_url);
    let downloader = ModelDownloader::new(cache).context("Failed to create model downloader")?;
    let span = spans::download(model_url, downloader.cache().get_current_cache_dir());
    let model_id = downloader
        .download_model(model_url, true)
        .instrument(span)
        .await
        .context("Failed to download model")?;

    println!("✅ Successfully downloaded model!");
    println!("   Model ID: {}", model_id);
    println!(
        "   Cache location: {}",
        downloader.cache().get_model_path(&model_id).display()
    );
    println!("\n💡 To use this model:");
    println!("   imgly-text-behind compose --model {} input.jpg", model_id);
    Ok(())
}

fn list_cached_models(cache: &ModelCache) -> Result<()> {
    let models = cache.scan_cached_models().context("Failed to list cached models")?;

    println!("📦 Cached Models");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if models.is_empty() {
        println!("No cached models found.");
        println!("\n💡 To download a model, use:");
        println!("  imgly-text-behind download {}", ModelCache::get_default_model_url());
        return Ok(());
    }

    for model in models {
        println!("📁 Model ID: {}", model.model_id);
        println!("  └─ Cache location: {}", model.path.display());
        if !model.variants.is_empty() {
            println!("  └─ Variants: {}", model.variants.join(", "));
        }
        println!("  └─ Size: {}", format_size(model.size_bytes));
        println!();
    }

    println!("💡 To use a cached model:");
    println!("  imgly-text-behind compose --model MODEL_ID input.jpg");
    Ok(())
}

fn clear_cache_models(cache: &ModelCache, model_id: Option<&str>) -> Result<()> {
    if let Some(model_id) = model_id {
        println!("🗑️  Clearing specific model: {}", model_id);
        if cache
            .clear_specific_model(model_id)
            .with_context(|| format!("Failed to clear model '{}'", model_id))?
        {
            println!("✅ Successfully removed model: {}", model_id);
        } else {
            println!("⚠️  Model '{}' not found in cache", model_id);
            println!("   Use list-models to see available models");
        }
    } else {
        println!("🗑️  Clearing entire model cache...");
        let removed = cache.clear_all_models().context("Failed to clear cache")?;
        if removed.is_empty() {
            println!("💡 Cache was already empty");
        } else {
            println!("✅ Successfully removed {} model(s):", removed.len());
            for model_id in &removed {
                println!("   • {}", model_id);
            }
        }
    }

    println!("   Cache location: {}", cache.get_current_cache_dir().display());
    Ok(())
}

fn show_current_cache_dir(cache: &ModelCache) -> Result<()> {
    println!("📁 Current cache directory:");
    println!("   Path: {}", cache.get_current_cache_dir().display());

    if std::env::var_os(CACHE_DIR_ENV).is_some() {
        println!("   Source: {} environment variable", CACHE_DIR_ENV);
    } else {
        println!("   Source: platform cache directory");
    }

    println!("\n💡 To use a custom cache directory:");
    println!("   imgly-text-behind --cache-dir /path/to/custom/cache <COMMAND>");
    println!("   or set {} environment variable", CACHE_DIR_ENV);
    Ok(())
}
