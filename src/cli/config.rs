//! Conversion from CLI arguments to library configuration

use super::main_impl::{ComposeArgs, ModelArgs};
use crate::{
    cache::ModelCache,
    config::{ComposeRequest, DOWNLOAD_FILE_NAME},
    models::{ModelSource, ModelSpec},
    processor::{ProcessorConfig, ProcessorConfigBuilder},
    utils::ModelSpecParser,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Where `compose` writes its PNG
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OutputTarget {
    Stdout,
    File(PathBuf),
}

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the processor configuration for `--model`, `--variant` and `--backend`
    pub(crate) fn processor_config(
        model: &ModelArgs,
        cache: &ModelCache,
        cache_dir: Option<&Path>,
    ) -> Result<ProcessorConfig> {
        let model_spec = match &model.model {
            Some(model_arg) => ModelSpecParser::parse(model_arg),
            None => Self::default_model_spec(cache),
        };
        let model_spec = ModelSpecParser::with_variant(model_spec, model.variant.as_deref());

        let mut builder = ProcessorConfigBuilder::new()
            .model_spec(model_spec)
            .backend_type(model.backend);
        if let Some(dir) = cache_dir {
            builder = builder.cache_dir(dir);
        }
        builder.build().context("Invalid configuration")
    }

    /// Default model when cached, else the first cached model, else the
    /// default model (downloaded on first use)
    fn default_model_spec(cache: &ModelCache) -> ModelSpec {
        let default_id = ModelCache::get_default_model_id();
        if cache.is_model_cached(&default_id) {
            return ModelSpec::default();
        }

        match cache.scan_cached_models() {
            Ok(models) => models
                .into_iter()
                .next()
                .map_or_else(ModelSpec::default, |model| {
                    log::info!("Using cached model: {}", model.model_id);
                    ModelSpec {
                        source: ModelSource::Downloaded(model.model_id),
                        variant: None,
                    }
                }),
            Err(_) => ModelSpec::default(),
        }
    }

    pub(crate) fn compose_request(args: &ComposeArgs) -> Result<ComposeRequest> {
        Ok(ComposeRequest::builder()
            .text(args.text.clone())
            .font(args.font)
            .font_size(args.font_size)
            .font_color(args.font_color.clone())
            .build()?)
    }

    pub(crate) fn output_target(args: &ComposeArgs) -> OutputTarget {
        match args.output.as_deref() {
            Some("-") => OutputTarget::Stdout,
            Some(path) => OutputTarget::File(PathBuf::from(path)),
            None => OutputTarget::File(PathBuf::from(DOWNLOAD_FILE_NAME)),
        }
    }

    #[cfg(feature = "web")]
    pub(crate) fn server_config(args: &super::main_impl::ServeArgs) -> Result<crate::config::ServerConfig> {
        if args.max_upload_mb == 0 {
            anyhow::bail!("--max-upload-mb must be at least 1");
        }
        Ok(crate::config::ServerConfig {
            bind: args.bind,
            max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
        })
    }
}
