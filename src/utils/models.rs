//! Parsing of `--model` arguments

use crate::{
    cache::ModelCache,
    models::{ModelSource, ModelSpec},
};
use std::path::{Path, PathBuf};

/// Turns a command-line model argument into a `ModelSpec`
pub struct ModelSpecParser;

impl ModelSpecParser {
    /// Parse `model` or `model:variant`
    ///
    /// Existing filesystem paths become external models, URLs are mapped to
    /// their cache ID and anything else is treated as a cached model ID.
    ///
    /// ```rust
    /// use imgly_text_behind::utils::ModelSpecParser;
    /// use imgly_text_behind::ModelSource;
    ///
    /// let spec = ModelSpecParser::parse("imgly--isnet-general-onnx:fp16");
    /// assert_eq!(spec.variant.as_deref(), Some("fp16"));
    /// assert_eq!(
    ///     spec.source,
    ///     ModelSource::Downloaded("imgly--isnet-general-onnx".to_string())
    /// );
    /// ```
    #[must_use]
    pub fn parse(model_arg: &str) -> ModelSpec {
        if model_arg.starts_with("http") {
            return ModelSpec {
                source: ModelSource::Downloaded(ModelCache::url_to_model_id(model_arg)),
                variant: None,
            };
        }

        let (name, variant) = match model_arg.rsplit_once(':') {
            // Windows drive letters are not variants
            Some((name, variant)) if !Path::new(model_arg).exists() && name.len() > 1 => {
                (name, Some(variant.to_string()))
            },
            _ => (model_arg, None),
        };

        let source = if Path::new(name).exists() {
            ModelSource::External(PathBuf::from(name))
        } else {
            ModelSource::Downloaded(name.to_string())
        };

        ModelSpec { source, variant }
    }

    /// Apply an explicit `--variant` flag, which wins over a `:variant` suffix
    #[must_use]
    pub fn with_variant(mut spec: ModelSpec, variant: Option<&str>) -> ModelSpec {
        if let Some(variant) = variant {
            spec.variant = Some(variant.to_string());
        }
        spec
    }
}
