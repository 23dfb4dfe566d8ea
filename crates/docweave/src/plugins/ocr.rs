//! OCR backend plugins and their name-keyed registry.
//!
//! The pipeline selects a backend by `ExtractionConfig::ocr.backend`. A backend that is not
//! registered when OCR is needed is a configuration error; there is no fallback.

use crate::Result;
use crate::core::config::OcrConfig;
use crate::plugins::Plugin;
use crate::plugins::registry::{Registry, validate_plugin_name};
use crate::types::ExtractionResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Recognizes text in raw image bytes.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use docweave::plugins::{OcrBackend, Plugin};
/// use docweave::{ExtractionResult, OcrConfig, Result};
///
/// struct FixedOcr;
///
/// impl Plugin for FixedOcr {
///     fn name(&self) -> &str { "fixed" }
///     fn version(&self) -> String { "1.0.0".to_string() }
/// }
///
/// #[async_trait]
/// impl OcrBackend for FixedOcr {
///     async fn process_image(&self, _image: &[u8], _config: &OcrConfig) -> Result<ExtractionResult> {
///         Ok(ExtractionResult::new("recognized text", "text/plain"))
///     }
///
///     fn supports_language(&self, lang: &str) -> bool {
///         lang == "eng"
///     }
/// }
/// ```
#[async_trait]
pub trait OcrBackend: Plugin {
    async fn process_image(&self, image_bytes: &[u8], config: &OcrConfig) -> Result<ExtractionResult>;

    /// Whether the backend can recognize `lang` (ISO 639-3, e.g. `"eng"`).
    fn supports_language(&self, lang: &str) -> bool;

    fn supported_languages(&self) -> Vec<String> {
        Vec::new()
    }
}

type OcrFn = dyn Fn(&[u8], &str) -> Result<ExtractionResult> + Send + Sync;

/// Adapter registering a closure `(image_bytes, language) -> result` as an OCR backend.
///
/// Closure backends accept every language.
pub struct FnOcrBackend {
    name: String,
    f: Box<OcrFn>,
}

impl FnOcrBackend {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[u8], &str) -> Result<ExtractionResult> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl Plugin for FnOcrBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        "0.0.0".to_string()
    }
}

#[async_trait]
impl OcrBackend for FnOcrBackend {
    async fn process_image(&self, image_bytes: &[u8], config: &OcrConfig) -> Result<ExtractionResult> {
        (self.f)(image_bytes, &config.language)
    }

    fn supports_language(&self, _lang: &str) -> bool {
        true
    }
}

pub struct OcrBackendRegistry {
    inner: Registry<dyn OcrBackend>,
}

impl Default for OcrBackendRegistry {
    fn default() -> Self {
        Self {
            inner: Registry::new("OCR backend", validate_plugin_name),
        }
    }
}

impl OcrBackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, backend: Arc<dyn OcrBackend>) -> Result<()> {
        self.inner.add(name, backend)?;
        tracing::info!(backend = name, "registered OCR backend");
        Ok(())
    }

    pub fn register_fn<F>(&self, name: &str, f: F) -> Result<()>
    where
        F: Fn(&[u8], &str) -> Result<ExtractionResult> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnOcrBackend::new(name, f)))
    }

    pub fn unregister(&self, name: &str) -> Result<()> {
        self.inner.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OcrBackend>> {
        self.inner.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    pub fn list(&self) -> Vec<String> {
        self.inner.keys()
    }

    pub fn clear(&self) -> Result<()> {
        self.inner.clear()
    }
}

pub fn register_ocr_backend(name: &str, backend: Arc<dyn OcrBackend>) -> Result<()> {
    crate::PipelineContext::global().ocr_backends().register(name, backend)
}

pub fn unregister_ocr_backend(name: &str) -> Result<()> {
    crate::PipelineContext::global().ocr_backends().unregister(name)
}

pub fn list_ocr_backends() -> Vec<String> {
    crate::PipelineContext::global().ocr_backends().list()
}

pub fn clear_ocr_backends() -> Result<()> {
    crate::PipelineContext::global().ocr_backends().clear()
}
