//! The set of registries a pipeline dispatches through.

use crate::Result;
use crate::ocr::OcrCache;
use crate::plugins::{ExtractorRegistry, OcrBackendRegistry, PostProcessorRegistry, ValidatorRegistry};
use once_cell::sync::Lazy;
use std::sync::Arc;

static GLOBAL_CONTEXT: Lazy<PipelineContext> = Lazy::new(PipelineContext::new);

/// Registries plus the OCR cache, shared by every extraction run through this context.
///
/// Cloning is cheap and yields a handle to the same registries. The free functions
/// (`extract_file`, `register_extractor`, ...) use [`PipelineContext::global`]; tests and
/// embedders that need isolation construct their own with [`PipelineContext::new`].
#[derive(Clone, Default)]
pub struct PipelineContext {
    extractors: Arc<ExtractorRegistry>,
    ocr_backends: Arc<OcrBackendRegistry>,
    post_processors: Arc<PostProcessorRegistry>,
    validators: Arc<ValidatorRegistry>,
    ocr_cache: Arc<OcrCache>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide context.
    pub fn global() -> &'static PipelineContext {
        &GLOBAL_CONTEXT
    }

    pub fn extractors(&self) -> &ExtractorRegistry {
        &self.extractors
    }

    pub fn ocr_backends(&self) -> &OcrBackendRegistry {
        &self.ocr_backends
    }

    pub fn post_processors(&self) -> &PostProcessorRegistry {
        &self.post_processors
    }

    pub fn validators(&self) -> &ValidatorRegistry {
        &self.validators
    }

    pub fn ocr_cache(&self) -> &OcrCache {
        &self.ocr_cache
    }

    /// Clear every registry and the OCR cache.
    pub fn reset(&self) -> Result<()> {
        self.extractors.clear()?;
        self.ocr_backends.clear()?;
        self.post_processors.clear()?;
        self.validators.clear()?;
        self.ocr_cache.clear();
        Ok(())
    }
}
