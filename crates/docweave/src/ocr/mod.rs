//! OCR invocation.
//!
//! Looks up the configured backend in a [`PipelineContext`], checks language support, and
//! runs the backend under the call policy (timeout, retries). Results are cached per context
//! when `use_cache` is set.

pub mod cache;

pub use cache::{OcrCache, OcrCacheStats, compute_hash};

use crate::core::call::{self, CallSite};
use crate::core::config::{ExtractionConfig, OcrConfig};
use crate::plugins::PipelineContext;
use crate::types::{ExtractionResult, OcrMetadata};
use crate::{DocweaveError, ErrorKind, Result};
use std::sync::Arc;

/// Run OCR on `image` with the backend named by `ocr.backend`.
///
/// An unregistered backend or an unsupported language is a validation error. Backend
/// failures and timeouts are OCR errors naming the backend.
pub(crate) async fn run_ocr(
    ctx: &PipelineContext,
    image: Arc<[u8]>,
    ocr: &OcrConfig,
    config: &ExtractionConfig,
) -> Result<ExtractionResult> {
    let backend = ctx.ocr_backends().get(&ocr.backend).ok_or_else(|| {
        DocweaveError::validation(format!(
            "OCR backend '{}' is not registered (available: {:?})",
            ocr.backend,
            ctx.ocr_backends().list()
        ))
    })?;

    if !backend.supports_language(&ocr.language) {
        return Err(DocweaveError::validation(format!(
            "OCR backend '{}' does not support language '{}'",
            ocr.backend, ocr.language
        )));
    }

    let cache_key = config
        .use_cache
        .then(|| OcrCache::key(&ocr.backend, &ocr.language, &image));
    if let Some(key) = &cache_key
        && let Some(hit) = ctx.ocr_cache().get(key)
    {
        tracing::debug!(backend = %ocr.backend, "OCR cache hit");
        return Ok(hit);
    }

    let policy = config.call_policy();
    let timeout = call::policy_timeout(&policy);
    let site = CallSite::Ocr(ocr.backend.clone());
    let site = &site;

    let mut result = call::with_retry(&policy, || {
        let backend = Arc::clone(&backend);
        let image = Arc::clone(&image);
        let ocr = ocr.clone();
        async move {
            call::guarded(site, timeout, async move {
                let name = ocr.backend.clone();
                backend
                    .process_image(&image, &ocr)
                    .await
                    .map_err(|e| into_ocr_error(&name, e))
            })
            .await
        }
    })
    .await
    .inspect_err(|e| tracing::warn!(backend = %ocr.backend, error = %e, "OCR failed"))?;

    result.metadata.ocr = Some(OcrMetadata {
        backend: ocr.backend.clone(),
        language: ocr.language.clone(),
    });

    if let Some(key) = cache_key {
        ctx.ocr_cache().insert(key, result.clone());
    }
    Ok(result)
}

fn into_ocr_error(backend: &str, err: DocweaveError) -> DocweaveError {
    if err.kind() == ErrorKind::Ocr {
        return err;
    }
    DocweaveError::Ocr {
        message: err.to_string(),
        backend: backend.to_string(),
        source: Some(Box::new(err)),
    }
}
