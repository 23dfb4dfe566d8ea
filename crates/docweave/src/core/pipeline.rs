//! The extraction state machine.
//!
//! One request moves through
//! `Received → MimeResolved → Extracted → (OcrMerged)? → (StructurallyAssembled)? →
//! PostProcessed → Validated → Completed`, or stops at the first failing stage. Every
//! transition is logged at debug level; the failing stage is logged at warn level.

use crate::core::call::{self, CallSite};
use crate::core::config::{ExtractionConfig, OcrConfig, ReductionMode, ResultFormat};
use crate::core::io;
use crate::core::mime::{self, PDF_MIME_TYPE};
use crate::extractors::builtin_extractor_for;
use crate::ocr::run_ocr;
use crate::plugins::{DocumentExtractor, PipelineContext, Plugin};
use crate::text::{calculate_quality_score, reduce_tokens, split_elements};
use crate::types::{ExtractedImage, ExtractionResult, PageBoundary, PageContent, PageStructure};
use crate::{DocweaveError, ErrorKind, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

const FORM_FEED: char = '\u{000C}';
const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Received,
    MimeResolved,
    Extracted,
    OcrMerged,
    StructurallyAssembled,
    PostProcessed,
    Validated,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::MimeResolved => "mime_resolved",
            Stage::Extracted => "extracted",
            Stage::OcrMerged => "ocr_merged",
            Stage::StructurallyAssembled => "structurally_assembled",
            Stage::PostProcessed => "post_processed",
            Stage::Validated => "validated",
            Stage::Completed => "completed",
        };
        f.write_str(name)
    }
}

pub(crate) enum Source {
    File(PathBuf),
    Bytes(Arc<[u8]>),
}

/// Input of one pipeline run. The configuration is a snapshot shared with spawned calls.
pub(crate) struct ExtractionRequest {
    pub source: Source,
    pub mime_hint: Option<String>,
    pub config: Arc<ExtractionConfig>,
}

/// Run `request` to completion, logging the stage at which it failed.
pub(crate) async fn run(ctx: &PipelineContext, request: ExtractionRequest) -> Result<ExtractionResult> {
    let mut stage = Stage::Received;
    let outcome = drive(ctx, request, &mut stage).await;
    if let Err(e) = &outcome {
        tracing::warn!(stage = %stage, kind = %e.kind(), error = %e, "extraction failed");
    }
    outcome
}

fn enter(stage: &mut Stage, next: Stage, mime_type: &str) {
    *stage = next;
    tracing::debug!(stage = %next, mime_type, "pipeline stage");
}

async fn drive(ctx: &PipelineContext, request: ExtractionRequest, stage: &mut Stage) -> Result<ExtractionResult> {
    let ExtractionRequest {
        source,
        mime_hint,
        config,
    } = request;
    tracing::debug!(stage = %Stage::Received, "pipeline stage");

    let hint = mime::normalize_mime_hint(mime_hint.as_deref())?;
    let (bytes, mime_type) = match source {
        Source::File(path) => {
            let bytes: Arc<[u8]> = io::read_file_async(&path).await?.into();
            let mime_type = hint.unwrap_or_else(|| mime::detect_mime_type_from_path(&path));
            (bytes, mime_type)
        }
        Source::Bytes(bytes) => {
            let mime_type = hint.unwrap_or_else(|| mime::detect_mime_type_from_bytes(&bytes));
            (bytes, mime_type)
        }
    };
    enter(stage, Stage::MimeResolved, &mime_type);

    let mut result = match ctx.extractors().get(&mime_type) {
        Some(extractor) => {
            let result = extract_custom(extractor, Arc::clone(&bytes), &mime_type, &config).await?;
            enter(stage, Stage::Extracted, &mime_type);
            result
        }
        None => {
            let result = extract_builtin(ctx, &bytes, &mime_type, &config).await?;
            enter(stage, Stage::Extracted, &mime_type);
            match merge_ocr(ctx, result, &bytes, &mime_type, &config).await? {
                (result, true) => {
                    enter(stage, Stage::OcrMerged, &mime_type);
                    result
                }
                (result, false) => result,
            }
        }
    };

    if assemble(ctx, &mut result, &config).await? {
        enter(stage, Stage::StructurallyAssembled, &mime_type);
    }

    let result = post_process(ctx, result, &config).await?;
    enter(stage, Stage::PostProcessed, &mime_type);

    validate(ctx, &result, &config).await?;
    enter(stage, Stage::Validated, &mime_type);

    enter(stage, Stage::Completed, &mime_type);
    Ok(result)
}

/// A custom extractor's result is the whole extraction result. Any failure is attributed to it.
async fn extract_custom(
    extractor: Arc<dyn DocumentExtractor>,
    bytes: Arc<[u8]>,
    mime_type: &str,
    config: &Arc<ExtractionConfig>,
) -> Result<ExtractionResult> {
    let name = extractor.name().to_string();
    let site = CallSite::Plugin(name.clone());
    let timeout = call::policy_timeout(&config.call_policy());
    let mime = mime_type.to_string();
    let snapshot = Arc::clone(config);

    tracing::debug!(extractor = %name, mime_type, "dispatching to custom extractor");
    call::guarded(&site, timeout, async move {
        extractor.extract_bytes(&bytes, &mime, &snapshot).await
    })
    .await
    .map_err(|e| into_plugin_error(&name, e))
}

async fn extract_builtin(
    ctx: &PipelineContext,
    bytes: &Arc<[u8]>,
    mime_type: &str,
    config: &Arc<ExtractionConfig>,
) -> Result<ExtractionResult> {
    let extractor =
        builtin_extractor_for(mime_type).ok_or_else(|| DocweaveError::UnsupportedFormat(mime_type.to_string()))?;
    let name = extractor.name().to_string();
    let site = CallSite::Plugin(name.clone());
    let timeout = call::policy_timeout(&config.call_policy());
    let input = Arc::clone(bytes);
    let mime = mime_type.to_string();
    let snapshot = Arc::clone(config);

    tracing::debug!(extractor = %name, mime_type, "dispatching to built-in extractor");
    let outcome = call::guarded(&site, timeout, async move {
        extractor.extract_bytes(&input, &mime, &snapshot).await
    })
    .await;

    if mime_type != PDF_MIME_TYPE || !config.pdf_options.as_ref().is_some_and(|pdf| pdf.ocr_fallback) {
        return outcome;
    }

    match outcome {
        Ok(result) if !result.content.trim().is_empty() => Ok(result),
        Ok(_) => {
            tracing::debug!("PDF has no text layer, falling back to OCR");
            pdf_ocr_fallback(ctx, bytes, mime_type, config).await
        }
        Err(e) if e.kind() == ErrorKind::Io => Err(e),
        Err(e) => {
            tracing::debug!(error = %e, "native PDF extraction failed, falling back to OCR");
            pdf_ocr_fallback(ctx, bytes, mime_type, config).await
        }
    }
}

async fn pdf_ocr_fallback(
    ctx: &PipelineContext,
    bytes: &Arc<[u8]>,
    mime_type: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionResult> {
    let ocr = config.ocr.clone().unwrap_or_default();
    let mut result = run_ocr(ctx, Arc::clone(bytes), &ocr, config).await?;
    result.mime_type = mime_type.to_string();
    result.images = None;
    Ok(result)
}

/// OCR the input itself when it is an image or when OCR is forced. Returns whether OCR ran.
async fn merge_ocr(
    ctx: &PipelineContext,
    mut result: ExtractionResult,
    bytes: &Arc<[u8]>,
    mime_type: &str,
    config: &ExtractionConfig,
) -> Result<(ExtractionResult, bool)> {
    if !(mime::is_image_mime(mime_type) || config.force_ocr) || result.metadata.ocr.is_some() {
        return Ok((result, false));
    }

    let ocr = config.ocr.clone().unwrap_or_default();
    let ocr_result = run_ocr(ctx, Arc::clone(bytes), &ocr, config).await?;

    result.content = ocr_result.content;
    result.pages = ocr_result.pages;
    result.metadata.pages = ocr_result.metadata.pages;
    result.tables.extend(ocr_result.tables);
    result.metadata.ocr = ocr_result.metadata.ocr;
    for (key, value) in ocr_result.metadata.custom {
        result.metadata.custom.entry(key).or_insert(value);
    }
    Ok((result, true))
}

fn into_plugin_error(name: &str, err: DocweaveError) -> DocweaveError {
    match err {
        DocweaveError::Plugin { .. } => err,
        other => DocweaveError::plugin(name, other.to_string()),
    }
}

/// Apply every enabled structural step. Returns whether any step ran.
async fn assemble(ctx: &PipelineContext, result: &mut ExtractionResult, config: &Arc<ExtractionConfig>) -> Result<bool> {
    let mut assembled = false;

    if let Some(reduction) = config.token_reduction.as_ref().filter(|r| r.mode != ReductionMode::Off) {
        match result.pages.as_mut() {
            Some(pages) => {
                for page in pages.iter_mut() {
                    page.content = reduce_tokens(&page.content, reduction);
                }
                rebuild_from_pages(result);
            }
            None => result.content = reduce_tokens(&result.content, reduction),
        }
        assembled = true;
    }

    assembled |= assemble_pages(result, config);

    if config.enable_quality_processing {
        result.metadata.quality_score = Some(calculate_quality_score(&result.content, &result.metadata));
        assembled = true;
    }

    if let Some(chunking) = &config.chunking {
        chunk(result, chunking, config).await?;
        assembled = true;
    }

    assembled |= assemble_images(ctx, result, config).await?;

    if let Some(detection) = &config.language_detection {
        result.detected_languages = detect_languages(&result.content, detection)?;
        assembled = true;
    }

    if let Some(keywords) = &config.keywords {
        result.metadata.extracted_keywords = Some(extract_keywords(&result.content, keywords)?);
        assembled = true;
    }

    if config.result_format == ResultFormat::ElementBased {
        let elements = match &result.pages {
            Some(pages) => pages
                .iter()
                .flat_map(|page| split_elements(&page.content, Some(page.page_number)))
                .collect(),
            None => split_elements(&result.content, None),
        };
        result.elements = Some(elements);
        assembled = true;
    }

    Ok(assembled)
}

/// Rewrite `content` and page boundaries from the per-page contents.
fn rebuild_from_pages(result: &mut ExtractionResult) {
    let Some(pages) = &result.pages else {
        return;
    };
    let mut content = String::new();
    let mut boundaries = Vec::with_capacity(pages.len());
    for (idx, page) in pages.iter().enumerate() {
        if idx > 0 {
            content.push_str(PAGE_SEPARATOR);
        }
        let byte_start = content.len();
        content.push_str(&page.content);
        boundaries.push(PageBoundary {
            byte_start,
            byte_end: content.len(),
            page_number: page.page_number,
        });
    }
    result.content = content;
    result.metadata.pages = Some(PageStructure {
        total_count: pages.len(),
        boundaries: Some(boundaries),
    });
}

/// Split on form feeds when the extractor did not report pages.
fn split_form_feeds(content: &str) -> (Vec<PageContent>, Vec<PageBoundary>) {
    let mut pages = Vec::new();
    let mut boundaries = Vec::new();
    let mut offset = 0;
    for (idx, text) in content.split(FORM_FEED).enumerate() {
        let trimmed = text.trim();
        let byte_start = offset + (text.len() - text.trim_start().len());
        boundaries.push(PageBoundary {
            byte_start,
            byte_end: byte_start + trimmed.len(),
            page_number: idx + 1,
        });
        pages.push(PageContent {
            page_number: idx + 1,
            content: trimmed.to_string(),
            ..Default::default()
        });
        offset += text.len() + FORM_FEED.len_utf8();
    }
    (pages, boundaries)
}

fn assemble_pages(result: &mut ExtractionResult, config: &ExtractionConfig) -> bool {
    let Some(page_config) = config.pages.as_ref().filter(|p| p.extract_pages || p.insert_page_markers) else {
        result.pages = None;
        return false;
    };

    let pages = match result.pages.take() {
        Some(pages) => pages,
        None => {
            let (pages, boundaries) = split_form_feeds(&result.content);
            result.metadata.pages = Some(PageStructure {
                total_count: pages.len(),
                boundaries: Some(boundaries),
            });
            pages
        }
    };
    result.metadata.page_count.get_or_insert(pages.len());

    if page_config.insert_page_markers {
        let mut content = String::new();
        let mut boundaries = Vec::with_capacity(pages.len());
        for page in &pages {
            content.push_str(
                &page_config
                    .marker_format
                    .replace("{page_num}", &page.page_number.to_string()),
            );
            let byte_start = content.len();
            content.push_str(&page.content);
            boundaries.push(PageBoundary {
                byte_start,
                byte_end: content.len(),
                page_number: page.page_number,
            });
        }
        result.content = content;
        result.metadata.pages = Some(PageStructure {
            total_count: pages.len(),
            boundaries: Some(boundaries),
        });
    }

    result.pages = page_config.extract_pages.then_some(pages);
    true
}

#[cfg(feature = "chunking")]
async fn chunk(
    result: &mut ExtractionResult,
    chunking: &crate::core::config::ChunkingConfig,
    config: &ExtractionConfig,
) -> Result<()> {
    let boundaries = result
        .metadata
        .pages
        .as_ref()
        .and_then(|pages| pages.boundaries.as_deref());
    let mut chunks = crate::chunking::chunk_text(&result.content, chunking, boundaries)?;
    result.metadata.chunk_count = Some(chunks.len());

    if let Some(embedding) = chunking.embedding.clone() {
        let site = CallSite::Plugin("embeddings".to_string());
        let timeout = call::policy_timeout(&config.call_policy());
        chunks = call::guarded_blocking(&site, timeout, move || {
            crate::embeddings::generate_embeddings_for_chunks(&mut chunks, &embedding)?;
            Ok(chunks)
        })
        .await?;
    }

    result.chunks = Some(chunks);
    Ok(())
}

#[cfg(not(feature = "chunking"))]
async fn chunk(
    _result: &mut ExtractionResult,
    _chunking: &crate::core::config::ChunkingConfig,
    _config: &ExtractionConfig,
) -> Result<()> {
    Err(DocweaveError::MissingDependency(
        "chunking requires the `chunking` feature".to_string(),
    ))
}

#[cfg(feature = "language-detection")]
fn detect_languages(
    content: &str,
    detection: &crate::core::config::LanguageDetectionConfig,
) -> Result<Option<Vec<String>>> {
    Ok(crate::language_detection::detect_languages(content, detection))
}

#[cfg(not(feature = "language-detection"))]
fn detect_languages(
    _content: &str,
    _detection: &crate::core::config::LanguageDetectionConfig,
) -> Result<Option<Vec<String>>> {
    Err(DocweaveError::MissingDependency(
        "language detection requires the `language-detection` feature".to_string(),
    ))
}

#[cfg(feature = "keywords")]
fn extract_keywords(
    content: &str,
    keywords: &crate::core::config::KeywordConfig,
) -> Result<Vec<crate::types::Keyword>> {
    Ok(crate::keywords::extract_keywords(content, keywords))
}

#[cfg(not(feature = "keywords"))]
fn extract_keywords(
    _content: &str,
    _keywords: &crate::core::config::KeywordConfig,
) -> Result<Vec<crate::types::Keyword>> {
    Err(DocweaveError::MissingDependency(
        "keyword extraction requires the `keywords` feature".to_string(),
    ))
}

/// Resolve the image section: absent unless requested, filtered by size, optionally OCR'd.
async fn assemble_images(ctx: &PipelineContext, result: &mut ExtractionResult, config: &ExtractionConfig) -> Result<bool> {
    let Some(image_config) = config.images.as_ref().filter(|images| images.extract_images) else {
        result.images = None;
        return Ok(false);
    };

    let max = image_config.max_image_dimension;
    let mut images: Vec<ExtractedImage> = result
        .images
        .take()
        .unwrap_or_default()
        .into_iter()
        .filter(|image| image.width.is_none_or(|w| w <= max) && image.height.is_none_or(|h| h <= max))
        .collect();

    if image_config.perform_ocr {
        let ocr: OcrConfig = config.ocr.clone().unwrap_or_default();
        for image in &mut images {
            let mut nested = run_ocr(ctx, Arc::from(image.data.as_slice()), &ocr, config).await?;
            nested.images = None;
            image.ocr_result = Some(Box::new(nested));
        }
    }

    result.images = Some(images);
    Ok(true)
}

async fn post_process(
    ctx: &PipelineContext,
    mut result: ExtractionResult,
    config: &Arc<ExtractionConfig>,
) -> Result<ExtractionResult> {
    if config.postprocessor.as_ref().is_some_and(|pp| !pp.enabled) {
        tracing::debug!("post-processing disabled");
        return Ok(result);
    }

    let timeout = call::policy_timeout(&config.call_policy());
    for (name, processor) in ctx.post_processors().snapshot() {
        if config.postprocessor.as_ref().is_some_and(|pp| !pp.allows(&name)) {
            continue;
        }
        if !processor.should_process(&result, config) {
            continue;
        }

        tracing::debug!(processor = %name, "running post-processor");
        let site = CallSite::Plugin(name.clone());
        let snapshot = Arc::clone(config);
        result = call::guarded(&site, timeout, async move { processor.process(result, &snapshot).await })
            .await
            .map_err(|e| into_plugin_error(&name, e))?;
    }
    Ok(result)
}

/// Every validator must accept the result; the first rejection ends the run.
async fn validate(ctx: &PipelineContext, result: &ExtractionResult, config: &Arc<ExtractionConfig>) -> Result<()> {
    let validators = ctx.validators().snapshot();
    if validators.is_empty() {
        return Ok(());
    }

    let map = Arc::new(result.to_map()?);
    let timeout = call::policy_timeout(&config.call_policy());
    for (name, validator) in validators {
        if !validator.should_validate(&map, config) {
            continue;
        }

        tracing::debug!(validator = %name, "running validator");
        let site = CallSite::Plugin(name.clone());
        let input = Arc::clone(&map);
        let snapshot = Arc::clone(config);
        let verdict = call::guarded(&site, timeout, async move { Ok(validator.validate(&input, &snapshot).await) }).await?;

        if let Err(mut failure) = verdict {
            if failure.details.validator.is_none() {
                failure = failure.with_validator(name);
            }
            return Err(failure.into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ImageExtractionConfig, PageConfig, PostProcessorConfig, TokenReductionConfig};
    use crate::plugins::{FnExtractor, FnOcrBackend, ValidationError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(bytes: &[u8], mime: &str, config: ExtractionConfig) -> ExtractionRequest {
        ExtractionRequest {
            source: Source::Bytes(Arc::from(bytes)),
            mime_hint: Some(mime.to_string()),
            config: Arc::new(config),
        }
    }

    fn mock_ocr(ctx: &PipelineContext) {
        ctx.ocr_backends()
            .register_fn("tesseract", |bytes, lang| {
                Ok(ExtractionResult::new(
                    format!("ocr[{}]:{}", lang, String::from_utf8_lossy(bytes)),
                    "text/plain",
                ))
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_plain_text_defaults() {
        let ctx = PipelineContext::new();
        let result = run(&ctx, request(b"hello world", "text/plain", ExtractionConfig::default()))
            .await
            .unwrap();

        assert_eq!(result.content, "hello world");
        assert!(result.metadata.quality_score.is_some());
        assert!(result.chunks.is_none());
        assert!(result.images.is_none());
        assert!(result.pages.is_none());
        assert!(result.elements.is_none());
    }

    #[tokio::test]
    async fn test_custom_extractor_takes_precedence() {
        let ctx = PipelineContext::new();
        ctx.extractors()
            .register_fn("text/plain", |_, mime| Ok(ExtractionResult::new("custom", mime)))
            .unwrap();

        let result = run(&ctx, request(b"builtin", "text/plain", ExtractionConfig::default()))
            .await
            .unwrap();
        assert_eq!(result.content, "custom");
    }

    #[tokio::test]
    async fn test_custom_extractor_error_is_plugin_error() {
        let ctx = PipelineContext::new();
        ctx.extractors()
            .register("application/x-fail", Arc::new(FnExtractor::new("failing", |_, _| {
                Err(DocweaveError::parsing("cannot read"))
            })))
            .unwrap();

        let err = run(&ctx, request(b"x", "application/x-fail", ExtractionConfig::default()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Plugin);
        assert_eq!(err.plugin_name(), Some("failing"));
    }

    #[tokio::test]
    async fn test_unknown_mime_and_malformed_hint() {
        let ctx = PipelineContext::new();
        let err = run(&ctx, request(b"x", "application/x-nothing", ExtractionConfig::default()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);

        let err = run(&ctx, request(b"x", "not a mime", ExtractionConfig::default()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_image_input_is_ocred() {
        let ctx = PipelineContext::new();
        mock_ocr(&ctx);

        let result = run(&ctx, request(b"pixels", "image/png", ExtractionConfig::default()))
            .await
            .unwrap();
        assert_eq!(result.content, "ocr[eng]:pixels");
        assert_eq!(result.metadata.ocr.unwrap().backend, "tesseract");
    }

    #[tokio::test]
    async fn test_image_input_without_backend_is_validation_error() {
        let ctx = PipelineContext::new();
        let err = run(&ctx, request(b"pixels", "image/png", ExtractionConfig::default()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_image_section_and_nested_ocr() {
        let ctx = PipelineContext::new();
        mock_ocr(&ctx);
        ctx.extractors()
            .register_fn("application/x-album", |_, mime| {
                let mut result = ExtractionResult::new("album", mime);
                let mut small = ExtractedImage::new(b"small".to_vec(), "png", 0);
                small.width = Some(10);
                let mut huge = ExtractedImage::new(b"huge".to_vec(), "png", 1);
                huge.width = Some(10_000);
                result.images = Some(vec![small, huge]);
                Ok(result)
            })
            .unwrap();

        let not_requested = run(&ctx, request(b"", "application/x-album", ExtractionConfig::default()))
            .await
            .unwrap();
        assert!(not_requested.images.is_none());

        let config = ExtractionConfig {
            images: Some(ImageExtractionConfig {
                perform_ocr: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = run(&ctx, request(b"", "application/x-album", config)).await.unwrap();
        let images = result.images.unwrap();
        assert_eq!(images.len(), 1);
        let nested = images[0].ocr_result.as_ref().unwrap();
        assert_eq!(nested.content, "ocr[eng]:small");
        assert!(nested.images.is_none());
        assert_eq!(result.content, "album");
    }

    #[tokio::test]
    async fn test_requested_images_empty_when_none_found() {
        let ctx = PipelineContext::new();
        let config = ExtractionConfig {
            images: Some(ImageExtractionConfig::default()),
            ..Default::default()
        };
        let result = run(&ctx, request(b"text", "text/plain", config)).await.unwrap();
        assert_eq!(result.images, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_form_feed_pages_and_markers() {
        let ctx = PipelineContext::new();
        let config = ExtractionConfig {
            pages: Some(PageConfig {
                extract_pages: true,
                insert_page_markers: true,
                marker_format: "[{page_num}]".to_string(),
            }),
            ..Default::default()
        };
        let result = run(&ctx, request(b"one\x0ctwo", "text/plain", config)).await.unwrap();

        let pages = result.pages.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].content, "two");
        assert_eq!(result.content, "[1]one[2]two");
        assert_eq!(result.metadata.page_count, Some(2));
    }

    #[tokio::test]
    async fn test_token_reduction_and_elements() {
        let ctx = PipelineContext::new();
        let config = ExtractionConfig {
            token_reduction: Some(TokenReductionConfig {
                mode: ReductionMode::Light,
                ..Default::default()
            }),
            result_format: ResultFormat::ElementBased,
            ..Default::default()
        };
        let result = run(&ctx, request(b"Hello    world!!!\n\nSecond block", "text/plain", config))
            .await
            .unwrap();
        assert_eq!(result.content, "Hello world!\n\nSecond block");
        assert_eq!(result.elements.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_post_processors_run_in_order_and_can_be_filtered() {
        let ctx = PipelineContext::new();
        ctx.post_processors()
            .register("append-a", |mut r| {
                r.content.push('a');
                Ok(r)
            })
            .unwrap();
        ctx.post_processors()
            .register("append-b", |mut r| {
                r.content.push('b');
                Ok(r)
            })
            .unwrap();

        let result = run(&ctx, request(b"x", "text/plain", ExtractionConfig::default()))
            .await
            .unwrap();
        assert_eq!(result.content, "xab");

        let config = ExtractionConfig {
            postprocessor: Some(PostProcessorConfig {
                disabled_processors: Some(vec!["append-a".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = run(&ctx, request(b"x", "text/plain", config)).await.unwrap();
        assert_eq!(result.content, "xb");
    }

    #[tokio::test]
    async fn test_validators_short_circuit() {
        let ctx = PipelineContext::new();
        let later_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&later_calls);

        ctx.validators()
            .register_checked("needs-title", |map| {
                if map["metadata"].get("title").is_none() {
                    return Err(ValidationError::required("title"));
                }
                Ok(())
            })
            .unwrap();
        ctx.validators()
            .register_fn("later", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            })
            .unwrap();

        let err = run(&ctx, request(b"x", "text/plain", ExtractionConfig::default()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.plugin_name(), Some("needs-title"));
        assert_eq!(err.validation_details().unwrap().details.field.as_deref(), Some("title"));
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_force_ocr_replaces_content() {
        let ctx = PipelineContext::new();
        ctx.ocr_backends()
            .register("scanner", Arc::new(FnOcrBackend::new("scanner", |_, _| {
                Ok(ExtractionResult::new("scanned", "text/plain"))
            })))
            .unwrap();
        let config = ExtractionConfig {
            force_ocr: true,
            ocr: Some(OcrConfig {
                backend: "scanner".to_string(),
                language: "eng".to_string(),
            }),
            ..Default::default()
        };
        let result = run(&ctx, request(b"native", "text/plain", config)).await.unwrap();
        assert_eq!(result.content, "scanned");
    }

    #[cfg(feature = "pdf")]
    #[tokio::test]
    async fn test_force_ocr_on_pdf_survives_page_assembly() {
        let ctx = PipelineContext::new();
        ctx.ocr_backends()
            .register("scanner", Arc::new(FnOcrBackend::new("scanner", |_, _| {
                Ok(ExtractionResult::new("SCANNED", "text/plain"))
            })))
            .unwrap();
        let pdf = crate::extractors::pdf::tests::build_pdf(&["Native words"]);
        let forced = || ExtractionConfig {
            force_ocr: true,
            ocr: Some(OcrConfig {
                backend: "scanner".to_string(),
                language: "eng".to_string(),
            }),
            ..Default::default()
        };

        let with_markers = ExtractionConfig {
            pages: Some(PageConfig {
                extract_pages: true,
                insert_page_markers: true,
                marker_format: "[{page_num}]".to_string(),
            }),
            ..forced()
        };
        let result = run(&ctx, request(&pdf, "application/pdf", with_markers)).await.unwrap();
        assert_eq!(result.content, "[1]SCANNED");
        assert_eq!(result.pages.unwrap()[0].content, "SCANNED");
        let boundary = &result.metadata.pages.unwrap().boundaries.unwrap()[0];
        assert_eq!(&result.content[boundary.byte_start..boundary.byte_end], "SCANNED");

        let with_reduction = ExtractionConfig {
            token_reduction: Some(TokenReductionConfig {
                mode: ReductionMode::Light,
                ..Default::default()
            }),
            ..forced()
        };
        let result = run(&ctx, request(&pdf, "application/pdf", with_reduction)).await.unwrap();
        assert_eq!(result.content, "SCANNED");
        assert!(!result.content.contains("Native"));
    }

    #[tokio::test]
    async fn test_validator_chain_stops_at_first_rejection() {
        let ctx = PipelineContext::new();
        let first_calls = Arc::new(AtomicUsize::new(0));
        let last_calls = Arc::new(AtomicUsize::new(0));
        let first = Arc::clone(&first_calls);
        let last = Arc::clone(&last_calls);

        ctx.validators()
            .register_fn("min_length", move |map| {
                first.fetch_add(1, Ordering::SeqCst);
                map["content"].as_str().is_some_and(|c| !c.is_empty())
            })
            .unwrap();
        ctx.validators()
            .register_checked("required_metadata", |map| {
                if map["metadata"].get("title").is_none() {
                    return Err(ValidationError::required("title"));
                }
                Ok(())
            })
            .unwrap();
        ctx.validators()
            .register_fn("comprehensive", move |_| {
                last.fetch_add(1, Ordering::SeqCst);
                true
            })
            .unwrap();

        let err = run(&ctx, request(b"body text", "text/plain", ExtractionConfig::default()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.plugin_name(), Some("required_metadata"));
        assert_eq!(err.validation_details().unwrap().details.field.as_deref(), Some("title"));
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(last_calls.load(Ordering::SeqCst), 0);
    }

    fn wrapping_processor(ctx: &PipelineContext, name: &'static str) {
        ctx.post_processors()
            .register(name, move |mut r| {
                r.content = format!("{}({})", name, r.content);
                Ok(r)
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_registration_order_decides_composition() {
        let forward = PipelineContext::new();
        for name in ["A", "B", "C"] {
            wrapping_processor(&forward, name);
        }
        let result = run(&forward, request(b"raw", "text/plain", ExtractionConfig::default()))
            .await
            .unwrap();
        assert_eq!(result.content, "C(B(A(raw)))");

        let rotated = PipelineContext::new();
        for name in ["C", "A", "B"] {
            wrapping_processor(&rotated, name);
        }
        let result = run(&rotated, request(b"raw", "text/plain", ExtractionConfig::default()))
            .await
            .unwrap();
        assert_eq!(result.content, "B(A(C(raw)))");
    }

    #[test]
    fn test_split_form_feeds_boundaries() {
        let content = "ab\x0ccd";
        let (pages, boundaries) = split_form_feeds(content);
        assert_eq!(pages.len(), 2);
        assert_eq!(&content[boundaries[1].byte_start..boundaries[1].byte_end], "cd");
    }

    #[test]
    fn test_split_form_feeds_boundaries_match_trimmed_pages() {
        let content = "  ab \x0c\ncd\n\x0c";
        let (pages, boundaries) = split_form_feeds(content);
        assert_eq!(pages.len(), 3);
        for (page, boundary) in pages.iter().zip(&boundaries) {
            assert_eq!(&content[boundary.byte_start..boundary.byte_end], page.content);
        }
        assert_eq!(pages[0].content, "ab");
        assert_eq!(pages[2].content, "");
    }
}
