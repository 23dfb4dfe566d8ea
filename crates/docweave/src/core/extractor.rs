//! Extraction entry points.
//!
//! Every entry point validates the configuration, then drives one pipeline run per input
//! (see `core::pipeline`). The methods on [`PipelineContext`] dispatch through that
//! context's registries; the free functions use [`PipelineContext::global`].
//!
//! # Functions
//!
//! - [`extract_file`] - Extract content from a file path
//! - [`extract_bytes`] - Extract content from a byte array
//! - [`batch_extract_file`] - Extract content from multiple files concurrently
//! - [`batch_extract_bytes`] - Extract content from multiple byte arrays concurrently
//!
//! Each has a `_sync` twin that blocks on a shared runtime.

use crate::core::config::ExtractionConfig;
use crate::core::pipeline::{self, ExtractionRequest, Source};
use crate::panic_context::PanicContext;
use crate::plugins::PipelineContext;
use crate::types::ExtractionResult;
use crate::{DocweaveError, Result};
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Runtime shared by the synchronous wrappers.
///
/// Building a runtime only fails when the process is out of threads or memory, at which point
/// no extraction could succeed anyway.
static GLOBAL_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create global Tokio runtime - system may be out of resources")
});

/// One slot of a batch: the item's result or the error that ended its run.
pub type BatchItem = Result<ExtractionResult>;

impl PipelineContext {
    /// Extract content from the file at `path`.
    ///
    /// `mime_type` overrides detection. A malformed override is a validation error; a
    /// missing or unreadable file is an I/O error.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use docweave::{ExtractionConfig, PipelineContext};
    ///
    /// # async fn example() -> docweave::Result<()> {
    /// let ctx = PipelineContext::new();
    /// let result = ctx.extract_file("document.pdf", None, &ExtractionConfig::default()).await?;
    /// println!("{}", result.content);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn extract_file(
        &self,
        path: impl AsRef<Path>,
        mime_type: Option<&str>,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        config.validate()?;
        let request = ExtractionRequest {
            source: Source::File(path.as_ref().to_path_buf()),
            mime_hint: mime_type.map(str::to_string),
            config: Arc::new(config.clone()),
        };
        pipeline::run(self, request).await
    }

    /// Extract content from `content`, declared as `mime_type`.
    ///
    /// An empty `mime_type` falls back to content sniffing.
    pub async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        config.validate()?;
        let request = ExtractionRequest {
            source: Source::Bytes(Arc::from(content)),
            mime_hint: Some(mime_type.to_string()),
            config: Arc::new(config.clone()),
        };
        pipeline::run(self, request).await
    }

    /// Extract every file in `paths`, at most `max_concurrent_extractions` at a time.
    ///
    /// The outer error is reserved for an invalid configuration. Slot `i` of the returned
    /// vector holds the outcome for `paths[i]`; a failed item never affects its siblings.
    pub async fn batch_extract_file(
        &self,
        paths: Vec<impl AsRef<Path>>,
        config: &ExtractionConfig,
    ) -> Result<Vec<BatchItem>> {
        config.validate()?;
        let config = Arc::new(config.clone());
        let requests = paths
            .into_iter()
            .map(|path| ExtractionRequest {
                source: Source::File(path.as_ref().to_path_buf()),
                mime_hint: None,
                config: Arc::clone(&config),
            })
            .collect();
        Ok(self.run_batch(requests, config.effective_concurrency()).await)
    }

    /// Extract every entry of `contents`, declared as the matching entry of `mime_types`.
    ///
    /// The two vectors must have the same length; a mismatch is a validation error for the
    /// whole batch. Otherwise behaves like [`PipelineContext::batch_extract_file`].
    pub async fn batch_extract_bytes(
        &self,
        contents: Vec<Vec<u8>>,
        mime_types: Vec<String>,
        config: &ExtractionConfig,
    ) -> Result<Vec<BatchItem>> {
        config.validate()?;
        if contents.len() != mime_types.len() {
            return Err(DocweaveError::validation(format!(
                "batch_extract_bytes got {} inputs but {} MIME types",
                contents.len(),
                mime_types.len()
            )));
        }

        let config = Arc::new(config.clone());
        let requests = contents
            .into_iter()
            .zip(mime_types)
            .map(|(bytes, mime)| ExtractionRequest {
                source: Source::Bytes(bytes.into()),
                mime_hint: Some(mime),
                config: Arc::clone(&config),
            })
            .collect();
        Ok(self.run_batch(requests, config.effective_concurrency()).await)
    }

    async fn run_batch(&self, requests: Vec<ExtractionRequest>, max_concurrent: usize) -> Vec<BatchItem> {
        let total = requests.len();
        if total == 0 {
            return Vec::new();
        }

        tracing::debug!(items = total, max_concurrent, "starting batch extraction");
        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        // Handles are joined in input order, so slot i always belongs to request i.
        let handles: Vec<JoinHandle<BatchItem>> = requests
            .into_iter()
            .map(|request| {
                let ctx = self.clone();
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| DocweaveError::plugin("batch", "batch scheduler closed"))?;
                    pipeline::run(&ctx, request).await
                })
            })
            .collect();

        let mut slots = Vec::with_capacity(total);
        for handle in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) if join_error.is_panic() => {
                    let context = PanicContext::from_payload(join_error.into_panic().as_ref());
                    Err(DocweaveError::plugin_panic("batch", context))
                }
                Err(_) => Err(DocweaveError::plugin("batch", "batch item was cancelled")),
            };
            slots.push(outcome);
        }

        let failed = slots.iter().filter(|slot| slot.is_err()).count();
        tracing::debug!(items = total, failed, "batch extraction finished");
        slots
    }
}

/// Extract content from a file using the global context.
///
/// # Example
///
/// ```rust,no_run
/// use docweave::core::extractor::extract_file;
/// use docweave::core::config::ExtractionConfig;
///
/// # async fn example() -> docweave::Result<()> {
/// let config = ExtractionConfig::default();
/// let result = extract_file("document.pdf", None, &config).await?;
/// println!("Content: {}", result.content);
/// # Ok(())
/// # }
/// ```
pub async fn extract_file(
    path: impl AsRef<Path>,
    mime_type: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult> {
    PipelineContext::global().extract_file(path, mime_type, config).await
}

/// Extract content from bytes using the global context.
pub async fn extract_bytes(content: &[u8], mime_type: &str, config: &ExtractionConfig) -> Result<ExtractionResult> {
    PipelineContext::global().extract_bytes(content, mime_type, config).await
}

/// Batch file extraction using the global context.
pub async fn batch_extract_file(paths: Vec<impl AsRef<Path>>, config: &ExtractionConfig) -> Result<Vec<BatchItem>> {
    PipelineContext::global().batch_extract_file(paths, config).await
}

/// Batch byte extraction using the global context.
pub async fn batch_extract_bytes(
    contents: Vec<Vec<u8>>,
    mime_types: Vec<String>,
    config: &ExtractionConfig,
) -> Result<Vec<BatchItem>> {
    PipelineContext::global()
        .batch_extract_bytes(contents, mime_types, config)
        .await
}

/// Synchronous [`extract_file`]. Must not be called from within an async runtime.
pub fn extract_file_sync(
    path: impl AsRef<Path>,
    mime_type: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult> {
    GLOBAL_RUNTIME.block_on(extract_file(path, mime_type, config))
}

/// Synchronous [`extract_bytes`]. Must not be called from within an async runtime.
pub fn extract_bytes_sync(content: &[u8], mime_type: &str, config: &ExtractionConfig) -> Result<ExtractionResult> {
    GLOBAL_RUNTIME.block_on(extract_bytes(content, mime_type, config))
}

/// Synchronous [`batch_extract_file`]. Must not be called from within an async runtime.
pub fn batch_extract_file_sync(paths: Vec<PathBuf>, config: &ExtractionConfig) -> Result<Vec<BatchItem>> {
    GLOBAL_RUNTIME.block_on(batch_extract_file(paths, config))
}

/// Synchronous [`batch_extract_bytes`]. Must not be called from within an async runtime.
pub fn batch_extract_bytes_sync(
    contents: Vec<Vec<u8>>,
    mime_types: Vec<String>,
    config: &ExtractionConfig,
) -> Result<Vec<BatchItem>> {
    GLOBAL_RUNTIME.block_on(batch_extract_bytes(contents, mime_types, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::fs::File;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_extract_file_basic() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.txt");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"Hello, world!").unwrap();

        let ctx = PipelineContext::new();
        let result = ctx
            .extract_file(&file_path, None, &ExtractionConfig::default())
            .await
            .unwrap();
        assert_eq!(result.content, "Hello, world!");
        assert_eq!(result.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn test_extract_file_with_mime_override() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("data.bin");
        std::fs::write(&file_path, b"# Heading\n\nbody").unwrap();

        let ctx = PipelineContext::new();
        let result = ctx
            .extract_file(&file_path, Some("text/markdown; charset=utf-8"), &ExtractionConfig::default())
            .await
            .unwrap();
        assert_eq!(result.mime_type, "text/markdown");
        assert_eq!(result.metadata.title.as_deref(), Some("Heading"));
    }

    #[tokio::test]
    async fn test_extract_missing_file_is_io_error() {
        let ctx = PipelineContext::new();
        let err = ctx
            .extract_file("/nonexistent/file.txt", None, &ExtractionConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_extraction() {
        let ctx = PipelineContext::new();
        let config = ExtractionConfig {
            max_concurrent_extractions: Some(0),
            ..Default::default()
        };
        let err = ctx.extract_bytes(b"x", "text/plain", &config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_isolates_failures() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("a.txt");
        let third = dir.path().join("c.txt");
        std::fs::write(&first, "first").unwrap();
        std::fs::write(&third, "third").unwrap();
        let paths = vec![first, dir.path().join("missing.txt"), third];

        let ctx = PipelineContext::new();
        let results = ctx
            .batch_extract_file(paths, &ExtractionConfig::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().content, "first");
        assert_eq!(results[1].as_ref().unwrap_err().kind(), ErrorKind::Io);
        assert_eq!(results[2].as_ref().unwrap().content, "third");
    }

    #[tokio::test]
    async fn test_batch_bytes_length_mismatch() {
        let ctx = PipelineContext::new();
        let err = ctx
            .batch_extract_bytes(vec![b"a".to_vec()], vec![], &ExtractionConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_batch_empty() {
        let ctx = PipelineContext::new();
        let results = ctx
            .batch_extract_bytes(vec![], vec![], &ExtractionConfig::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_batch_respects_concurrency_limit() {
        let ctx = PipelineContext::new();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));

        ctx.extractors()
            .register_fn("application/x-slow", move |bytes, mime| {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                r.fetch_sub(1, Ordering::SeqCst);
                Ok(ExtractionResult::new(String::from_utf8_lossy(bytes), mime))
            })
            .unwrap();

        let config = ExtractionConfig {
            max_concurrent_extractions: Some(2),
            ..Default::default()
        };
        let contents: Vec<Vec<u8>> = (0..8).map(|i| i.to_string().into_bytes()).collect();
        let mimes = vec!["application/x-slow".to_string(); 8];
        let results = ctx.batch_extract_bytes(contents, mimes, &config).await.unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.as_ref().unwrap().content, i.to_string());
        }
    }

    #[test]
    fn test_sync_wrappers_use_global_context() {
        let result = extract_bytes_sync(b"sync text", "text/plain", &ExtractionConfig::default()).unwrap();
        assert_eq!(result.content, "sync text");

        let err = extract_file_sync("/nonexistent/path.txt", None, &ExtractionConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        let empty = batch_extract_file_sync(vec![], &ExtractionConfig::default()).unwrap();
        assert!(empty.is_empty());
    }
}
