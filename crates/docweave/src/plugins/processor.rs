//! Post-processor plugins and the ordered post-processor chain.
//!
//! Post-processors run strictly in registration order after structural assembly. Each one
//! takes ownership of the previous processor's output and returns the next result. Any error
//! or panic aborts the extraction.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::plugins::Plugin;
use crate::plugins::registry::{Registry, ScopedRegistration, validate_plugin_name};
use crate::types::ExtractionResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Transforms an extraction result.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use docweave::plugins::{Plugin, PostProcessor};
/// use docweave::{ExtractionConfig, ExtractionResult, Result};
///
/// struct WordCount;
///
/// impl Plugin for WordCount {
///     fn name(&self) -> &str { "word-count" }
///     fn version(&self) -> String { "1.0.0".to_string() }
/// }
///
/// #[async_trait]
/// impl PostProcessor for WordCount {
///     async fn process(&self, mut result: ExtractionResult, _config: &ExtractionConfig) -> Result<ExtractionResult> {
///         let words = result.content.split_whitespace().count();
///         result.metadata.custom.insert("word_count".to_string(), words.into());
///         Ok(result)
///     }
/// }
/// ```
#[async_trait]
pub trait PostProcessor: Plugin {
    async fn process(&self, result: ExtractionResult, config: &ExtractionConfig) -> Result<ExtractionResult>;

    /// Skip this processor for results it has no business touching.
    fn should_process(&self, _result: &ExtractionResult, _config: &ExtractionConfig) -> bool {
        true
    }
}

type ProcessFn = dyn Fn(ExtractionResult) -> Result<ExtractionResult> + Send + Sync;

/// Adapter registering a closure as a post-processor.
pub struct FnPostProcessor {
    name: String,
    f: Box<ProcessFn>,
}

impl FnPostProcessor {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ExtractionResult) -> Result<ExtractionResult> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl Plugin for FnPostProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        "0.0.0".to_string()
    }
}

#[async_trait]
impl PostProcessor for FnPostProcessor {
    async fn process(&self, result: ExtractionResult, _config: &ExtractionConfig) -> Result<ExtractionResult> {
        (self.f)(result)
    }
}

pub struct PostProcessorRegistry {
    inner: Registry<dyn PostProcessor>,
}

impl Default for PostProcessorRegistry {
    fn default() -> Self {
        Self {
            inner: Registry::new("post-processor", validate_plugin_name),
        }
    }
}

impl PostProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure under `name`, appended to the end of the chain.
    pub fn register<F>(&self, name: &str, f: F) -> Result<()>
    where
        F: Fn(ExtractionResult) -> Result<ExtractionResult> + Send + Sync + 'static,
    {
        self.register_instance(name, Arc::new(FnPostProcessor::new(name, f)))
    }

    pub fn register_instance(&self, name: &str, processor: Arc<dyn PostProcessor>) -> Result<()> {
        self.inner.add(name, processor)?;
        tracing::info!(processor = name, "registered post-processor");
        Ok(())
    }

    /// Register several processors in order. If any name is invalid or taken (including a
    /// duplicate within `processors`), nothing is registered.
    pub fn register_many<I>(&self, processors: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Arc<dyn PostProcessor>)>,
    {
        self.inner.add_many(processors.into_iter().collect())
    }

    pub fn unregister(&self, name: &str) -> Result<()> {
        self.inner.remove(name)
    }

    pub fn unregister_many<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.inner.remove(name.as_ref())?;
        }
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    /// Processor names in chain order.
    pub fn list(&self) -> Vec<String> {
        self.inner.keys()
    }

    pub fn clear(&self) -> Result<()> {
        self.inner.clear()
    }

    /// Register `processors` until the returned guard is dropped.
    pub fn scoped(
        &self,
        processors: Vec<(String, Arc<dyn PostProcessor>)>,
    ) -> Result<ScopedRegistration<'_, dyn PostProcessor>> {
        ScopedRegistration::new(&self.inner, processors)
    }

    /// Run `work` with `processors` temporarily appended to the chain.
    ///
    /// Exactly the processors added here are removed afterwards, whether `work` returns,
    /// fails, or unwinds. If any name is already taken the call fails before `work` runs.
    pub async fn with_processors<F, Fut, R>(
        &self,
        processors: Vec<(String, Arc<dyn PostProcessor>)>,
        work: F,
    ) -> Result<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let guard = self.scoped(processors)?;
        tracing::debug!(processors = ?guard.keys().collect::<Vec<_>>(), "running with scoped post-processors");
        let output = work().await;
        drop(guard);
        Ok(output)
    }

    /// Chain snapshot taken at the start of a post-processing stage.
    pub(crate) fn snapshot(&self) -> Vec<(String, Arc<dyn PostProcessor>)> {
        self.inner.snapshot()
    }
}

pub fn register_post_processor(name: &str, processor: Arc<dyn PostProcessor>) -> Result<()> {
    crate::PipelineContext::global().post_processors().register_instance(name, processor)
}

pub fn unregister_post_processor(name: &str) -> Result<()> {
    crate::PipelineContext::global().post_processors().unregister(name)
}

pub fn list_post_processors() -> Vec<String> {
    crate::PipelineContext::global().post_processors().list()
}

pub fn clear_post_processors() -> Result<()> {
    crate::PipelineContext::global().post_processors().clear()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocweaveError;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn append(tag: &'static str) -> impl Fn(ExtractionResult) -> Result<ExtractionResult> + Send + Sync + 'static {
        move |mut result| {
            result.content.push_str(tag);
            Ok(result)
        }
    }

    fn instance(name: &str, tag: &'static str) -> (String, Arc<dyn PostProcessor>) {
        (name.to_string(), Arc::new(FnPostProcessor::new(name, append(tag))))
    }

    struct PdfOnly;

    impl Plugin for PdfOnly {
        fn name(&self) -> &str {
            "pdf-only"
        }

        fn version(&self) -> String {
            "1.0.0".to_string()
        }
    }

    #[async_trait]
    impl PostProcessor for PdfOnly {
        async fn process(&self, result: ExtractionResult, _: &ExtractionConfig) -> Result<ExtractionResult> {
            Ok(result)
        }

        fn should_process(&self, result: &ExtractionResult, _: &ExtractionConfig) -> bool {
            result.mime_type == "application/pdf"
        }
    }

    #[tokio::test]
    async fn test_closure_processor_owns_result() {
        let processor = FnPostProcessor::new("upper", |mut result: ExtractionResult| {
            result.content = result.content.to_uppercase();
            Ok(result)
        });
        let out = processor
            .process(ExtractionResult::new("hello", "text/plain"), &ExtractionConfig::default())
            .await
            .unwrap();
        assert_eq!(out.content, "HELLO");
    }

    #[test]
    fn test_should_process_filter() {
        let config = ExtractionConfig::default();
        assert!(PdfOnly.should_process(&ExtractionResult::new("", "application/pdf"), &config));
        assert!(!PdfOnly.should_process(&ExtractionResult::new("", "text/plain"), &config));
    }

    #[test]
    fn test_registration_order_and_uniqueness() {
        let registry = PostProcessorRegistry::new();
        registry.register("b", append("b")).unwrap();
        registry.register("a", append("a")).unwrap();
        assert!(registry.register("a", append("again")).is_err());
        assert_eq!(registry.list(), vec!["b", "a"]);

        registry.unregister("b").unwrap();
        registry.register("b", append("b")).unwrap();
        assert_eq!(registry.list(), vec!["a", "b"]);
    }

    #[test]
    fn test_register_many_all_or_nothing() {
        let registry = PostProcessorRegistry::new();
        registry.register("existing", append("e")).unwrap();

        let err = registry
            .register_many(vec![instance("fresh", "f"), instance("existing", "x")])
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(registry.list(), vec!["existing"]);

        registry
            .register_many(vec![instance("one", "1"), instance("two", "2")])
            .unwrap();
        assert_eq!(registry.list(), vec!["existing", "one", "two"]);

        registry.unregister_many(["one", "two", "missing"]).unwrap();
        assert_eq!(registry.list(), vec!["existing"]);
    }

    #[tokio::test]
    async fn test_with_processors_restores_registry() {
        let registry = PostProcessorRegistry::new();
        registry.register("base", append("base")).unwrap();

        let reg = &registry;
        let seen = registry
            .with_processors(vec![instance("temp", "t")], || async move { reg.list() })
            .await
            .unwrap();
        assert_eq!(seen, vec!["base", "temp"]);
        assert_eq!(registry.list(), vec!["base"]);

        let failed: Result<std::result::Result<(), DocweaveError>> = registry
            .with_processors(vec![instance("temp", "t")], || async {
                Err(DocweaveError::validation("work failed"))
            })
            .await;
        assert!(failed.unwrap().is_err());
        assert_eq!(registry.list(), vec!["base"]);
    }

    #[tokio::test]
    async fn test_with_processors_rejects_existing_name_before_work() {
        let registry = PostProcessorRegistry::new();
        registry.register("base", append("base")).unwrap();

        let ran = AtomicBool::new(false);
        let flag = &ran;
        let err = registry
            .with_processors(vec![instance("base", "x")], || async move {
                flag.store(true, Ordering::SeqCst);
            })
            .await
            .unwrap_err();

        assert!(!ran.load(Ordering::SeqCst));
        assert!(err.to_string().contains("already registered"));
        assert_eq!(registry.list(), vec!["base"]);
    }
}
