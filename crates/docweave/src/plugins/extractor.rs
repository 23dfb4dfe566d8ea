//! Document extractor plugins and the MIME-keyed extractor registry.
//!
//! A custom extractor registered for a MIME type takes absolute precedence over the built-in
//! handler for that type. Its result is used as the whole extraction result.

use crate::core::config::ExtractionConfig;
use crate::core::mime::validate_mime_syntax;
use crate::plugins::Plugin;
use crate::plugins::registry::{Registry, validate_plugin_name};
use crate::types::ExtractionResult;
use crate::{DocweaveError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Turns raw bytes of a known MIME type into an [`ExtractionResult`].
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use docweave::plugins::{DocumentExtractor, Plugin};
/// use docweave::{ExtractionConfig, ExtractionResult, Result};
///
/// struct UpperCaseExtractor;
///
/// impl Plugin for UpperCaseExtractor {
///     fn name(&self) -> &str { "upper-case" }
///     fn version(&self) -> String { "1.0.0".to_string() }
/// }
///
/// #[async_trait]
/// impl DocumentExtractor for UpperCaseExtractor {
///     async fn extract_bytes(&self, content: &[u8], mime_type: &str, _config: &ExtractionConfig) -> Result<ExtractionResult> {
///         let text = String::from_utf8_lossy(content).to_uppercase();
///         Ok(ExtractionResult::new(text, mime_type))
///     }
/// }
/// ```
#[async_trait]
pub trait DocumentExtractor: Plugin {
    async fn extract_bytes(&self, content: &[u8], mime_type: &str, config: &ExtractionConfig)
    -> Result<ExtractionResult>;

    /// MIME types this extractor handles when used as a built-in. A trailing `/*` matches
    /// the whole family.
    fn supported_mime_types(&self) -> &[&str] {
        &[]
    }

    fn can_handle(&self, mime_type: &str) -> bool {
        self.supported_mime_types().iter().any(|supported| {
            supported
                .strip_suffix("/*")
                .map(|family| mime_type.split('/').next() == Some(family))
                .unwrap_or(*supported == mime_type)
        })
    }
}

type ExtractFn = dyn Fn(&[u8], &str) -> Result<ExtractionResult> + Send + Sync;

/// Adapter registering a closure as an extractor.
pub struct FnExtractor {
    name: String,
    f: Box<ExtractFn>,
}

impl FnExtractor {
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

impl Plugin for FnExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        "0.0.0".to_string()
    }
}

#[async_trait]
impl DocumentExtractor for FnExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        _config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        (self.f)(content, mime_type)
    }
}

/// Custom extractors keyed by exact, normalized MIME type.
pub struct ExtractorRegistry {
    inner: Registry<dyn DocumentExtractor>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self {
            inner: Registry::new("extractor", validate_mime_syntax),
        }
    }
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `extractor` for `mime_type`. Fails if the MIME type is malformed or already
    /// has a custom extractor.
    pub fn register(&self, mime_type: &str, extractor: Arc<dyn DocumentExtractor>) -> Result<()> {
        self.inner.add(mime_type, extractor)?;
        tracing::info!(mime_type, "registered custom extractor");
        Ok(())
    }

    pub fn register_fn<F>(&self, mime_type: &str, f: F) -> Result<()>
    where
        F: Fn(&[u8], &str) -> Result<ExtractionResult> + Send + Sync + 'static,
    {
        let name = format!("custom-extractor:{}", mime_type.trim().to_ascii_lowercase());
        self.register(mime_type, Arc::new(FnExtractor::new(name, f)))
    }

    pub fn unregister(&self, mime_type: &str) -> Result<()> {
        self.inner.remove(mime_type)
    }

    pub fn get(&self, mime_type: &str) -> Option<Arc<dyn DocumentExtractor>> {
        self.inner.get(mime_type)
    }

    pub fn has(&self, mime_type: &str) -> bool {
        self.inner.contains(mime_type)
    }

    /// Registered MIME types in registration order.
    pub fn list(&self) -> Vec<String> {
        self.inner.keys()
    }

    pub fn clear(&self) -> Result<()> {
        self.inner.clear()
    }

    /// Probe a plugin manifest for compatibility without installing anything.
    ///
    /// Returns `false` if the manifest cannot be read or parsed, or if its name or any of its
    /// MIME types is invalid.
    pub fn test(&self, plugin_path: impl AsRef<Path>) -> bool {
        let path = plugin_path.as_ref();
        match PluginManifest::load(path).and_then(|manifest| manifest.check()) {
            Ok(manifest) => {
                tracing::debug!(path = %path.display(), plugin = %manifest.name, "plugin manifest is compatible");
                true
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "plugin manifest rejected");
                false
            }
        }
    }
}

/// Description of an installable extractor plugin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    pub mime_types: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PluginManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "toml" => toml::from_str(&content)
                .map_err(|e| DocweaveError::validation(format!("Invalid TOML manifest {}: {}", path.display(), e))),
            "yaml" | "yml" => serde_yaml_ng::from_str(&content)
                .map_err(|e| DocweaveError::validation(format!("Invalid YAML manifest {}: {}", path.display(), e))),
            "json" => Ok(serde_json::from_str(&content)?),
            _ => Err(DocweaveError::validation(format!(
                "Unsupported manifest format: {}",
                path.display()
            ))),
        }
    }

    fn check(self) -> Result<Self> {
        validate_plugin_name(&self.name)?;
        if self.version.trim().is_empty() {
            return Err(DocweaveError::validation("Plugin version cannot be empty"));
        }
        if self.mime_types.is_empty() {
            return Err(DocweaveError::validation(format!(
                "Plugin '{}' declares no MIME types",
                self.name
            )));
        }
        for mime in &self.mime_types {
            validate_mime_syntax(mime)?;
        }
        Ok(self)
    }
}

/// Register a custom extractor in the global pipeline context.
pub fn register_extractor(mime_type: &str, extractor: Arc<dyn DocumentExtractor>) -> Result<()> {
    crate::PipelineContext::global().extractors().register(mime_type, extractor)
}

pub fn unregister_extractor(mime_type: &str) -> Result<()> {
    crate::PipelineContext::global().extractors().unregister(mime_type)
}

pub fn list_extractors() -> Vec<String> {
    crate::PipelineContext::global().extractors().list()
}

pub fn clear_extractors() -> Result<()> {
    crate::PipelineContext::global().extractors().clear()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    struct FamilyExtractor;

    impl Plugin for FamilyExtractor {
        fn name(&self) -> &str {
            "family"
        }

        fn version(&self) -> String {
            "1.0.0".to_string()
        }
    }

    #[async_trait]
    impl DocumentExtractor for FamilyExtractor {
        async fn extract_bytes(&self, _: &[u8], mime_type: &str, _: &ExtractionConfig) -> Result<ExtractionResult> {
            Ok(ExtractionResult::new("", mime_type))
        }

        fn supported_mime_types(&self) -> &[&str] {
            &["image/*", "text/plain"]
        }
    }

    #[test]
    fn test_can_handle_family_wildcard() {
        let extractor = FamilyExtractor;
        assert!(extractor.can_handle("image/png"));
        assert!(extractor.can_handle("text/plain"));
        assert!(!extractor.can_handle("text/html"));
        assert!(!extractor.can_handle("imagery/png"));
    }

    #[tokio::test]
    async fn test_register_fn_and_lookup() {
        let registry = ExtractorRegistry::new();
        registry
            .register_fn("text/x-custom", |bytes, mime| {
                Ok(ExtractionResult::new(format!("{} bytes", bytes.len()), mime))
            })
            .unwrap();

        assert!(registry.has("TEXT/X-CUSTOM"));
        assert_eq!(registry.list(), vec!["text/x-custom"]);

        let extractor = registry.get("text/x-custom").unwrap();
        assert_eq!(extractor.name(), "custom-extractor:text/x-custom");
        let result = extractor
            .extract_bytes(b"abc", "text/x-custom", &ExtractionConfig::default())
            .await
            .unwrap();
        assert_eq!(result.content, "3 bytes");
    }

    #[test]
    fn test_register_rejects_duplicates_and_bad_keys() {
        let registry = ExtractorRegistry::new();
        registry
            .register_fn("text/x-custom", |_, mime| Ok(ExtractionResult::new("first", mime)))
            .unwrap();

        assert!(
            registry
                .register_fn("text/x-custom", |_, mime| Ok(ExtractionResult::new("second", mime)))
                .is_err()
        );
        assert!(registry.register_fn("", |_, mime| Ok(ExtractionResult::new("", mime))).is_err());
        assert!(
            registry
                .register_fn("not-a-mime", |_, mime| Ok(ExtractionResult::new("", mime)))
                .is_err()
        );
        assert_eq!(registry.list(), vec!["text/x-custom"]);

        registry.unregister("text/x-custom").unwrap();
        assert!(!registry.has("text/x-custom"));
    }

    #[test]
    fn test_probe_manifests() {
        let dir = tempdir().unwrap();
        let registry = ExtractorRegistry::new();

        let good = dir.path().join("plugin.toml");
        fs::write(
            &good,
            "name = \"invoice-extractor\"\nversion = \"1.2.0\"\nmime_types = [\"application/x-invoice\"]\n",
        )
        .unwrap();
        assert!(registry.test(&good));
        assert!(registry.is_empty_for_tests());

        let bad_mime = dir.path().join("plugin.json");
        fs::write(
            &bad_mime,
            r#"{"name": "x", "version": "1", "mime_types": ["invoice"]}"#,
        )
        .unwrap();
        assert!(!registry.test(&bad_mime));

        let no_types = dir.path().join("plugin.yaml");
        fs::write(&no_types, "name: x\nversion: '1'\nmime_types: []\n").unwrap();
        assert!(!registry.test(&no_types));

        assert!(!registry.test(dir.path().join("missing.toml")));
    }

    impl ExtractorRegistry {
        fn is_empty_for_tests(&self) -> bool {
            self.inner.is_empty()
        }
    }
}
