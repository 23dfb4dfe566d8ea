//! Configuration loading and management.
//!
//! Every option group is a plain serde struct with snake_case keys. Absent optional groups
//! are omitted when serializing, unknown keys are ignored when deserializing, and every type
//! implements [`JsonConfig`] so it can be built from and turned back into a JSON map on its
//! own. Configuration files (TOML, YAML, JSON) are loaded with the same types.

use crate::{DocweaveError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound on batch concurrency regardless of configuration.
pub const MAX_CONCURRENCY_CAP: usize = 64;

/// Main extraction configuration.
///
/// # Example
///
/// ```rust
/// use docweave::core::config::{ExtractionConfig, JsonConfig};
///
/// let config = ExtractionConfig::from_json(r#"{"force_ocr": true, "unknown": 1}"#).unwrap();
/// assert!(config.force_ocr);
/// assert_eq!(ExtractionConfig::from_json(&config.to_json().unwrap()).unwrap(), config);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Cache OCR output within a pipeline context
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Compute a quality score for the extracted text
    #[serde(default = "default_true")]
    pub enable_quality_processing: bool,

    /// OCR configuration (None = default backend and language when OCR runs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr: Option<OcrConfig>,

    /// Run OCR regardless of the detected MIME type
    #[serde(default)]
    pub force_ocr: bool,

    /// Text chunking configuration (None = chunking disabled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunking: Option<ChunkingConfig>,

    /// Image extraction configuration (None = no image extraction)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<ImageExtractionConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_options: Option<PdfConfig>,

    /// Token reduction configuration (None = no token reduction)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_reduction: Option<TokenReductionConfig>,

    /// Language detection configuration (None = no language detection)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_detection: Option<LanguageDetectionConfig>,

    /// Page extraction configuration (None = no per-page output)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<PageConfig>,

    /// Keyword extraction configuration (None = no keyword extraction)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<KeywordConfig>,

    /// Post-processor configuration (None = run every registered processor)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postprocessor: Option<PostProcessorConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_options: Option<HtmlOptions>,

    /// Maximum concurrent extractions in batch operations (None = num_cpus * 2).
    ///
    /// Always capped at [`MAX_CONCURRENCY_CAP`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_extractions: Option<usize>,

    #[serde(default)]
    pub result_format: ResultFormat,

    #[serde(default)]
    pub output_format: OutputFormat,

    /// Timeout and retry policy for plugin calls (None = defaults)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_policy: Option<CallPolicyConfig>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            enable_quality_processing: true,
            ocr: None,
            force_ocr: false,
            chunking: None,
            images: None,
            pdf_options: None,
            token_reduction: None,
            language_detection: None,
            pages: None,
            keywords: None,
            postprocessor: None,
            html_options: None,
            max_concurrent_extractions: None,
            result_format: ResultFormat::default(),
            output_format: OutputFormat::default(),
            call_policy: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFormat {
    #[default]
    Unified,
    ElementBased,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Plain,
    Markdown,
    Djot,
    Html,
}

/// Post-processor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProcessorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whitelist of processor names to run (None = all)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_processors: Option<Vec<String>>,

    /// Blacklist of processor names to skip (None = none)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_processors: Option<Vec<String>>,
}

impl Default for PostProcessorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enabled_processors: None,
            disabled_processors: None,
        }
    }
}

impl PostProcessorConfig {
    pub fn allows(&self, name: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if let Some(enabled) = &self.enabled_processors
            && !enabled.iter().any(|n| n == name)
        {
            return false;
        }
        if let Some(disabled) = &self.disabled_processors
            && disabled.iter().any(|n| n == name)
        {
            return false;
        }
        true
    }
}

/// OCR configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Name of a registered OCR backend
    #[serde(default = "default_ocr_backend")]
    pub backend: String,

    /// Language code (e.g., "eng", "deu")
    #[serde(default = "default_eng")]
    pub language: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: default_ocr_backend(),
            language: default_eng(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkerType {
    #[default]
    Text,
    Markdown,
}

/// Chunking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_chunk_size")]
    pub max_chars: usize,

    /// Overlap between chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub max_overlap: usize,

    /// Snap chunk ends to sentence boundaries where possible
    #[serde(default)]
    pub sentence_boundaries: bool,

    #[serde(default)]
    pub chunker_type: ChunkerType,

    /// Embedding configuration (None = no embeddings)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingConfig>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_chunk_size(),
            max_overlap: default_chunk_overlap(),
            sentence_boundaries: false,
            chunker_type: ChunkerType::default(),
            embedding: None,
        }
    }
}

/// Embedding generation configuration for chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub model: EmbeddingModelType,

    /// Normalize embedding vectors to unit length
    #[serde(default = "default_true")]
    pub normalize: bool,

    /// Chunks embedded per inference call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Model cache directory (None = `.docweave/embeddings` under the working directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: EmbeddingModelType::default(),
            normalize: true,
            batch_size: default_batch_size(),
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmbeddingModelType {
    /// Named preset (`fast`, `balanced`, `quality`, `multilingual`)
    Preset { name: String },

    /// A fastembed model by name
    FastEmbed { model: String, dimensions: usize },

    Custom { model_id: String, dimensions: usize },
}

impl Default for EmbeddingModelType {
    fn default() -> Self {
        EmbeddingModelType::Preset {
            name: "balanced".to_string(),
        }
    }
}

/// Image extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageExtractionConfig {
    #[serde(default = "default_true")]
    pub extract_images: bool,

    /// OCR every extracted image, attaching the result to the image
    #[serde(default)]
    pub perform_ocr: bool,

    /// Images with a larger known width or height are dropped
    #[serde(default = "default_max_dimension")]
    pub max_image_dimension: u32,
}

impl Default for ImageExtractionConfig {
    fn default() -> Self {
        Self {
            extract_images: true,
            perform_ocr: false,
            max_image_dimension: default_max_dimension(),
        }
    }
}

/// PDF-specific configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfConfig {
    /// Read title, author, and producer from the document info dictionary
    #[serde(default = "default_true")]
    pub extract_metadata: bool,

    /// Run OCR over the document when native text extraction fails or finds no text
    #[serde(default)]
    pub ocr_fallback: bool,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            extract_metadata: true,
            ocr_fallback: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionMode {
    #[default]
    Off,
    Light,
    Moderate,
}

/// Token reduction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenReductionConfig {
    #[serde(default)]
    pub mode: ReductionMode,

    /// Keep capitalized words and numbers even when they are stopwords
    #[serde(default = "default_true")]
    pub preserve_important_words: bool,
}

impl Default for TokenReductionConfig {
    fn default() -> Self {
        Self {
            mode: ReductionMode::Off,
            preserve_important_words: true,
        }
    }
}

/// Language detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetectionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum confidence threshold (0.0-1.0)
    #[serde(default = "default_confidence")]
    pub min_confidence: f64,

    /// Detect multiple languages in the document
    #[serde(default)]
    pub detect_multiple: bool,
}

impl Default for LanguageDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_confidence: default_confidence(),
            detect_multiple: false,
        }
    }
}

/// Page extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    /// Populate `ExtractionResult::pages`
    #[serde(default)]
    pub extract_pages: bool,

    /// Insert a marker before each page in `content`
    #[serde(default)]
    pub insert_page_markers: bool,

    /// Marker template; `{page_num}` is replaced with the 1-indexed page number
    #[serde(default = "default_page_marker")]
    pub marker_format: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            extract_pages: false,
            insert_page_markers: false,
            marker_format: default_page_marker(),
        }
    }
}

/// Keyword extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordConfig {
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,

    /// Minimum normalized score (0.0-1.0)
    #[serde(default)]
    pub min_score: f32,

    /// Inclusive range of words per keyword phrase
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),

    /// Stopword language. Only English (`en`, `eng`, `english`) is supported; None = English
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            max_keywords: default_max_keywords(),
            min_score: 0.0,
            ngram_range: default_ngram_range(),
            language: None,
        }
    }
}

/// HTML conversion options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlOptions {
    /// Copy `<title>` and `<meta>` values into the result metadata
    #[serde(default = "default_true")]
    pub extract_metadata: bool,

    /// Tags whose markup is dropped during conversion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_tags: Option<Vec<String>>,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            extract_metadata: true,
            strip_tags: None,
        }
    }
}

/// Timeout and retry policy applied at every plugin call boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallPolicyConfig {
    /// Hard timeout for a single extractor, OCR, post-processor, validator, or embedding call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Additional attempts for failed OCR calls
    #[serde(default)]
    pub retry_attempts: u32,

    /// Delay before retry `n` is `n * retry_backoff_ms`
    #[serde(default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for CallPolicyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retry_attempts: 0,
            retry_backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_eng() -> String {
    "eng".to_string()
}

fn default_ocr_backend() -> String {
    "tesseract".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_batch_size() -> usize {
    32
}

fn default_max_dimension() -> u32 {
    4096
}

fn default_confidence() -> f64 {
    0.8
}

fn default_page_marker() -> String {
    "\n\n<!-- PAGE {page_num} -->\n\n".to_string()
}

fn default_max_keywords() -> usize {
    10
}

fn default_ngram_range() -> (usize, usize) {
    (1, 3)
}

fn is_english(lang: &str) -> bool {
    matches!(lang.to_lowercase().as_str(), "en" | "eng" | "english")
}

fn default_timeout_ms() -> u64 {
    120_000
}

fn default_backoff_ms() -> u64 {
    250
}

/// JSON map conversion shared by every configuration type.
pub trait JsonConfig: Serialize + DeserializeOwned {
    /// Parse from a JSON string.
    ///
    /// Malformed JSON is [`DocweaveError::InvalidJson`]; well-formed JSON with wrongly
    /// typed fields is a validation error.
    fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(json_error)
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| DocweaveError::parsing_with_source("Failed to serialize config", e))
    }

    fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        serde_json::from_value(serde_json::Value::Object(map)).map_err(json_error)
    }

    fn to_map(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(other) => Err(DocweaveError::parsing(format!("Config serialized to non-object JSON: {}", other))),
            Err(e) => Err(DocweaveError::parsing_with_source("Failed to serialize config", e)),
        }
    }
}

fn json_error(err: serde_json::Error) -> DocweaveError {
    match err.classify() {
        serde_json::error::Category::Data => {
            DocweaveError::validation_with_source(format!("Invalid configuration value: {}", err), err)
        }
        _ => err.into(),
    }
}

macro_rules! impl_json_config {
    ($($ty:ty),* $(,)?) => {
        $(impl JsonConfig for $ty {})*
    };
}

impl_json_config!(
    ExtractionConfig,
    PostProcessorConfig,
    OcrConfig,
    ChunkingConfig,
    EmbeddingConfig,
    ImageExtractionConfig,
    PdfConfig,
    TokenReductionConfig,
    LanguageDetectionConfig,
    PageConfig,
    KeywordConfig,
    HtmlOptions,
    CallPolicyConfig,
);

const CONFIG_FILE_NAMES: [&str; 4] = ["docweave.toml", "docweave.yaml", "docweave.yml", "docweave.json"];

impl ExtractionConfig {
    /// Reject semantically invalid option combinations.
    pub fn validate(&self) -> Result<()> {
        if let Some(chunking) = &self.chunking {
            if chunking.max_chars == 0 {
                return Err(DocweaveError::validation("chunking.max_chars must be greater than 0"));
            }
            if chunking.max_overlap >= chunking.max_chars {
                return Err(DocweaveError::validation(format!(
                    "chunking.max_overlap ({}) must be smaller than chunking.max_chars ({})",
                    chunking.max_overlap, chunking.max_chars
                )));
            }
            if let Some(embedding) = &chunking.embedding
                && embedding.batch_size == 0
            {
                return Err(DocweaveError::validation(
                    "chunking.embedding.batch_size must be greater than 0",
                ));
            }
        }

        if self.max_concurrent_extractions == Some(0) {
            return Err(DocweaveError::validation(
                "max_concurrent_extractions must be greater than 0",
            ));
        }

        if let Some(ocr) = &self.ocr {
            if ocr.backend.trim().is_empty() {
                return Err(DocweaveError::validation("ocr.backend must not be empty"));
            }
            if ocr.language.trim().is_empty() {
                return Err(DocweaveError::validation("ocr.language must not be empty"));
            }
        }

        if let Some(lang) = &self.language_detection
            && !(0.0..=1.0).contains(&lang.min_confidence)
        {
            return Err(DocweaveError::validation(format!(
                "language_detection.min_confidence must be within 0.0..=1.0, got {}",
                lang.min_confidence
            )));
        }

        if let Some(keywords) = &self.keywords {
            let (min, max) = keywords.ngram_range;
            if min == 0 || min > max {
                return Err(DocweaveError::validation(format!(
                    "keywords.ngram_range must satisfy 1 <= min <= max, got ({}, {})",
                    min, max
                )));
            }
            if let Some(lang) = keywords.language.as_deref()
                && !is_english(lang)
            {
                return Err(DocweaveError::validation(format!(
                    "keywords.language {:?} is not supported; only English stopwords are available",
                    lang
                )));
            }
        }

        if let Some(policy) = &self.call_policy
            && policy.timeout_ms == 0
        {
            return Err(DocweaveError::validation("call_policy.timeout_ms must be greater than 0"));
        }

        Ok(())
    }

    /// Effective batch concurrency: configured value or `num_cpus * 2`, capped.
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrent_extractions
            .unwrap_or_else(|| num_cpus::get() * 2)
            .clamp(1, MAX_CONCURRENCY_CAP)
    }

    pub fn call_policy(&self) -> CallPolicyConfig {
        self.call_policy.clone().unwrap_or_default()
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config_file(path.as_ref())?;
        toml::from_str(&content)
            .map_err(|e| DocweaveError::validation(format!("Invalid TOML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config_file(path.as_ref())?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| DocweaveError::validation(format!("Invalid YAML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config_file(path.as_ref())?;
        Self::from_json(&content).map_err(|e| match e {
            DocweaveError::InvalidJson { message, source } => DocweaveError::InvalidJson {
                message: format!("{} in {}", message, path.as_ref().display()),
                source,
            },
            other => other,
        })
    }

    /// Load configuration, picking the format from the file extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase) {
            Some(ext) if ext == "toml" => Self::from_toml_file(path),
            Some(ext) if ext == "yaml" || ext == "yml" => Self::from_yaml_file(path),
            Some(ext) if ext == "json" => Self::from_json_file(path),
            _ => Err(DocweaveError::validation(format!(
                "Unsupported config file format: {} (expected .toml, .yaml, .yml or .json)",
                path.display()
            ))),
        }
    }

    /// Discover a configuration file by walking up from the current directory.
    pub fn discover() -> Result<Option<Self>> {
        let current = std::env::current_dir()?;
        Self::discover_from(&current)
    }

    pub fn discover_from(start: &Path) -> Result<Option<Self>> {
        let mut current = Some(start);

        while let Some(dir) = current {
            for name in CONFIG_FILE_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    tracing::debug!(path = %candidate.display(), "discovered config file");
                    return Ok(Some(Self::from_file(candidate)?));
                }
            }
            current = dir.parent();
        }

        Ok(None)
    }
}

fn read_config_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| DocweaveError::validation(format!("Failed to read config file {}: {}", path.display(), e)))
}
