//! HTML extractor.
//!
//! HTML is converted to Markdown with `html-to-markdown-rs`. Document metadata comes back
//! as YAML frontmatter at the top of the converted text, which is split off and mapped
//! onto [`Metadata`].

use crate::core::config::{ExtractionConfig, HtmlOptions, OutputFormat};
use crate::plugins::{DocumentExtractor, Plugin};
use crate::text::markup::{extract_pipe_tables, strip_markdown};
use crate::types::{ExtractionResult, Metadata};
use crate::{DocweaveError, Result};
use async_trait::async_trait;
use html_to_markdown_rs::{ConversionOptions, convert};
use serde_json::Value;

/// HTML document extractor.
#[derive(Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for HtmlExtractor {
    fn name(&self) -> &str {
        "html-extractor"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> &str {
        "Converts HTML to Markdown and reads head metadata"
    }
}

#[async_trait]
impl DocumentExtractor for HtmlExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let html = String::from_utf8_lossy(content);
        let options = config.html_options.clone().unwrap_or_default();

        let converted = convert_html_to_markdown(&html, &options)?;
        let (frontmatter, markdown) = split_frontmatter(&converted);

        let metadata = match frontmatter {
            Some(yaml) if options.extract_metadata => parse_frontmatter(yaml)?,
            _ => Metadata::default(),
        };
        let tables = extract_pipe_tables(markdown, 1);

        let content = match config.output_format {
            OutputFormat::Html => html.into_owned(),
            OutputFormat::Markdown | OutputFormat::Djot => markdown.trim().to_string(),
            OutputFormat::Plain => strip_markdown(markdown),
        };

        Ok(ExtractionResult {
            metadata,
            tables,
            ..ExtractionResult::new(content, mime_type)
        })
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["text/html", "application/xhtml+xml"]
    }
}

pub fn convert_html_to_markdown(html: &str, options: &HtmlOptions) -> Result<String> {
    let conversion = ConversionOptions {
        extract_metadata: options.extract_metadata,
        strip_tags: options.strip_tags.clone().unwrap_or_default(),
        ..Default::default()
    };
    convert(html, Some(conversion))
        .map_err(|e| DocweaveError::parsing(format!("Failed to convert HTML to Markdown: {}", e)))
}

/// Split a leading `---` delimited YAML block from the body.
fn split_frontmatter(markdown: &str) -> (Option<&str>, &str) {
    let normalized = markdown.strip_prefix("---\r\n").or_else(|| markdown.strip_prefix("---\n"));
    let Some(after_opening) = normalized else {
        return (None, markdown);
    };

    if let Some(rest) = after_opening.strip_prefix("---\n") {
        return (None, rest);
    }
    match after_opening.find("\n---\n") {
        Some(pos) => (Some(&after_opening[..pos]), &after_opening[pos + 5..]),
        None => (None, markdown),
    }
}

fn parse_frontmatter(yaml: &str) -> Result<Metadata> {
    let value: Value = serde_yaml_ng::from_str(yaml)
        .map_err(|e| DocweaveError::parsing(format!("Failed to parse YAML frontmatter: {}", e)))?;

    let mut metadata = Metadata::default();
    let Value::Object(mapping) = value else {
        return Ok(metadata);
    };

    for (key, value) in mapping {
        let Value::String(text) = value else {
            continue;
        };
        match key.as_str() {
            "title" => metadata.title = Some(text),
            "meta-description" => metadata.subject = Some(text),
            "meta-author" => metadata.authors = Some(vec![text]),
            "meta-keywords" => {
                metadata.keywords = Some(
                    text.split(',')
                        .map(|k| k.trim().to_string())
                        .filter(|k| !k.is_empty())
                        .collect(),
                )
            }
            "lang" | "meta-language" => metadata.language = Some(text),
            _ => {
                metadata.custom.insert(key, Value::String(text));
            }
        }
    }

    Ok(metadata)
}
