//! Structured data extractor (JSON, YAML, TOML).
//!
//! Documents are flattened into one `path: value` line per scalar. Object keys are joined
//! with `.`, array items are addressed as `path[i]` (`item_i` at the root), and nulls and
//! empty strings are skipped.

use crate::core::config::ExtractionConfig;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::{ExtractionResult, Metadata};
use crate::{DocweaveError, Result};
use async_trait::async_trait;
use serde_json::{Value, json};

/// Keys whose string values are copied into metadata when they appear at the top level.
const TEXT_FIELDS: &[&str] = &["title", "name", "description", "summary", "author"];

/// Structured data extractor supporting JSON, YAML, and TOML.
#[derive(Default)]
pub struct StructuredExtractor;

impl StructuredExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for StructuredExtractor {
    fn name(&self) -> &str {
        "structured-extractor"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

#[async_trait]
impl DocumentExtractor for StructuredExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        _config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let (value, format) = match mime_type {
            "application/json" | "text/json" => (parse_json(content)?, "json"),
            "application/x-yaml" | "application/yaml" | "text/yaml" | "text/x-yaml" => (parse_yaml(content)?, "yaml"),
            "application/toml" | "text/toml" => (parse_toml(content)?, "toml"),
            _ => return Err(DocweaveError::UnsupportedFormat(mime_type.to_string())),
        };

        let mut lines = Vec::new();
        flatten(&value, "", &mut lines);

        let mut metadata = Metadata::default();
        metadata.custom.insert("data_format".to_string(), json!(format));
        metadata.custom.insert("field_count".to_string(), json!(lines.len()));
        if let Value::Object(map) = &value {
            for key in TEXT_FIELDS {
                if let Some(Value::String(s)) = map.get(*key)
                    && !s.is_empty()
                {
                    metadata.custom.insert((*key).to_string(), json!(s));
                }
            }
            metadata.title = map.get("title").and_then(Value::as_str).map(str::to_string);
        }

        Ok(ExtractionResult {
            metadata,
            ..ExtractionResult::new(lines.join("\n"), mime_type)
        })
    }

    fn supported_mime_types(&self) -> &[&str] {
        &[
            "application/json",
            "text/json",
            "application/x-yaml",
            "application/yaml",
            "text/yaml",
            "text/x-yaml",
            "application/toml",
            "text/toml",
        ]
    }
}

fn utf8<'a>(data: &'a [u8], format: &str) -> Result<&'a str> {
    std::str::from_utf8(data).map_err(|e| DocweaveError::parsing_with_source(format!("Invalid UTF-8 in {}", format), e))
}

fn parse_json(data: &[u8]) -> Result<Value> {
    serde_json::from_slice(data).map_err(|e| DocweaveError::parsing_with_source("Failed to parse JSON", e))
}

fn parse_yaml(data: &[u8]) -> Result<Value> {
    serde_yaml_ng::from_str(utf8(data, "YAML")?)
        .map_err(|e| DocweaveError::parsing_with_source("Failed to parse YAML", e))
}

fn parse_toml(data: &[u8]) -> Result<Value> {
    let value: toml::Value =
        toml::from_str(utf8(data, "TOML")?).map_err(|e| DocweaveError::parsing_with_source("Failed to parse TOML", e))?;
    serde_json::to_value(value).map_err(|e| DocweaveError::parsing_with_source("Failed to convert TOML", e))
}

fn flatten(value: &Value, prefix: &str, lines: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::String(s) if s.is_empty() => {}
        Value::String(s) => lines.push(format!("{}: {}", prefix, s)),
        Value::Bool(b) => lines.push(format!("{}: {}", prefix, b)),
        Value::Number(n) => lines.push(format!("{}: {}", prefix, n)),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let key = if prefix.is_empty() {
                    format!("item_{}", i)
                } else {
                    format!("{}[{}]", prefix, i)
                };
                flatten(item, &key, lines);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(item, &key, lines);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    async fn extract(data: &str, mime: &str) -> Result<ExtractionResult> {
        StructuredExtractor::new()
            .extract_bytes(data.as_bytes(), mime, &ExtractionConfig::default())
            .await
    }

    #[tokio::test]
    async fn test_json_is_flattened() {
        let result = extract(
            r#"{"title": "Inventory", "items": [{"sku": "a1", "qty": 3}], "note": "", "gone": null}"#,
            "application/json",
        )
        .await
        .unwrap();

        assert!(result.content.contains("title: Inventory"));
        assert!(result.content.contains("items[0].sku: a1"));
        assert!(result.content.contains("items[0].qty: 3"));
        assert!(!result.content.contains("note"));
        assert!(!result.content.contains("gone"));
        assert_eq!(result.metadata.title.as_deref(), Some("Inventory"));
        assert_eq!(result.metadata.custom["data_format"], "json");
    }

    #[tokio::test]
    async fn test_root_array_items() {
        let result = extract("[1, true]", "application/json").await.unwrap();
        assert_eq!(result.content, "item_0: 1\nitem_1: true");
    }

    #[tokio::test]
    async fn test_yaml_and_toml() {
        let yaml = extract("server:\n  port: 8080\n", "application/x-yaml").await.unwrap();
        assert_eq!(yaml.content, "server.port: 8080");

        let toml = extract("[server]\nhost = \"localhost\"\n", "application/toml").await.unwrap();
        assert_eq!(toml.content, "server.host: localhost");
    }

    #[tokio::test]
    async fn test_malformed_input_is_parsing_error() {
        let err = extract("{ not json", "application/json").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parsing);

        let err = extract("a = [", "application/toml").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parsing);
    }

    #[test]
    fn test_structured_extractor_plugin_interface() {
        let extractor = StructuredExtractor::new();
        assert_eq!(extractor.name(), "structured-extractor");
        assert!(extractor.initialize().is_ok());
        assert!(extractor.can_handle("application/toml"));
        assert!(!extractor.can_handle("text/plain"));
    }
}
