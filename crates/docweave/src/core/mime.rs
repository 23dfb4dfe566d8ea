//! MIME type detection and hint validation.
//!
//! Detection never fails: unrecognized content resolves to [`OCTET_STREAM_MIME_TYPE`] so that
//! an explicit hint or a custom extractor can still take over. Only a syntactically malformed
//! hint is an error.

use crate::{DocweaveError, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

pub const HTML_MIME_TYPE: &str = "text/html";
pub const MARKDOWN_MIME_TYPE: &str = "text/markdown";
pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const PLAIN_TEXT_MIME_TYPE: &str = "text/plain";
pub const CSV_MIME_TYPE: &str = "text/csv";
pub const JSON_MIME_TYPE: &str = "application/json";
pub const YAML_MIME_TYPE: &str = "application/x-yaml";
pub const TOML_MIME_TYPE: &str = "application/toml";
pub const XML_MIME_TYPE: &str = "application/xml";
pub const OCTET_STREAM_MIME_TYPE: &str = "application/octet-stream";

/// Bytes read from a file when sniffing its content.
const SNIFF_LEN: usize = 8 * 1024;

static EXT_TO_MIME: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert("txt", PLAIN_TEXT_MIME_TYPE);
    m.insert("text", PLAIN_TEXT_MIME_TYPE);
    m.insert("log", PLAIN_TEXT_MIME_TYPE);
    m.insert("md", MARKDOWN_MIME_TYPE);
    m.insert("markdown", MARKDOWN_MIME_TYPE);
    m.insert("csv", CSV_MIME_TYPE);

    m.insert("pdf", PDF_MIME_TYPE);

    m.insert("html", HTML_MIME_TYPE);
    m.insert("htm", HTML_MIME_TYPE);
    m.insert("xml", XML_MIME_TYPE);

    m.insert("json", JSON_MIME_TYPE);
    m.insert("yaml", YAML_MIME_TYPE);
    m.insert("yml", YAML_MIME_TYPE);
    m.insert("toml", TOML_MIME_TYPE);

    m.insert("png", "image/png");
    m.insert("jpg", "image/jpeg");
    m.insert("jpeg", "image/jpeg");
    m.insert("gif", "image/gif");
    m.insert("bmp", "image/bmp");
    m.insert("tif", "image/tiff");
    m.insert("tiff", "image/tiff");
    m.insert("webp", "image/webp");

    m
});

/// Detect a MIME type from content signatures alone.
///
/// Binary formats are recognized by magic numbers; text is classified structurally (JSON,
/// HTML, XML, plain UTF-8). Anything else is `application/octet-stream`.
pub fn detect_mime_type_from_bytes(content: &[u8]) -> String {
    if let Some(kind) = infer::get(content) {
        return kind.mime_type().to_string();
    }

    sniff_text(content).unwrap_or(OCTET_STREAM_MIME_TYPE).to_string()
}

fn sniff_text(content: &[u8]) -> Option<&'static str> {
    let text = match std::str::from_utf8(content) {
        Ok(text) => text,
        // A sniff window may cut a multi-byte character in half.
        Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => std::str::from_utf8(&content[..e.valid_up_to()]).ok()?,
        Err(_) => return None,
    };

    if text.contains('\0') {
        return None;
    }

    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if trimmed.is_empty() {
        return Some(PLAIN_TEXT_MIME_TYPE);
    }

    let head: String = trimmed.chars().take(256).collect::<String>().to_ascii_lowercase();
    if head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<body") {
        return Some(HTML_MIME_TYPE);
    }
    if head.starts_with("<?xml") {
        return Some(XML_MIME_TYPE);
    }
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(text.trim()).is_ok()
    {
        return Some(JSON_MIME_TYPE);
    }

    Some(PLAIN_TEXT_MIME_TYPE)
}

/// Detect a MIME type from a path.
///
/// The extension decides when it is known. Otherwise, or when the extension only maps to a
/// generic type, the first bytes of the file are sniffed if the file is readable. Missing or
/// unreadable files fall back to `application/octet-stream`.
pub fn detect_mime_type_from_path(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();

    let from_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .and_then(|ext| {
            EXT_TO_MIME
                .get(ext.as_str())
                .map(|mime| mime.to_string())
                .or_else(|| mime_guess::from_ext(&ext).first().map(|m| m.essence_str().to_string()))
        });

    if let Some(mime) = &from_extension
        && mime != OCTET_STREAM_MIME_TYPE
    {
        return mime.clone();
    }

    match read_head(path) {
        Some(head) => detect_mime_type_from_bytes(&head),
        None => OCTET_STREAM_MIME_TYPE.to_string(),
    }
}

fn read_head(path: &Path) -> Option<Vec<u8>> {
    let file = std::fs::File::open(path).ok()?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head).ok()?;
    Some(head)
}

/// Normalize a caller-supplied MIME hint.
///
/// Returns `Ok(None)` for an absent or blank hint. Parameters such as `; charset=utf-8` are
/// dropped and the result is lower-cased. A hint that is not `type/subtype` made of RFC 6838
/// token characters is a validation error.
pub fn normalize_mime_hint(hint: Option<&str>) -> Result<Option<String>> {
    let Some(raw) = hint else {
        return Ok(None);
    };
    let essence = raw.split(';').next().unwrap_or_default().trim();
    if essence.is_empty() {
        return Ok(None);
    }
    validate_mime_syntax(essence).map(Some)
}

/// Validate and normalize a `type/subtype` string.
pub fn validate_mime_syntax(mime: &str) -> Result<String> {
    let normalized = mime.trim().to_ascii_lowercase();
    let mut parts = normalized.splitn(2, '/');
    let kind = parts.next().unwrap_or_default();
    let subtype = parts.next().unwrap_or_default();

    let valid_token = |s: &str| {
        !s.is_empty()
            && s.len() <= 127
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c))
    };

    if valid_token(kind) && valid_token(subtype) {
        Ok(normalized)
    } else {
        Err(DocweaveError::validation(format!(
            "Malformed MIME type '{}': expected type/subtype",
            mime
        )))
    }
}

/// Known file extensions for a MIME type.
pub fn get_extensions_for_mime(mime_type: &str) -> Vec<&'static str> {
    let mut extensions: Vec<&'static str> = EXT_TO_MIME
        .iter()
        .filter(|(_, mime)| **mime == mime_type)
        .map(|(ext, _)| *ext)
        .collect();

    if extensions.is_empty()
        && let Some(guessed) = mime_guess::get_mime_extensions_str(mime_type)
    {
        extensions.extend_from_slice(guessed);
    }

    extensions.sort_unstable();
    extensions
}

pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
}
