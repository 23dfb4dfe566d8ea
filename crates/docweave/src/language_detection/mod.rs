//! Language detection with `whatlang`.
//!
//! Codes are ISO 639-3 (`eng`, `deu`, `cmn`, ...). In multi-language mode the text is
//! scanned in fixed-size windows and languages are ordered by how many windows they won.

use crate::core::config::LanguageDetectionConfig;
use ahash::AHashMap;
use whatlang::{Lang, detect};

const WINDOW_CHARS: usize = 200;

/// Confidence floor applied to individual windows in multi-language mode.
const WINDOW_CONFIDENCE: f64 = 0.35;

/// Detected languages, or `None` when detection is disabled or nothing clears the threshold.
pub fn detect_languages(text: &str, config: &LanguageDetectionConfig) -> Option<Vec<String>> {
    if !config.enabled || text.trim().is_empty() {
        return None;
    }

    if config.detect_multiple {
        detect_multiple(text, config)
    } else {
        detect_single(text, config)
    }
}

fn detect_single(text: &str, config: &LanguageDetectionConfig) -> Option<Vec<String>> {
    let info = detect(text)?;
    (info.confidence() >= config.min_confidence).then(|| vec![info.lang().code().to_string()])
}

fn detect_multiple(text: &str, config: &LanguageDetectionConfig) -> Option<Vec<String>> {
    let chars: Vec<char> = text.chars().collect();
    let threshold = config.min_confidence.min(WINDOW_CONFIDENCE);

    let mut counts: AHashMap<Lang, usize> = AHashMap::new();
    for window in chars.chunks(WINDOW_CHARS) {
        let window: String = window.iter().collect();
        if let Some(info) = detect(&window)
            && info.confidence() >= threshold
        {
            *counts.entry(info.lang()).or_insert(0) += 1;
        }
    }

    if counts.is_empty() {
        return detect_single(text, config);
    }

    let mut ranked: Vec<(Lang, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.code().cmp(b.0.code())));
    Some(ranked.into_iter().map(|(lang, _)| lang.code().to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENGLISH: &str = "The quick brown fox jumps over the lazy dog. This sentence is written in plain English \
        and should be detected without any trouble at all by the detector.";
    const GERMAN: &str = "Der schnelle braune Fuchs springt über den faulen Hund. Dieser Satz ist auf Deutsch \
        geschrieben und sollte ohne Schwierigkeiten erkannt werden können.";

    fn config(detect_multiple: bool) -> LanguageDetectionConfig {
        LanguageDetectionConfig {
            enabled: true,
            min_confidence: 0.5,
            detect_multiple,
        }
    }

    #[test]
    fn test_detect_single_language() {
        assert_eq!(detect_languages(ENGLISH, &config(false)), Some(vec!["eng".to_string()]));
    }

    #[test]
    fn test_disabled_and_empty() {
        let disabled = LanguageDetectionConfig {
            enabled: false,
            ..config(false)
        };
        assert!(detect_languages(ENGLISH, &disabled).is_none());
        assert!(detect_languages("   ", &config(false)).is_none());
    }

    #[test]
    fn test_detect_multiple_languages() {
        let text = format!("{} {} {}", ENGLISH, GERMAN, GERMAN);
        let languages = detect_languages(&text, &config(true)).unwrap();
        assert!(languages.contains(&"deu".to_string()));
        assert!(languages.contains(&"eng".to_string()));
    }
}
