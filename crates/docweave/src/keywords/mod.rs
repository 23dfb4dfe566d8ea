//! Keyword extraction with RAKE.
//!
//! Raw RAKE scores are min-max normalized to `0.0..=1.0` before `min_score` is applied, so
//! the top phrase always scores 1.0.

use crate::core::config::KeywordConfig;
use crate::text::stopwords;
use crate::types::Keyword;
use rake::{Rake, StopWords};
use std::collections::HashSet;

pub fn extract_keywords(text: &str, config: &KeywordConfig) -> Vec<Keyword> {
    if text.trim().is_empty() || config.max_keywords == 0 {
        return Vec::new();
    }

    let words: HashSet<String> = stopwords::english().iter().map(|w| w.to_string()).collect();
    let rake = Rake::new(StopWords::from(words));

    let (min_words, max_words) = config.ngram_range;
    let candidates: Vec<(String, f64)> = rake
        .run(text)
        .into_iter()
        .filter(|scored| {
            let word_count = scored.keyword.split_whitespace().count();
            scored.keyword.chars().count() > 1 && (min_words..=max_words).contains(&word_count)
        })
        .map(|scored| (scored.keyword, scored.score))
        .collect();

    if candidates.is_empty() {
        return Vec::new();
    }

    let min = candidates.iter().map(|(_, s)| *s).fold(f64::INFINITY, f64::min);
    let max = candidates.iter().map(|(_, s)| *s).fold(f64::NEG_INFINITY, f64::max);

    let mut keywords: Vec<Keyword> = candidates
        .into_iter()
        .map(|(text, raw)| {
            let score = if max > min {
                ((raw - min) / (max - min)).clamp(0.0, 1.0)
            } else {
                1.0
            };
            Keyword {
                text,
                score: score as f32,
            }
        })
        .filter(|k| k.score >= config.min_score)
        .collect();

    keywords.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.text.cmp(&b.text))
    });
    keywords.truncate(config.max_keywords);
    keywords
}
