//! Chunk embeddings.
//!
//! Models are provided by `fastembed` (behind the `embeddings` feature) and initialized once
//! per model and cache directory. Presets bundle a model with the chunk size it is meant
//! for. Without the feature, embedding generation fails with a missing-dependency error.

use crate::Result;
use crate::core::config::EmbeddingConfig;
use crate::types::Chunk;

/// A named model choice for common retrieval setups.
#[derive(Debug, Clone)]
pub struct EmbeddingPreset {
    pub name: &'static str,
    pub chunk_size: usize,
    pub overlap: usize,
    pub model_name: &'static str,
    pub dimensions: usize,
    pub description: &'static str,
}

pub const EMBEDDING_PRESETS: &[EmbeddingPreset] = &[
    EmbeddingPreset {
        name: "fast",
        chunk_size: 512,
        overlap: 50,
        model_name: "AllMiniLML6V2Q",
        dimensions: 384,
        description: "Quantized small model for prototyping and constrained hosts.",
    },
    EmbeddingPreset {
        name: "balanced",
        chunk_size: 1024,
        overlap: 100,
        model_name: "BGEBaseENV15",
        dimensions: 768,
        description: "General purpose English retrieval.",
    },
    EmbeddingPreset {
        name: "quality",
        chunk_size: 2000,
        overlap: 200,
        model_name: "BGELargeENV15",
        dimensions: 1024,
        description: "Large model for maximum accuracy.",
    },
    EmbeddingPreset {
        name: "multilingual",
        chunk_size: 1024,
        overlap: 100,
        model_name: "MultilingualE5Base",
        dimensions: 768,
        description: "Mixed-language documents.",
    },
];

pub fn get_preset(name: &str) -> Option<&'static EmbeddingPreset> {
    EMBEDDING_PRESETS.iter().find(|p| p.name == name)
}

pub fn list_presets() -> Vec<&'static str> {
    EMBEDDING_PRESETS.iter().map(|p| p.name).collect()
}

/// Scale `vector` to unit length. Zero vectors are left alone.
pub fn normalize(vector: &mut [f32]) {
    let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        vector.iter_mut().for_each(|x| *x /= magnitude);
    }
}

#[cfg(feature = "embeddings")]
mod model {
    use super::get_preset;
    use crate::core::config::{EmbeddingConfig, EmbeddingModelType};
    use crate::{DocweaveError, Result};
    use ahash::AHashMap;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use once_cell::sync::Lazy;
    use parking_lot::{Mutex, RwLock};
    use std::path::PathBuf;
    use std::sync::Arc;

    type SharedModel = Arc<Mutex<TextEmbedding>>;

    static MODEL_CACHE: Lazy<RwLock<AHashMap<String, SharedModel>>> = Lazy::new(|| RwLock::new(AHashMap::new()));

    fn embedding_error(message: impl Into<String>) -> DocweaveError {
        DocweaveError::plugin("embeddings", message)
    }

    fn model_by_name(name: &str) -> Result<EmbeddingModel> {
        match name {
            "AllMiniLML6V2Q" => Ok(EmbeddingModel::AllMiniLML6V2Q),
            "BGEBaseENV15" => Ok(EmbeddingModel::BGEBaseENV15),
            "BGELargeENV15" => Ok(EmbeddingModel::BGELargeENV15),
            "MultilingualE5Base" => Ok(EmbeddingModel::MultilingualE5Base),
            other => Err(embedding_error(format!("Unknown fastembed model: {}", other))),
        }
    }

    fn resolve(config: &EmbeddingConfig) -> Result<EmbeddingModel> {
        match &config.model {
            EmbeddingModelType::Preset { name } => {
                let preset = get_preset(name).ok_or_else(|| embedding_error(format!("Unknown embedding preset: {}", name)))?;
                model_by_name(preset.model_name)
            }
            EmbeddingModelType::FastEmbed { model, .. } => model_by_name(model),
            EmbeddingModelType::Custom { model_id, .. } => Err(embedding_error(format!(
                "Custom embedding models are not supported: {}",
                model_id
            ))),
        }
    }

    pub(super) fn get_or_init(config: &EmbeddingConfig) -> Result<SharedModel> {
        let model = resolve(config)?;
        let cache_dir = config.cache_dir.clone().unwrap_or_else(|| {
            let mut path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            path.push(".docweave");
            path.push("embeddings");
            path
        });
        let key = format!("{:?}_{}", model, cache_dir.display());

        if let Some(cached) = MODEL_CACHE.read().get(&key) {
            return Ok(Arc::clone(cached));
        }

        let mut cache = MODEL_CACHE.write();
        if let Some(cached) = cache.get(&key) {
            return Ok(Arc::clone(cached));
        }

        tracing::info!(model = ?model, cache_dir = %cache_dir.display(), "initializing embedding model");
        let embedding = TextEmbedding::try_new(InitOptions::new(model).with_cache_dir(cache_dir))
            .map_err(|e| embedding_error(format!("Failed to initialize embedding model: {}", e)))?;
        let shared = Arc::new(Mutex::new(embedding));
        cache.insert(key, Arc::clone(&shared));
        Ok(shared)
    }

    pub(super) fn embed(model: &SharedModel, texts: Vec<String>, batch_size: usize) -> Result<Vec<Vec<f32>>> {
        model
            .lock()
            .embed(texts, Some(batch_size))
            .map_err(|e| embedding_error(format!("Failed to generate embeddings: {}", e)))
    }
}

/// Populate `embedding` on every chunk. Blocking; run it off the async executor.
#[cfg(feature = "embeddings")]
pub fn generate_embeddings_for_chunks(chunks: &mut [Chunk], config: &EmbeddingConfig) -> Result<()> {
    if chunks.is_empty() {
        return Ok(());
    }

    let shared = model::get_or_init(config)?;
    let texts = chunks.iter().map(|chunk| chunk.content.clone()).collect();
    let vectors = model::embed(&shared, texts, config.batch_size)?;

    for (chunk, mut vector) in chunks.iter_mut().zip(vectors) {
        if config.normalize {
            normalize(&mut vector);
        }
        chunk.embedding = Some(vector);
    }
    Ok(())
}

#[cfg(not(feature = "embeddings"))]
pub fn generate_embeddings_for_chunks(_chunks: &mut [Chunk], _config: &EmbeddingConfig) -> Result<()> {
    Err(crate::DocweaveError::MissingDependency(
        "embedding generation requires the `embeddings` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_preset() {
        assert_eq!(get_preset("balanced").unwrap().dimensions, 768);
        assert!(get_preset("nope").is_none());
        assert_eq!(list_presets(), vec!["fast", "balanced", "quality", "multilingual"]);
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[cfg(not(feature = "embeddings"))]
    #[test]
    fn test_missing_feature_is_missing_dependency() {
        let mut chunks = Vec::new();
        let err = generate_embeddings_for_chunks(&mut chunks, &EmbeddingConfig::default()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::MissingDependency);
    }
}
