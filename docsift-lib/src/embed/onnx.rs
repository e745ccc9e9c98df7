use fastembed::{EmbeddingModel as FastEmbedKind, InitOptions, TextEmbedding};
use parking_lot::Mutex;

use crate::embed::{Embedding, EmbeddingModel};
use crate::{Error, Result};

/// Default model name, a 384-dimensional sentence-transformers model
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Embedder backend running a sentence embedding model through fastembed.
///
/// Uses ONNX runtime inference. The model is downloaded on first use and
/// cached by fastembed. The dimension is measured once at load time.
pub struct FastEmbedModel {
    model: Mutex<TextEmbedding>,
    name: String,
    dimension: usize,
}

impl FastEmbedModel {
    /// Load the default model (all-MiniLM-L6-v2, ~90MB download).
    pub fn new() -> Result<Self> {
        Self::with_model_name(DEFAULT_MODEL)
    }

    /// Load a model by its short name, e.g. `bge-small-en-v1.5`.
    pub fn with_model_name(name: &str) -> Result<Self> {
        let kind = model_kind(name)?;
        let opts = InitOptions::new(kind).with_show_download_progress(true);

        let mut model =
            TextEmbedding::try_new(opts).map_err(|e| Error::Embedding(e.to_string()))?;

        let dimension = model
            .embed(vec!["dimension check"], None)
            .map_err(|e| Error::Embedding(e.to_string()))?
            .first()
            .map(Vec::len)
            .ok_or_else(|| Error::Embedding("model returned no embeddings".to_string()))?;

        tracing::info!(target: "embed", "loaded {name} ({dimension} dimensions)");

        Ok(Self {
            model: Mutex::new(model),
            name: name.to_string(),
            dimension,
        })
    }
}

impl EmbeddingModel for FastEmbedModel {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        self.model
            .lock()
            .embed(texts.to_vec(), None)
            .map_err(|e| Error::Embedding(e.to_string()))
    }
}

/// Map a short model name onto fastembed's model enum.
fn model_kind(name: &str) -> Result<FastEmbedKind> {
    match name {
        "all-MiniLM-L6-v2" => Ok(FastEmbedKind::AllMiniLML6V2),
        "all-MiniLM-L12-v2" => Ok(FastEmbedKind::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(FastEmbedKind::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(FastEmbedKind::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(FastEmbedKind::BGELargeENV15),
        other => Err(Error::Config(format!("unknown embedding model: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::Embedder;

    #[test]
    fn test_unknown_model_name() {
        assert!(matches!(model_kind("word2vec"), Err(Error::Config(_))));
    }

    #[test]
    fn test_known_model_names() {
        assert!(model_kind(DEFAULT_MODEL).is_ok());
        assert!(model_kind("bge-small-en-v1.5").is_ok());
    }

    #[test]
    #[ignore] // Requires model download, run with: cargo test -- --ignored
    fn test_default_model_dimension() {
        let model = FastEmbedModel::new().unwrap();
        assert_eq!(model.dimension(), 384);
    }

    #[test]
    #[ignore] // Requires model download
    fn test_related_text_scores_higher() {
        let embedder = Embedder::new(FastEmbedModel::new().unwrap());

        let query = embedder.embed("How do I reset my password?").unwrap();
        let related = embedder.embed("Steps to change your account password").unwrap();
        let unrelated = embedder.embed("The stadium was packed with fans").unwrap();

        assert!(Embedder::similarity(&query, &related) > Embedder::similarity(&query, &unrelated));
    }

    #[test]
    #[ignore] // Requires model download
    fn test_batch_matches_single_with_model() {
        let embedder = Embedder::new(FastEmbedModel::new().unwrap());
        let texts = ["First document", "", "Second document"];
        let batch = embedder.embed_batch(&texts).unwrap();

        for (text, vector) in texts.iter().zip(&batch) {
            let single = embedder.embed(text).unwrap();
            assert!(vector.iter().zip(&single).all(|(a, b)| (a - b).abs() < 1e-4));
        }
    }
}
