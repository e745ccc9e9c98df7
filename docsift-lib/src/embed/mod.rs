//! Text embedding
//!
//! [`Embedder`] wraps an [`EmbeddingModel`] backend and owns the embedding
//! policy shared by every backend:
//!
//! - empty or whitespace-only text maps to the all-zero vector, never an error
//! - `embed_batch` only sends non-empty texts to the model and puts zero
//!   vectors back at their original positions
//! - every vector has the model's fixed dimension
//!
//! # Backends
//!
//! - [`FastEmbedModel`]: ONNX inference through fastembed
//!   (all-MiniLM-L6-v2 by default, 384 dimensions)
//! - [`HashingModel`]: deterministic feature hashing, no model download
//!
//! # Usage
//!
//! ```ignore
//! use docsift_lib::embed::{Embedder, FastEmbedModel};
//!
//! let embedder = Embedder::new(FastEmbedModel::new()?);
//!
//! let vectors = embedder.embed_batch(&["Match report...", "", "News article..."])?;
//! assert!(vectors[1].iter().all(|x| *x == 0.0));
//!
//! let query = embedder.embed("Who scored the winning goal?")?;
//! let score = Embedder::similarity(&query, &vectors[0]);
//! ```

use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::{Error, Result};

/// A vector embedding - fixed size array of floats
pub type Embedding = Vec<f32>;

/// Default number of texts sent to the model per call
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Trait for embedding model backends
///
/// Backends only ever see non-empty texts; [`Embedder`] handles the rest.
pub trait EmbeddingModel: Send + Sync {
    /// Embed a batch of non-empty texts, one vector per input in order
    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Returns the embedding dimension
    fn dimension(&self) -> usize;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

/// A chunk paired with its embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Embedding,
}

/// Embeds text through a backend model with empty-input handling.
pub struct Embedder {
    model: Box<dyn EmbeddingModel>,
    batch_size: usize,
}

impl Embedder {
    pub fn new(model: impl EmbeddingModel + 'static) -> Self {
        Self::from_boxed(Box::new(model))
    }

    pub fn from_boxed(model: Box<dyn EmbeddingModel>) -> Self {
        Self {
            model,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Limit how many texts go to the model in one call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn dimension(&self) -> usize {
        self.model.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// The all-zero vector used for empty input.
    pub fn zero_vector(&self) -> Embedding {
        vec![0.0; self.dimension()]
    }

    /// Embed a single text.
    pub fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| Error::Embedding("model returned no embeddings".to_string()))
    }

    /// Embed many texts, preserving length and order.
    ///
    /// If any model call fails the whole batch fails.
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let dimension = self.dimension();
        let mut results = vec![None; texts.len()];

        // filter out empty texts but keep track of positions
        let (positions, non_empty): (Vec<usize>, Vec<&str>) = texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| (i, *text))
            .unzip();

        tracing::debug!(
            target: "embed",
            "embedding {} texts ({} empty) with {}",
            texts.len(),
            texts.len() - non_empty.len(),
            self.model_name()
        );

        for (batch_positions, batch) in positions
            .chunks(self.batch_size)
            .zip(non_empty.chunks(self.batch_size))
        {
            let embeddings = self.model.embed_texts(batch)?;
            if embeddings.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "model returned {} embeddings for {} texts",
                    embeddings.len(),
                    batch.len()
                )));
            }

            for (&position, embedding) in batch_positions.iter().zip(embeddings) {
                if embedding.len() != dimension {
                    return Err(Error::DimensionMismatch {
                        expected: dimension,
                        actual: embedding.len(),
                    });
                }
                results[position] = Some(embedding);
            }
        }

        Ok(results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| self.zero_vector()))
            .collect())
    }

    /// Embed chunk texts and attach each vector to its chunk, keeping order.
    pub fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embed_batch(&texts)?;

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect())
    }

    /// Cosine similarity between two embeddings, see [`cosine_similarity`].
    pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 means identical direction. A zero-norm
/// vector (or a length mismatch) has no direction and scores `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

mod hashing;
mod onnx;

pub use hashing::*;
pub use onnx::*;
