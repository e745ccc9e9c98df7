use sha2::{Digest, Sha256};

use crate::embed::{Embedding, EmbeddingModel};
use crate::Result;

/// Feature-hashing embedder backend.
///
/// Lowercased word unigrams and bigrams are hashed into a fixed number of
/// signed buckets and the result is L2-normalized. Texts sharing vocabulary
/// score higher under cosine similarity. Output is fully deterministic and
/// needs no model download, which makes it the backend of choice for tests
/// and offline runs.
#[derive(Debug, Clone)]
pub struct HashingModel {
    dimension: usize,
}

impl HashingModel {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimension];

        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        for word in &words {
            self.add_feature(&mut vector, word, 1.0);
        }
        for pair in words.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(bytes);

        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl EmbeddingModel for HashingModel {
    fn model_name(&self) -> &str {
        "feature-hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::cosine_similarity;

    #[test]
    fn test_deterministic() {
        let model = HashingModel::new(64);
        let a = model.embed_texts(&["same input text"]).unwrap();
        let b = model.embed_texts(&["same input text"]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unit_norm() {
        let model = HashingModel::new(64);
        let v = &model.embed_texts(&["normalize me please"]).unwrap()[0];
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_insensitive() {
        let model = HashingModel::new(64);
        let v = model.embed_texts(&["Rust Vectors", "rust vectors"]).unwrap();
        assert_eq!(v[0], v[1]);
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let model = HashingModel::new(256);
        let v = model
            .embed_texts(&[
                "the cat sat on the mat",
                "a cat sat on a mat",
                "quarterly revenue grew strongly",
            ])
            .unwrap();

        assert!(cosine_similarity(&v[0], &v[1]) > cosine_similarity(&v[0], &v[2]));
    }

    #[test]
    fn test_punctuation_only_is_zero() {
        let model = HashingModel::new(16);
        let v = &model.embed_texts(&["... !!"]).unwrap()[0];
        assert_eq!(v.len(), 16);
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
