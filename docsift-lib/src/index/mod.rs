//! Vector index backends
//!
//! An index stores one entry per chunk: the embedding, the chunk text and a
//! flat metadata map that always carries `document_id` and `chunk_index`.
//! Entries are keyed `doc_{document_id}_chunk_{position}`, where `position`
//! is the chunk's position in the batch it was inserted with.
//!
//! # Backends
//!
//! - [`MemoryIndex`]: brute-force cosine search behind a reader/writer lock
//! - [`FileIndex`]: a `MemoryIndex` persisted as a JSON snapshot on disk
//!
//! # Usage
//!
//! ```ignore
//! use docsift_lib::index::{MemoryIndex, VectorIndex};
//!
//! let index = MemoryIndex::new(384);
//!
//! // Insert one document's embedded chunks as a single batch
//! index.add_chunks(&embedded, 7)?;
//!
//! // Search across everything, or within one document
//! let hits = index.search(&query_embedding, 5, None)?;
//! let hits = index.search(&query_embedding, 5, Some(7))?;
//!
//! index.delete_document_chunks(7)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::chunk::Metadata;
use crate::embed::{EmbeddedChunk, Embedding};
use crate::{DocumentId, Error, Result};

/// Metadata keys owned by the index, never taken from caller metadata
pub const RESERVED_KEYS: [&str; 4] = ["document_id", "chunk_index", "char_count", "word_count"];

/// Flat metadata stored with every entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryMetadata {
    pub document_id: DocumentId,
    pub chunk_index: usize,
    pub char_count: usize,
    pub word_count: usize,
    /// Caller and extraction metadata merged in
    #[serde(flatten)]
    pub extra: Metadata,
}

impl EntryMetadata {
    /// All metadata keys, reserved keys first.
    pub fn keys(&self) -> Vec<String> {
        RESERVED_KEYS
            .iter()
            .map(|k| k.to_string())
            .chain(self.extra.keys().cloned())
            .collect()
    }
}

/// A stored chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub embedding: Embedding,
    pub text: String,
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    /// Build the entry for the chunk at `position` in a document's batch.
    pub fn from_chunk(embedded: &EmbeddedChunk, document_id: DocumentId, position: usize) -> Self {
        let chunk = &embedded.chunk;

        let mut extra = chunk.metadata.clone();
        for key in RESERVED_KEYS {
            if extra.remove(key).is_some() {
                tracing::warn!(
                    target: "index",
                    "ignoring reserved metadata key '{key}' on document {document_id}"
                );
            }
        }

        Self {
            id: entry_id(document_id, position),
            embedding: embedded.embedding.clone(),
            text: chunk.text.clone(),
            metadata: EntryMetadata {
                document_id,
                chunk_index: chunk.chunk_index,
                char_count: chunk.char_count,
                word_count: chunk.word_count,
                extra,
            },
        }
    }
}

/// Deterministic entry id for the chunk at `position` of a document's batch.
pub fn entry_id(document_id: DocumentId, position: usize) -> String {
    format!("doc_{document_id}_chunk_{position}")
}

/// Turn a document's embedded chunks into entries, failing the whole batch
/// if any embedding has the wrong dimension or any metadata value cannot be
/// stored.
pub(crate) fn build_entries(
    chunks: &[EmbeddedChunk],
    document_id: DocumentId,
    dimension: usize,
) -> Result<Vec<IndexEntry>> {
    chunks
        .iter()
        .enumerate()
        .map(|(position, embedded)| {
            if embedded.embedding.len() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    actual: embedded.embedding.len(),
                });
            }
            let metadata = &embedded.chunk.metadata;
            if let Some((key, value)) = metadata.iter().find(|(_, v)| !v.is_finite()) {
                return Err(Error::InvalidInput(format!(
                    "metadata '{key}' of document {document_id} is not a finite number: {value}"
                )));
            }
            Ok(IndexEntry::from_chunk(embedded, document_id, position))
        })
        .collect()
}

/// A search result with similarity score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    /// Entry id
    pub id: String,
    /// Owning document
    pub document_id: DocumentId,
    /// Position of the chunk within its document
    pub chunk_index: usize,
    /// The matched chunk text
    pub text: String,
    /// Cosine similarity to the query: -1.0 to 1.0, higher is more similar
    pub similarity: f32,
}

/// Summary of index contents
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexStats {
    pub total_chunks: usize,
    pub document_count: usize,
    pub dimension: usize,
    /// Metadata keys of one sample entry, empty when the index is empty
    pub sample_metadata_keys: Vec<String>,
}

/// Trait for vector index backends
///
/// Writes for one document land atomically: concurrent readers see either
/// none or all of a batch.
pub trait VectorIndex: Send + Sync {
    /// Dimension every stored embedding must have
    fn dimension(&self) -> usize;

    /// Insert one document's chunks as a single batch
    ///
    /// Entry ids are `doc_{document_id}_chunk_{i}` for the chunk at position
    /// `i`. Existing entries with the same id are overwritten; other
    /// documents are never touched. No-op for an empty slice.
    fn add_chunks(&self, chunks: &[EmbeddedChunk], document_id: DocumentId) -> Result<()>;

    /// Search for the `k` entries most similar to `query_embedding`
    ///
    /// # Arguments
    /// * `query_embedding` - The query vector
    /// * `k` - Maximum number of results
    /// * `document_id` - Only consider entries of this document
    ///
    /// # Returns
    /// Results sorted by similarity (highest first). Empty when nothing
    /// matches.
    fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        document_id: Option<DocumentId>,
    ) -> Result<Vec<SearchHit>>;

    /// Remove every entry of a document, returning how many were removed
    fn delete_document_chunks(&self, document_id: DocumentId) -> Result<usize>;

    /// Summary of index contents
    fn stats(&self) -> IndexStats;

    /// Irrecoverably remove all entries
    fn reset(&self) -> Result<()>;

    /// Get total number of stored entries
    fn len(&self) -> usize;

    /// Check if index is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

mod file;
mod memory;

pub use file::*;
pub use memory::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;

    fn embedded(text: &str, index: usize, metadata: Metadata) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk::new(text.to_string(), index, metadata),
            embedding: vec![1.0, 0.0],
        }
    }

    #[test]
    fn test_entry_id_format() {
        assert_eq!(entry_id(7, 0), "doc_7_chunk_0");
        assert_eq!(entry_id(42, 13), "doc_42_chunk_13");
    }

    #[test]
    fn test_entry_metadata_merges_caller_metadata() {
        let mut meta = Metadata::new();
        meta.insert("source".to_string(), "notes.txt".into());
        meta.insert("pages".to_string(), 3_i64.into());

        let entry = IndexEntry::from_chunk(&embedded("hello world", 2, meta), 9, 2);

        assert_eq!(entry.id, "doc_9_chunk_2");
        assert_eq!(entry.metadata.document_id, 9);
        assert_eq!(entry.metadata.chunk_index, 2);
        assert_eq!(entry.metadata.char_count, 11);
        assert_eq!(entry.metadata.word_count, 2);
        assert_eq!(entry.metadata.extra.len(), 2);
    }

    #[test]
    fn test_non_finite_metadata_rejects_batch() {
        let mut bad = Metadata::new();
        bad.insert("score".to_string(), f64::NAN.into());
        let batch = vec![
            embedded("fine", 0, Metadata::new()),
            embedded("broken", 1, bad),
        ];

        let result = build_entries(&batch, 3, 2);
        assert!(matches!(result, Err(Error::InvalidInput(msg)) if msg.contains("score")));

        let mut ok = Metadata::new();
        ok.insert("score".to_string(), 0.5.into());
        assert!(build_entries(&[embedded("fine", 0, ok)], 3, 2).is_ok());
    }

    #[test]
    fn test_reserved_keys_not_overridden() {
        let mut meta = Metadata::new();
        meta.insert("document_id".to_string(), 999_i64.into());
        meta.insert("chunk_index".to_string(), "bogus".into());

        let entry = IndexEntry::from_chunk(&embedded("text", 0, meta), 1, 0);

        assert_eq!(entry.metadata.document_id, 1);
        assert_eq!(entry.metadata.chunk_index, 0);
        assert!(entry.metadata.extra.is_empty());
    }

    #[test]
    fn test_metadata_serializes_flat() {
        let mut meta = Metadata::new();
        meta.insert("source".to_string(), "a.txt".into());
        let entry = IndexEntry::from_chunk(&embedded("text", 0, meta), 5, 0);

        let json = serde_json::to_value(&entry.metadata).unwrap();
        assert_eq!(json["document_id"], 5);
        assert_eq!(json["chunk_index"], 0);
        assert_eq!(json["source"], "a.txt");

        let back: EntryMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry.metadata);
    }

    #[test]
    fn test_metadata_keys() {
        let mut meta = Metadata::new();
        meta.insert("lines".to_string(), 4_i64.into());
        let entry = IndexEntry::from_chunk(&embedded("text", 0, meta), 5, 0);

        assert_eq!(
            entry.metadata.keys(),
            vec!["document_id", "chunk_index", "char_count", "word_count", "lines"]
        );
    }

    #[test]
    fn test_build_entries_rejects_wrong_dimension() {
        let mut chunks = vec![embedded("a", 0, Metadata::new()), embedded("b", 1, Metadata::new())];
        chunks[1].embedding = vec![1.0, 0.0, 0.0];

        let result = build_entries(&chunks, 1, 2);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }
}
