use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;

use crate::embed::{cosine_similarity, EmbeddedChunk};
use crate::index::{build_entries, IndexEntry, IndexStats, SearchHit, VectorIndex};
use crate::{DocumentId, Error, Result};

/// In-memory vector index.
///
/// Uses brute-force cosine similarity search. Suitable for small datasets
/// (< 100k chunks). Entries are kept ordered by id, so iteration and search
/// tie-breaks are deterministic.
pub struct MemoryIndex {
    dimension: usize,
    entries: RwLock<BTreeMap<String, IndexEntry>>,
}

impl MemoryIndex {
    /// Create a new empty in-memory index.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Rebuild an index from previously stored entries.
    pub(crate) fn from_entries(dimension: usize, entries: Vec<IndexEntry>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for entry in entries {
            if entry.embedding.len() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    actual: entry.embedding.len(),
                });
            }
            map.insert(entry.id.clone(), entry);
        }

        Ok(Self {
            dimension,
            entries: RwLock::new(map),
        })
    }

    /// Run `f` over all entries under the read lock.
    pub(crate) fn with_entries<R>(&self, f: impl FnOnce(&BTreeMap<String, IndexEntry>) -> R) -> R {
        f(&self.entries.read())
    }

    /// Insert an already validated batch under a single write lock.
    pub(crate) fn insert_batch(&self, document_id: DocumentId, batch: Vec<IndexEntry>) {
        let count = batch.len();

        let mut entries = self.entries.write();
        for entry in batch {
            entries.insert(entry.id.clone(), entry);
        }

        tracing::info!(
            target: "index",
            "added {count} chunks for document {document_id} (total: {})",
            entries.len()
        );
    }
}

impl VectorIndex for MemoryIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn add_chunks(&self, chunks: &[EmbeddedChunk], document_id: DocumentId) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        // validate the whole batch before taking the write lock
        let batch = build_entries(chunks, document_id, self.dimension)?;
        self.insert_batch(document_id, batch);
        Ok(())
    }

    fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        document_id: Option<DocumentId>,
    ) -> Result<Vec<SearchHit>> {
        if query_embedding.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query_embedding.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read();
        let mut hits: Vec<SearchHit> = entries
            .values()
            .filter(|entry| document_id.is_none_or(|id| entry.metadata.document_id == id))
            .map(|entry| SearchHit {
                id: entry.id.clone(),
                document_id: entry.metadata.document_id,
                chunk_index: entry.metadata.chunk_index,
                text: entry.text.clone(),
                similarity: cosine_similarity(query_embedding, &entry.embedding),
            })
            .collect();
        drop(entries);

        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);

        Ok(hits)
    }

    fn delete_document_chunks(&self, document_id: DocumentId) -> Result<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.metadata.document_id != document_id);
        let removed = before - entries.len();

        if removed > 0 {
            tracing::info!(target: "index", "deleted {removed} chunks for document {document_id}");
        } else {
            tracing::debug!(target: "index", "no chunks found for document {document_id}");
        }
        Ok(removed)
    }

    fn stats(&self) -> IndexStats {
        let entries = self.entries.read();
        let documents: BTreeSet<DocumentId> =
            entries.values().map(|e| e.metadata.document_id).collect();

        IndexStats {
            total_chunks: entries.len(),
            document_count: documents.len(),
            dimension: self.dimension,
            sample_metadata_keys: entries
                .values()
                .next()
                .map(|e| e.metadata.keys())
                .unwrap_or_default(),
        }
    }

    fn reset(&self) -> Result<()> {
        self.entries.write().clear();
        tracing::info!(target: "index", "index reset");
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}
