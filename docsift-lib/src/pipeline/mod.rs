//! Ingestion and retrieval orchestration
//!
//! Combines chunker, embedder and index into the two flows the rest of the
//! system uses:
//!
//! ```text
//! ingest:   Extraction -> Chunker -> Embedder::embed_chunks -> VectorIndex::add_chunks
//! retrieve: question   -> Embedder::embed -> VectorIndex::search -> ranked hits
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use docsift_lib::pipeline::Pipeline;
//!
//! let pipeline = Pipeline::new(chunker, embedder, index)?;
//! let report = pipeline.ingest(&extraction, 7, &Metadata::new());
//! let context = pipeline.retrieve("Who won the match?", 5, None)?;
//! println!("{}", context.context());
//! ```

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunker, Metadata, preview};
use crate::embed::Embedder;
use crate::extract::Extraction;
use crate::index::{IndexStats, SearchHit, VectorIndex};
use crate::{DocumentId, Error, Result};

/// Outcome of ingesting one document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    pub success: bool,
    pub chunk_count: usize,
    pub extraction_metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One document queued for [`Pipeline::ingest_many`]
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub document_id: DocumentId,
    pub extraction: Extraction,
    pub metadata: Metadata,
}

/// A retrieved chunk prepared for display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceChunk {
    pub document_id: DocumentId,
    pub text_preview: String,
    pub similarity: f32,
}

/// Hits retrieved for one question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedContext {
    pub question: String,
    pub hits: Vec<SearchHit>,
}

impl RetrievedContext {
    /// Hits joined into one prompt-ready block, best match first.
    pub fn context(&self) -> String {
        self.hits
            .iter()
            .enumerate()
            .map(|(i, hit)| format!("[Document {}]\n{}", i + 1, hit.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Hits as short previews with similarity rounded to 3 decimals.
    pub fn sources(&self, preview_chars: usize) -> Vec<SourceChunk> {
        self.hits
            .iter()
            .map(|hit| SourceChunk {
                document_id: hit.document_id,
                text_preview: preview(&hit.text, preview_chars),
                similarity: (hit.similarity * 1000.0).round() / 1000.0,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Document ingestion and retrieval over one index.
pub struct Pipeline<C: Chunker, I: VectorIndex> {
    chunker: C,
    embedder: Embedder,
    index: I,
}

impl<C: Chunker, I: VectorIndex> Pipeline<C, I> {
    /// Create a pipeline. The embedder and index must agree on dimension.
    pub fn new(chunker: C, embedder: Embedder, index: I) -> Result<Self> {
        if embedder.dimension() != index.dimension() {
            return Err(Error::DimensionMismatch {
                expected: index.dimension(),
                actual: embedder.dimension(),
            });
        }

        Ok(Self {
            chunker,
            embedder,
            index,
        })
    }

    /// Chunk, embed and index one document.
    ///
    /// Failures are reported in the returned [`IngestReport`] and leave the
    /// index untouched.
    pub fn ingest(
        &self,
        extraction: &Extraction,
        document_id: DocumentId,
        metadata: &Metadata,
    ) -> IngestReport {
        match self.try_ingest(extraction, document_id, metadata) {
            Ok(chunk_count) => IngestReport {
                success: true,
                chunk_count,
                extraction_metadata: extraction.metadata.clone(),
                error: None,
            },
            Err(e) => {
                tracing::warn!(target: "pipeline", "document {document_id} failed: {e}");
                IngestReport {
                    success: false,
                    chunk_count: 0,
                    extraction_metadata: extraction.metadata.clone(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Ingest already extracted plain text.
    pub fn ingest_text(
        &self,
        text: &str,
        document_id: DocumentId,
        metadata: &Metadata,
    ) -> IngestReport {
        self.ingest(&Extraction::ok(text, Metadata::new()), document_id, metadata)
    }

    /// Like [`ingest`](Self::ingest) but returns the typed error.
    ///
    /// Returns the number of chunks written.
    pub fn try_ingest(
        &self,
        extraction: &Extraction,
        document_id: DocumentId,
        metadata: &Metadata,
    ) -> Result<usize> {
        if !extraction.success {
            let reason = extraction
                .error
                .clone()
                .unwrap_or_else(|| "extractor reported failure".to_string());
            return Err(Error::Extraction(reason));
        }

        // extraction metadata wins over caller metadata on key clashes
        let mut chunk_metadata = metadata.clone();
        chunk_metadata.extend(extraction.metadata.clone());

        let chunks = self.chunker.chunk(&extraction.text, &chunk_metadata);
        if chunks.is_empty() {
            return Err(Error::EmptyChunkSet { document_id });
        }
        let chunk_count = chunks.len();
        tracing::debug!(target: "pipeline", "document {document_id}: {chunk_count} chunks");

        let embedded = self.embedder.embed_chunks(chunks)?;
        self.index.add_chunks(&embedded, document_id)?;

        tracing::info!(
            target: "pipeline",
            "ingested document {document_id} ({chunk_count} chunks)"
        );
        Ok(chunk_count)
    }

    /// Ingest independent documents in parallel.
    ///
    /// Each document is written as its own batch. Reports come back in
    /// request order.
    pub fn ingest_many(&self, requests: &[IngestRequest]) -> Vec<IngestReport> {
        requests
            .par_iter()
            .map(|req| self.ingest(&req.extraction, req.document_id, &req.metadata))
            .collect()
    }

    /// Search with a precomputed query embedding.
    pub fn query(
        &self,
        embedding: &[f32],
        k: usize,
        document_id: Option<DocumentId>,
    ) -> Result<Vec<SearchHit>> {
        self.index.search(embedding, k, document_id)
    }

    /// Embed a question and fetch the `k` closest chunks.
    ///
    /// A blank question is rejected with [`Error::InvalidInput`].
    pub fn retrieve(
        &self,
        question: &str,
        k: usize,
        document_id: Option<DocumentId>,
    ) -> Result<RetrievedContext> {
        if question.trim().is_empty() {
            return Err(Error::InvalidInput("question cannot be empty".to_string()));
        }

        let embedding = self.embedder.embed(question)?;
        let hits = self.query(&embedding, k, document_id)?;

        tracing::debug!(target: "pipeline", "retrieved {} chunks for question", hits.len());
        Ok(RetrievedContext {
            question: question.to_string(),
            hits,
        })
    }

    /// Remove every chunk of a document. Unknown documents are a no-op.
    pub fn delete_document(&self, document_id: DocumentId) -> Result<usize> {
        self.index.delete_document_chunks(document_id)
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// Irrecoverably clear the index.
    pub fn reset(&self) -> Result<()> {
        self.index.reset()
    }

    #[must_use]
    pub fn chunker(&self) -> &C {
        &self.chunker
    }

    #[must_use]
    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    #[must_use]
    pub fn index(&self) -> &I {
        &self.index
    }

    /// Release the index, e.g. to close a [`FileIndex`](crate::index::FileIndex).
    pub fn into_index(self) -> I {
        self.index
    }
}
