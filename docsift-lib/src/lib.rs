//! docsift - document ingestion and semantic retrieval
//!
//! # Architecture
//!
//! ```text
//! Extraction -> Chunker -> Embedder -> VectorIndex
//!                                          |
//! Question -> Embedder -> search <---------+
//!                           |
//!                      ranked chunks
//! ```
//!
//! [`pipeline::Pipeline`] wires the stages together.
//!
//! # Example
//!
//! ```ignore
//! use docsift_lib::chunk::{Metadata, SentenceChunker};
//! use docsift_lib::embed::{Embedder, FastEmbedModel};
//! use docsift_lib::index::MemoryIndex;
//! use docsift_lib::pipeline::Pipeline;
//!
//! let embedder = Embedder::new(FastEmbedModel::new()?);
//! let index = MemoryIndex::new(embedder.dimension());
//! let pipeline = Pipeline::new(SentenceChunker::default(), embedder, index)?;
//!
//! // Index a document
//! let report = pipeline.ingest_text(&document, 1, &Metadata::new());
//!
//! // Search
//! let context = pipeline.retrieve("Who won the match?", 5, None)?;
//! ```

pub mod chunk;
pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod index;
pub mod logging;
pub mod pipeline;

pub use error::{Error, Result};

/// Caller-assigned document identifier
pub type DocumentId = i64;
