//! Error types for docsift

use thiserror::Error;

use crate::DocumentId;

/// Result type alias for docsift operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur anywhere in the ingestion and retrieval pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// The upstream extractor could not produce text
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Chunking produced nothing from non-empty text
    #[error("no chunks generated from document {document_id}")]
    EmptyChunkSet { document_id: DocumentId },

    /// Failed to load or run the embedding model
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Failed to write to or read from the vector index
    #[error("index write error: {0}")]
    IndexWrite(String),

    /// A vector did not have the configured dimension
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Configuration could not be loaded or is invalid
    #[error("config error: {0}")]
    Config(String),

    /// Invalid input provided
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IndexWrite(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::IndexWrite(e.to_string())
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Error::Config(e.to_string())
    }
}
