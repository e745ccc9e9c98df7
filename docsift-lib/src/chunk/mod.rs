//! Document chunking
//!
//! Extracted text is split into overlapping, size-bounded chunks before
//! embedding. Chunks keep their position (`chunk_index`) so ordering survives
//! all the way into the index.
//!
//! # Implementing a Chunker
//!
//! ```ignore
//! use docsift_lib::chunk::{Chunker, Chunk, Metadata};
//!
//! struct MyChunker { /* ... */ }
//!
//! impl Chunker for MyChunker {
//!     fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
//!         // Your chunking logic here
//!         todo!()
//!     }
//!
//!     fn name(&self) -> &str {
//!         "mine"
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Flat metadata map attached to chunks and index entries
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A single metadata value
///
/// Metadata stays flat: only scalars are allowed so entries can be filtered
/// and persisted without nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    /// False for NaN and infinite floats, which JSON cannot represent.
    pub fn is_finite(&self) -> bool {
        match self {
            MetadataValue::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(v) => write!(f, "{v}"),
            MetadataValue::Int(v) => write!(f, "{v}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Int(v)
    }
}

impl From<usize> for MetadataValue {
    fn from(v: usize) -> Self {
        MetadataValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Text(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Text(v)
    }
}

/// A chunk of text with its derived counts and metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The text content of this chunk
    pub text: String,
    /// Position within the source document (0-indexed)
    pub chunk_index: usize,
    /// Length of `text` in characters
    pub char_count: usize,
    /// Number of whitespace separated words in `text`
    pub word_count: usize,
    /// Copy of the caller supplied metadata
    pub metadata: Metadata,
}

impl Chunk {
    /// Build a chunk, deriving its character and word counts from `text`.
    pub fn new(text: String, chunk_index: usize, metadata: Metadata) -> Self {
        Self {
            char_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
            text,
            chunk_index,
            metadata,
        }
    }

    /// Short preview of the chunk text, truncated to `max_chars` characters.
    pub fn preview(&self, max_chars: usize) -> String {
        preview(&self.text, max_chars)
    }
}

/// Truncate `text` to `max_chars` characters, appending `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}

/// Trait for document chunking strategies
pub trait Chunker: Send + Sync {
    /// Split text into chunks
    ///
    /// # Arguments
    /// * `text` - The extracted document text
    /// * `metadata` - Metadata copied onto every chunk
    ///
    /// # Returns
    /// Chunks numbered sequentially from 0. Empty or whitespace-only input
    /// yields no chunks.
    fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk>;

    /// Returns the name of this chunking strategy
    fn name(&self) -> &str;
}

mod sentence;

pub use sentence::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_derived_from_text() {
        let chunk = Chunk::new("two words".to_string(), 3, Metadata::new());
        assert_eq!(chunk.char_count, 9);
        assert_eq!(chunk.word_count, 2);
        assert_eq!(chunk.chunk_index, 3);
    }

    #[test]
    fn test_char_count_is_not_bytes() {
        let chunk = Chunk::new("héllo wörld".to_string(), 0, Metadata::new());
        assert_eq!(chunk.char_count, 11);
    }

    #[test]
    fn test_preview_short_text_unchanged() {
        assert_eq!(preview("short", 100), "short");
    }

    #[test]
    fn test_preview_truncates_with_ellipsis() {
        let chunk = Chunk::new("abcdefghij".to_string(), 0, Metadata::new());
        assert_eq!(chunk.preview(4), "abcd...");
    }

    #[test]
    fn test_metadata_value_untagged_json() {
        let mut meta = Metadata::new();
        meta.insert("pages".to_string(), 3_i64.into());
        meta.insert("source".to_string(), "a.txt".into());

        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"pages":3,"source":"a.txt"}"#);

        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_metadata_value_finiteness() {
        assert!(MetadataValue::from(1.5).is_finite());
        assert!(MetadataValue::from("nan").is_finite());
        assert!(!MetadataValue::from(f64::NAN).is_finite());
        assert!(!MetadataValue::from(f64::NEG_INFINITY).is_finite());
    }
}
