//! Layered configuration.
//!
//! Settings are resolved in order, later layers winning:
//! - built-in defaults
//! - TOML file (`docsift.toml` in the working directory, or an explicit path)
//! - environment variables
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `DOCSIFT_` and use double
//! underscores to separate nested levels:
//! - `DOCSIFT_CHUNKING__CHUNK_SIZE=300` sets `chunking.chunk_size`
//! - `DOCSIFT_EMBEDDING__BACKEND=hashing` sets `embedding.backend`
//! - `DOCSIFT_INDEX__PATH=/tmp/idx` sets `index.path`

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::chunk::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP_SENTENCES, SentenceChunker};
use crate::embed::{DEFAULT_BATCH_SIZE, DEFAULT_MODEL, Embedder, FastEmbedModel, HashingModel};
use crate::{Error, Result};

/// Default config file looked up in the working directory
pub const CONFIG_FILE: &str = "docsift.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DOCSIFT_";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for sentence chunking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Trailing sentences repeated at the start of the next chunk
    #[serde(default = "default_overlap_sentences")]
    pub overlap_sentences: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_overlap_sentences() -> usize {
    DEFAULT_OVERLAP_SENTENCES
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap_sentences: default_overlap_sentences(),
        }
    }
}

impl ChunkingConfig {
    pub fn chunker(&self) -> SentenceChunker {
        SentenceChunker::new(self.chunk_size).with_overlap(self.overlap_sentences)
    }
}

/// Which embedding backend to load
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// ONNX model through fastembed
    #[default]
    Fastembed,
    /// Deterministic feature hashing
    Hashing,
}

/// Configuration for the embedding model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    /// Model name (fastembed backend)
    #[serde(default = "default_model")]
    pub model: String,

    /// Vector dimension (hashing backend; fastembed measures the model)
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Texts per model call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: default_model(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
        }
    }
}

impl EmbeddingConfig {
    /// Load the configured backend.
    pub fn embedder(&self) -> Result<Embedder> {
        let embedder = match self.backend {
            EmbeddingBackend::Fastembed => {
                Embedder::new(FastEmbedModel::with_model_name(&self.model)?)
            }
            EmbeddingBackend::Hashing => Embedder::new(HashingModel::new(self.dimension)),
        };
        Ok(embedder.with_batch_size(self.batch_size))
    }
}

/// Configuration for index storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexConfig {
    /// Directory holding the index snapshot
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

fn default_index_path() -> PathBuf {
    PathBuf::from(".docsift/index")
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

/// Configuration for retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Results returned when the caller does not ask for a count
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Characters shown in source previews
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

fn default_k() -> usize {
    5
}

fn default_preview_chars() -> usize {
    200
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            preview_chars: default_preview_chars(),
        }
    }
}

/// Log levels, overridden by `RUST_LOG` when set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default level for all modules
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `index = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from defaults, `docsift.toml` and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration using a specific TOML file (missing files are skipped)
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let settings: Settings = Self::figment(path.as_ref()).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be greater than 0".to_string()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::Config("embedding.dimension must be greater than 0".to_string()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding.batch_size must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Config(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, toml_string).map_err(|e| Error::Config(e.to_string()))?;
        Ok(())
    }
}
