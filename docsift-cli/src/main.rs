//! docsift CLI - ingest documents and query them
//!
//! # Commands
//!
//! ```bash
//! # Chunk a document and show results
//! docsift chunk notes.txt
//!
//! # Embed text and show vector stats
//! docsift embed "Who won the 2023 Ashes?"
//!
//! # Index a file under a document id, then ask about it
//! docsift ingest notes.txt --id 1
//! docsift query "who scored" -k 3
//!
//! # Housekeeping
//! docsift stats
//! docsift delete --id 1
//! docsift reset
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use docsift_lib::{
    chunk::{Chunker, Metadata, SentenceChunker, preview},
    config::{EmbeddingBackend, Settings},
    extract::{Extraction, extract_plain_text},
    index::FileIndex,
    logging,
    pipeline::Pipeline,
};

#[derive(Parser)]
#[command(name = "docsift")]
#[command(about = "Document ingestion and semantic retrieval")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./docsift.toml)
    #[arg(long, global = true, env = "DOCSIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured embedding backend
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Fastembed,
    Hashing,
}

impl From<Backend> for EmbeddingBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Fastembed => EmbeddingBackend::Fastembed,
            Backend::Hashing => EmbeddingBackend::Hashing,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk a document and print the chunks
    Chunk {
        /// Input file to chunk
        input: PathBuf,

        /// Chunk size in characters (defaults to config)
        #[arg(long)]
        size: Option<usize>,
    },

    /// Embed text and show vector info
    Embed {
        /// Text to embed
        text: String,
    },

    /// Extract, chunk, embed and index a document
    Ingest {
        /// Input file to index
        input: PathBuf,

        /// Document id to store the chunks under
        #[arg(long)]
        id: i64,
    },

    /// Retrieve the chunks closest to a question
    Query {
        /// Question to search for
        question: String,

        /// Number of results to return
        #[arg(short)]
        k: Option<usize>,

        /// Only search chunks of this document
        #[arg(long)]
        document: Option<i64>,

        /// Print hits as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove every chunk of a document
    Delete {
        #[arg(long)]
        id: i64,
    },

    /// Show index statistics
    Stats,

    /// Clear the index
    Reset,
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(backend) = cli.backend {
        settings.embedding.backend = backend.into();
    }
    Ok(settings)
}

fn read_document(path: &Path) -> Result<Extraction> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    // pdf and docx come pre-extracted from an external tool
    match ext.as_str() {
        "txt" | "md" | "" => {
            let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            Ok(extract_plain_text(&bytes))
        }
        other => Ok(Extraction::failed(format!("unsupported file type: .{other}"))),
    }
}

fn open_pipeline(settings: &Settings) -> Result<Pipeline<SentenceChunker, FileIndex>> {
    let embedder = settings.embedding.embedder()?;
    tracing::debug!("embedding with {} ({} dims)", embedder.model_name(), embedder.dimension());

    let index = FileIndex::open(&settings.index.path, embedder.dimension())?;
    Ok(Pipeline::new(settings.chunking.chunker(), embedder, index)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Chunk { input, size } => {
            let extraction = read_document(&input)?;
            if !extraction.success {
                anyhow::bail!(extraction.error.unwrap_or_default());
            }
            let mut chunker = settings.chunking.chunker();
            if let Some(size) = size {
                chunker.chunk_size = size.max(1);
            }
            let chunks = chunker.chunk(&extraction.text, &Metadata::new());

            println!(
                "Chunked '{}' into {} chunks using {} strategy:\n",
                input.display(),
                chunks.len(),
                chunker.name()
            );
            for chunk in &chunks {
                println!(
                    "--- Chunk {} ({} chars, {} words) ---",
                    chunk.chunk_index + 1,
                    chunk.char_count,
                    chunk.word_count
                );
                println!("{}\n", chunk.preview(settings.search.preview_chars));
            }
        }

        Commands::Embed { text } => {
            println!("Loading embedding model...");
            let embedder = settings.embedding.embedder()?;
            let embedding = embedder.embed(&text)?;

            println!("\nEmbedding stats ({}):", embedder.model_name());
            println!("  Dimensions: {}", embedding.len());
            println!("  First 5 values: {:?}", embedding.iter().take(5).collect::<Vec<_>>());
            println!("  Min: {:.4}", embedding.iter().copied().fold(f32::INFINITY, f32::min));
            println!("  Max: {:.4}", embedding.iter().copied().fold(f32::NEG_INFINITY, f32::max));
        }

        Commands::Ingest { input, id } => {
            let extraction = read_document(&input)?;
            let pipeline = open_pipeline(&settings)?;

            let mut metadata = Metadata::new();
            metadata.insert("source".to_string(), input.display().to_string().into());
            let report = pipeline.ingest(&extraction, id, &metadata);

            println!("{}", serde_json::to_string_pretty(&report)?);
            pipeline.into_index().close()?;
            if !report.success {
                std::process::exit(1);
            }
        }

        Commands::Query {
            question,
            k,
            document,
            json,
        } => {
            let pipeline = open_pipeline(&settings)?;
            let k = k.unwrap_or(settings.search.default_k);
            let context = pipeline.retrieve(&question, k, document)?;

            if json {
                let sources = context.sources(settings.search.preview_chars);
                println!("{}", serde_json::to_string_pretty(&sources)?);
            } else if context.is_empty() {
                println!("No matching chunks.");
            } else {
                println!("=== Results for '{question}' ===\n");
                for (i, hit) in context.hits.iter().enumerate() {
                    println!(
                        "#{} doc {} chunk {} (score: {:.4})",
                        i + 1,
                        hit.document_id,
                        hit.chunk_index,
                        hit.similarity
                    );
                    println!("---");
                    println!("{}\n", preview(&hit.text, settings.search.preview_chars));
                }
            }
        }

        Commands::Delete { id } => {
            let pipeline = open_pipeline(&settings)?;
            let removed = pipeline.delete_document(id)?;
            println!("Removed {removed} chunks of document {id}");
            pipeline.into_index().close()?;
        }

        Commands::Stats => {
            let pipeline = open_pipeline(&settings)?;
            println!("{}", serde_json::to_string_pretty(&pipeline.stats())?);
        }

        Commands::Reset => {
            let pipeline = open_pipeline(&settings)?;
            pipeline.reset()?;
            let index = pipeline.into_index();
            println!("Index at {} cleared", index.path().display());
            index.close()?;
        }
    }

    Ok(())
}
