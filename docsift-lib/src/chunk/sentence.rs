use std::sync::LazyLock;

use regex::Regex;

use crate::chunk::{Chunk, Chunker, Metadata};

/// Default chunk budget in characters
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default number of trailing sentences carried into the next chunk
pub const DEFAULT_OVERLAP_SENTENCES: usize = 2;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--- Page \d+ ---").expect("page marker pattern is valid"));

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("sentence boundary pattern is valid"));

/// Sentence chunker - packs whole sentences into size-bounded chunks
///
/// Sentences are accumulated greedily while the joined text stays within
/// `chunk_size` characters. When a chunk closes, the next one is seeded with
/// the trailing `overlap_sentences` sentences of the closed chunk so that
/// neighbouring chunks share context.
///
/// A sentence is never split: one that is longer than `chunk_size` becomes a
/// chunk on its own.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    pub chunk_size: usize,
    pub overlap_sentences: usize,
}

impl SentenceChunker {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            overlap_sentences: DEFAULT_OVERLAP_SENTENCES,
        }
    }

    pub fn with_overlap(mut self, overlap_sentences: usize) -> Self {
        self.overlap_sentences = overlap_sentences;
        self
    }

    /// Pick the sentences that open the chunk after `closed`.
    ///
    /// Leading overlap sentences are dropped until the overlap plus `next_len`
    /// fits the budget, so only single-sentence chunks can ever exceed it.
    fn overlap<'a>(&self, closed: &[&'a str], next_len: usize) -> Vec<&'a str> {
        let take = self.overlap_sentences;
        if take == 0 || closed.len() < take {
            return Vec::new();
        }

        let mut seed = closed[closed.len() - take..].to_vec();
        while !seed.is_empty() && joined_len(&seed) + 1 + next_len > self.chunk_size {
            seed.remove(0);
        }
        seed
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl Chunker for SentenceChunker {
    fn name(&self) -> &str {
        "sentence"
    }

    fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let cleaned = clean_text(text);
        let sentences = split_sentences(&cleaned);

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0;

        for sentence in sentences {
            let len = sentence.chars().count();

            // close the chunk once the next sentence would overflow it
            if !current.is_empty() && current_len + 1 + len > self.chunk_size {
                chunks.push(Chunk::new(current.join(" "), chunks.len(), metadata.clone()));
                current = self.overlap(&current, len);
                current_len = joined_len(&current);
            }

            if !current.is_empty() {
                current_len += 1;
            }
            current_len += len;
            current.push(sentence);
        }

        // flush trailing chunk
        if !current.is_empty() {
            chunks.push(Chunk::new(current.join(" "), chunks.len(), metadata.clone()));
        }

        tracing::debug!(
            target: "chunk",
            "split {} chars into {} chunks",
            cleaned.len(),
            chunks.len()
        );
        chunks
    }
}

/// Collapse whitespace runs and drop page-break markers.
pub fn clean_text(text: &str) -> String {
    let without_markers = PAGE_MARKER.replace_all(text, " ");
    WHITESPACE
        .replace_all(&without_markers, " ")
        .trim()
        .to_string()
}

/// Split normalized text after `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_END.find_iter(text) {
        // punctuation is a single ASCII byte
        let end = boundary.start() + 1;
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = boundary.end();
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Character length of sentences joined by single spaces.
fn joined_len(sentences: &[&str]) -> usize {
    if sentences.is_empty() {
        return 0;
    }
    sentences.iter().map(|s| s.chars().count()).sum::<usize>() + sentences.len() - 1
}
