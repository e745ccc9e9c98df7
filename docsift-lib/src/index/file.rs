use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::embed::EmbeddedChunk;
use crate::index::{IndexEntry, IndexStats, MemoryIndex, SearchHit, VectorIndex, build_entries};
use crate::{DocumentId, Error, Result};

/// Snapshot file name inside the index directory
pub const SNAPSHOT_FILE: &str = "index.json";

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    dimension: usize,
    entries: Vec<&'a IndexEntry>,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

/// Vector index persisted to a directory.
///
/// Search runs against an in-memory copy. Every mutation first writes the
/// resulting state to disk and only then applies it in memory, so a failed
/// write leaves both the snapshot and the searchable entries unchanged.
/// Snapshots are written to a temporary file and renamed into place.
///
/// Lifecycle: [`FileIndex::open`] loads (or creates) the directory,
/// [`FileIndex::close`] writes a final snapshot and consumes the index.
pub struct FileIndex {
    dir: PathBuf,
    inner: MemoryIndex,
    // serializes persist-then-apply so snapshots land in write order
    writer: Mutex<()>,
}

impl FileIndex {
    /// Open the index stored in `dir`, creating it if needed.
    ///
    /// Fails if an existing snapshot was written with a different dimension.
    pub fn open(dir: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let path = dir.join(SNAPSHOT_FILE);
        let inner = if path.exists() {
            let data = fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&data)?;

            if snapshot.version != SNAPSHOT_VERSION {
                return Err(Error::IndexWrite(format!(
                    "unsupported snapshot version {} in {}",
                    snapshot.version,
                    path.display()
                )));
            }
            if snapshot.dimension != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    actual: snapshot.dimension,
                });
            }

            MemoryIndex::from_entries(dimension, snapshot.entries)?
        } else {
            MemoryIndex::new(dimension)
        };

        tracing::info!(
            target: "index",
            "opened index at {} ({} chunks)",
            dir.display(),
            inner.len()
        );

        Ok(Self {
            dir,
            inner,
            writer: Mutex::new(()),
        })
    }

    /// Directory holding the snapshot
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Write the current state to disk.
    pub fn flush(&self) -> Result<()> {
        let _guard = self.writer.lock();
        let json = self
            .inner
            .with_entries(|entries| self.encode(entries.values()))?;
        self.write_snapshot(&json)
    }

    /// Flush and release the index.
    pub fn close(self) -> Result<()> {
        self.flush()?;
        tracing::debug!(target: "index", "closed index at {}", self.dir.display());
        Ok(())
    }

    fn encode<'a>(&self, entries: impl Iterator<Item = &'a IndexEntry>) -> Result<Vec<u8>> {
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            dimension: self.inner.dimension(),
            entries: entries.collect(),
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }

    fn write_snapshot(&self, json: &[u8]) -> Result<()> {
        let path = self.dir.join(SNAPSHOT_FILE);
        let tmp = self.dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl VectorIndex for FileIndex {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn add_chunks(&self, chunks: &[EmbeddedChunk], document_id: DocumentId) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let batch = build_entries(chunks, document_id, self.inner.dimension())?;

        let _guard = self.writer.lock();
        let json = self.inner.with_entries(|entries| {
            let replaced: BTreeSet<&str> = batch.iter().map(|e| e.id.as_str()).collect();
            let kept = entries
                .values()
                .filter(|entry| !replaced.contains(entry.id.as_str()));
            self.encode(kept.chain(batch.iter()))
        })?;
        self.write_snapshot(&json)?;

        self.inner.insert_batch(document_id, batch);
        Ok(())
    }

    fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        document_id: Option<DocumentId>,
    ) -> Result<Vec<SearchHit>> {
        self.inner.search(query_embedding, k, document_id)
    }

    fn delete_document_chunks(&self, document_id: DocumentId) -> Result<usize> {
        let _guard = self.writer.lock();
        let (json, removed) = self.inner.with_entries(|entries| -> Result<_> {
            let removed = entries
                .values()
                .filter(|entry| entry.metadata.document_id == document_id)
                .count();
            if removed == 0 {
                return Ok((None, 0));
            }
            let kept = entries
                .values()
                .filter(|entry| entry.metadata.document_id != document_id);
            Ok((Some(self.encode(kept)?), removed))
        })?;

        if let Some(json) = json {
            self.write_snapshot(&json)?;
            self.inner.delete_document_chunks(document_id)?;
        }
        Ok(removed)
    }

    fn stats(&self) -> IndexStats {
        self.inner.stats()
    }

    fn reset(&self) -> Result<()> {
        let _guard = self.writer.lock();
        let json = self.encode(std::iter::empty())?;
        self.write_snapshot(&json)?;
        self.inner.reset()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::chunk::{Chunk, Metadata};

    fn chunks(texts: &[&str]) -> Vec<EmbeddedChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| EmbeddedChunk {
                chunk: Chunk::new(text.to_string(), i, Metadata::new()),
                embedding: vec![1.0, i as f32],
            })
            .collect()
    }

    #[test]
    fn test_open_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("index");

        let index = FileIndex::open(&dir, 2).unwrap();
        assert!(dir.is_dir());
        assert_eq!(index.path(), dir.as_path());
        assert!(index.is_empty());
    }

    #[test]
    fn test_entries_survive_reopen() {
        let tmp = TempDir::new().unwrap();

        let index = FileIndex::open(tmp.path(), 2).unwrap();
        index.add_chunks(&chunks(&["first", "second"]), 3).unwrap();
        index.close().unwrap();

        let reopened = FileIndex::open(tmp.path(), 2).unwrap();
        assert_eq!(reopened.len(), 2);

        let hits = reopened.search(&[1.0, 0.0], 1, Some(3)).unwrap();
        assert_eq!(hits[0].text, "first");
        assert_eq!(hits[0].id, "doc_3_chunk_0");
    }

    #[test]
    fn test_every_write_is_persisted() {
        let tmp = TempDir::new().unwrap();

        let index = FileIndex::open(tmp.path(), 2).unwrap();
        index.add_chunks(&chunks(&["a"]), 1).unwrap();
        index.add_chunks(&chunks(&["b"]), 2).unwrap();
        index.delete_document_chunks(1).unwrap();

        // no close: the snapshot already reflects the last write
        let reopened = FileIndex::open(tmp.path(), 2).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.search(&[1.0, 0.0], 5, Some(1)).unwrap().is_empty());
    }

    #[test]
    fn test_reset_is_persisted() {
        let tmp = TempDir::new().unwrap();

        let index = FileIndex::open(tmp.path(), 2).unwrap();
        index.add_chunks(&chunks(&["a", "b"]), 1).unwrap();
        index.reset().unwrap();
        drop(index);

        assert!(FileIndex::open(tmp.path(), 2).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_on_open() {
        let tmp = TempDir::new().unwrap();

        let index = FileIndex::open(tmp.path(), 2).unwrap();
        index.add_chunks(&chunks(&["a"]), 1).unwrap();
        index.close().unwrap();

        let result = FileIndex::open(tmp.path(), 384);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { expected: 384, actual: 2 })
        ));
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(SNAPSHOT_FILE), "not json").unwrap();

        assert!(matches!(FileIndex::open(tmp.path(), 2), Err(Error::IndexWrite(_))));
    }

    #[test]
    fn test_non_finite_metadata_never_reaches_disk() {
        let tmp = TempDir::new().unwrap();
        let index = FileIndex::open(tmp.path(), 2).unwrap();
        index.add_chunks(&chunks(&["good"]), 1).unwrap();

        let mut meta = Metadata::new();
        meta.insert("score".to_string(), f64::INFINITY.into());
        let bad = vec![EmbeddedChunk {
            chunk: Chunk::new("bad".to_string(), 0, meta),
            embedding: vec![1.0, 0.0],
        }];
        assert!(matches!(index.add_chunks(&bad, 2), Err(Error::InvalidInput(_))));
        index.close().unwrap();

        let reopened = FileIndex::open(tmp.path(), 2).unwrap();
        assert_eq!(reopened.len(), 1);
    }

    fn block_snapshot_writes(dir: &Path) {
        fs::create_dir(dir.join(format!("{SNAPSHOT_FILE}.tmp"))).unwrap();
    }

    fn unblock_snapshot_writes(dir: &Path) {
        fs::remove_dir(dir.join(format!("{SNAPSHOT_FILE}.tmp"))).unwrap();
    }

    #[test]
    fn test_failed_add_leaves_index_unchanged() {
        let tmp = TempDir::new().unwrap();
        let index = FileIndex::open(tmp.path(), 2).unwrap();
        index.add_chunks(&chunks(&["kept"]), 1).unwrap();

        block_snapshot_writes(tmp.path());
        let result = index.add_chunks(&chunks(&["lost"]), 2);
        assert!(matches!(result, Err(Error::IndexWrite(_))));
        assert_eq!(index.len(), 1);
        assert!(index.search(&[1.0, 0.0], 5, Some(2)).unwrap().is_empty());

        // the next successful write must not resurrect the failed batch
        unblock_snapshot_writes(tmp.path());
        index.add_chunks(&chunks(&["later"]), 3).unwrap();
        drop(index);

        let reopened = FileIndex::open(tmp.path(), 2).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.search(&[1.0, 0.0], 5, Some(2)).unwrap().is_empty());
    }

    #[test]
    fn test_failed_delete_and_reset_leave_index_unchanged() {
        let tmp = TempDir::new().unwrap();
        let index = FileIndex::open(tmp.path(), 2).unwrap();
        index.add_chunks(&chunks(&["a", "b"]), 1).unwrap();

        block_snapshot_writes(tmp.path());
        assert!(index.delete_document_chunks(1).is_err());
        assert!(index.reset().is_err());
        assert_eq!(index.len(), 2);
        assert_eq!(index.search(&[1.0, 0.0], 5, Some(1)).unwrap().len(), 2);

        // nothing to delete means nothing to write
        assert_eq!(index.delete_document_chunks(9).unwrap(), 0);
    }

    #[test]
    fn test_overwrite_is_persisted_without_duplicates() {
        let tmp = TempDir::new().unwrap();
        let index = FileIndex::open(tmp.path(), 2).unwrap();
        index.add_chunks(&chunks(&["old first", "old second"]), 1).unwrap();
        index.add_chunks(&chunks(&["new first"]), 1).unwrap();
        drop(index);

        let reopened = FileIndex::open(tmp.path(), 2).unwrap();
        assert_eq!(reopened.len(), 2);
        let hits = reopened.search(&[1.0, 0.0], 5, Some(1)).unwrap();
        assert!(hits.iter().any(|hit| hit.text == "new first"));
        assert!(hits.iter().all(|hit| hit.text != "old first"));
    }
}
