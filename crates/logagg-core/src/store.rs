//! Store: storage capabilities and their implementations.
//!
//! The aggregator only knows [`LogSink`]; read-side consumers only know
//! [`Snapshot`]. [`MemoryStore`] implements both and is the default store.
//! [`JsonlStore`] additionally appends every record to a JSON Lines file.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::Record;

/// Destination for records drained by the aggregator's workers.
///
/// Implementations must be safe to call from many workers at once.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Persist one record.
    async fn store(&self, record: Record) -> Result<(), StoreError>;

    /// Short backend name for logging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Read-side capability: a consistent copy of everything stored so far.
pub trait Snapshot: Send + Sync {
    /// Return every stored record in insertion order.
    ///
    /// The copy is taken atomically with respect to concurrent writes.
    fn snapshot(&self) -> Vec<Record>;

    /// Number of stored records. Override when counting is cheaper than
    /// copying.
    fn len(&self) -> usize {
        self.snapshot().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Append-only in-memory log.
///
/// Writers take the write lock for the duration of one `push`; readers clone
/// under the read lock, so a snapshot never sees a half-appended record.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&self, record: Record) {
        // A panic elsewhere cannot leave the Vec half-pushed, so a poisoned
        // lock still guards valid data.
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}

#[async_trait]
impl LogSink for MemoryStore {
    async fn store(&self, record: Record) -> Result<(), StoreError> {
        self.append(record);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl Snapshot for MemoryStore {
    fn snapshot(&self) -> Vec<Record> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn len(&self) -> usize {
        MemoryStore::len(self)
    }
}

// ---------------------------------------------------------------------------
// JsonlStore
// ---------------------------------------------------------------------------

/// Sink that appends each record as one JSON line to a file.
///
/// Records are mirrored into a [`MemoryStore`] once the line has been
/// written, so the HTTP view can read from the same sink.
///
/// Each line is written on the blocking pool and runs to completion even if
/// the `store` future is dropped, so a store timeout never leaves half a line
/// in the file. A write that fails part way is truncated back off.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    file: Arc<Mutex<File>>,
    mirror: Arc<MemoryStore>,
}

impl JsonlStore {
    /// Open `path` for appending, creating it if necessary.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?
            .into_std()
            .await;
        tracing::debug!(path = %path.display(), "opened jsonl store");
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
            mirror: Arc::new(MemoryStore::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.mirror.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirror.is_empty()
    }
}

#[async_trait]
impl LogSink for JsonlStore {
    async fn store(&self, record: Record) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let file = Arc::clone(&self.file);
        let mirror = Arc::clone(&self.mirror);
        tokio::task::spawn_blocking(move || {
            // Held across the mirror append so file order and memory order agree.
            let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
            append_line(&mut file, &line)?;
            mirror.append(record);
            Ok::<(), StoreError>(())
        })
        .await
        .map_err(|err| StoreError::Io(std::io::Error::other(err)))?
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

impl Snapshot for JsonlStore {
    fn snapshot(&self) -> Vec<Record> {
        self.mirror.snapshot()
    }

    fn len(&self) -> usize {
        self.mirror.len()
    }
}

/// Append one full line or nothing.
fn append_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    let end = file.metadata()?.len();
    if let Err(err) = file.write_all(line).and_then(|()| file.flush()) {
        if let Err(truncate) = file.set_len(end) {
            tracing::error!(error = %truncate, "failed to cut partial jsonl line");
        }
        return Err(err);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
