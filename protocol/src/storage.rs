//! # Snapshot Store
//!
//! Durable checkpoints of pool state on sled's embedded key-value store.
//! The accounting core is an in-memory state machine; the node writes a
//! snapshot after every keeper tick and reloads the latest one on start.
//!
//! ## Tree Layout
//!
//! | Tree        | Key                | Value               |
//! |-------------|--------------------|---------------------|
//! | `snapshots` | `seq` (8B BE)      | `bincode(state)`    |
//! | `metadata`  | key (UTF-8)        | value (bytes)       |
//!
//! Sequence numbers are big-endian so sled's lexicographic order is also
//! numeric order, which makes pruning a plain front-of-tree scan.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};
use std::path::Path;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors from the snapshot store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key in the `metadata` tree holding the newest sequence number.
const META_LATEST_SEQ: &[u8] = b"latest_snapshot_seq";

// ---------------------------------------------------------------------------
// SnapshotStore
// ---------------------------------------------------------------------------

/// Append-only sequence of serialized state snapshots.
///
/// Cloning shares the underlying sled handle; sled serializes writers
/// internally, so an `Arc` is not required.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    db: Db,
    snapshots: Tree,
    metadata: Tree,
}

impl SnapshotStore {
    /// Opens or creates a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// An in-memory store dropped with the handle. For tests and the
    /// scenario simulator.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let snapshots = db.open_tree("snapshots")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            snapshots,
            metadata,
        })
    }

    /// Appends a snapshot and returns its sequence number (starting at 0).
    pub fn put_snapshot<T: Serialize>(&self, state: &T) -> StoreResult<u64> {
        let bytes =
            bincode::serialize(state).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let seq = match self.latest_seq()? {
            Some(prev) => prev + 1,
            None => 0,
        };
        let key = seq.to_be_bytes();
        self.snapshots.insert(key, bytes)?;
        self.metadata.insert(META_LATEST_SEQ, &key)?;
        self.db.flush()?;
        Ok(seq)
    }

    /// Sequence number of the newest snapshot, if any.
    pub fn latest_seq(&self) -> StoreResult<Option<u64>> {
        match self.metadata.get(META_LATEST_SEQ)? {
            Some(bytes) => Ok(Some(decode_seq(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The newest snapshot with its sequence number.
    pub fn latest_snapshot<T: DeserializeOwned>(&self) -> StoreResult<Option<(u64, T)>> {
        let Some(seq) = self.latest_seq()? else {
            return Ok(None);
        };
        Ok(self.get_snapshot(seq)?.map(|state| (seq, state)))
    }

    /// The snapshot at `seq`, if it has not been pruned.
    pub fn get_snapshot<T: DeserializeOwned>(&self, seq: u64) -> StoreResult<Option<T>> {
        match self.snapshots.get(seq.to_be_bytes())? {
            Some(bytes) => {
                let state = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Deletes all but the newest `keep` snapshots. Returns how many went.
    pub fn prune(&self, keep: usize) -> StoreResult<usize> {
        let excess = self.snapshots.len().saturating_sub(keep);
        let mut removed = 0;
        for entry in self.snapshots.iter().take(excess) {
            let (key, _) = entry?;
            self.snapshots.remove(key)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Number of snapshots currently held.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Flushes pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode_seq(bytes: &[u8]) -> StoreResult<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Serialization(format!("bad sequence key length {}", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}
