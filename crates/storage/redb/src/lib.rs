//! redb-backed [`StateStore`].
//!
//! All entries live in a single `state` table keyed by string. Every
//! [`StoreBatch`] is applied inside one write transaction, which gives the
//! all-or-nothing guarantee the store contract requires.

use std::fmt::Display;
use std::path::Path;

use metrics::Counter;
use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;
use vertex_storage::{BatchOp, StateStore, StoreBatch, StoreError, StoreResult};

/// Key: store key. Value: encoded value bytes.
const STATE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("state");

fn db_err(err: impl Display) -> StoreError {
    StoreError::Database(err.to_string())
}

/// Durable state store on a single redb file.
pub struct RedbStateStore {
    db: RwLock<Option<Database>>,
    batches_written: Counter,
}

impl RedbStateStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = Database::create(path.as_ref()).map_err(db_err)?;

        let write_txn = db.begin_write().map_err(db_err)?;
        {
            let _ = write_txn.open_table(STATE_TABLE).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;

        debug!(path = %path.as_ref().display(), "Opened redb state store");
        Ok(Self {
            db: RwLock::new(Some(db)),
            batches_written: metrics::counter!("storage.redb.batches_written"),
        })
    }

    fn apply(&self, ops: Vec<BatchOp>) -> StoreResult<()> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;

        let write_txn = db.begin_write().map_err(db_err)?;
        {
            let mut table = write_txn.open_table(STATE_TABLE).map_err(db_err)?;
            for op in &ops {
                match op {
                    BatchOp::Put { key, value } => {
                        table.insert(key.as_str(), value.as_slice()).map_err(db_err)?;
                    }
                    BatchOp::Delete { key } => {
                        table.remove(key.as_str()).map_err(db_err)?;
                    }
                }
            }
        }
        write_txn.commit().map_err(db_err)
    }
}

impl StateStore for RedbStateStore {
    fn get_raw(&self, key: &str) -> StoreResult<Vec<u8>> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;

        let read_txn = db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(STATE_TABLE).map_err(db_err)?;
        match table.get(key).map_err(db_err)? {
            Some(value) => Ok(value.value().to_vec()),
            None => Err(StoreError::NotFound),
        }
    }

    fn put_raw(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.apply(vec![BatchOp::Put {
            key: key.to_string(),
            value,
        }])
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.apply(vec![BatchOp::Delete {
            key: key.to_string(),
        }])
    }

    fn iterate(
        &self,
        prefix: &str,
        f: &mut dyn FnMut(&str, &[u8]) -> StoreResult<bool>,
    ) -> StoreResult<()> {
        // The read transaction is a snapshot that outlives the lock, so the
        // callback may write to the store.
        let read_txn = {
            let guard = self.db.read();
            let db = guard.as_ref().ok_or(StoreError::Closed)?;
            db.begin_read().map_err(db_err)?
        };
        let table = read_txn.open_table(STATE_TABLE).map_err(db_err)?;

        for entry in table.range(prefix..).map_err(db_err)? {
            let (key, value) = entry.map_err(db_err)?;
            if !key.value().starts_with(prefix) {
                break;
            }
            if f(key.value(), value.value())? {
                break;
            }
        }
        Ok(())
    }

    fn write_batch(&self, batch: StoreBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.apply(batch.into_ops())?;
        self.batches_written.increment(1);
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        if self.db.write().take().is_some() {
            debug!("Closed redb state store");
        }
        Ok(())
    }
}
