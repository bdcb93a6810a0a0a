use crate::{StoreResult, StoreValue};

/// A single batched mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

/// An ordered set of mutations applied atomically by
/// [`StateStore::write_batch`](crate::StateStore::write_batch).
///
/// Later operations on the same key win.
#[derive(Clone, Debug, Default)]
pub struct StoreBatch {
    ops: Vec<BatchOp>,
}

impl StoreBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes `value` and queues a put.
    pub fn put<T: StoreValue>(&mut self, key: impl Into<String>, value: &T) -> StoreResult<()> {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.encode_value()?,
        });
        Ok(())
    }

    pub fn put_raw(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value,
        });
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.ops.push(BatchOp::Delete { key: key.into() });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}
