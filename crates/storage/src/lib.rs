//! Typed key/value state store.
//!
//! [`StateStore`] is the object-safe byte-level interface implemented by the
//! backends ([`MemoryStateStore`] here, the redb store in
//! `vertex-storage-redb`). [`StateStoreExt`] layers typed access on top of it
//! through the [`StoreValue`] codec trait.
//!
//! Keys are UTF-8 strings and iteration is lexicographic by key. A
//! [`StoreBatch`] is the only atomicity boundary: either every operation in it
//! becomes durable or none does.

mod batch;
mod codec;
mod memory;

pub use batch::{BatchOp, StoreBatch};
pub use codec::{JsonValue, StoreValue};
pub use memory::MemoryStateStore;

/// Store error type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No value under the requested key.
    #[error("not found")]
    NotFound,

    /// The store has been closed.
    #[error("store closed")]
    Closed,

    /// A value could not be encoded.
    #[error("failed to encode value: {0}")]
    Encode(String),

    /// A stored value could not be decoded.
    #[error("failed to decode value: {0}")]
    Decode(String),

    /// Backend failure.
    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Whether this is the [`StoreError::NotFound`] sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Byte-level key/value store. Implementations are internally thread-safe.
pub trait StateStore: Send + Sync {
    /// Returns the raw bytes under `key`, or [`StoreError::NotFound`].
    fn get_raw(&self, key: &str) -> StoreResult<Vec<u8>>;

    fn put_raw(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Visits every entry whose key starts with `prefix`, in key order.
    ///
    /// The callback returns `Ok(true)` to stop early.
    fn iterate(
        &self,
        prefix: &str,
        f: &mut dyn FnMut(&str, &[u8]) -> StoreResult<bool>,
    ) -> StoreResult<()>;

    /// Applies every operation in `batch` atomically.
    fn write_batch(&self, batch: StoreBatch) -> StoreResult<()>;

    fn close(&self) -> StoreResult<()>;
}

/// Typed access for any [`StateStore`].
pub trait StateStoreExt: StateStore {
    fn get<T: StoreValue>(&self, key: &str) -> StoreResult<T> {
        T::decode_value(&self.get_raw(key)?)
    }

    /// Like [`StateStoreExt::get`] but maps `NotFound` to `None`.
    fn get_opt<T: StoreValue>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get::<T>(key) {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn put<T: StoreValue>(&self, key: &str, value: &T) -> StoreResult<()> {
        self.put_raw(key, value.encode_value()?)
    }
}

impl<S: StateStore + ?Sized> StateStoreExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_ext_through_trait_object() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        store.put("balance_aa", &-1000i64).unwrap();

        assert_eq!(store.get::<i64>("balance_aa").unwrap(), -1000);
        assert_eq!(store.get_opt::<i64>("balance_bb").unwrap(), None);
        assert!(store.get::<i64>("balance_bb").unwrap_err().is_not_found());
    }

    #[test]
    fn test_decode_error_is_not_not_found() {
        let store = MemoryStateStore::new();
        store.put_raw("k", b"not json".to_vec()).unwrap();

        let err = store.get_opt::<u64>("k").unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }
}
