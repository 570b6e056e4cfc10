use super::{Storage, StorageError};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// In-memory storage backed by a `RwLock<HashMap>`.
///
/// `closed` is only read or flipped while `data` is locked, so no write can
/// land after `close` has cleared the map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, Bytes>>,
    closed: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn put(&self, key: &str, value: Bytes) -> Result<(), StorageError> {
        let mut data = self.data.write();
        self.ensure_open()?;
        data.insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        let data = self.data.read();
        self.ensure_open()?;
        Ok(data.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut data = self.data.write();
        self.ensure_open()?;
        data.remove(key);
        Ok(())
    }

    fn close(&self) -> Result<(), StorageError> {
        let mut data = self.data.write();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StorageError::Closed);
        }
        let dropped = data.len();
        data.clear();
        drop(data);

        debug!(dropped, "closed in-memory storage");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let storage = MemoryStorage::new();

        storage.put("k", Bytes::from_static(b"v1")).unwrap();
        assert_eq!(storage.get("k").unwrap(), Some(Bytes::from_static(b"v1")));

        storage.put("k", Bytes::from_static(b"v2")).unwrap();
        assert_eq!(storage.get("k").unwrap(), Some(Bytes::from_static(b"v2")));
        assert_eq!(storage.len(), 1);

        storage.delete("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
        storage.delete("k").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_closed_storage_rejects_calls() {
        let storage = MemoryStorage::new();
        storage.put("k", Bytes::from_static(b"v")).unwrap();
        storage.close().unwrap();

        assert_eq!(storage.get("k"), Err(StorageError::Closed));
        assert_eq!(storage.put("k", Bytes::new()), Err(StorageError::Closed));
        assert_eq!(storage.delete("k"), Err(StorageError::Closed));
        assert_eq!(storage.close(), Err(StorageError::Closed));
    }

    #[test]
    fn test_no_write_survives_concurrent_close() {
        for _ in 0..50 {
            let storage = MemoryStorage::new();
            crossbeam::thread::scope(|s| {
                for writer in 0..4 {
                    let storage = &storage;
                    s.spawn(move |_| {
                        for i in 0..200 {
                            let key = format!("w{}-{}", writer, i);
                            if storage.put(&key, Bytes::from_static(b"v")).is_err() {
                                break;
                            }
                        }
                    });
                }
                let storage = &storage;
                s.spawn(move |_| storage.close().unwrap());
            })
            .unwrap();

            assert!(storage.is_empty(), "{} keys written after close", storage.len());
            assert_eq!(
                storage.put("late", Bytes::from_static(b"v")),
                Err(StorageError::Closed)
            );
        }
    }
}
