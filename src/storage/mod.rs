//! Storage capability
//!
//! The backend a node uses for the keys the ring assigns to it. The ring
//! never calls this; it only decides which nodes' storage a key lands in.

mod memory;

pub use memory::MemoryStorage;

use crate::types::Node;
use bytes::Bytes;
use std::sync::Arc;

/// Error returned by storage backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backend was closed
    Closed,
    /// Backend-specific failure
    Backend(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Closed => write!(f, "storage is closed"),
            StorageError::Backend(e) => write!(f, "storage backend error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

/// Key-value persistence engine
pub trait Storage: Send + Sync {
    fn put(&self, key: &str, value: Bytes) -> Result<(), StorageError>;

    /// `None` when the key is absent
    fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError>;

    /// Deleting an absent key is not an error
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Release the backend; every later call fails with `Closed`
    fn close(&self) -> Result<(), StorageError>;
}

/// A physical node paired with its storage backend
#[derive(Clone)]
pub struct StorageNode {
    pub node: Node,
    pub storage: Arc<dyn Storage>,
}

impl StorageNode {
    pub fn new(node: Node, storage: Arc<dyn Storage>) -> Self {
        StorageNode { node, storage }
    }

    /// Node backed by a fresh in-memory store
    pub fn in_memory(node: Node) -> Self {
        Self::new(node, Arc::new(MemoryStorage::new()))
    }
}

impl std::fmt::Debug for StorageNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageNode").field("node", &self.node).finish()
    }
}
