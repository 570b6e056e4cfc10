//! Data-placement core for a Dynamo-style key-value store.
//!
//! A consistent-hash ring with virtual nodes maps each key to an ordered
//! preference list of distinct physical nodes. Quorum coordination, the
//! transport, and conflict resolution sit on top and consume the types here.

pub mod observability;
pub mod replication;
pub mod storage;
pub mod types;

pub use replication::{
    HashRing, RebalancePlan, ReplicationConfig, RingError, RingHasher, SharedHashRing,
};
pub use storage::{MemoryStorage, Storage, StorageError, StorageNode};
pub use types::{KeyValuePair, Node, NodeId, Timestamp, VectorClock, VirtualNode};
