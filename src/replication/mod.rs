//! Data placement and replication policy
//!
//! - [`hash`]: the ring hash function
//! - [`hash_ring`]: virtual-node table and replica lookup
//! - [`shared_ring`]: copy-on-write wrapper for concurrent use
//! - [`rebalance`]: handoff planning across membership changes
//! - [`config`]: replication factor and quorum policy

pub mod config;
pub mod hash;
pub mod hash_ring;
pub mod rebalance;
pub mod shared_ring;

pub use config::{majority, ConfigError, QuorumOp, ReplicationConfig};
pub use hash::{Fnv1a, MixedFnv1a, RingHasher};
pub use hash_ring::{DistributionStats, HashRing, RingError};
pub use rebalance::{plan_rebalance, Migration, RebalancePlan};
pub use shared_ring::SharedHashRing;
