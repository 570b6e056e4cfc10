//! Cluster data model
//!
//! Physical nodes, the virtual nodes that place them on the ring, and the
//! versioned records the storage layer keeps for each key. The ring only
//! ever refers to a physical node by its [`NodeId`]; the [`Node`] itself
//! lives in a registry next to the ring.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier of a physical node, e.g. `"node-1"`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

/// A physical server in the cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// host:port the transport layer uses to reach this node
    pub address: String,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, address: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            address: address.into(),
        }
    }
}

/// A point on the hash ring that maps back to a physical node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VirtualNode {
    /// Label the position was derived from, `<node id>-<index>`
    pub id: String,
    /// The physical node this virtual node belongs to
    pub physical_node_id: NodeId,
    /// Position on the 2^64 ring
    pub position: u64,
}

impl VirtualNode {
    /// Label for the `index`-th virtual node of `node`
    pub fn label(node: &NodeId, index: u32) -> String {
        format!("{}-{}", node, index)
    }
}

/// Wall-clock time in milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    /// Current wall-clock time. A clock set before the epoch reads as zero.
    pub fn now() -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Timestamp(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

/// Per-record causal version vector.
///
/// Each entry is one node's view of causal progress. Counters only move
/// forward. Merging and comparing clocks belongs to the conflict-resolution
/// layer, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock(BTreeMap<NodeId, u64>);

impl VectorClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance `node`'s counter and return the new value
    pub fn increment(&mut self, node: &NodeId) -> u64 {
        let counter = self.0.entry(node.clone()).or_insert(0);
        *counter = counter.saturating_add(1);
        *counter
    }

    /// Counter for `node`, zero if it has never written
    pub fn get(&self, node: &NodeId) -> u64 {
        self.0.get(node).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, u64)> {
        self.0.iter().map(|(node, counter)| (node, *counter))
    }
}

/// One versioned record along with its causal metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: Bytes,
    pub clock: VectorClock,
    /// Tie-break hint only; ordering is decided by `clock`
    pub timestamp: Timestamp,
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>, clock: VectorClock) -> Self {
        KeyValuePair {
            key: key.into(),
            value: value.into(),
            clock,
            timestamp: Timestamp::now(),
        }
    }
}
