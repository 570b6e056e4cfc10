//! Shared hash ring with copy-on-write snapshots
//!
//! Lookups vastly outnumber joins and leaves, so readers never wait on a
//! membership change:
//!
//! ```text
//!  lookup ──read lock (clone Arc)──▶ Arc<HashRing> v7 ──walk, no lock held
//!
//!  add_node ──writer mutex──▶ clone v7 ─▶ mutate ─▶ write lock, swap in v8
//! ```
//!
//! A snapshot handed out before the swap stays valid and unchanged; it
//! simply describes the older membership.

use super::config::ReplicationConfig;
use super::hash::{MixedFnv1a, RingHasher};
use super::hash_ring::{HashRing, RingError};
use crate::observability::{lookup_span, membership_span, noop_metrics, SharedMetrics};
use crate::types::{Node, NodeId, VirtualNode};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub struct SharedHashRing<H: RingHasher + Clone = MixedFnv1a> {
    current: RwLock<Arc<HashRing<H>>>,
    /// Serializes writers so no membership change is lost
    writer: Mutex<()>,
    metrics: SharedMetrics,
}

impl SharedHashRing<MixedFnv1a> {
    pub fn new() -> Self {
        Self::from_ring(HashRing::new())
    }
}

impl Default for SharedHashRing<MixedFnv1a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: RingHasher + Clone> SharedHashRing<H> {
    pub fn from_ring(ring: HashRing<H>) -> Self {
        SharedHashRing {
            current: RwLock::new(Arc::new(ring)),
            writer: Mutex::new(()),
            metrics: noop_metrics(),
        }
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Current immutable ring
    pub fn snapshot(&self) -> Arc<HashRing<H>> {
        Arc::clone(&*self.current.read())
    }

    pub fn version(&self) -> u64 {
        self.current.read().version()
    }

    /// Add a node and publish the new ring. Returns the new ring version.
    pub fn add_node(&self, node: Node, virtual_count: u32) -> Result<u64, RingError> {
        let span = membership_span("join", node.id.as_str());
        let _enter = span.enter();

        let node_id = node.id.clone();
        let (version, collisions, nodes, vnodes) = self.publish(|ring| {
            let before = ring.collision_count();
            ring.add_node(node, virtual_count)?;
            Ok(ring.collision_count().saturating_sub(before))
        })?;

        self.metrics.record_collisions(collisions);
        self.metrics.record_membership_change("join", nodes, vnodes);
        info!(node = %node_id, version, nodes, "node joined ring");
        Ok(version)
    }

    /// Add a node with the configured number of virtual nodes
    pub fn add_node_with_config(
        &self,
        node: Node,
        config: &ReplicationConfig,
    ) -> Result<u64, RingError> {
        self.add_node(node, config.virtual_nodes_per_physical_node)
    }

    /// Remove a node and publish the new ring
    pub fn remove_node(&self, id: &NodeId) -> Result<Node, RingError> {
        let span = membership_span("leave", id.as_str());
        let _enter = span.enter();

        let (version, node, nodes, vnodes) = self.publish(|ring| ring.remove_node(id))?;

        self.metrics.record_membership_change("leave", nodes, vnodes);
        info!(node = %id, version, nodes, "node left ring");
        Ok(node)
    }

    /// Replicas for `key` on the current snapshot
    pub fn get_nodes_for_key(&self, key: &str, n: usize) -> Vec<VirtualNode> {
        let span = lookup_span(key, n);
        let _enter = span.enter();

        let start = Instant::now();
        let ring = self.snapshot();
        let result = ring.get_nodes_for_key(key, n);
        self.metrics
            .record_lookup(n, result.len(), start.elapsed().as_secs_f64() * 1000.0);
        result
    }

    /// Replicas for `key` using the configured replication factor
    pub fn get_replicas(&self, key: &str, config: &ReplicationConfig) -> Vec<VirtualNode> {
        self.get_nodes_for_key(key, config.replication_factor)
    }

    /// Clone the current ring, apply `change`, and swap the result in.
    ///
    /// On error nothing is published. Returns the new version, `change`'s
    /// output, and the new node / virtual node counts.
    fn publish<R>(
        &self,
        change: impl FnOnce(&mut HashRing<H>) -> Result<R, RingError>,
    ) -> Result<(u64, R, usize, usize), RingError> {
        let _writer = self.writer.lock();

        let mut next = (**self.current.read()).clone();
        let out = change(&mut next)?;
        let (version, nodes, vnodes) = (next.version(), next.node_count(), next.virtual_node_count());

        *self.current.write() = Arc::new(next);
        Ok((version, out, nodes, vnodes))
    }
}
