//! Consistent Hash Ring with Virtual Nodes
//!
//! Dynamo-style placement: every physical node is hashed onto the ring many
//! times, and a key is owned by the first N distinct physical nodes found
//! walking clockwise from the key's position. The order of that walk is the
//! preference list; its first entry is the coordinator for the key.

use super::hash::{MixedFnv1a, RingHasher};
use crate::types::{Node, NodeId, VirtualNode};
use ahash::{AHashMap, AHashSet};
use tracing::{debug, warn};

/// Error type for ring membership changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingError {
    /// A node with this id is already on the ring
    NodeAlreadyPresent(NodeId),
    /// No node with this id is on the ring
    NodeNotFound(NodeId),
    /// A node must own at least one virtual node
    InvalidVirtualNodeCount,
}

impl std::fmt::Display for RingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RingError::NodeAlreadyPresent(id) => write!(f, "node {} is already on the ring", id),
            RingError::NodeNotFound(id) => write!(f, "node {} is not on the ring", id),
            RingError::InvalidVirtualNodeCount => {
                write!(f, "virtual node count must be at least 1")
            }
        }
    }
}

impl std::error::Error for RingError {}

/// Consistent hash ring for key-to-node mapping
///
/// Three indexes are kept in lockstep:
/// - `virtual_nodes`: ring position -> virtual node
/// - `sorted_positions`: every key of `virtual_nodes`, ascending
/// - `node_positions`: physical node -> positions of its virtual nodes
///
/// `nodes` is the registry of physical nodes; virtual nodes refer to it by id.
#[derive(Debug, Clone)]
pub struct HashRing<H: RingHasher = MixedFnv1a> {
    virtual_nodes: AHashMap<u64, VirtualNode>,
    sorted_positions: Vec<u64>,
    node_positions: AHashMap<NodeId, Vec<u64>>,
    nodes: AHashMap<NodeId, Node>,
    hasher: H,
    /// Incremented on every membership change
    version: u64,
    /// Virtual nodes currently sitting clockwise of their hashed position
    collisions: u64,
}

/// A virtual node waiting for a ring position
struct Slot {
    hashed: u64,
    label: String,
    node: NodeId,
    index: u32,
}

impl HashRing<MixedFnv1a> {
    /// Create an empty ring using the default hasher
    pub fn new() -> Self {
        Self::with_hasher(MixedFnv1a)
    }

    /// Create a ring holding `nodes`, each with `virtual_count` virtual nodes
    pub fn with_nodes<I>(nodes: I, virtual_count: u32) -> Result<Self, RingError>
    where
        I: IntoIterator<Item = Node>,
    {
        let mut ring = Self::new();
        for node in nodes {
            ring.add_node(node, virtual_count)?;
        }
        Ok(ring)
    }
}

impl Default for HashRing<MixedFnv1a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: RingHasher> HashRing<H> {
    /// Create an empty ring that places keys with `hasher`
    pub fn with_hasher(hasher: H) -> Self {
        HashRing {
            virtual_nodes: AHashMap::new(),
            sorted_positions: Vec::new(),
            node_positions: AHashMap::new(),
            nodes: AHashMap::new(),
            hasher,
            version: 0,
            collisions: 0,
        }
    }

    /// Place a physical node on the ring with `virtual_count` virtual nodes.
    ///
    /// Virtual node `i` is labelled `<id>-<i>` and sits at the hash of its
    /// label. Virtual nodes whose hashes collide are ordered by label: the
    /// smallest label keeps the hashed position and the rest take the next
    /// free positions clockwise. Placement therefore depends only on which
    /// nodes are on the ring, never on the order they joined in.
    ///
    /// Adding a node id that is already present is rejected and leaves the
    /// ring untouched.
    pub fn add_node(&mut self, node: Node, virtual_count: u32) -> Result<(), RingError> {
        if virtual_count == 0 {
            return Err(RingError::InvalidVirtualNodeCount);
        }
        if self.nodes.contains_key(&node.id) {
            return Err(RingError::NodeAlreadyPresent(node.id));
        }

        let slots: Vec<Slot> = (0..virtual_count)
            .map(|index| {
                let label = VirtualNode::label(&node.id, index);
                Slot {
                    hashed: self.hasher.hash(&label),
                    label,
                    node: node.id.clone(),
                    index,
                }
            })
            .collect();

        // Nothing displaced and no new collision: every vnode sits at its hash
        let fits_directly = self.collisions == 0 && {
            let mut fresh = AHashSet::with_capacity(slots.len());
            slots
                .iter()
                .all(|slot| !self.virtual_nodes.contains_key(&slot.hashed) && fresh.insert(slot.hashed))
        };

        if fits_directly {
            let mut positions = Vec::with_capacity(slots.len());
            for slot in slots {
                positions.push(slot.hashed);
                self.virtual_nodes.insert(
                    slot.hashed,
                    VirtualNode {
                        id: slot.label,
                        physical_node_id: slot.node,
                        position: slot.hashed,
                    },
                );
            }
            self.sorted_positions.extend_from_slice(&positions);
            self.sorted_positions.sort_unstable();
            self.node_positions.insert(node.id.clone(), positions);
        } else {
            let mut all = self.current_slots();
            all.extend(slots);
            self.place(all);
            warn!(
                node = %node.id,
                displaced = self.collisions,
                "ring position collision, colliding virtual nodes ordered by label"
            );
        }

        debug!(node = %node.id, address = %node.address, virtual_count, "added node to ring");
        self.nodes.insert(node.id.clone(), node);
        self.version += 1;
        Ok(())
    }

    /// Take a physical node and all of its virtual nodes off the ring.
    ///
    /// Virtual nodes that were pushed clockwise by the departed node's
    /// collide back to their hashed positions.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<Node, RingError> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| RingError::NodeNotFound(id.clone()))?;

        let positions = self.node_positions.remove(id).unwrap_or_default();
        if self.collisions == 0 {
            for position in &positions {
                self.virtual_nodes.remove(position);
            }
            let virtual_nodes = &self.virtual_nodes;
            self.sorted_positions.retain(|p| virtual_nodes.contains_key(p));
        } else {
            let remaining = self.current_slots();
            self.place(remaining);
        }

        debug!(node = %id, removed = positions.len(), "removed node from ring");
        self.version += 1;
        Ok(node)
    }

    /// Every virtual node of the registered nodes, with its hashed position
    fn current_slots(&self) -> Vec<Slot> {
        let mut slots = Vec::with_capacity(self.virtual_nodes.len());
        for (node, positions) in &self.node_positions {
            for (index, position) in positions.iter().enumerate() {
                let Some(vnode) = self.virtual_nodes.get(position) else {
                    continue;
                };
                slots.push(Slot {
                    hashed: self.hasher.hash(&vnode.id),
                    label: vnode.id.clone(),
                    node: node.clone(),
                    index: index as u32,
                });
            }
        }
        slots
    }

    /// Rebuild all three indexes from `slots`.
    ///
    /// Slots are placed in `(hashed, label)` order, each at the first free
    /// position at or clockwise of its hash.
    fn place(&mut self, mut slots: Vec<Slot>) {
        slots.sort_unstable_by(|a, b| a.hashed.cmp(&b.hashed).then_with(|| a.label.cmp(&b.label)));

        self.virtual_nodes.clear();
        let mut node_positions: AHashMap<NodeId, Vec<u64>> = AHashMap::new();
        let mut displaced = 0;

        for slot in slots {
            let position = self.probe_free_position(slot.hashed);
            if position != slot.hashed {
                displaced += 1;
            }

            let index = slot.index as usize;
            let positions = node_positions.entry(slot.node.clone()).or_default();
            if positions.len() <= index {
                positions.resize(index + 1, 0);
            }
            positions[index] = position;

            self.virtual_nodes.insert(
                position,
                VirtualNode {
                    id: slot.label,
                    physical_node_id: slot.node,
                    position,
                },
            );
        }

        self.sorted_positions = self.virtual_nodes.keys().copied().collect();
        self.sorted_positions.sort_unstable();
        self.node_positions = node_positions;
        self.collisions = displaced;
    }

    fn probe_free_position(&self, mut position: u64) -> u64 {
        while self.virtual_nodes.contains_key(&position) {
            position = position.wrapping_add(1);
        }
        position
    }

    /// Get up to `n` virtual nodes for `key`, each on a distinct physical node.
    ///
    /// The walk starts at the first virtual node at or after the key's
    /// position, wrapping past the top of the ring, and skips virtual nodes
    /// whose physical node was already picked. The result is shorter than
    /// `n` when the ring has fewer than `n` physical nodes, and empty when
    /// the ring is empty.
    pub fn get_nodes_for_key(&self, key: &str, n: usize) -> Vec<VirtualNode> {
        if self.sorted_positions.is_empty() || n == 0 {
            return Vec::new();
        }

        let key_pos = self.hasher.hash(key);
        let ring_len = self.sorted_positions.len();
        let start_idx = match self.sorted_positions.partition_point(|&p| p < key_pos) {
            i if i == ring_len => 0,
            i => i,
        };

        let wanted = n.min(self.nodes.len());
        let mut result = Vec::with_capacity(wanted);
        let mut seen = AHashSet::with_capacity(wanted);

        // Walk clockwise collecting unique physical nodes
        for step in 0..ring_len {
            if result.len() == wanted {
                break;
            }
            let position = self.sorted_positions[(start_idx + step) % ring_len];
            let Some(vnode) = self.virtual_nodes.get(&position) else {
                continue;
            };
            if seen.insert(&vnode.physical_node_id) {
                result.push(vnode.clone());
            }
        }

        result
    }

    /// Physical node ids responsible for `key`, in preference order
    pub fn get_node_ids_for_key(&self, key: &str, n: usize) -> Vec<NodeId> {
        self.get_nodes_for_key(key, n)
            .into_iter()
            .map(|vnode| vnode.physical_node_id)
            .collect()
    }

    /// The coordinator (first replica) for `key`
    pub fn get_primary(&self, key: &str) -> Option<VirtualNode> {
        self.get_nodes_for_key(key, 1).into_iter().next()
    }

    /// Check if `node` is one of the first `n` replicas for `key`
    pub fn is_responsible(&self, key: &str, node: &NodeId, n: usize) -> bool {
        self.get_nodes_for_key(key, n)
            .iter()
            .any(|vnode| &vnode.physical_node_id == node)
    }

    /// Look up a registered physical node
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Iterate over all physical nodes (unordered)
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Get the number of physical nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the total number of virtual nodes
    pub fn virtual_node_count(&self) -> usize {
        self.sorted_positions.len()
    }

    /// Ring positions owned by a physical node, in creation order
    pub fn virtual_nodes_of(&self, id: &NodeId) -> Option<&[u64]> {
        self.node_positions.get(id).map(Vec::as_slice)
    }

    /// Virtual node at an exact ring position
    pub fn virtual_node_at(&self, position: u64) -> Option<&VirtualNode> {
        self.virtual_nodes.get(&position)
    }

    /// All occupied ring positions, ascending
    pub fn positions(&self) -> &[u64] {
        &self.sorted_positions
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_positions.is_empty()
    }

    /// Get the current ring version
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of virtual nodes currently placed away from their hashed position
    pub fn collision_count(&self) -> u64 {
        self.collisions
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Share of the ring each physical node is primary for, sorted by node id.
    ///
    /// A virtual node owns the arc from its predecessor (exclusive) up to its
    /// own position (inclusive).
    pub fn ownership_fractions(&self) -> Vec<(NodeId, f64)> {
        let mut owned: AHashMap<&NodeId, f64> = AHashMap::new();
        let len = self.sorted_positions.len();
        const RING_SIZE: f64 = 18_446_744_073_709_551_616.0; // 2^64

        for (i, &position) in self.sorted_positions.iter().enumerate() {
            let Some(vnode) = self.virtual_nodes.get(&position) else {
                continue;
            };
            let arc = if len == 1 {
                1.0
            } else {
                let prev = self.sorted_positions[(i + len - 1) % len];
                position.wrapping_sub(prev) as f64 / RING_SIZE
            };
            *owned.entry(&vnode.physical_node_id).or_insert(0.0) += arc;
        }

        let mut fractions: Vec<(NodeId, f64)> = self
            .nodes
            .keys()
            .map(|id| (id.clone(), owned.get(id).copied().unwrap_or(0.0)))
            .collect();
        fractions.sort_by(|a, b| a.0.cmp(&b.0));
        fractions
    }

    /// Count how many of `sample_keys` each node is primary for
    pub fn get_distribution_stats<S: AsRef<str>>(&self, sample_keys: &[S]) -> DistributionStats {
        let mut node_counts: AHashMap<NodeId, usize> =
            self.nodes.keys().map(|id| (id.clone(), 0)).collect();

        for key in sample_keys {
            if let Some(primary) = self.get_primary(key.as_ref()) {
                *node_counts.entry(primary.physical_node_id).or_insert(0) += 1;
            }
        }

        let mut per_node: Vec<(NodeId, usize)> = node_counts.into_iter().collect();
        per_node.sort_by(|a, b| a.0.cmp(&b.0));

        let counts: Vec<usize> = per_node.iter().map(|(_, c)| *c).collect();
        let total: usize = counts.iter().sum();
        let mean = if counts.is_empty() {
            0.0
        } else {
            total as f64 / counts.len() as f64
        };

        let variance = if counts.len() > 1 {
            counts
                .iter()
                .map(|&c| (c as f64 - mean).powi(2))
                .sum::<f64>()
                / counts.len() as f64
        } else {
            0.0
        };

        DistributionStats {
            total_keys: total,
            min_per_node: counts.iter().copied().min().unwrap_or(0),
            max_per_node: counts.iter().copied().max().unwrap_or(0),
            mean_per_node: mean,
            std_dev: variance.sqrt(),
            per_node,
        }
    }
}

/// Primary-owner key counts across nodes
#[derive(Debug, Clone)]
pub struct DistributionStats {
    pub total_keys: usize,
    pub min_per_node: usize,
    pub max_per_node: usize,
    pub mean_per_node: f64,
    pub std_dev: f64,
    /// Keys per node, sorted by node id
    pub per_node: Vec<(NodeId, usize)>,
}
