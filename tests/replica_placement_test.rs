//! Replica Placement Tests
//!
//! Drives writes through the ring into per-node storage and checks that
//! each key lands on exactly its preference list, and that quorum checks
//! line up with how many replicas actually took the write.

use bytes::Bytes;
use dynamo_ring::replication::{ConfigError, QuorumOp, ReplicationConfig, SharedHashRing};
use dynamo_ring::{KeyValuePair, Node, NodeId, StorageError, StorageNode, VectorClock};
use std::collections::HashMap;

struct Cluster {
    ring: SharedHashRing,
    storage: HashMap<NodeId, StorageNode>,
    config: ReplicationConfig,
}

impl Cluster {
    fn new(count: usize, config: ReplicationConfig) -> Self {
        let ring = SharedHashRing::new();
        let mut storage = HashMap::new();
        for i in 0..count {
            let node = Node::new(format!("node-{}", i), format!("10.0.0.{}:7000", i + 1));
            ring.add_node_with_config(node.clone(), &config).unwrap();
            storage.insert(node.id.clone(), StorageNode::in_memory(node));
        }
        Cluster {
            ring,
            storage,
            config,
        }
    }

    /// Write `kv` to every replica; returns how many acknowledged
    fn replicate(&self, kv: &KeyValuePair) -> usize {
        let encoded = Bytes::from(serde_json::to_vec(kv).unwrap());
        self.ring
            .get_replicas(&kv.key, &self.config)
            .iter()
            .filter(|v| {
                self.storage[&v.physical_node_id]
                    .storage
                    .put(&kv.key, encoded.clone())
                    .is_ok()
            })
            .count()
    }

    fn holders(&self, key: &str) -> Vec<NodeId> {
        let mut holders: Vec<NodeId> = self
            .storage
            .iter()
            .filter(|(_, s)| matches!(s.storage.get(key), Ok(Some(_))))
            .map(|(id, _)| id.clone())
            .collect();
        holders.sort();
        holders
    }
}

fn versioned(key: &str, value: &'static [u8], coordinator: &NodeId) -> KeyValuePair {
    let mut clock = VectorClock::new();
    clock.increment(coordinator);
    KeyValuePair::new(key, Bytes::from_static(value), clock)
}

#[test]
fn test_writes_land_exactly_on_preference_list() {
    let cluster = Cluster::new(6, ReplicationConfig::default().with_virtual_nodes(64));

    for i in 0..300 {
        let key = format!("user:{}", i);
        let snapshot = cluster.ring.snapshot();
        let coordinator = snapshot.get_primary(&key).unwrap().physical_node_id;

        let acks = cluster.replicate(&versioned(&key, b"v", &coordinator));
        assert_eq!(acks, 3);
        assert!(cluster.config.write_quorum_met(acks));

        let mut expected = snapshot.get_node_ids_for_key(&key, 3);
        expected.sort();
        assert_eq!(cluster.holders(&key), expected);
    }
}

#[test]
fn test_stored_record_keeps_causal_metadata() {
    let cluster = Cluster::new(3, ReplicationConfig::default().with_virtual_nodes(32));
    let coordinator = NodeId::new("node-1");
    let kv = versioned("cart:42", b"3 items", &coordinator);
    cluster.replicate(&kv);

    for node in cluster.storage.values() {
        let raw = node.storage.get("cart:42").unwrap().unwrap();
        let stored: KeyValuePair = serde_json::from_slice(&raw).unwrap();
        assert_eq!(stored, kv);
        assert_eq!(stored.clock.get(&coordinator), 1);
    }
}

#[test]
fn test_closed_replica_breaks_quorum_only_below_threshold() {
    let cluster = Cluster::new(3, ReplicationConfig::default().with_virtual_nodes(32));
    cluster.storage[&NodeId::new("node-0")]
        .storage
        .close()
        .unwrap();

    let kv = versioned("order:7", b"paid", &NodeId::new("node-1"));
    let acks = cluster.replicate(&kv);
    assert_eq!(acks, 2);
    assert!(cluster.config.write_quorum_met(acks));

    cluster.storage[&NodeId::new("node-1")]
        .storage
        .close()
        .unwrap();
    let acks = cluster.replicate(&kv);
    assert_eq!(acks, 1);
    assert!(!cluster.config.write_quorum_met(acks));

    assert_eq!(
        cluster.storage[&NodeId::new("node-0")].storage.get("order:7"),
        Err(StorageError::Closed)
    );
}

#[test]
fn test_small_cluster_reports_insufficient_replicas() {
    let config = ReplicationConfig::default().with_virtual_nodes(32);
    let cluster = Cluster::new(1, config.clone());

    let replicas = cluster.ring.get_replicas("key", &config);
    assert_eq!(replicas.len(), 1);
    assert!(matches!(
        config.check_replica_set(replicas.len(), QuorumOp::Write),
        Err(ConfigError::InsufficientReplicas { .. })
    ));

    cluster
        .ring
        .add_node_with_config(Node::new("node-1", "10.0.0.2:7000"), &config)
        .unwrap();
    let replicas = cluster.ring.get_replicas("key", &config);
    assert_eq!(replicas.len(), 2);
    assert!(config
        .check_replica_set(replicas.len(), QuorumOp::Write)
        .is_ok());
    assert!(config.check_replica_set(replicas.len(), QuorumOp::Read).is_ok());
}
