//! Membership Change Tests
//!
//! A join should take roughly 1/(N+1) of the keyspace, and only from the
//! existing nodes to the newcomer. A leave should hand back exactly the
//! departed node's keys and nothing else, copied from replicas that are
//! still on the ring.

use dynamo_ring::replication::{plan_rebalance, HashRing};
use dynamo_ring::{Node, NodeId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const VIRTUAL_NODES: u32 = 256;

fn node(id: &str) -> Node {
    Node::new(id, format!("{}:7000", id))
}

fn cluster(count: usize) -> HashRing {
    let nodes = (0..count).map(|i| node(&format!("node-{}", i)));
    HashRing::with_nodes(nodes, VIRTUAL_NODES).unwrap()
}

fn random_keys(seed: u64, count: usize) -> Vec<String> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| format!("{:016x}", rng.gen::<u64>()))
        .collect()
}

#[test]
fn test_join_moves_minimal_fraction_of_primaries() {
    let old = cluster(10);
    let mut new = old.clone();
    new.add_node(node("node-10"), VIRTUAL_NODES).unwrap();

    let keys = random_keys(11, 100_000);
    let newcomer = NodeId::new("node-10");
    let mut moved = 0usize;

    for key in &keys {
        let before = old.get_primary(key).unwrap().physical_node_id;
        let after = new.get_primary(key).unwrap().physical_node_id;
        if before != after {
            moved += 1;
            assert_eq!(after, newcomer, "{} moved between existing nodes", key);
        }
    }

    let fraction = moved as f64 / keys.len() as f64;
    println!(
        "\n=== Join of 11th node ===\n  moved {:.2}% (ideal {:.2}%)",
        fraction * 100.0,
        100.0 / 11.0
    );
    assert!(
        (0.05..=0.14).contains(&fraction),
        "moved fraction {:.4} outside expected band",
        fraction
    );

    let plan = plan_rebalance(&old, &new, &keys, 1);
    assert_eq!(plan.primaries_moved, moved);
    assert_eq!(plan.migrations.len(), moved);
}

#[test]
fn test_join_replica_handoffs_target_only_newcomer() {
    let old = cluster(5);
    let mut new = old.clone();
    new.add_node(node("node-5"), VIRTUAL_NODES).unwrap();

    let keys = random_keys(12, 20_000);
    let plan = plan_rebalance(&old, &new, &keys, 3);

    assert!(!plan.is_empty());
    for migration in &plan.migrations {
        assert_eq!(migration.to.as_str(), "node-5");
        assert_ne!(migration.from.as_str(), "node-5");
        // The source actually held the key before the join
        assert!(old.is_responsible(&migration.key, &migration.from, 3));
        assert!(!new.is_responsible(&migration.key, &migration.from, 3));
    }
}

#[test]
fn test_leave_returns_only_departed_keys() {
    let old = cluster(8);
    let mut new = old.clone();
    let departed = NodeId::new("node-3");
    new.remove_node(&departed).unwrap();

    let keys = random_keys(13, 50_000);
    for key in &keys {
        let before = old.get_primary(key).unwrap().physical_node_id;
        let after = new.get_primary(key).unwrap().physical_node_id;
        if before != departed {
            assert_eq!(before, after, "{} moved although its owner stayed", key);
        } else {
            assert_ne!(after, departed);
        }
    }

    let plan = plan_rebalance(&old, &new, &keys, 3);
    assert!(!plan.is_empty());
    for migration in &plan.migrations {
        assert!(old.is_responsible(&migration.key, &departed, 3));
        assert_ne!(migration.from, departed, "copy sourced from departed node");
        assert!(new.contains_node(&migration.from));
        assert!(new.is_responsible(&migration.key, &migration.from, 3));
    }
}

#[test]
fn test_join_then_leave_restores_placement() {
    let original = cluster(6);
    let mut ring = original.clone();
    ring.add_node(node("node-6"), VIRTUAL_NODES).unwrap();
    ring.remove_node(&NodeId::new("node-6")).unwrap();

    assert_eq!(ring.positions(), original.positions());
    for key in random_keys(14, 5_000) {
        assert_eq!(
            ring.get_nodes_for_key(&key, 3),
            original.get_nodes_for_key(&key, 3)
        );
    }
    let plan = plan_rebalance(&original, &ring, &random_keys(15, 1_000), 3);
    assert!(plan.is_empty());
}
