//! Replica handoff planning between two ring states
//!
//! When membership changes, only keys whose preference list changed need to
//! move. Comparing the old and new ring per key yields the exact set of
//! copies the data layer has to make.

use super::hash::RingHasher;
use super::hash_ring::HashRing;
use crate::types::NodeId;
use tracing::debug;

/// A replica of `key` that must be copied from one node to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub key: String,
    /// Node that held a replica under the old ring
    pub from: NodeId,
    /// Node that holds a replica under the new ring but did not before
    pub to: NodeId,
}

#[derive(Debug, Clone, Default)]
pub struct RebalancePlan {
    pub migrations: Vec<Migration>,
    pub keys_examined: usize,
    /// Keys whose coordinator changed
    pub primaries_moved: usize,
}

impl RebalancePlan {
    /// Fraction of examined keys whose coordinator changed
    pub fn primary_moved_fraction(&self) -> f64 {
        if self.keys_examined == 0 {
            0.0
        } else {
            self.primaries_moved as f64 / self.keys_examined as f64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

/// Compute the handoffs needed to go from `old` to `new` for `keys`.
///
/// Each node that gained a replica of a key is paired with a source that
/// held it under the old ring and is still a member of the new one:
/// - a node that dropped out of the key's replica set but stayed in the
///   cluster (a join pushed it out), otherwise
/// - the first old replica that kept its copy (a leave, or the old ring
///   had fewer than `n` nodes).
///
/// A departed node is only named as the source when no other node ever
/// held the key. Keys that had no owner before produce no migrations.
pub fn plan_rebalance<H, S>(
    old: &HashRing<H>,
    new: &HashRing<H>,
    keys: &[S],
    n: usize,
) -> RebalancePlan
where
    H: RingHasher,
    S: AsRef<str>,
{
    let mut plan = RebalancePlan {
        keys_examined: keys.len(),
        ..RebalancePlan::default()
    };

    for key in keys {
        let key = key.as_ref();
        let old_owners = old.get_node_ids_for_key(key, n);
        let new_owners = new.get_node_ids_for_key(key, n);

        let Some(old_primary) = old_owners.first() else {
            continue;
        };
        if new_owners.first() != Some(old_primary) {
            plan.primaries_moved += 1;
        }

        let mut losers = old_owners
            .iter()
            .filter(|o| !new_owners.contains(o) && new.contains_node(o));
        let survivor = old_owners.iter().find(|o| new_owners.contains(o));
        for gainer in new_owners.iter().filter(|o| !old_owners.contains(o)) {
            let from = losers.next().or(survivor).unwrap_or(old_primary);
            plan.migrations.push(Migration {
                key: key.to_string(),
                from: from.clone(),
                to: gainer.clone(),
            });
        }
    }

    debug!(
        keys = plan.keys_examined,
        migrations = plan.migrations.len(),
        primaries_moved = plan.primaries_moved,
        "planned rebalance"
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Node;

    fn node(id: &str) -> Node {
        Node::new(id, format!("{}:7000", id))
    }

    fn keys(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("key_{}", i)).collect()
    }

    #[test]
    fn test_identical_rings_need_no_migrations() {
        let ring = HashRing::with_nodes(vec![node("a"), node("b"), node("c")], 64).unwrap();
        let plan = plan_rebalance(&ring, &ring.clone(), &keys(1000), 3);

        assert!(plan.is_empty());
        assert_eq!(plan.keys_examined, 1000);
        assert_eq!(plan.primaries_moved, 0);
    }

    #[test]
    fn test_join_moves_keys_only_to_new_node() {
        let old = HashRing::with_nodes(vec![node("a"), node("b"), node("c")], 64).unwrap();
        let mut new = old.clone();
        new.add_node(node("d"), 64).unwrap();

        let plan = plan_rebalance(&old, &new, &keys(2000), 2);
        assert!(!plan.is_empty());
        for migration in &plan.migrations {
            assert_eq!(migration.to.as_str(), "d");
            assert_ne!(migration.from.as_str(), "d");
        }
    }

    #[test]
    fn test_leave_copies_departed_keys_from_survivors() {
        let old = HashRing::with_nodes(vec![node("a"), node("b"), node("c"), node("d")], 64).unwrap();
        let mut new = old.clone();
        new.remove_node(&"b".into()).unwrap();

        let plan = plan_rebalance(&old, &new, &keys(2000), 2);
        assert!(!plan.is_empty());
        for migration in &plan.migrations {
            // Copies come from the replica that stayed, never the departed node
            assert_ne!(migration.from.as_str(), "b");
            assert!(old.is_responsible(&migration.key, &"b".into(), 2));
            assert!(old.is_responsible(&migration.key, &migration.from, 2));
            assert!(new.is_responsible(&migration.key, &migration.from, 2));
        }
    }

    #[test]
    fn test_leave_of_sole_holder_falls_back_to_departed_node() {
        let old = HashRing::with_nodes(vec![node("a"), node("b")], 16).unwrap();
        let mut new = old.clone();
        new.remove_node(&"b".into()).unwrap();

        let plan = plan_rebalance(&old, &new, &keys(500), 1);
        assert!(!plan.is_empty());
        assert!(plan
            .migrations
            .iter()
            .all(|m| m.from.as_str() == "b" && m.to.as_str() == "a"));
    }

    #[test]
    fn test_growing_past_replica_count_copies_from_primary() {
        let old = HashRing::with_nodes(vec![node("a")], 16).unwrap();
        let mut new = old.clone();
        new.add_node(node("b"), 16).unwrap();

        let plan = plan_rebalance(&old, &new, &keys(200), 3);
        // Every key gains "b" as a replica and "a" is the only possible source
        assert_eq!(plan.migrations.len(), 200);
        assert!(plan
            .migrations
            .iter()
            .all(|m| m.from.as_str() == "a" && m.to.as_str() == "b"));
    }

    #[test]
    fn test_empty_old_ring_has_nothing_to_move() {
        let old = HashRing::new();
        let new = HashRing::with_nodes(vec![node("a")], 16).unwrap();

        let plan = plan_rebalance(&old, &new, &keys(100), 3);
        assert!(plan.is_empty());
        assert_eq!(plan.primary_moved_fraction(), 0.0);
    }
}
