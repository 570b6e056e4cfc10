//! Ring simulator
//!
//! Builds a ring from a replication config and reports how keys land on it:
//! load spread, sample preference lists, and how much data a join moves.
//!
//! Usage: `ring-sim [config.toml] [--nodes N] [--keys K] [--seed S] [--json]`

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use dynamo_ring::observability::{init_tracing, simulated_metrics, TracingConfig};
use dynamo_ring::replication::{plan_rebalance, QuorumOp, ReplicationConfig, SharedHashRing};
use dynamo_ring::{Node, VirtualNode};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{info, warn};

const DEFAULT_NODES: usize = 10;
const DEFAULT_KEYS: usize = 100_000;
const DEFAULT_SEED: u64 = 42;
const SAMPLE_KEYS: usize = 5;

struct Args {
    config_path: Option<String>,
    nodes: usize,
    keys: usize,
    seed: u64,
    json: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let flag_value = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .and_then(|v| v.parse().ok())
    };

    Args {
        config_path: args.first().filter(|a| !a.starts_with("--")).cloned(),
        nodes: flag_value("--nodes").unwrap_or(DEFAULT_NODES),
        keys: flag_value("--keys").unwrap_or(DEFAULT_KEYS),
        seed: flag_value("--seed").map(|s: usize| s as u64).unwrap_or(DEFAULT_SEED),
        json: args.iter().any(|a| a == "--json"),
    }
}

#[derive(Serialize)]
struct Placement<'a> {
    key: &'a str,
    replicas: &'a [VirtualNode],
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing(&TracingConfig::from_env())?;
    let args = parse_args();

    let config = match &args.config_path {
        Some(path) => ReplicationConfig::load(path)?,
        None => ReplicationConfig::default(),
    };
    config.validate()?;
    info!(
        replication_factor = config.replication_factor,
        read_quorum = config.read_quorum,
        write_quorum = config.write_quorum,
        virtual_nodes = config.virtual_nodes_per_physical_node,
        strict = config.is_strict_quorum(),
        "replication policy"
    );

    let metrics = simulated_metrics();
    let ring = SharedHashRing::new().with_metrics(metrics.clone());
    for i in 0..args.nodes {
        let node = Node::new(format!("node-{}", i), format!("10.0.0.{}:7000", i + 1));
        ring.add_node_with_config(node, &config)?;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let keys: Vec<String> = (0..args.keys)
        .map(|_| format!("{:016x}", rng.gen::<u64>()))
        .collect();

    // --- Load distribution ---
    let snapshot = ring.snapshot();
    let stats = snapshot.get_distribution_stats(&keys);
    println!("=== Primary load over {} keys ===", stats.total_keys);
    for (node, count) in &stats.per_node {
        let share = if stats.mean_per_node > 0.0 {
            *count as f64 / stats.mean_per_node
        } else {
            0.0
        };
        println!("  {:<10} {:>8}  ({:.3}x mean)", node, count, share);
    }
    println!(
        "  min={} max={} mean={:.1} std_dev={:.1}\n",
        stats.min_per_node, stats.max_per_node, stats.mean_per_node, stats.std_dev
    );

    // --- Sample preference lists ---
    println!("=== Preference lists (N={}) ===", config.replication_factor);
    let samples: Vec<(&str, Vec<VirtualNode>)> = keys
        .iter()
        .take(SAMPLE_KEYS)
        .map(|k| (k.as_str(), ring.get_replicas(k, &config)))
        .collect();
    for (key, replicas) in &samples {
        let ids: Vec<&str> = replicas.iter().map(|v| v.physical_node_id.as_str()).collect();
        println!("  {} -> {:?}", key, ids);
        if let Err(e) = config.check_replica_set(replicas.len(), QuorumOp::Write) {
            warn!(key = %key, error = %e, "key cannot reach write quorum");
        }
    }
    println!();

    if args.json {
        let placements: Vec<Placement> = samples
            .iter()
            .map(|(key, replicas)| Placement { key, replicas })
            .collect();
        println!("{}\n", serde_json::to_string_pretty(&placements)?);
    }

    // --- Join rebalance ---
    let joiner = Node::new(format!("node-{}", args.nodes), "10.0.0.254:7000");
    ring.add_node_with_config(joiner, &config)?;
    let plan = plan_rebalance(&*snapshot, &*ring.snapshot(), &keys, config.replication_factor);
    println!("=== Rebalance after one join ===");
    println!(
        "  primaries moved: {} ({:.2}% of keys, ideal {:.2}%)",
        plan.primaries_moved,
        plan.primary_moved_fraction() * 100.0,
        100.0 / (args.nodes + 1) as f64
    );
    println!("  replica copies:  {}", plan.migrations.len());
    println!(
        "  lookups: {}, membership changes: {}, collisions: {}",
        metrics.lookup_count(),
        metrics.membership_change_count(),
        metrics.collision_count()
    );

    Ok(())
}
