//! Global Subscriber Installation
//!
//! Lives in its own test binary: installing the global subscriber here
//! would otherwise turn on log output for every other test in the process.

use dynamo_ring::observability::{init_tracing, TracingConfig};

#[test]
fn test_second_init_fails_without_panicking() {
    let config = TracingConfig {
        default_filter: "warn".to_string(),
        ..TracingConfig::default()
    };

    assert!(init_tracing(&config).is_ok());
    assert!(init_tracing(&config).is_err());
    tracing::info!("filtered out below warn");
}
