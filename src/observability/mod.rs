//! Observability
//!
//! - Structured logging via `tracing` / `tracing-subscriber`
//! - Metrics through the [`MetricsRecorder`] trait
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | `info` | Log filter directives |
//! | `RING_LOG_FORMAT` | text | `json` for JSON lines |

pub mod recorder;
pub mod spans;
pub mod tracing_setup;

pub use recorder::{
    noop_metrics, simulated_metrics, MetricType, MetricsRecorder, NoopMetrics, RecordedMetric,
    SharedMetrics, SimulatedMetrics,
};
pub use spans::*;
pub use tracing_setup::{init as init_tracing, TracingConfig};
