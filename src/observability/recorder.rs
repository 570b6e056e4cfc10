//! Metrics Recorder Trait
//!
//! Abstraction over metrics sinks so ring code can be observed the same way
//! in production and in tests:
//! - `NoopMetrics`: compiles to nothing
//! - `SimulatedMetrics`: in-memory recording for assertions

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for recording metrics
pub trait MetricsRecorder: Send + Sync + 'static {
    /// Increment a counter by 1
    fn incr(&self, name: &str, tags: &[&str]);

    /// Record a histogram/distribution value
    fn histogram(&self, name: &str, value: f64, tags: &[&str]);

    /// Set a gauge value
    fn gauge(&self, name: &str, value: f64, tags: &[&str]);

    /// Record a timing in milliseconds
    fn timing(&self, name: &str, duration_ms: f64, tags: &[&str]);

    // Convenience methods with default implementations

    /// Record a replica lookup, flagging results shorter than requested
    fn record_lookup(&self, requested: usize, returned: usize, duration_ms: f64) {
        let status = if returned >= requested { "full" } else { "short" };
        let status_tag = format!("status:{}", status);

        self.timing("ring.lookup.duration", duration_ms, &[&status_tag]);
        self.incr("ring.lookup.count", &[&status_tag]);
    }

    /// Record a node joining or leaving, with the resulting ring size
    fn record_membership_change(&self, event: &str, node_count: usize, virtual_node_count: usize) {
        let event_tag = format!("event:{}", event);
        self.incr("ring.membership.changes", &[&event_tag]);
        self.gauge("ring.nodes", node_count as f64, &[]);
        self.gauge("ring.virtual_nodes", virtual_node_count as f64, &[]);
    }

    /// Record virtual nodes moved off an occupied position
    fn record_collisions(&self, count: u64) {
        if count > 0 {
            self.incr("ring.collisions", &[]);
            self.histogram("ring.collisions.batch_size", count as f64, &[]);
        }
    }
}

/// No-op metrics recorder - zero overhead when metrics are disabled
#[derive(Clone, Default)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    #[inline]
    fn incr(&self, _name: &str, _tags: &[&str]) {}
    #[inline]
    fn histogram(&self, _name: &str, _value: f64, _tags: &[&str]) {}
    #[inline]
    fn gauge(&self, _name: &str, _value: f64, _tags: &[&str]) {}
    #[inline]
    fn timing(&self, _name: &str, _duration_ms: f64, _tags: &[&str]) {}
}

/// Recorded metric for testing
#[derive(Debug, Clone)]
pub struct RecordedMetric {
    pub name: String,
    pub value: f64,
    pub tags: Vec<String>,
    pub metric_type: MetricType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
    Timing,
}

/// Simulated metrics recorder - records all metrics for verification
#[derive(Default)]
pub struct SimulatedMetrics {
    recorded: Mutex<Vec<RecordedMetric>>,
    lookup_count: AtomicU64,
    membership_change_count: AtomicU64,
    collision_count: AtomicU64,
}

impl SimulatedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded metrics
    pub fn get_recorded(&self) -> Vec<RecordedMetric> {
        self.recorded.lock().clone()
    }

    /// Get metrics by name
    pub fn get_by_name(&self, name: &str) -> Vec<RecordedMetric> {
        self.recorded
            .lock()
            .iter()
            .filter(|m| m.name == name)
            .cloned()
            .collect()
    }

    /// Latest value of a gauge, if it was ever set
    pub fn last_gauge(&self, name: &str) -> Option<f64> {
        self.recorded
            .lock()
            .iter()
            .rev()
            .find(|m| m.name == name && m.metric_type == MetricType::Gauge)
            .map(|m| m.value)
    }

    pub fn lookup_count(&self) -> u64 {
        self.lookup_count.load(Ordering::SeqCst)
    }

    pub fn membership_change_count(&self) -> u64 {
        self.membership_change_count.load(Ordering::SeqCst)
    }

    pub fn collision_count(&self) -> u64 {
        self.collision_count.load(Ordering::SeqCst)
    }

    /// Clear all recorded metrics
    pub fn clear(&self) {
        self.recorded.lock().clear();
        self.lookup_count.store(0, Ordering::SeqCst);
        self.membership_change_count.store(0, Ordering::SeqCst);
        self.collision_count.store(0, Ordering::SeqCst);
    }

    /// Check a metric was recorded with the given type
    pub fn assert_metric(&self, name: &str, metric_type: MetricType) -> bool {
        self.recorded
            .lock()
            .iter()
            .any(|m| m.name == name && m.metric_type == metric_type)
    }

    fn push(&self, name: &str, value: f64, tags: &[&str], metric_type: MetricType) {
        self.recorded.lock().push(RecordedMetric {
            name: name.to_string(),
            value,
            tags: tags.iter().map(|s| s.to_string()).collect(),
            metric_type,
        });
    }
}

impl MetricsRecorder for SimulatedMetrics {
    fn incr(&self, name: &str, tags: &[&str]) {
        self.push(name, 1.0, tags, MetricType::Counter);
    }

    fn histogram(&self, name: &str, value: f64, tags: &[&str]) {
        self.push(name, value, tags, MetricType::Histogram);
    }

    fn gauge(&self, name: &str, value: f64, tags: &[&str]) {
        self.push(name, value, tags, MetricType::Gauge);
    }

    fn timing(&self, name: &str, duration_ms: f64, tags: &[&str]) {
        self.push(name, duration_ms, tags, MetricType::Timing);
    }

    fn record_lookup(&self, requested: usize, returned: usize, duration_ms: f64) {
        self.lookup_count.fetch_add(1, Ordering::SeqCst);

        let status = if returned >= requested { "full" } else { "short" };
        let status_tag = format!("status:{}", status);
        self.timing("ring.lookup.duration", duration_ms, &[&status_tag]);
        self.incr("ring.lookup.count", &[&status_tag]);
    }

    fn record_membership_change(&self, event: &str, node_count: usize, virtual_node_count: usize) {
        self.membership_change_count.fetch_add(1, Ordering::SeqCst);

        let event_tag = format!("event:{}", event);
        self.incr("ring.membership.changes", &[&event_tag]);
        self.gauge("ring.nodes", node_count as f64, &[]);
        self.gauge("ring.virtual_nodes", virtual_node_count as f64, &[]);
    }

    fn record_collisions(&self, count: u64) {
        if count > 0 {
            self.collision_count.fetch_add(count, Ordering::SeqCst);
            self.incr("ring.collisions", &[]);
            self.histogram("ring.collisions.batch_size", count as f64, &[]);
        }
    }
}

/// Arc wrapper for trait object usage
pub type SharedMetrics = Arc<dyn MetricsRecorder>;

/// Create a no-op metrics recorder
pub fn noop_metrics() -> SharedMetrics {
    Arc::new(NoopMetrics)
}

/// Create a simulated metrics recorder for testing
pub fn simulated_metrics() -> Arc<SimulatedMetrics> {
    Arc::new(SimulatedMetrics::new())
}
