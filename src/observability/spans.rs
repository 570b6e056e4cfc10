//! Span helpers for ring operations

use tracing::{span, Level, Span};

/// Span covering a membership change (`join` / `leave`) for one node
#[inline]
pub fn membership_span(event: &str, node: &str) -> Span {
    span!(
        Level::INFO,
        "ring.membership",
        ring.event = %event,
        ring.node = %node
    )
}

/// Span for a replica lookup
#[inline]
pub fn lookup_span(key: &str, replicas: usize) -> Span {
    span!(
        Level::DEBUG,
        "ring.lookup",
        ring.key = %key,
        ring.replicas = replicas
    )
}
