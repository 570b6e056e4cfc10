//! Tracing Setup
//!
//! Initializes tracing-subscriber with environment-based filtering and an
//! optional JSON formatter for log shipping.

use tracing_subscriber::EnvFilter;

/// Log output settings
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Emit one JSON object per event instead of human-readable lines
    pub json: bool,
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        TracingConfig {
            json: false,
            default_filter: "info".to_string(),
        }
    }
}

impl TracingConfig {
    /// Read `RING_LOG_FORMAT` (`json` or anything else for text)
    pub fn from_env() -> Self {
        let json = std::env::var("RING_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        TracingConfig {
            json,
            ..Self::default()
        }
    }
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set, which callers that may
/// initialize more than once can ignore. Installing one is process-wide, so
/// exercise this from its own test binary.
pub fn init(config: &TracingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json {
        builder.json().try_init()?;
    } else {
        builder.try_init()?;
    }

    tracing::debug!(json = config.json, "tracing initialized");
    Ok(())
}
