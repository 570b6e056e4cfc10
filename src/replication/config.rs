use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Error type for replication policy validation and loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidReplicationFactor,
    InvalidReadQuorum { read_quorum: usize, replication_factor: usize },
    InvalidWriteQuorum { write_quorum: usize, replication_factor: usize },
    InvalidVirtualNodes,
    InvalidHeartbeat,
    /// The ring returned fewer replicas than the quorum needs
    InsufficientReplicas {
        operation: QuorumOp,
        required: usize,
        available: usize,
    },
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidReplicationFactor => {
                write!(f, "replication factor must be at least 1")
            }
            ConfigError::InvalidReadQuorum {
                read_quorum,
                replication_factor,
            } => write!(
                f,
                "read quorum {} must be between 1 and replication factor {}",
                read_quorum, replication_factor
            ),
            ConfigError::InvalidWriteQuorum {
                write_quorum,
                replication_factor,
            } => write!(
                f,
                "write quorum {} must be between 1 and replication factor {}",
                write_quorum, replication_factor
            ),
            ConfigError::InvalidVirtualNodes => {
                write!(f, "virtual nodes per physical node must be at least 1")
            }
            ConfigError::InvalidHeartbeat => write!(f, "heartbeat interval must be non-zero"),
            ConfigError::InsufficientReplicas {
                operation,
                required,
                available,
            } => write!(
                f,
                "{} quorum needs {} replicas, only {} available",
                operation, required, available
            ),
            ConfigError::Io(e) => write!(f, "failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuorumOp {
    Read,
    Write,
}

impl std::fmt::Display for QuorumOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuorumOp::Read => write!(f, "read"),
            QuorumOp::Write => write!(f, "write"),
        }
    }
}

/// Majority quorum for a replication factor: `rf / 2 + 1`
pub const fn majority(replication_factor: usize) -> usize {
    replication_factor / 2 + 1
}

/// Replication and placement policy
///
/// The ring never reads this. The coordination layer asks the ring for
/// `replication_factor` nodes and then waits for `read_quorum` or
/// `write_quorum` of them to answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawReplicationConfig")]
pub struct ReplicationConfig {
    /// Number of distinct nodes holding a copy of each key
    pub replication_factor: usize,
    /// Replicas that must answer a read
    pub read_quorum: usize,
    /// Replicas that must acknowledge a write
    pub write_quorum: usize,
    /// Peer heartbeat period in milliseconds
    pub heartbeat_interval_ms: u64,
    /// Number of virtual nodes per physical node on the hash ring.
    /// Higher values improve distribution balance but use more memory.
    pub virtual_nodes_per_physical_node: u32,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        let rf = 3;
        ReplicationConfig {
            replication_factor: rf,
            read_quorum: majority(rf),
            write_quorum: majority(rf),
            heartbeat_interval_ms: 500,
            virtual_nodes_per_physical_node: 256,
        }
    }
}

/// On-disk form. Quorums left out of the file follow the replication
/// factor, the same way [`ReplicationConfig::with_replication_factor`] does.
#[derive(Deserialize)]
#[serde(default)]
struct RawReplicationConfig {
    replication_factor: usize,
    read_quorum: Option<usize>,
    write_quorum: Option<usize>,
    heartbeat_interval_ms: u64,
    virtual_nodes_per_physical_node: u32,
}

impl Default for RawReplicationConfig {
    fn default() -> Self {
        let defaults = ReplicationConfig::default();
        RawReplicationConfig {
            replication_factor: defaults.replication_factor,
            read_quorum: None,
            write_quorum: None,
            heartbeat_interval_ms: defaults.heartbeat_interval_ms,
            virtual_nodes_per_physical_node: defaults.virtual_nodes_per_physical_node,
        }
    }
}

impl From<RawReplicationConfig> for ReplicationConfig {
    fn from(raw: RawReplicationConfig) -> Self {
        let rf = raw.replication_factor;
        ReplicationConfig {
            replication_factor: rf,
            read_quorum: raw.read_quorum.unwrap_or(majority(rf)),
            write_quorum: raw.write_quorum.unwrap_or(majority(rf)),
            heartbeat_interval_ms: raw.heartbeat_interval_ms,
            virtual_nodes_per_physical_node: raw.virtual_nodes_per_physical_node,
        }
    }
}

impl ReplicationConfig {
    /// Set the replication factor and reset both quorums to its majority
    pub fn with_replication_factor(mut self, rf: usize) -> Self {
        self.replication_factor = rf;
        self.read_quorum = majority(rf);
        self.write_quorum = majority(rf);
        self
    }

    pub fn with_read_quorum(mut self, quorum: usize) -> Self {
        self.read_quorum = quorum;
        self
    }

    pub fn with_write_quorum(mut self, quorum: usize) -> Self {
        self.write_quorum = quorum;
        self
    }

    /// Set virtual nodes per physical node
    pub fn with_virtual_nodes(mut self, count: u32) -> Self {
        self.virtual_nodes_per_physical_node = count;
        self
    }

    pub fn with_heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.heartbeat_interval_ms = ms;
        self
    }

    /// Get heartbeat interval as Duration
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rf = self.replication_factor;
        if rf == 0 {
            return Err(ConfigError::InvalidReplicationFactor);
        }
        if self.read_quorum == 0 || self.read_quorum > rf {
            return Err(ConfigError::InvalidReadQuorum {
                read_quorum: self.read_quorum,
                replication_factor: rf,
            });
        }
        if self.write_quorum == 0 || self.write_quorum > rf {
            return Err(ConfigError::InvalidWriteQuorum {
                write_quorum: self.write_quorum,
                replication_factor: rf,
            });
        }
        if self.virtual_nodes_per_physical_node == 0 {
            return Err(ConfigError::InvalidVirtualNodes);
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidHeartbeat);
        }
        Ok(())
    }

    /// Every read overlaps every write (R + W > N)
    pub fn is_strict_quorum(&self) -> bool {
        self.read_quorum + self.write_quorum > self.replication_factor
    }

    pub fn read_quorum_met(&self, acks: usize) -> bool {
        acks >= self.read_quorum
    }

    pub fn write_quorum_met(&self, acks: usize) -> bool {
        acks >= self.write_quorum
    }

    /// Fail when a lookup returned too few replicas to ever reach quorum
    pub fn check_replica_set(&self, available: usize, operation: QuorumOp) -> Result<(), ConfigError> {
        let required = match operation {
            QuorumOp::Read => self.read_quorum,
            QuorumOp::Write => self.write_quorum,
        };
        if available < required {
            return Err(ConfigError::InsufficientReplicas {
                operation,
                required,
                available,
            });
        }
        Ok(())
    }

    /// Parse a TOML document. Missing fields take their defaults, except
    /// missing quorums, which become the majority of `replication_factor`.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: ReplicationConfig =
            toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
