//! Node configuration.
//!
//! Every knob has a default matching the reference cluster settings. A JSON
//! file may override any subset of them; CLI flags override the file.

use crate::error::{ClusterError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// A member silent for this long is reported as failed.
    pub failure_window_ms: u64,
    /// Extra time a failed member is kept before it is removed.
    pub cleanup_window_ms: u64,
    /// Window for a replicated request to gather its quorum.
    pub request_timeout_ms: u64,
    pub replication_factor: usize,
    /// Size of the hash ring; positions live in `[0, ring_space)`. Capped at
    /// `u32::MAX` by the 32-bit hash.
    pub ring_space: u32,
    /// Peers contacted per gossip cycle.
    pub gossip_fanout: usize,
    pub cycle_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            failure_window_ms: 2000,
            cleanup_window_ms: 3000,
            request_timeout_ms: 100,
            replication_factor: 3,
            ring_space: 127,
            gossip_fanout: 3,
            cycle_interval_ms: 100,
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&raw).map_err(|e| {
            ClusterError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.replication_factor == 0 {
            return Err(ClusterError::InvalidConfig(
                "replication_factor must be at least 1".to_string(),
            ));
        }
        if self.ring_space == 0 {
            return Err(ClusterError::InvalidConfig(
                "ring_space must be at least 1".to_string(),
            ));
        }
        if self.gossip_fanout == 0 {
            return Err(ClusterError::InvalidConfig(
                "gossip_fanout must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Acknowledgements (the owner's own write included) needed to confirm a request.
    pub fn quorum(&self) -> usize {
        self.replication_factor / 2 + 1
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_is_majority_of_replication_factor() {
        let mut config = NodeConfig::default();
        assert_eq!(config.quorum(), 2);

        config.replication_factor = 4;
        assert_eq!(config.quorum(), 3);

        config.replication_factor = 1;
        assert_eq!(config.quorum(), 1);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: NodeConfig =
            serde_json::from_str(r#"{"replication_factor": 5, "ring_space": 4096}"#).unwrap();

        assert_eq!(config.replication_factor, 5);
        assert_eq!(config.ring_space, 4096);
        assert_eq!(config.failure_window_ms, 2000);
        assert_eq!(config.request_timeout_ms, 100);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = NodeConfig::default();
        assert!(config.validate().is_ok());

        config.replication_factor = 0;
        assert!(config.validate().is_err());

        let config = NodeConfig {
            ring_space: 0,
            ..NodeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_missing_path_is_io_error() {
        let result = NodeConfig::from_file(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(ClusterError::Io(_))));
    }
}
