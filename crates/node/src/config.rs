//! Node Configuration

use anyhow::{bail, Context, Result};
use paxos_consensus::{FanOut, ProposerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP bind address
    pub listen_addr: String,
    /// Ordered peer base urls; the node set every proposal is sent to
    pub peers: Vec<String>,
    /// Bound on each peer call in milliseconds (none = wait indefinitely)
    pub rpc_timeout_ms: Option<u64>,
    /// How each phase reaches the peers
    pub fan_out: FanOut,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3001".to_string(),
            peers: vec![
                "http://paxos_3001:3001".to_string(),
                "http://paxos_3002:3002".to_string(),
                "http://paxos_3003:3003".to_string(),
            ],
            rpc_timeout_ms: None,
            fan_out: FanOut::Concurrent,
        }
    }
}

impl NodeConfig {
    /// Load from a JSON file; missing fields fall back to defaults
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.peers.is_empty() {
            bail!("node set is empty: at least one peer is required");
        }
        if self.rpc_timeout_ms == Some(0) {
            bail!("rpc_timeout_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn proposer_config(&self) -> ProposerConfig {
        ProposerConfig {
            fan_out: self.fan_out,
            rpc_timeout: self.rpc_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_matches_reference_deployment() {
        let config = NodeConfig::default();
        assert_eq!(config.peers.len(), 3);
        assert!(config.validate().is_ok());
        assert_eq!(config.proposer_config().rpc_timeout, None);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "peers": ["http://a:1", "http://b:2"], "rpc_timeout_ms": 500, "fan_out": "sequential" }}"#
        )
        .unwrap();

        let config = NodeConfig::load(file.path()).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:3001");
        assert_eq!(config.peers, vec!["http://a:1", "http://b:2"]);
        assert_eq!(config.fan_out, FanOut::Sequential);
        assert_eq!(
            config.proposer_config().rpc_timeout,
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = NodeConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("reading config file"));
    }

    #[test]
    fn test_validate_rejects_empty_node_set() {
        let config = NodeConfig {
            peers: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = NodeConfig {
            rpc_timeout_ms: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
