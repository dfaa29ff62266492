use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::policy::DistributionPolicy;

/// Immutable swarm configuration, fixed when the coordinator is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    #[serde(default = "default_name")]
    pub name: String,

    /// Hard cap on registered agents.
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,

    /// Minimum number of agents for a vote to be considered meaningful.
    #[serde(default = "default_quorum_size")]
    pub quorum_size: usize,

    /// Fraction of the swarm that must vote for a decision to bind.
    #[serde(default = "default_consensus_threshold")]
    pub consensus_threshold: f64,

    #[serde(default)]
    pub distribution_policy: DistributionPolicy,

    /// Upper bound on the execute phase's wait for active tasks to drain.
    #[serde(default = "default_execute_timeout_secs")]
    pub execute_timeout_secs: u64,

    /// Polling interval used by the execute phase.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Safety valve on the scheduler loop when pending work can never be
    /// assigned (e.g. no capable agent exists).
    #[serde(default = "default_max_cycles")]
    pub max_cycles: usize,
}

fn default_name() -> String {
    "swarm".to_string()
}

fn default_max_agents() -> usize {
    10
}

fn default_quorum_size() -> usize {
    3
}

fn default_consensus_threshold() -> f64 {
    0.67
}

fn default_execute_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_max_cycles() -> usize {
    100
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: default_name(),
            max_agents: default_max_agents(),
            quorum_size: default_quorum_size(),
            consensus_threshold: default_consensus_threshold(),
            distribution_policy: DistributionPolicy::default(),
            execute_timeout_secs: default_execute_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_cycles: default_max_cycles(),
        }
    }
}

impl SwarmConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: DistributionPolicy) -> Self {
        self.distribution_policy = policy;
        self
    }

    pub fn with_max_agents(mut self, max_agents: usize) -> Self {
        self.max_agents = max_agents;
        self
    }

    pub fn with_consensus_threshold(mut self, threshold: f64) -> Self {
        self.consensus_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Config file path within a state directory.
    pub fn config_path(state_dir: &Path) -> PathBuf {
        state_dir.join("swarm.toml")
    }

    /// Load a swarm config from disk. Returns defaults if not found.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = Self::config_path(state_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).context("Failed to read swarm config")?;
        let config: Self = toml::from_str(&content).context("Failed to parse swarm config")?;
        Ok(config)
    }

    /// Save the config to disk.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        let path = Self::config_path(state_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize swarm config")?;
        std::fs::write(&path, content).context("Failed to write swarm config")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = SwarmConfig::default();
        assert_eq!(config.max_agents, 10);
        assert_eq!(config.distribution_policy, DistributionPolicy::RoundRobin);
        assert!((config.consensus_threshold - 0.67).abs() < f64::EPSILON);
    }

    #[test]
    fn test_threshold_clamped() {
        let config = SwarmConfig::default().with_consensus_threshold(1.8);
        assert!((config.consensus_threshold - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_missing_returns_default() {
        let dir = tempdir().unwrap();
        let config = SwarmConfig::load(dir.path()).unwrap();
        assert_eq!(config.name, "swarm");
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let config = SwarmConfig::named("verifier-pool")
            .with_policy(DistributionPolicy::Auction)
            .with_max_agents(4);
        config.save(dir.path()).unwrap();

        let loaded = SwarmConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.id, config.id);
        assert_eq!(loaded.name, "verifier-pool");
        assert_eq!(loaded.max_agents, 4);
        assert_eq!(loaded.distribution_policy, DistributionPolicy::Auction);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SwarmConfig = toml::from_str("name = \"tiny\"\nmax_agents = 2\n").unwrap();
        assert_eq!(config.name, "tiny");
        assert_eq!(config.max_agents, 2);
        assert_eq!(config.execute_timeout_secs, 30);
    }
}
