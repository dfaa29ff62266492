use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of capabilities an agent can declare at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Inference,
    Settlement,
    ContentVerification,
    RoyaltyProcessing,
    DataAnalysis,
    SwarmCoordination,
}

/// Agent lifecycle status as observed by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Processing,
    Waiting,
    Error,
}

/// Immutable agent configuration, fixed at registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: Uuid,
    pub name: String,
    pub capabilities: Vec<Capability>,
    /// Optional backing model reference used for inference proofs.
    pub model_id: Option<Uuid>,
    pub max_concurrent_tasks: u32,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, capabilities: Vec<Capability>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            capabilities,
            model_id: None,
            max_concurrent_tasks: 1,
        }
    }

    pub fn with_model(mut self, model_id: Uuid) -> Self {
        self.model_id = Some(model_id);
        self
    }
}

/// Bounded integer reputation score in [0, 100].
///
/// Successful tasks reward +1, failed tasks penalize -5. New agents start
/// at the maximum so early failures are immediately visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reputation(i32);

impl Reputation {
    pub const MIN: i32 = 0;
    pub const MAX: i32 = 100;
    const REWARD: i32 = 1;
    const PENALTY: i32 = 5;

    pub fn new(score: i32) -> Self {
        Self(score.clamp(Self::MIN, Self::MAX))
    }

    pub fn score(&self) -> i32 {
        self.0
    }

    /// Apply the success reward, saturating at the upper bound.
    pub fn reward(&mut self) {
        self.0 = (self.0 + Self::REWARD).min(Self::MAX);
    }

    /// Apply the failure penalty, saturating at the lower bound.
    pub fn penalize(&mut self) {
        self.0 = (self.0 - Self::PENALTY).max(Self::MIN);
    }
}

impl Default for Reputation {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

/// Read-only view of an agent's runtime state, taken under the agent's
/// lock and handed to the coordinator and distribution policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: Uuid,
    pub name: String,
    pub capabilities: Vec<Capability>,
    pub status: AgentStatus,
    pub current_task_id: Option<Uuid>,
    pub reputation: Reputation,
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    pub last_error: Option<String>,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl AgentSnapshot {
    pub fn is_available(&self) -> bool {
        self.status == AgentStatus::Idle
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn has_capabilities(&self, required: &[Capability]) -> bool {
        required.iter().all(|c| self.has_capability(*c))
    }
}
