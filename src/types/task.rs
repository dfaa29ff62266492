use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::Capability;

/// The kind of work a task carries. Each built-in kind maps to one
/// execution handler on the agent; `Custom` tags are rejected at execution
/// time as an unknown task type, failing the task rather than the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Inference,
    Verification,
    Settlement,
    ContentAnalysis,
    RoyaltyCalculation,
    DataAggregation,
    Consensus,
    Custom(String),
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Inference => write!(f, "inference"),
            TaskKind::Verification => write!(f, "verification"),
            TaskKind::Settlement => write!(f, "settlement"),
            TaskKind::ContentAnalysis => write!(f, "content_analysis"),
            TaskKind::RoyaltyCalculation => write!(f, "royalty_calculation"),
            TaskKind::DataAggregation => write!(f, "data_aggregation"),
            TaskKind::Consensus => write!(f, "consensus"),
            TaskKind::Custom(tag) => write!(f, "{tag}"),
        }
    }
}

/// Priority is carried for external ordering; the built-in distribution
/// policies do not act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Task lifecycle states. `Completed`, `Failed` and `Cancelled` are
/// terminal: a task in one of those states is immutable and lives only in
/// the completed log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// A unit of work submitted to the swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub kind: TaskKind,
    pub priority: TaskPriority,
    pub required_capabilities: Vec<Capability>,
    pub input: serde_json::Value,
    pub created_by: String,
    pub assigned_to: Option<Uuid>,
    pub status: TaskStatus,
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(kind: TaskKind, input: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            priority: TaskPriority::Medium,
            required_capabilities: Vec::new(),
            input,
            created_by: "coordinator".to_string(),
            assigned_to: None,
            status: TaskStatus::Pending,
            result: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_capabilities(mut self, caps: Vec<Capability>) -> Self {
        self.required_capabilities = caps;
        self
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.created_by = creator.into();
        self
    }

    /// Mark the task assigned to an agent.
    pub fn assign(&mut self, agent_id: Uuid) {
        self.assigned_to = Some(agent_id);
        self.status = TaskStatus::Assigned;
    }

    /// Mark the task completed with a result payload.
    pub fn complete(&mut self, result: serde_json::Value) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
    }

    /// Mark the task failed; the error becomes the task's result payload.
    pub fn fail(&mut self, error: impl std::fmt::Display) {
        self.status = TaskStatus::Failed;
        self.result = Some(serde_json::json!({ "error": error.to_string() }));
        self.completed_at = Some(Utc::now());
    }

    /// Mark the task cancelled (shutdown path).
    pub fn cancel(&mut self) {
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }
}
