use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("Swarm at capacity: {max_agents} agents already registered")]
    SwarmAtCapacity { max_agents: usize },

    #[error("Task not found: {0}")]
    TaskNotFound(uuid::Uuid),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Task execution failed: {0}")]
    TaskExecution(String),

    #[error("Proof generation failed: {0}")]
    ProofGeneration(String),

    // Carried for external ProofStore / MemoryStore implementations; the
    // in-memory ones never fail.
    #[error("Proof storage error: {0}")]
    ProofStorage(String),

    #[error("Memory store error: {0}")]
    Memory(String),
}

pub type Result<T> = std::result::Result<T, SwarmError>;
