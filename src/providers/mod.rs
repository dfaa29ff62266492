pub mod memory;

pub use memory::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::error::SwarmError;

/// A request for a verifiable inference proof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofRequest {
    pub model_id: Option<Uuid>,
    pub inputs: serde_json::Value,
    pub model_hash: Option<String>,
    pub proof_type: String,
}

/// The output of proof generation: the proof blob plus the inference
/// result it attests to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofBundle {
    pub proof: String,
    pub inference_result: serde_json::Value,
    pub generation_time_ms: u64,
}

/// A stored proof record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofRecord {
    pub proof_id: Uuid,
    pub agent_id: Uuid,
    pub proof: String,
    pub inference_result: serde_json::Value,
    pub stored_at: DateTime<Utc>,
}

/// External proof-generation collaborator. A generation fault propagates
/// to the calling agent and puts it into `Error` status.
#[async_trait]
pub trait ProofGenerator: Send + Sync {
    async fn initialize(&self) -> Result<(), SwarmError>;

    async fn generate_proof(&self, request: &ProofRequest) -> Result<ProofBundle, SwarmError>;

    async fn close(&self) -> Result<(), SwarmError>;
}

/// External durable storage for proofs.
#[async_trait]
pub trait ProofStore: Send + Sync {
    /// Persist a proof record and return its id.
    async fn store_proof(&self, record: ProofRecord) -> Result<Uuid, SwarmError>;

    /// Check a stored proof against its recorded digest.
    async fn verify_proof_integrity(&self, proof_id: Uuid) -> Result<bool, SwarmError>;
}

/// Eventually-durable mirror of the swarm's shared-memory map. The
/// coordinator writes through without waiting for durability.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn initialize_memory(
        &self,
        swarm_id: Uuid,
        seed: serde_json::Value,
    ) -> Result<serde_json::Value, SwarmError>;

    async fn set_value(
        &self,
        swarm_id: Uuid,
        key: &str,
        value: serde_json::Value,
        contributor: &str,
    ) -> Result<(), SwarmError>;

    async fn delete_value(
        &self,
        swarm_id: Uuid,
        key: &str,
        contributor: &str,
    ) -> Result<(), SwarmError>;
}
