use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{MemoryStore, ProofBundle, ProofGenerator, ProofRecord, ProofRequest, ProofStore};
use crate::types::error::SwarmError;

/// In-process proof generator. Produces a SHA-256 digest over the request
/// inputs as the "proof" and echoes the inputs back as the inference
/// result, which is enough to exercise the full proof path end to end.
pub struct LocalProofGenerator {
    initialized: AtomicBool,
    closed: AtomicBool,
}

impl LocalProofGenerator {
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    fn digest(request: &ProofRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.inputs.to_string().as_bytes());
        if let Some(hash) = &request.model_hash {
            hasher.update(hash.as_bytes());
        }
        hasher.update(request.proof_type.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl Default for LocalProofGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProofGenerator for LocalProofGenerator {
    async fn initialize(&self) -> Result<(), SwarmError> {
        self.initialized.store(true, Ordering::SeqCst);
        self.closed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn generate_proof(&self, request: &ProofRequest) -> Result<ProofBundle, SwarmError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SwarmError::ProofGeneration(
                "proof generator is closed".to_string(),
            ));
        }
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(SwarmError::ProofGeneration(
                "proof generator not initialized".to_string(),
            ));
        }
        let started = Instant::now();
        let proof = Self::digest(request);
        Ok(ProofBundle {
            proof,
            inference_result: serde_json::json!({
                "model_id": request.model_id,
                "outputs": request.inputs,
            }),
            generation_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn close(&self) -> Result<(), SwarmError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory proof store keyed by proof id. Integrity verification
/// recomputes the digest of the stored inference result and compares it
/// against the digest recorded at store time.
pub struct InMemoryProofStore {
    records: DashMap<Uuid, (ProofRecord, String)>,
}

impl InMemoryProofStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    fn record_digest(record: &ProofRecord) -> String {
        let mut hasher = Sha256::new();
        hasher.update(record.proof.as_bytes());
        hasher.update(record.inference_result.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InMemoryProofStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProofStore for InMemoryProofStore {
    async fn store_proof(&self, record: ProofRecord) -> Result<Uuid, SwarmError> {
        let id = record.proof_id;
        let digest = Self::record_digest(&record);
        self.records.insert(id, (record, digest));
        Ok(id)
    }

    async fn verify_proof_integrity(&self, proof_id: Uuid) -> Result<bool, SwarmError> {
        match self.records.get(&proof_id) {
            Some(entry) => {
                let (record, digest) = entry.value();
                Ok(Self::record_digest(record) == *digest)
            }
            None => Ok(false),
        }
    }
}

/// In-memory shared-memory mirror with a per-key contributor log.
pub struct InMemorySwarmMemory {
    swarms: DashMap<Uuid, HashMap<String, serde_json::Value>>,
    contributions: DashMap<Uuid, Vec<(String, String)>>,
}

impl InMemorySwarmMemory {
    pub fn new() -> Self {
        Self {
            swarms: DashMap::new(),
            contributions: DashMap::new(),
        }
    }

    pub fn get_value(&self, swarm_id: Uuid, key: &str) -> Option<serde_json::Value> {
        self.swarms.get(&swarm_id).and_then(|m| m.get(key).cloned())
    }

    pub fn contributions(&self, swarm_id: Uuid) -> Vec<(String, String)> {
        self.contributions
            .get(&swarm_id)
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl Default for InMemorySwarmMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemorySwarmMemory {
    async fn initialize_memory(
        &self,
        swarm_id: Uuid,
        seed: serde_json::Value,
    ) -> Result<serde_json::Value, SwarmError> {
        let mut map = HashMap::new();
        if let serde_json::Value::Object(fields) = seed {
            for (k, v) in fields {
                map.insert(k, v);
            }
        }
        map.insert(
            "initialized_at".to_string(),
            serde_json::json!(Utc::now().to_rfc3339()),
        );
        let data = serde_json::json!(map.clone());
        self.swarms.insert(swarm_id, map);
        Ok(data)
    }

    async fn set_value(
        &self,
        swarm_id: Uuid,
        key: &str,
        value: serde_json::Value,
        contributor: &str,
    ) -> Result<(), SwarmError> {
        self.swarms
            .entry(swarm_id)
            .or_default()
            .insert(key.to_string(), value);
        self.contributions
            .entry(swarm_id)
            .or_default()
            .push((key.to_string(), contributor.to_string()));
        Ok(())
    }

    async fn delete_value(
        &self,
        swarm_id: Uuid,
        key: &str,
        contributor: &str,
    ) -> Result<(), SwarmError> {
        if let Some(mut map) = self.swarms.get_mut(&swarm_id) {
            map.remove(key);
        }
        self.contributions
            .entry(swarm_id)
            .or_default()
            .push((format!("-{key}"), contributor.to_string()));
        Ok(())
    }
}
