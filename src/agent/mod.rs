pub mod handlers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::providers::{ProofGenerator, ProofRecord, ProofRequest, ProofStore};
use crate::types::{
    AgentConfig, AgentMessage, AgentSnapshot, AgentStatus, Capability, MessageKind, Reputation,
    Result, SwarmError, Task, TaskKind, TaskStatus,
};

/// Pluggable consensus decision function. The default votes for the first
/// offered option; production deployments swap in model- or rule-driven
/// strategies without touching the surrounding protocol.
pub trait VotingStrategy: Send + Sync {
    fn vote(&self, topic: &str, options: &[String]) -> Option<String>;
}

/// Placeholder strategy: always the first option.
pub struct FirstOptionVoter;

impl VotingStrategy for FirstOptionVoter {
    fn vote(&self, _topic: &str, options: &[String]) -> Option<String> {
        options.first().cloned()
    }
}

/// Mutable runtime state owned by the agent. The coordinator only ever
/// observes it through [`AgentSnapshot`].
struct AgentRuntime {
    status: AgentStatus,
    current_task_id: Option<Uuid>,
    inbox: Vec<AgentMessage>,
    context: HashMap<String, Value>,
    last_error: Option<String>,
    proof_ids: Vec<Uuid>,
    reputation: Reputation,
    total_tasks: u64,
    successful_tasks: u64,
    failed_tasks: u64,
    last_heartbeat: Option<DateTime<Utc>>,
}

impl AgentRuntime {
    fn new() -> Self {
        Self {
            status: AgentStatus::Idle,
            current_task_id: None,
            inbox: Vec::new(),
            context: HashMap::new(),
            last_error: None,
            proof_ids: Vec::new(),
            reputation: Reputation::default(),
            total_tasks: 0,
            successful_tasks: 0,
            failed_tasks: 0,
            last_heartbeat: None,
        }
    }
}

/// A capability-tagged worker that executes one task at a time.
pub struct Agent {
    config: AgentConfig,
    runtime: Mutex<AgentRuntime>,
    proofs: Arc<dyn ProofGenerator>,
    proof_store: Arc<dyn ProofStore>,
    voter: Arc<dyn VotingStrategy>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        proofs: Arc<dyn ProofGenerator>,
        proof_store: Arc<dyn ProofStore>,
    ) -> Self {
        Self {
            config,
            runtime: Mutex::new(AgentRuntime::new()),
            proofs,
            proof_store,
            voter: Arc::new(FirstOptionVoter),
        }
    }

    pub fn with_voter(mut self, voter: Arc<dyn VotingStrategy>) -> Self {
        self.voter = voter;
        self
    }

    pub fn id(&self) -> Uuid {
        self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    // The lock is only ever held for field reads/writes, never across an
    // await point.
    fn lock(&self) -> MutexGuard<'_, AgentRuntime> {
        self.runtime.lock().expect("agent runtime lock poisoned")
    }

    /// True iff the agent is idle.
    pub fn is_available(&self) -> bool {
        self.lock().status == AgentStatus::Idle
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.config.capabilities.contains(&capability)
    }

    pub fn status(&self) -> AgentStatus {
        self.lock().status
    }

    /// Take a point-in-time snapshot of the runtime state.
    pub fn snapshot(&self) -> AgentSnapshot {
        let rt = self.lock();
        AgentSnapshot {
            id: self.config.id,
            name: self.config.name.clone(),
            capabilities: self.config.capabilities.clone(),
            status: rt.status,
            current_task_id: rt.current_task_id,
            reputation: rt.reputation,
            total_tasks: rt.total_tasks,
            successful_tasks: rt.successful_tasks,
            failed_tasks: rt.failed_tasks,
            last_error: rt.last_error.clone(),
            last_heartbeat: rt.last_heartbeat,
        }
    }

    /// Clear an `Error` status back to idle. Returns whether the agent was
    /// actually in the error state.
    pub fn reset(&self) -> bool {
        let mut rt = self.lock();
        if rt.status == AgentStatus::Error {
            rt.status = AgentStatus::Idle;
            rt.current_task_id = None;
            rt.last_error = None;
            true
        } else {
            false
        }
    }

    /// Execute a task to a terminal state.
    ///
    /// The caller is responsible for checking [`Agent::is_available`]
    /// before assigning. A handler error is swallowed into the task: the
    /// task comes back `Failed` with the error as its result payload and
    /// the agent returns to idle. The one exception is a proof-generation
    /// fault during inference, which leaves the agent in `Error` status
    /// and propagates to the caller.
    pub async fn execute_task(&self, mut task: Task) -> Result<Task> {
        {
            let mut rt = self.lock();
            rt.status = AgentStatus::Processing;
            rt.current_task_id = Some(task.id);
        }
        task.status = TaskStatus::InProgress;

        let outcome = self.dispatch(&task).await;
        match outcome {
            Ok(result) => {
                task.complete(result);
                let mut rt = self.lock();
                rt.reputation.reward();
                rt.total_tasks += 1;
                rt.successful_tasks += 1;
                rt.status = AgentStatus::Idle;
                rt.current_task_id = None;
            }
            Err(err @ SwarmError::ProofGeneration(_)) => {
                // Collaborator fault: the task still counts against
                // reputation, but status stays Error (set by
                // process_inference) and the fault propagates.
                let mut rt = self.lock();
                rt.reputation.penalize();
                rt.total_tasks += 1;
                rt.failed_tasks += 1;
                rt.current_task_id = None;
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(task_id = %task.id, agent = %self.config.name, error = %err, "task handler failed");
                task.fail(&err);
                let mut rt = self.lock();
                rt.reputation.penalize();
                rt.total_tasks += 1;
                rt.failed_tasks += 1;
                rt.last_error = Some(err.to_string());
                rt.status = AgentStatus::Idle;
                rt.current_task_id = None;
            }
        }
        Ok(task)
    }

    /// Dispatch on the task kind. `Custom` tags have no handler and fail
    /// the task as an unknown type.
    async fn dispatch(&self, task: &Task) -> Result<Value> {
        match &task.kind {
            TaskKind::Inference => self.process_inference(&task.input).await,
            TaskKind::Verification => self.verify_proof(&task.input).await,
            TaskKind::Settlement => handlers::settle(&task.input),
            TaskKind::ContentAnalysis => handlers::analyze_content(&task.input),
            TaskKind::RoyaltyCalculation => handlers::calculate_royalties(&task.input),
            TaskKind::DataAggregation => handlers::aggregate_data(&task.input),
            TaskKind::Consensus => self.vote_on_payload(&task.input),
            TaskKind::Custom(tag) => Err(SwarmError::UnknownTaskType(tag.clone())),
        }
    }

    /// Run an inference through the proof generator and persist the proof.
    ///
    /// This is the only execution path that can leave the agent outside
    /// the idle/processing cycle: on a generation fault the status becomes
    /// `Error` and the fault propagates. Callers must [`Agent::reset`] or
    /// replace the agent.
    pub async fn process_inference(&self, input: &Value) -> Result<Value> {
        let request = ProofRequest {
            model_id: self.config.model_id,
            inputs: input.clone(),
            model_hash: input
                .get("model_hash")
                .and_then(Value::as_str)
                .map(String::from),
            proof_type: input
                .get("proof_type")
                .and_then(Value::as_str)
                .unwrap_or("zkml")
                .to_string(),
        };

        let bundle = match self.proofs.generate_proof(&request).await {
            Ok(bundle) => bundle,
            Err(err) => {
                let mut rt = self.lock();
                rt.status = AgentStatus::Error;
                rt.last_error = Some(err.to_string());
                return Err(err);
            }
        };

        let record = ProofRecord {
            proof_id: Uuid::new_v4(),
            agent_id: self.config.id,
            proof: bundle.proof.clone(),
            inference_result: bundle.inference_result.clone(),
            stored_at: Utc::now(),
        };
        let proof_id = self.proof_store.store_proof(record).await?;
        self.lock().proof_ids.push(proof_id);

        Ok(json!({
            "proof_id": proof_id,
            "proof": bundle.proof,
            "inference_result": bundle.inference_result,
            "generation_time_ms": bundle.generation_time_ms,
        }))
    }

    async fn verify_proof(&self, input: &Value) -> Result<Value> {
        let proof_id = input
            .get("proof_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                SwarmError::TaskExecution("verification requires a 'proof_id'".to_string())
            })?;
        let valid = self.proof_store.verify_proof_integrity(proof_id).await?;
        Ok(json!({ "proof_id": proof_id, "valid": valid }))
    }

    fn vote_on_payload(&self, input: &Value) -> Result<Value> {
        let topic = input.get("topic").and_then(Value::as_str).unwrap_or("");
        let options: Vec<String> = input
            .get("options")
            .and_then(Value::as_array)
            .map(|opts| {
                opts.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        match self.voter.vote(topic, &options) {
            Some(vote) => Ok(json!({ "topic": topic, "vote": vote })),
            None => Err(SwarmError::TaskExecution(
                "consensus task offered no options".to_string(),
            )),
        }
    }

    /// Vote on a consensus ballot. Deterministic placeholder policy by
    /// default; see [`VotingStrategy`].
    pub fn participate_in_consensus(&self, topic: &str, options: &[String]) -> Option<String> {
        self.voter.vote(topic, options)
    }

    /// Buffer an inbound message, run its handler, and synthesize a reply
    /// when the kind warrants one.
    pub async fn handle_message(&self, message: AgentMessage) -> Result<Option<AgentMessage>> {
        self.lock().inbox.push(message.clone());

        match message.kind {
            MessageKind::TaskRequest => {
                self.lock()
                    .context
                    .insert("last_task_request".to_string(), message.payload.clone());
                let reply = message.reply(
                    MessageKind::TaskResponse,
                    json!({
                        "agent_id": self.config.id,
                        "available": self.is_available(),
                    }),
                );
                Ok(Some(reply))
            }
            MessageKind::InferenceRequest => {
                let result = self.process_inference(&message.payload).await?;
                self.lock()
                    .context
                    .insert("last_inference_result".to_string(), result);
                Ok(None)
            }
            MessageKind::MemoryUpdate => {
                if let Some(key) = message.payload.get("key").and_then(Value::as_str) {
                    let value = message
                        .payload
                        .get("value")
                        .cloned()
                        .unwrap_or(Value::Null);
                    self.lock().context.insert(key.to_string(), value);
                }
                Ok(None)
            }
            MessageKind::Heartbeat => {
                let status = {
                    let mut rt = self.lock();
                    rt.last_heartbeat = Some(Utc::now());
                    rt.status
                };
                let reply = message.reply(
                    MessageKind::Heartbeat,
                    json!({ "agent_id": self.config.id, "status": status }),
                );
                Ok(Some(reply))
            }
            MessageKind::ConsensusRequest => {
                let topic = message
                    .payload
                    .get("topic")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                let options: Vec<String> = message
                    .payload
                    .get("options")
                    .and_then(Value::as_array)
                    .map(|opts| {
                        opts.iter()
                            .filter_map(Value::as_str)
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();
                let reply = self.participate_in_consensus(topic, &options).map(|vote| {
                    message.reply(
                        MessageKind::ConsensusVote,
                        json!({
                            "consensus_id": message.payload.get("consensus_id"),
                            "agent_id": self.config.id,
                            "vote": vote,
                        }),
                    )
                });
                Ok(reply)
            }
            MessageKind::TaskResponse | MessageKind::ConsensusVote => Ok(None),
        }
    }

    /// Read a context value (test and diagnostics hook).
    pub fn context_value(&self, key: &str) -> Option<Value> {
        self.lock().context.get(key).cloned()
    }

    pub fn proof_ids(&self) -> Vec<Uuid> {
        self.lock().proof_ids.clone()
    }
}
