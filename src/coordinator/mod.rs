pub mod scheduler;

pub use scheduler::{SchedulerPhase, SchedulerReport, SwarmScheduler};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::agent::Agent;
use crate::config::SwarmConfig;
use crate::consensus::{ConsensusManager, ConsensusRequest};
use crate::policy::Candidate;
use crate::providers::{MemoryStore, ProofGenerator, ProofStore};
use crate::types::{
    AgentConfig, AgentMessage, AgentSnapshot, Capability, MessageKind, Result, SwarmError, Task,
    TaskKind, TaskPriority, TaskStatus,
};

/// Swarm-wide mutable state. The coordinator is its single writer; every
/// mutation happens under one lock so cross-collection invariants (a task
/// lives in exactly one of pending/active/completed) hold atomically.
struct SwarmState {
    agents: Vec<Arc<Agent>>,
    pending: VecDeque<Task>,
    active: HashMap<Uuid, Task>,
    completed: Vec<Task>,
    shared_memory: HashMap<String, Value>,
    outbox: VecDeque<AgentMessage>,
    updated_at: DateTime<Utc>,
}

impl SwarmState {
    fn new() -> Self {
        Self {
            agents: Vec::new(),
            pending: VecDeque::new(),
            active: HashMap::new(),
            completed: Vec::new(),
            shared_memory: HashMap::new(),
            outbox: VecDeque::new(),
            updated_at: Utc::now(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn agent(&self, id: Uuid) -> Option<&Arc<Agent>> {
        self.agents.iter().find(|a| a.id() == id)
    }

    fn active_count_for(&self, agent_id: Uuid) -> usize {
        self.active
            .values()
            .filter(|t| t.assigned_to == Some(agent_id))
            .count()
    }
}

/// Read-only swarm statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmStats {
    pub agent_count: usize,
    pub pending_tasks: usize,
    pub active_tasks: usize,
    pub completed_tasks: usize,
    /// Completed-and-successful over completed-total; 0 when nothing has
    /// completed yet.
    pub success_rate: f64,
    pub agents_by_status: HashMap<String, usize>,
    pub average_reputation: f64,
}

/// Owns all swarm-wide state: the agent registry, task collections,
/// shared memory mirror, and the consensus registry.
pub struct SwarmCoordinator {
    config: SwarmConfig,
    state: Mutex<SwarmState>,
    consensus: ConsensusManager,
    proofs: Arc<dyn ProofGenerator>,
    proof_store: Arc<dyn ProofStore>,
    memory: Arc<dyn MemoryStore>,
}

impl SwarmCoordinator {
    /// Build a coordinator, initializing the proof generator and seeding
    /// the external memory mirror.
    pub async fn new(
        config: SwarmConfig,
        proofs: Arc<dyn ProofGenerator>,
        proof_store: Arc<dyn ProofStore>,
        memory: Arc<dyn MemoryStore>,
    ) -> Result<Arc<Self>> {
        proofs.initialize().await?;
        memory
            .initialize_memory(
                config.id,
                json!({ "swarm": config.name, "policy": config.distribution_policy.to_string() }),
            )
            .await?;
        tracing::info!(swarm = %config.name, policy = %config.distribution_policy, "swarm coordinator created");
        Ok(Arc::new(Self {
            config,
            state: Mutex::new(SwarmState::new()),
            consensus: ConsensusManager::new(),
            proofs,
            proof_store,
            memory,
        }))
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// Register a new agent. Fails when the swarm is at capacity.
    pub async fn register_agent(&self, agent_config: AgentConfig) -> Result<Arc<Agent>> {
        let mut state = self.state.lock().await;
        if state.agents.len() >= self.config.max_agents {
            return Err(SwarmError::SwarmAtCapacity {
                max_agents: self.config.max_agents,
            });
        }

        let agent = Arc::new(Agent::new(
            agent_config,
            self.proofs.clone(),
            self.proof_store.clone(),
        ));
        let record = json!({
            "name": agent.name(),
            "capabilities": agent.config().capabilities,
            "registered_at": Utc::now().to_rfc3339(),
        });
        state
            .shared_memory
            .insert(format!("agent:{}", agent.id()), record.clone());
        state.agents.push(agent.clone());
        state.touch();
        drop(state);

        self.mirror(&format!("agent:{}", agent.id()), record).await;
        tracing::info!(agent = %agent.name(), id = %agent.id(), "agent registered");
        Ok(agent)
    }

    /// Remove an agent; idempotent. Tasks already assigned to the agent
    /// are left in the active map untouched. The registration record is
    /// dropped from shared memory and the external mirror.
    pub async fn remove_agent(&self, agent_id: Uuid) -> bool {
        let key = format!("agent:{agent_id}");
        let mut state = self.state.lock().await;
        let before = state.agents.len();
        state.agents.retain(|a| a.id() != agent_id);
        let removed = state.agents.len() < before;
        if removed {
            state.shared_memory.remove(&key);
            state.touch();
        }
        drop(state);

        if removed {
            if let Err(err) = self
                .memory
                .delete_value(self.config.id, &key, "coordinator")
                .await
            {
                tracing::warn!(key = %key, error = %err, "shared memory mirror delete failed");
            }
            tracing::info!(id = %agent_id, "agent removed");
        }
        removed
    }

    /// Clear an agent out of `Error` status. Returns false when the agent
    /// is unknown or was not in the error state.
    pub async fn reset_agent(&self, agent_id: Uuid) -> bool {
        let state = self.state.lock().await;
        match state.agent(agent_id) {
            Some(agent) => agent.reset(),
            None => false,
        }
    }

    pub async fn get_agent(&self, agent_id: Uuid) -> Option<Arc<Agent>> {
        self.state.lock().await.agent(agent_id).cloned()
    }

    pub async fn agent_snapshots(&self) -> Vec<AgentSnapshot> {
        let state = self.state.lock().await;
        state.agents.iter().map(|a| a.snapshot()).collect()
    }

    /// Submit a task and immediately run one distribution round. The
    /// returned task reflects whatever that round produced: still pending
    /// when no eligible agent was free, otherwise assigned (or further
    /// along if execution already finished).
    pub async fn submit_task(
        self: &Arc<Self>,
        kind: TaskKind,
        input: Value,
        priority: TaskPriority,
        required_capabilities: Vec<Capability>,
    ) -> Result<Task> {
        let task = Task::new(kind, input)
            .with_priority(priority)
            .with_capabilities(required_capabilities);
        let task_id = task.id;

        {
            let mut state = self.state.lock().await;
            state.pending.push_back(task);
            state.touch();
        }
        tracing::debug!(task = %task_id, "task submitted");

        self.distribute_tasks().await;
        self.task(task_id)
            .await
            .ok_or(SwarmError::TaskNotFound(task_id))
    }

    /// Look a task up across pending, active, and completed collections.
    pub async fn task(&self, task_id: Uuid) -> Option<Task> {
        let state = self.state.lock().await;
        state
            .pending
            .iter()
            .find(|t| t.id == task_id)
            .or_else(|| state.active.get(&task_id))
            .or_else(|| state.completed.iter().find(|t| t.id == task_id))
            .cloned()
    }

    /// One distribution round: walk pending tasks in FIFO order, select an
    /// agent per the configured policy, and kick off execution without
    /// blocking. Tasks with no eligible agent stay pending. Returns how
    /// many tasks were assigned.
    pub async fn distribute_tasks(self: &Arc<Self>) -> usize {
        let mut state = self.state.lock().await;
        let mut assigned = 0;
        let mut remaining = VecDeque::with_capacity(state.pending.len());

        while let Some(mut task) = state.pending.pop_front() {
            let candidates: Vec<Candidate> = state
                .agents
                .iter()
                .map(|a| Candidate {
                    snapshot: a.snapshot(),
                    active_tasks: state.active_count_for(a.id()),
                })
                .collect();

            match self.config.distribution_policy.select(&task, &candidates) {
                Some(agent_id) => {
                    // The policy only ever returns ids from the candidate
                    // set built above, all of which are registered.
                    let Some(agent) = state.agent(agent_id).cloned() else {
                        remaining.push_back(task);
                        continue;
                    };
                    task.assign(agent_id);
                    tracing::debug!(task = %task.id, agent = %agent.name(), "task assigned");
                    state.active.insert(task.id, task.clone());
                    assigned += 1;

                    let coordinator = self.clone();
                    tokio::spawn(async move {
                        coordinator.run_task_on_agent(agent, task).await;
                    });
                }
                None => remaining.push_back(task),
            }
        }
        state.pending = remaining;
        if assigned > 0 {
            state.touch();
        }
        assigned
    }

    /// Drive one task to a terminal state on an agent and land exactly one
    /// update in the active map. A propagated inference fault is caught
    /// here: the task is still marked failed so the scheduler never sees
    /// the fault, but the agent stays in `Error` until reset.
    async fn run_task_on_agent(self: Arc<Self>, agent: Arc<Agent>, mut task: Task) {
        let task_id = task.id;
        {
            let mut state = self.state.lock().await;
            if let Some(active) = state.active.get_mut(&task_id) {
                active.status = TaskStatus::InProgress;
            }
        }

        let finished = match agent.execute_task(task.clone()).await {
            Ok(done) => done,
            Err(err) => {
                tracing::error!(task = %task_id, agent = %agent.name(), error = %err, "agent fault during execution");
                task.fail(&err);
                task
            }
        };

        let mut state = self.state.lock().await;
        // `remove` returning Some guarantees a single completion per task.
        if state.active.remove(&task_id).is_some() {
            state.completed.push(finished);
            state.touch();
        }
    }

    /// Start a group vote and broadcast it to every registered agent,
    /// collecting synchronous vote replies into the outbound queue.
    pub async fn initiate_consensus(
        &self,
        topic: impl Into<String>,
        options: Vec<String>,
        deadline_ms: i64,
    ) -> Result<ConsensusRequest> {
        let topic = topic.into();
        let agents: Vec<Arc<Agent>> = {
            let state = self.state.lock().await;
            state.agents.clone()
        };
        if agents.len() < self.config.quorum_size {
            tracing::warn!(
                agents = agents.len(),
                quorum = self.config.quorum_size,
                "initiating consensus below quorum size"
            );
        }

        let required_votes =
            (agents.len() as f64 * self.config.consensus_threshold).ceil() as usize;
        let deadline = Utc::now() + Duration::milliseconds(deadline_ms);
        let request = self
            .consensus
            .initiate(topic.clone(), options.clone(), required_votes, deadline);
        tracing::info!(
            consensus = %request.id,
            topic = %topic,
            required_votes,
            "consensus initiated"
        );

        let payload = json!({
            "consensus_id": request.id,
            "topic": topic,
            "options": options,
            "deadline": deadline.to_rfc3339(),
        });
        let mut replies = Vec::new();
        for agent in &agents {
            let message = AgentMessage::new(
                "coordinator",
                agent.id().to_string(),
                MessageKind::ConsensusRequest,
                payload.clone(),
            );
            match agent.handle_message(message).await {
                Ok(Some(reply)) => replies.push(reply),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(agent = %agent.name(), error = %err, "consensus broadcast failed")
                }
            }
        }

        let mut state = self.state.lock().await;
        state.outbox.extend(replies);
        state.touch();
        Ok(request)
    }

    /// Record a ballot. False when the request is unknown, resolved, or
    /// past its deadline; reaching the required count resolves the vote
    /// synchronously in this call.
    pub fn record_vote(&self, consensus_id: Uuid, agent_id: Uuid, vote: impl Into<String>) -> bool {
        self.consensus.record_vote(consensus_id, agent_id, vote.into())
    }

    pub fn consensus_request(&self, consensus_id: Uuid) -> Option<ConsensusRequest> {
        self.consensus.get(consensus_id)
    }

    pub fn has_active_consensus(&self) -> bool {
        self.consensus.has_active()
    }

    /// Aggregate phase: fold completed task results into shared memory
    /// under `aggregatedResults` and mirror the fold to the memory store.
    pub async fn aggregate_results(&self) {
        let fold = {
            let mut state = self.state.lock().await;
            let mut fold = serde_json::Map::new();
            for task in &state.completed {
                if let Some(result) = &task.result {
                    fold.insert(task.id.to_string(), result.clone());
                }
            }
            let fold = Value::Object(fold);
            state
                .shared_memory
                .insert("aggregatedResults".to_string(), fold.clone());
            state.touch();
            fold
        };
        self.mirror("aggregatedResults", fold).await;
    }

    /// Consensus phase: sweep resolved and expired requests, surfacing
    /// resolved results into shared memory.
    pub async fn sweep_consensus(&self) {
        let resolved = self.consensus.sweep(Utc::now());
        if resolved.is_empty() {
            return;
        }
        let mut surfaced = Vec::with_capacity(resolved.len());
        {
            let mut state = self.state.lock().await;
            for request in resolved {
                let key = format!("consensus:{}", request.id);
                let value = json!({
                    "topic": request.topic,
                    "result": request.result,
                    "votes": request.vote_count(),
                });
                state.shared_memory.insert(key.clone(), value.clone());
                surfaced.push((key, value));
            }
            state.touch();
        }
        for (key, value) in surfaced {
            self.mirror(&key, value).await;
        }
    }

    /// Write-through to the external memory mirror. Best effort: the local
    /// map is authoritative and a mirror failure only logs.
    async fn mirror(&self, key: &str, value: Value) {
        if let Err(err) = self
            .memory
            .set_value(self.config.id, key, value, "coordinator")
            .await
        {
            tracing::warn!(key, error = %err, "shared memory mirror write failed");
        }
    }

    pub async fn shared_memory_value(&self, key: &str) -> Option<Value> {
        self.state.lock().await.shared_memory.get(key).cloned()
    }

    /// Drain collected agent replies for the embedding layer.
    pub async fn drain_outbox(&self) -> Vec<AgentMessage> {
        let mut state = self.state.lock().await;
        state.outbox.drain(..).collect()
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn active_count(&self) -> usize {
        self.state.lock().await.active.len()
    }

    pub async fn completed_count(&self) -> usize {
        self.state.lock().await.completed.len()
    }

    /// Read-only swarm statistics; no side effects.
    pub async fn stats(&self) -> SwarmStats {
        let state = self.state.lock().await;
        let completed_total = state.completed.len();
        let successful = state
            .completed
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        let success_rate = if completed_total == 0 {
            0.0
        } else {
            successful as f64 / completed_total as f64
        };

        let mut agents_by_status: HashMap<String, usize> = HashMap::new();
        let mut reputation_sum = 0i64;
        for agent in &state.agents {
            let snapshot = agent.snapshot();
            let key = format!("{:?}", snapshot.status).to_lowercase();
            *agents_by_status.entry(key).or_insert(0) += 1;
            reputation_sum += snapshot.reputation.score() as i64;
        }
        let average_reputation = if state.agents.is_empty() {
            0.0
        } else {
            reputation_sum as f64 / state.agents.len() as f64
        };

        SwarmStats {
            agent_count: state.agents.len(),
            pending_tasks: state.pending.len(),
            active_tasks: state.active.len(),
            completed_tasks: completed_total,
            success_rate,
            agents_by_status,
            average_reputation,
        }
    }

    /// Cancel all pending work, clear the registry, and release the proof
    /// generator.
    pub async fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        while let Some(mut task) = state.pending.pop_front() {
            task.cancel();
            state.completed.push(task);
        }
        state.agents.clear();
        state.touch();
        drop(state);

        self.proofs.close().await?;
        tracing::info!(swarm = %self.config.name, "swarm coordinator shut down");
        Ok(())
    }
}
