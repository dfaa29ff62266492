//! waggle: a multi-agent swarm coordination engine.
//!
//! The coordinator registers capability-tagged agents, distributes tasks
//! among them under one of four policies, runs a deadline-bound quorum
//! voting protocol, and drives a four-phase scheduling cycle
//! (distribute, execute, aggregate, consensus) until no work remains.

pub mod agent;
pub mod config;
pub mod consensus;
pub mod coordinator;
pub mod policy;
pub mod providers;
pub mod types;

pub use agent::{Agent, FirstOptionVoter, VotingStrategy};
pub use config::SwarmConfig;
pub use consensus::{ConsensusManager, ConsensusRequest};
pub use coordinator::{SchedulerPhase, SchedulerReport, SwarmCoordinator, SwarmScheduler, SwarmStats};
pub use policy::{Candidate, DistributionPolicy};
pub use types::{
    AgentConfig, AgentMessage, AgentSnapshot, AgentStatus, Capability, MessageKind, Reputation,
    Result, SwarmError, Task, TaskKind, TaskPriority, TaskStatus,
};
