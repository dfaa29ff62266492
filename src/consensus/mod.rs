use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A deadline-bound group vote. Ballots accumulate until the required
/// count is reached or the deadline passes; once resolved the request is
/// never mutated again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusRequest {
    pub id: Uuid,
    pub topic: String,
    pub options: Vec<String>,
    pub required_votes: usize,
    pub deadline: DateTime<Utc>,
    /// Ballot log in first-vote order. A re-vote replaces the agent's
    /// entry in place (last vote wins, position preserved).
    ballots: Vec<(Uuid, String)>,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConsensusRequest {
    pub fn new(
        topic: impl Into<String>,
        options: Vec<String>,
        required_votes: usize,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            options,
            required_votes,
            deadline,
            ballots: Vec::new(),
            result: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }

    pub fn is_resolved(&self) -> bool {
        self.result.is_some()
    }

    pub fn vote_count(&self) -> usize {
        self.ballots.len()
    }

    pub fn vote_of(&self, agent_id: Uuid) -> Option<&str> {
        self.ballots
            .iter()
            .find(|(id, _)| *id == agent_id)
            .map(|(_, v)| v.as_str())
    }

    fn record_ballot(&mut self, agent_id: Uuid, vote: String) {
        match self.ballots.iter_mut().find(|(id, _)| *id == agent_id) {
            Some(entry) => entry.1 = vote,
            None => self.ballots.push((agent_id, vote)),
        }
    }

    /// Tally ballots and pick the option with the strictly highest count.
    /// Ties break toward the option seen first in ballot order.
    fn resolve(&mut self) {
        let mut tally: Vec<(&str, usize)> = Vec::new();
        for (_, vote) in &self.ballots {
            match tally.iter_mut().find(|(option, _)| *option == vote) {
                Some(entry) => entry.1 += 1,
                None => tally.push((vote, 1)),
            }
        }
        // Strict comparison keeps the earliest-seen option on ties.
        let mut winner: Option<(&str, usize)> = None;
        for (option, count) in &tally {
            if winner.is_none_or(|(_, best)| *count > best) {
                winner = Some((option, *count));
            }
        }
        self.result = winner.map(|(option, _)| option.to_string());
    }
}

/// Tracks in-flight group votes for one swarm.
pub struct ConsensusManager {
    active: DashMap<Uuid, ConsensusRequest>,
}

impl ConsensusManager {
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
        }
    }

    /// Register a new vote and return a snapshot of it.
    pub fn initiate(
        &self,
        topic: impl Into<String>,
        options: Vec<String>,
        required_votes: usize,
        deadline: DateTime<Utc>,
    ) -> ConsensusRequest {
        let request = ConsensusRequest::new(topic, options, required_votes, deadline);
        let snapshot = request.clone();
        self.active.insert(request.id, request);
        snapshot
    }

    /// Record an agent's ballot. Returns false when the request is
    /// unknown, already resolved, or past its deadline. Reaching the
    /// required count resolves the request synchronously in this call.
    pub fn record_vote(&self, consensus_id: Uuid, agent_id: Uuid, vote: String) -> bool {
        let Some(mut request) = self.active.get_mut(&consensus_id) else {
            return false;
        };
        if request.is_resolved() || request.is_expired(Utc::now()) {
            return false;
        }
        request.record_ballot(agent_id, vote);
        if request.vote_count() >= request.required_votes {
            request.resolve();
            tracing::info!(
                consensus_id = %consensus_id,
                topic = %request.topic,
                result = ?request.result,
                votes = request.vote_count(),
                "consensus resolved"
            );
        }
        true
    }

    pub fn get(&self, consensus_id: Uuid) -> Option<ConsensusRequest> {
        self.active.get(&consensus_id).map(|r| r.clone())
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn has_active(&self) -> bool {
        !self.active.is_empty()
    }

    /// Drop resolved and expired requests from the active set, returning
    /// the resolved ones so their results can be surfaced. Expired
    /// requests with too few votes never resolve; they are discarded.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<ConsensusRequest> {
        let done: Vec<Uuid> = self
            .active
            .iter()
            .filter(|r| r.is_resolved() || r.is_expired(now))
            .map(|r| r.id)
            .collect();

        let mut resolved = Vec::new();
        for id in done {
            if let Some((_, request)) = self.active.remove(&id) {
                if request.is_resolved() {
                    resolved.push(request);
                } else {
                    tracing::debug!(consensus_id = %id, "consensus expired without quorum");
                }
            }
        }
        resolved
    }
}

impl Default for ConsensusManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn manager_with_request(required: usize, ttl_ms: i64) -> (ConsensusManager, Uuid) {
        let manager = ConsensusManager::new();
        let request = manager.initiate(
            "model-choice",
            vec!["A".into(), "B".into()],
            required,
            Utc::now() + Duration::milliseconds(ttl_ms),
        );
        (manager, request.id)
    }

    #[test]
    fn test_resolves_at_required_votes() {
        let (manager, id) = manager_with_request(2, 60_000);
        let (a1, a2) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(manager.record_vote(id, a1, "A".into()));
        assert!(manager.get(id).unwrap().result.is_none());

        assert!(manager.record_vote(id, a2, "A".into()));
        assert_eq!(manager.get(id).unwrap().result, Some("A".to_string()));
    }

    #[test]
    fn test_vote_after_resolution_rejected() {
        let (manager, id) = manager_with_request(2, 60_000);
        manager.record_vote(id, Uuid::new_v4(), "A".into());
        manager.record_vote(id, Uuid::new_v4(), "A".into());
        assert!(!manager.record_vote(id, Uuid::new_v4(), "B".into()));
    }

    #[test]
    fn test_unknown_request_rejected() {
        let manager = ConsensusManager::new();
        assert!(!manager.record_vote(Uuid::new_v4(), Uuid::new_v4(), "A".into()));
    }

    #[test]
    fn test_expired_request_rejects_votes_and_never_resolves() {
        let (manager, id) = manager_with_request(1, -1_000);
        assert!(!manager.record_vote(id, Uuid::new_v4(), "A".into()));

        let resolved = manager.sweep(Utc::now());
        assert!(resolved.is_empty());
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn test_last_vote_wins_single_ballot_per_agent() {
        let (manager, id) = manager_with_request(3, 60_000);
        let agent = Uuid::new_v4();
        manager.record_vote(id, agent, "A".into());
        manager.record_vote(id, agent, "B".into());

        let request = manager.get(id).unwrap();
        assert_eq!(request.vote_count(), 1);
        assert_eq!(request.vote_of(agent), Some("B"));
    }

    #[test]
    fn test_plurality_with_first_seen_tie_break() {
        let (manager, id) = manager_with_request(4, 60_000);
        // B first at two votes, then A reaches two: B wins the tie.
        manager.record_vote(id, Uuid::new_v4(), "B".into());
        manager.record_vote(id, Uuid::new_v4(), "A".into());
        manager.record_vote(id, Uuid::new_v4(), "B".into());
        manager.record_vote(id, Uuid::new_v4(), "A".into());

        assert_eq!(manager.get(id).unwrap().result, Some("B".to_string()));
    }

    #[test]
    fn test_strict_majority_wins() {
        let (manager, id) = manager_with_request(3, 60_000);
        manager.record_vote(id, Uuid::new_v4(), "A".into());
        manager.record_vote(id, Uuid::new_v4(), "B".into());
        manager.record_vote(id, Uuid::new_v4(), "B".into());
        assert_eq!(manager.get(id).unwrap().result, Some("B".to_string()));
    }

    #[test]
    fn test_sweep_returns_resolved_and_clears() {
        let (manager, id) = manager_with_request(1, 60_000);
        manager.record_vote(id, Uuid::new_v4(), "A".into());

        let resolved = manager.sweep(Utc::now());
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].result, Some("A".to_string()));
        assert!(!manager.has_active());

        // Swept requests no longer accept votes.
        assert!(!manager.record_vote(id, Uuid::new_v4(), "A".into()));
    }
}
