use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AgentSnapshot, Task};

/// A distribution candidate: an agent snapshot plus the number of tasks
/// currently held against it in the coordinator's active map (which can
/// run ahead of the agent's own status for assigned-but-not-started work).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub snapshot: AgentSnapshot,
    pub active_tasks: usize,
}

/// Strategy used to pick an agent for a pending task. Selected at
/// swarm-configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistributionPolicy {
    #[default]
    RoundRobin,
    CapabilityMatch,
    LoadBalanced,
    Auction,
}

impl DistributionPolicy {
    /// Select the best eligible agent for a task, or `None` when no agent
    /// qualifies (the task then stays pending; this is not an error).
    ///
    /// Eligibility is the same for every policy: the agent is idle, has
    /// every required capability, and holds nothing in the active map.
    /// Candidates are considered in registration order and every policy
    /// breaks ties by that order.
    pub fn select(&self, task: &Task, candidates: &[Candidate]) -> Option<Uuid> {
        let eligible: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| Self::is_eligible(task, c))
            .collect();
        if eligible.is_empty() {
            return None;
        }

        let chosen = match self {
            DistributionPolicy::RoundRobin => eligible[0],
            // Most required capabilities satisfied. Eligibility already
            // demands all of them, so this degenerates to first-by-order.
            DistributionPolicy::CapabilityMatch => {
                Self::best_by(&eligible, |c| Self::matched_capabilities(task, c) as i64)
            }
            DistributionPolicy::LoadBalanced => {
                Self::best_by(&eligible, |c| -(c.active_tasks as i64))
            }
            DistributionPolicy::Auction => {
                Self::best_by(&eligible, |c| c.snapshot.reputation.score() as i64)
            }
        };
        Some(chosen.snapshot.id)
    }

    /// Highest-scoring candidate; the first one wins on ties. Callers
    /// guarantee `eligible` is non-empty.
    fn best_by<'a>(eligible: &[&'a Candidate], score: impl Fn(&Candidate) -> i64) -> &'a Candidate {
        let mut best = eligible[0];
        let mut best_score = score(best);
        for &candidate in &eligible[1..] {
            let s = score(candidate);
            if s > best_score {
                best = candidate;
                best_score = s;
            }
        }
        best
    }

    fn is_eligible(task: &Task, candidate: &Candidate) -> bool {
        candidate.snapshot.is_available()
            && candidate
                .snapshot
                .has_capabilities(&task.required_capabilities)
            && candidate.active_tasks == 0
    }

    fn matched_capabilities(task: &Task, candidate: &Candidate) -> usize {
        task.required_capabilities
            .iter()
            .filter(|c| candidate.snapshot.has_capability(**c))
            .count()
    }
}

impl std::fmt::Display for DistributionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributionPolicy::RoundRobin => write!(f, "round_robin"),
            DistributionPolicy::CapabilityMatch => write!(f, "capability_match"),
            DistributionPolicy::LoadBalanced => write!(f, "load_balanced"),
            DistributionPolicy::Auction => write!(f, "auction"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentStatus, Capability, Reputation, TaskKind};

    fn make_candidate(
        name: &str,
        caps: Vec<Capability>,
        status: AgentStatus,
        reputation: i32,
        active_tasks: usize,
    ) -> Candidate {
        Candidate {
            snapshot: AgentSnapshot {
                id: Uuid::new_v4(),
                name: name.into(),
                capabilities: caps,
                status,
                current_task_id: None,
                reputation: Reputation::new(reputation),
                total_tasks: 0,
                successful_tasks: 0,
                failed_tasks: 0,
                last_error: None,
                last_heartbeat: None,
            },
            active_tasks,
        }
    }

    fn inference_task() -> Task {
        Task::new(TaskKind::Inference, serde_json::Value::Null)
            .with_capabilities(vec![Capability::Inference])
    }

    #[test]
    fn test_round_robin_picks_first_eligible() {
        let task = inference_task();
        let candidates = vec![
            make_candidate("busy", vec![Capability::Inference], AgentStatus::Processing, 100, 1),
            make_candidate("a", vec![Capability::Inference], AgentStatus::Idle, 100, 0),
            make_candidate("b", vec![Capability::Inference], AgentStatus::Idle, 100, 0),
        ];
        let picked = DistributionPolicy::RoundRobin.select(&task, &candidates);
        assert_eq!(picked, Some(candidates[1].snapshot.id));
    }

    #[test]
    fn test_capability_gating_excludes_mismatches() {
        let task = inference_task();
        let candidates = vec![make_candidate(
            "settler",
            vec![Capability::Settlement],
            AgentStatus::Idle,
            100,
            0,
        )];
        for policy in [
            DistributionPolicy::RoundRobin,
            DistributionPolicy::CapabilityMatch,
            DistributionPolicy::LoadBalanced,
            DistributionPolicy::Auction,
        ] {
            assert_eq!(policy.select(&task, &candidates), None);
        }
    }

    #[test]
    fn test_auction_prefers_highest_reputation() {
        let task = inference_task();
        let candidates = vec![
            make_candidate("worn", vec![Capability::Inference], AgentStatus::Idle, 60, 0),
            make_candidate("fresh", vec![Capability::Inference], AgentStatus::Idle, 95, 0),
        ];
        let picked = DistributionPolicy::Auction.select(&task, &candidates);
        assert_eq!(picked, Some(candidates[1].snapshot.id));
    }

    #[test]
    fn test_auction_ties_break_by_order() {
        let task = inference_task();
        let candidates = vec![
            make_candidate("first", vec![Capability::Inference], AgentStatus::Idle, 80, 0),
            make_candidate("second", vec![Capability::Inference], AgentStatus::Idle, 80, 0),
        ];
        let picked = DistributionPolicy::Auction.select(&task, &candidates);
        assert_eq!(picked, Some(candidates[0].snapshot.id));
    }

    #[test]
    fn test_agents_with_assigned_work_are_ineligible() {
        // Idle status but a task already sits in the active map for them.
        let task = inference_task();
        let candidates = vec![make_candidate(
            "assigned",
            vec![Capability::Inference],
            AgentStatus::Idle,
            100,
            1,
        )];
        assert_eq!(DistributionPolicy::LoadBalanced.select(&task, &candidates), None);
    }

    #[test]
    fn test_error_status_is_ineligible() {
        let task = inference_task();
        let candidates = vec![make_candidate(
            "broken",
            vec![Capability::Inference],
            AgentStatus::Error,
            100,
            0,
        )];
        assert_eq!(DistributionPolicy::RoundRobin.select(&task, &candidates), None);
    }

    #[test]
    fn test_no_candidates_is_silent() {
        let task = inference_task();
        assert_eq!(DistributionPolicy::RoundRobin.select(&task, &[]), None);
    }

    #[test]
    fn test_policy_serde_selector() {
        let policy: DistributionPolicy = serde_json::from_str("\"capability_match\"").unwrap();
        assert_eq!(policy, DistributionPolicy::CapabilityMatch);
        assert_eq!(policy.to_string(), "capability_match");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        const ALL_CAPS: [Capability; 6] = [
            Capability::Inference,
            Capability::Settlement,
            Capability::ContentVerification,
            Capability::RoyaltyProcessing,
            Capability::DataAnalysis,
            Capability::SwarmCoordination,
        ];

        fn cap_subset() -> impl Strategy<Value = Vec<Capability>> {
            proptest::collection::vec(0usize..6, 0..6)
                .prop_map(|idxs| {
                    let mut caps: Vec<Capability> =
                        idxs.into_iter().map(|i| ALL_CAPS[i]).collect();
                    caps.dedup();
                    caps
                })
        }

        fn arb_candidate() -> impl Strategy<Value = Candidate> {
            (cap_subset(), 0..4usize, 0..=100i32, any::<bool>()).prop_map(
                |(caps, active, rep, idle)| {
                    make_candidate(
                        "agent",
                        caps,
                        if idle {
                            AgentStatus::Idle
                        } else {
                            AgentStatus::Processing
                        },
                        rep,
                        active,
                    )
                },
            )
        }

        proptest! {
            /// No policy ever assigns a task to an agent lacking a
            /// required capability or holding active work.
            #[test]
            fn selection_respects_gating(
                required in cap_subset(),
                candidates in proptest::collection::vec(arb_candidate(), 0..8),
                policy_idx in 0usize..4,
            ) {
                let policy = [
                    DistributionPolicy::RoundRobin,
                    DistributionPolicy::CapabilityMatch,
                    DistributionPolicy::LoadBalanced,
                    DistributionPolicy::Auction,
                ][policy_idx];
                let task = Task::new(TaskKind::Inference, serde_json::Value::Null)
                    .with_capabilities(required.clone());

                if let Some(id) = policy.select(&task, &candidates) {
                    let chosen = candidates
                        .iter()
                        .find(|c| c.snapshot.id == id)
                        .expect("selected agent must come from the candidate set");
                    prop_assert!(chosen.snapshot.is_available());
                    prop_assert!(chosen.snapshot.has_capabilities(&required));
                    prop_assert_eq!(chosen.active_tasks, 0);
                }
            }
        }
    }
}
