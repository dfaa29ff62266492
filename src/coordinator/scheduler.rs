use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::SwarmCoordinator;

/// The four phases of the scheduling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerPhase {
    Distribute,
    Execute,
    Aggregate,
    Consensus,
}

/// Summary of one scheduler invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerReport {
    pub cycles: usize,
    pub tasks_assigned: usize,
    /// Whether any execute phase hit its timeout with work still active.
    pub execute_timed_out: bool,
}

/// Drives the distribute → execute → aggregate → consensus cycle until no
/// work remains, as an explicit four-state machine.
///
/// Transitions:
/// - after Distribute: pending → Execute; active → Aggregate; else done.
/// - after Execute: always Aggregate (the timeout never cancels work).
/// - after Aggregate: open votes → Consensus; pending → Distribute; else done.
/// - after Consensus: always Distribute.
pub struct SwarmScheduler {
    coordinator: Arc<SwarmCoordinator>,
}

impl SwarmScheduler {
    pub fn new(coordinator: Arc<SwarmCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Run cycles until the termination condition holds or the configured
    /// cycle budget is spent.
    pub async fn run(&self) -> SchedulerReport {
        let config = self.coordinator.config().clone();
        let mut report = SchedulerReport {
            cycles: 0,
            tasks_assigned: 0,
            execute_timed_out: false,
        };
        let mut phase = SchedulerPhase::Distribute;

        loop {
            match phase {
                SchedulerPhase::Distribute => {
                    if report.cycles >= config.max_cycles {
                        tracing::warn!(
                            cycles = report.cycles,
                            pending = self.coordinator.pending_count().await,
                            "scheduler cycle budget exhausted with work remaining"
                        );
                        break;
                    }
                    report.cycles += 1;
                    let assigned = self.coordinator.distribute_tasks().await;
                    report.tasks_assigned += assigned;
                    tracing::debug!(cycle = report.cycles, assigned, "distribute phase");

                    if self.coordinator.pending_count().await > 0 {
                        phase = SchedulerPhase::Execute;
                    } else if self.coordinator.active_count().await > 0 {
                        phase = SchedulerPhase::Aggregate;
                    } else {
                        break;
                    }
                }
                SchedulerPhase::Execute => {
                    let drained = self
                        .wait_for_active_drain(
                            Duration::from_secs(config.execute_timeout_secs),
                            Duration::from_millis(config.poll_interval_ms),
                        )
                        .await;
                    if !drained {
                        // Still-active tasks are left for a later pass,
                        // never cancelled.
                        report.execute_timed_out = true;
                        tracing::warn!("execute phase timed out waiting for active tasks");
                    }
                    phase = SchedulerPhase::Aggregate;
                }
                SchedulerPhase::Aggregate => {
                    self.coordinator.aggregate_results().await;
                    if self.coordinator.has_active_consensus() {
                        phase = SchedulerPhase::Consensus;
                    } else if self.coordinator.pending_count().await > 0 {
                        phase = SchedulerPhase::Distribute;
                    } else {
                        break;
                    }
                }
                SchedulerPhase::Consensus => {
                    self.coordinator.sweep_consensus().await;
                    phase = SchedulerPhase::Distribute;
                }
            }
        }

        tracing::info!(
            cycles = report.cycles,
            assigned = report.tasks_assigned,
            "scheduler loop terminated"
        );
        report
    }

    /// Poll until the active-task map drains or the deadline passes.
    /// Returns whether the map drained.
    async fn wait_for_active_drain(&self, timeout: Duration, poll: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.coordinator.active_count().await == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(poll).await;
        }
    }
}
