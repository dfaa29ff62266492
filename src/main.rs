use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use waggle::providers::{InMemoryProofStore, InMemorySwarmMemory, LocalProofGenerator};
use waggle::{
    AgentConfig, Capability, DistributionPolicy, SwarmConfig, SwarmCoordinator, SwarmScheduler,
    TaskKind, TaskPriority,
};

/// Run a full swarm lifecycle demo: register agents, distribute a batch
/// of tasks, hold a vote, and print the resulting stats.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waggle=info".into()),
        )
        .init();

    println!("=== waggle: swarm lifecycle demo ===\n");

    let config = SwarmConfig::named("demo-swarm")
        .with_max_agents(3)
        .with_policy(DistributionPolicy::LoadBalanced);
    let coordinator = SwarmCoordinator::new(
        config,
        Arc::new(LocalProofGenerator::new()),
        Arc::new(InMemoryProofStore::new()),
        Arc::new(InMemorySwarmMemory::new()),
    )
    .await?;

    // --- 1. Register agents ---
    let prover = coordinator
        .register_agent(AgentConfig::new(
            "prover",
            vec![Capability::Inference, Capability::ContentVerification],
        ))
        .await?;
    let analyst = coordinator
        .register_agent(AgentConfig::new("analyst", vec![Capability::DataAnalysis]))
        .await?;
    let settler = coordinator
        .register_agent(AgentConfig::new(
            "settler",
            vec![Capability::Settlement, Capability::RoyaltyProcessing],
        ))
        .await?;
    for agent in [&prover, &analyst, &settler] {
        println!("[1] Registered {} ({})", agent.name(), agent.id());
    }

    // --- 2. Submit a batch of work ---
    println!("\n[2] Submitting tasks");
    coordinator
        .submit_task(
            TaskKind::Inference,
            json!({"prompt": "classify sample 42"}),
            TaskPriority::High,
            vec![Capability::Inference],
        )
        .await?;
    coordinator
        .submit_task(
            TaskKind::DataAggregation,
            json!({"values": [12.0, 7.5, 3.25]}),
            TaskPriority::Medium,
            vec![Capability::DataAnalysis],
        )
        .await?;
    coordinator
        .submit_task(
            TaskKind::RoyaltyCalculation,
            json!({
                "gross": 5000.0,
                "splits": [
                    {"recipient": "artist", "share": 0.7},
                    {"recipient": "label", "share": 0.2},
                ],
            }),
            TaskPriority::Medium,
            vec![Capability::RoyaltyProcessing],
        )
        .await?;

    // --- 3. Hold a vote ---
    let request = coordinator
        .initiate_consensus("model-upgrade", vec!["v2".into(), "v3".into()], 5_000)
        .await?;
    println!(
        "[3] Consensus '{}' needs {} votes",
        request.topic, request.required_votes
    );
    for agent in [&prover, &analyst, &settler] {
        coordinator.record_vote(request.id, agent.id(), "v2");
    }

    // --- 4. Drive the scheduler until quiescent ---
    let report = SwarmScheduler::new(coordinator.clone()).run().await;
    println!(
        "\n[4] Scheduler finished: {} cycles, {} tasks assigned",
        report.cycles, report.tasks_assigned
    );

    // --- 5. Stats ---
    let stats = coordinator.stats().await;
    println!("\n[5] Swarm stats");
    println!("    agents:        {}", stats.agent_count);
    println!("    completed:     {}", stats.completed_tasks);
    println!("    success rate:  {:.0}%", stats.success_rate * 100.0);
    println!("    avg reputation: {:.1}", stats.average_reputation);
    if let Some(result) = coordinator
        .shared_memory_value(&format!("consensus:{}", request.id))
        .await
    {
        println!("    vote result:   {}", result["result"]);
    }

    coordinator.shutdown().await?;
    println!("\nSwarm shut down cleanly.");
    Ok(())
}
