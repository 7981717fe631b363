//! Agents command - health check of the agent allowlist
//!
//! Usage:
//!   agent-gateway agents          # one line per agent plus a summary
//!   agent-gateway agents --json   # machine-readable report

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use agent_gateway::{AgentCheck, AgentHealth, GatewayConfig};

#[derive(Debug, Serialize)]
struct HealthReport {
    timestamp: String,
    total_agents: usize,
    healthy: usize,
    missing: usize,
    agents: Vec<AgentCheck>,
}

/// Returns the number of missing agents so `main` can set the exit status.
pub fn run(config: &GatewayConfig, json: bool) -> Result<usize> {
    let agents = config.registry().health();
    let healthy = agents
        .iter()
        .filter(|a| a.status == AgentHealth::Healthy)
        .count();
    let report = HealthReport {
        timestamp: Utc::now().to_rfc3339(),
        total_agents: agents.len(),
        healthy,
        missing: agents.len() - healthy,
        agents,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.missing);
    }

    println!("Agents in {}", config.agents.dir.display());
    for check in &report.agents {
        match check.status {
            AgentHealth::Healthy => println!("  [ok]      {}", check.agent),
            AgentHealth::Missing => {
                println!("  [missing] {} ({})", check.agent, check.path.display())
            }
        }
    }
    println!();
    println!(
        "{} healthy, {} missing ({}%)",
        report.healthy,
        report.missing,
        if report.total_agents == 0 {
            0
        } else {
            report.healthy * 100 / report.total_agents
        }
    );

    Ok(report.missing)
}
