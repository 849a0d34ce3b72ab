//! Fading Light
//!
//! 入口：初始化日志、加载配置、选中全部参与者，然后逐回合推进并打印总线消息。
//!
//! 用法：`fading-light [config-path]`，缺省读取 config/agents.toml（存在时）。

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use fading_light::bus::PollResult;
use fading_light::core::AdvanceStatus;
use fading_light::llm::create_services;
use fading_light::{load_config, observability, SimulationEngine, SimulationHandle};

const DEFAULT_CONFIG: &str = "config/agents.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let path = std::env::args().nth(1).map(PathBuf::from).or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG);
        default.exists().then_some(default)
    });
    let config = load_config(path).context("Failed to load config")?;
    let services = create_services(&config.llm);
    let roster: Vec<String> = config.agents.iter().map(|a| a.id.clone()).collect();

    let engine = SimulationEngine::new(config, services).context("Failed to create engine")?;
    let handle = SimulationHandle::new(engine);
    handle.select(&roster).await.context("Failed to select agents")?;

    loop {
        let task = handle.advance_in_background();
        while !task.is_finished() {
            if !print_message(handle.poll()) {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
        // 服务失败直接退出；引擎状态保持在失败的那次发言之前
        let outcome = task
            .await
            .context("Round task panicked")?
            .context("Round failed")?;
        while print_message(handle.poll()) {}
        if outcome.status == AdvanceStatus::SimulationEnded {
            break;
        }
        println!();
    }

    let snapshot = handle.snapshot().await;
    println!(
        "Final: round {}, global essence {}",
        snapshot.round_number, snapshot.global_resource
    );
    for agent in snapshot.agents {
        let status = if agent.alive { "alive" } else { "faded" };
        println!("  {} ({}): {} essence", agent.name, status, agent.vitality);
    }
    Ok(())
}

/// 打印一条真实消息；信号与空轮询返回 false
fn print_message(result: PollResult) -> bool {
    match result {
        PollResult::Text { sender, content, .. } => println!("{}: {}", sender, content),
        PollResult::System { content, .. } => println!("[SYSTEM] {}", content),
        PollResult::TurnOver | PollResult::SimulationEnded | PollResult::Idle => return false,
    }
    true
}
