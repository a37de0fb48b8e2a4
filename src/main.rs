//! Veritas - 带研究验证的 LLM 编排
//!
//! 入口：加载配置、初始化日志、打开存储、组装编排器，然后逐行读取 stdin 与指定 agent 对话。
//! 用法：`veritas <agent_id>`；Ctrl+C 在回复进行中时取消这一轮，空闲时退出。

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use veritas::config::load_config;
use veritas::core::{Interrupt, OrchestratorBuilder, TurnInterrupter};
use veritas::observability;
use veritas::store::SqliteAgentStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let agent_id = std::env::args()
        .nth(1)
        .context("usage: veritas <agent_id>")?;

    let config = load_config(None).context("Failed to load config")?;
    observability::init(&config.app.log_level);

    let store = SqliteAgentStore::open(&config.app.database_path)
        .await
        .context("Failed to open agent store")?;
    let orchestrator = OrchestratorBuilder::new(config, Arc::new(store))
        .build()
        .context("Failed to build orchestrator")?;

    let interrupter = TurnInterrupter::new();
    let shutdown = interrupter.shutdown_token();
    {
        let interrupter = interrupter.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if interrupter.interrupt() == Interrupt::Shutdown {
                    break;
                }
            }
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => {
                // 阻塞中的 stdin 读取会拖住运行时关闭，直接退出
                tracing::info!("interrupted while idle, exiting");
                std::process::exit(130);
            }
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };
        let Some(line) = line else { break };
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }

        let turn = interrupter.start_turn();
        let result = orchestrator
            .handle_with_cancel(&agent_id, prompt, turn.token())
            .await;
        drop(turn);

        match result {
            Ok(reply) => println!("{}", reply.content),
            Err(e) => println!("error [{}]: {}", e.status_code(), e),
        }
    }

    Ok(())
}
