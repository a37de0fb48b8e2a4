//! 编排器：每轮对话的顶层状态机
//!
//! 1. EXPLORATORY：用上下文窗口调用主模型
//! 2. 直接回答：记录 user/assistant 轮次后返回
//! 3. 研究信号：检查研究工具 → RESEARCH → VERIFIED：先调用 Mode B，成功后在一个短事务内写载荷与轮次
//! 4. 网络调用期间不持有写锁；Mode B 或写入失败时不留下任何载荷与轮次，原错误原样上抛
//! 5. 研究失败时不写入任何内容，也不调用 Mode B

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, ModeState};
use crate::memory::Role;
use crate::modes::{ExploratoryService, PrimaryResponse, ToolControlSignal, VerifiedAnswerService};
use crate::research::{ResearchToolService, VerifiedPayload};
use crate::store::{AgentProfile, AgentStore, StoreError, StoreTransaction};
use crate::tools::AgentCapability;

pub const TOOL_NOT_ATTACHED_MESSAGE: &str = "research tool not attached";

/// 一轮编排的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorReply {
    pub content: String,
    /// 终止时所处的模式：直接回答为 Exploratory，研究路径为 Verified
    pub mode: ModeState,
    pub verified_payload_id: Option<i64>,
    pub confidence: Option<f64>,
}

pub struct AgentOrchestrator {
    store: Arc<dyn AgentStore>,
    exploratory: ExploratoryService,
    research: ResearchToolService,
    verified: VerifiedAnswerService,
}

impl AgentOrchestrator {
    pub fn new(
        store: Arc<dyn AgentStore>,
        exploratory: ExploratoryService,
        research: ResearchToolService,
        verified: VerifiedAnswerService,
    ) -> Self {
        Self {
            store,
            exploratory,
            research,
            verified,
        }
    }

    pub fn store(&self) -> &Arc<dyn AgentStore> {
        &self.store
    }

    pub async fn handle(&self, agent_id: &str, prompt: &str) -> Result<OrchestratorReply, AgentError> {
        self.handle_with_cancel(agent_id, prompt, &CancellationToken::new())
            .await
    }

    /// 同 handle；token 触发时中止在途推理并返回 Cancelled，已打开的事务回滚
    pub async fn handle_with_cancel(
        &self,
        agent_id: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<OrchestratorReply, AgentError> {
        if agent_id.trim().is_empty() {
            return Err(AgentError::Validation("agent id is required".to_string()));
        }
        if prompt.trim().is_empty() {
            return Err(AgentError::Validation("prompt is required".to_string()));
        }

        let profile = self.store.agent_profile(agent_id).await?;
        let history = self.store.conversation_turns(agent_id).await?;

        let mut state = ModeState::Exploratory;
        tracing::info!(agent_id, mode = %state, history = history.len(), "orchestration started");

        let response = self
            .exploratory
            .respond(&profile, &history, prompt, cancel)
            .await?;

        match response {
            PrimaryResponse::Answer(content) => {
                self.record_direct_answer(agent_id, prompt, &content).await?;
                tracing::info!(agent_id, mode = %state, "answered directly");
                Ok(OrchestratorReply {
                    content,
                    mode: state,
                    verified_payload_id: None,
                    confidence: None,
                })
            }
            PrimaryResponse::Research(signal) => {
                self.run_research_path(&profile, prompt, signal, &mut state, cancel)
                    .await
            }
        }
    }

    async fn run_research_path(
        &self,
        profile: &AgentProfile,
        prompt: &str,
        signal: ToolControlSignal,
        state: &mut ModeState,
        cancel: &CancellationToken,
    ) -> Result<OrchestratorReply, AgentError> {
        let agent_id = profile.agent_id.as_str();

        let capability = AgentCapability::from_tools(profile.attached_tools.iter().cloned());
        if !capability.allows_research() {
            tracing::warn!(agent_id, "research requested but research tool is not attached");
            return Err(AgentError::ToolNotAttached(TOOL_NOT_ATTACHED_MESSAGE.to_string()));
        }

        transition(state, ModeState::Research, agent_id);
        let payload = self
            .research
            .process_research_query_cancellable(&signal.query, cancel)
            .await?;

        transition(state, ModeState::Verified, agent_id);
        let content = self
            .verified
            .generate_cancellable(agent_id, &payload, cancel)
            .await
            .map_err(|e| {
                tracing::warn!(agent_id, error = %e, "verified answer failed, nothing persisted");
                e
            })?;

        let mut tx = self.store.begin().await?;
        match persist_verified_turn(&mut tx, agent_id, prompt, &payload, &content).await {
            Ok(payload_id) => {
                tx.commit().await?;
                tracing::info!(agent_id, payload_id, confidence = payload.confidence, "verified answer committed");
                Ok(OrchestratorReply {
                    content,
                    mode: *state,
                    verified_payload_id: Some(payload_id),
                    confidence: Some(payload.confidence),
                })
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(agent_id, error = %rollback_err, "rollback failed");
                }
                tracing::warn!(agent_id, error = %e, "verified turn rolled back");
                Err(e.into())
            }
        }
    }

    async fn record_direct_answer(&self, agent_id: &str, prompt: &str, content: &str) -> Result<(), AgentError> {
        let mut tx = self.store.begin().await?;
        let written = match tx.append_turn(agent_id, Role::User, prompt).await {
            Ok(_) => tx.append_turn(agent_id, Role::Assistant, content).await,
            Err(e) => Err(e),
        };

        match written {
            Ok(_) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(agent_id, error = %rollback_err, "rollback failed");
                }
                Err(e.into())
            }
        }
    }
}

/// 载荷与 user / assistant 轮次同一事务写入
async fn persist_verified_turn(
    tx: &mut Box<dyn StoreTransaction>,
    agent_id: &str,
    prompt: &str,
    payload: &VerifiedPayload,
    content: &str,
) -> Result<i64, StoreError> {
    let payload_id = tx.persist_verified_payload(agent_id, payload).await?;
    tx.append_turn(agent_id, Role::User, prompt).await?;
    tx.append_turn(agent_id, Role::Assistant, content).await?;
    Ok(payload_id)
}

fn transition(state: &mut ModeState, next: ModeState, agent_id: &str) {
    debug_assert!(state.can_transition_to(next));
    tracing::info!(agent_id, from = %state, to = %next, "mode transition");
    *state = next;
}
