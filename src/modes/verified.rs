//! 验证回答模式（Mode B）
//!
//! 系统提示 = 平台控制契约 + 夹在 VERIFIED 标记之间的载荷 + agent 系统提示。
//! 回复中出现研究标记即为契约违规，直接失败，不重试。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::{extract_content, ChatRequest, RetryingInferenceClient};
use crate::memory::Message;
use crate::modes::contract::{
    PLATFORM_CONTROL_CONTRACT, REQUEST_RESEARCH_TOKEN, VERIFIED_END_MARKER, VERIFIED_START_MARKER,
    VERIFIED_USER_INSTRUCTION,
};
use crate::research::VerifiedPayload;
use crate::store::{AgentProfile, AgentStore};

pub const CONTRACT_VIOLATION_MESSAGE: &str = "Mode B attempted to request research";

pub struct VerifiedAnswerService {
    client: Arc<RetryingInferenceClient>,
    store: Arc<dyn AgentStore>,
}

impl VerifiedAnswerService {
    pub fn new(client: Arc<RetryingInferenceClient>, store: Arc<dyn AgentStore>) -> Self {
        Self { client, store }
    }

    pub fn system_prompt(profile: &AgentProfile, payload: &VerifiedPayload) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}",
            PLATFORM_CONTROL_CONTRACT,
            VERIFIED_START_MARKER,
            payload.to_prompt_json(),
            VERIFIED_END_MARKER,
            profile.system_prompt
        )
    }

    pub async fn generate(&self, agent_id: &str, payload: &VerifiedPayload) -> Result<String, AgentError> {
        self.generate_cancellable(agent_id, payload, &CancellationToken::new())
            .await
    }

    pub async fn generate_cancellable(
        &self,
        agent_id: &str,
        payload: &VerifiedPayload,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let profile = self.store.agent_profile(agent_id).await?;

        let body = ChatRequest::new(
            profile.model.clone(),
            vec![
                Message::system(Self::system_prompt(&profile, payload)),
                Message::user(VERIFIED_USER_INSTRUCTION),
            ],
        );

        let raw = self.client.call_cancellable(&body, cancel).await?;
        let content = extract_content(&raw)?;

        if content.contains(REQUEST_RESEARCH_TOKEN) {
            tracing::error!(agent_id, "{}", CONTRACT_VIOLATION_MESSAGE);
            return Err(AgentError::ContractViolation(
                CONTRACT_VIOLATION_MESSAGE.to_string(),
            ));
        }

        tracing::debug!(agent_id, chars = content.len(), "verified answer generated");
        Ok(content)
    }
}
