//! 研究工具服务（Mode "research"）
//!
//! 外层协议循环叠加在传输层重试之上：每次尝试发送固定系统提示 + 查询，提取 content 并解析 TAG 协议；
//! 解析不到条目时在系统提示末尾追加 STRICT_REMINDER 再试，全部尝试失败则返回协议违规（422）。
//! 解析成功后逐条校验（answer 非空、source 以 http 开头），丢弃不合格条目，按剩余来源计算置信度。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::{extract_content, ChatRequest, RetryingInferenceClient};
use crate::memory::Message;
use crate::research::{
    compute_confidence, parse_research_tags, ResearchFact, ResearchQuery, VerifiedPayload,
    RESEARCH_MODEL, RESEARCH_SYSTEM_PROMPT, STRICT_REMINDER,
};

pub const PROTOCOL_VIOLATION_MESSAGE: &str = "Research LLM output violated tag protocol";
pub const NO_VALID_FACTS_MESSAGE: &str = "No valid research facts found";

/// 研究工具服务：持有研究角色专用的推理客户端
pub struct ResearchToolService {
    client: Arc<RetryingInferenceClient>,
    model: String,
    max_protocol_attempts: u32,
}

impl ResearchToolService {
    pub fn new(client: Arc<RetryingInferenceClient>) -> Self {
        Self {
            client,
            model: RESEARCH_MODEL.to_string(),
            max_protocol_attempts: 3,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_protocol_attempts(mut self, attempts: u32) -> Self {
        self.max_protocol_attempts = attempts.max(1);
        self
    }

    pub async fn process_research_query(
        &self,
        query: &ResearchQuery,
    ) -> Result<VerifiedPayload, AgentError> {
        self.process_research_query_cancellable(query, &CancellationToken::new())
            .await
    }

    pub async fn process_research_query_cancellable(
        &self,
        query: &ResearchQuery,
        cancel: &CancellationToken,
    ) -> Result<VerifiedPayload, AgentError> {
        if query.query.trim().is_empty() {
            return Err(AgentError::Validation("research query is empty".to_string()));
        }

        let facts = self.collect_tagged_facts(query, cancel).await?;
        tracing::debug!(parsed = facts.len(), "research tag protocol satisfied");

        let total = facts.len();
        let validated: Vec<ResearchFact> = facts.into_iter().filter(ResearchFact::is_valid).collect();
        if validated.is_empty() {
            tracing::error!(parsed = total, "{}", NO_VALID_FACTS_MESSAGE);
            return Err(AgentError::ProtocolViolation(NO_VALID_FACTS_MESSAGE.to_string()));
        }
        if validated.len() < total {
            tracing::debug!(dropped = total - validated.len(), "invalid research facts dropped");
        }

        let sources: Vec<&str> = validated.iter().map(|f| f.source.as_str()).collect();
        let confidence = compute_confidence(&sources);
        tracing::info!(facts = validated.len(), confidence, "research payload verified");

        Ok(VerifiedPayload {
            facts: validated,
            confidence,
            source_policy: query.source_policy.clone(),
        })
    }

    /// 协议循环：返回第一次解析出的非空条目列表
    async fn collect_tagged_facts(
        &self,
        query: &ResearchQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResearchFact>, AgentError> {
        let mut system_prompt = RESEARCH_SYSTEM_PROMPT.to_string();

        for attempt in 1..=self.max_protocol_attempts {
            let body = ChatRequest::new(
                self.model.clone(),
                vec![
                    Message::system(system_prompt.clone()),
                    Message::user(query.query.clone()),
                ],
            );

            let raw = self.client.call_cancellable(&body, cancel).await?;
            let content = extract_content(&raw).map_err(|e| {
                tracing::error!(error = %e, "invalid research LLM response");
                AgentError::from(e)
            })?;

            let facts = parse_research_tags(&content);
            if !facts.is_empty() {
                tracing::debug!(attempt, "research tag protocol satisfied");
                return Ok(facts);
            }

            tracing::warn!(
                attempt,
                max_attempts = self.max_protocol_attempts,
                "research output had no tagged items, hardening prompt"
            );
            system_prompt.push_str(STRICT_REMINDER);
        }

        tracing::error!("{}", PROTOCOL_VIOLATION_MESSAGE);
        Err(AgentError::ProtocolViolation(
            PROTOCOL_VIOLATION_MESSAGE.to_string(),
        ))
    }
}
