//! 编排器构建器：按配置组装两个独立的推理客户端、三个模式服务与存储
//!
//! 主角色（探索 / 验证）与研究角色各自拥有传输（连接池）、重试策略实例与 token 统计。
//! 测试可通过 with_transports 注入 ScriptedTransport。

use std::sync::Arc;

use serde_json::Value;

use crate::config::AppConfig;
use crate::core::{AgentError, AgentOrchestrator};
use crate::llm::{ChatTransport, ClientRole, HttpTransport, RetryPolicy, RetryingInferenceClient};
use crate::memory::{ContextBuilder, TokenCounter};
use crate::modes::{ExploratoryService, VerifiedAnswerService};
use crate::research::ResearchToolService;
use crate::store::AgentStore;

pub struct OrchestratorBuilder {
    config: AppConfig,
    store: Arc<dyn AgentStore>,
    primary_transport: Option<Arc<dyn ChatTransport>>,
    research_transport: Option<Arc<dyn ChatTransport>>,
    retry_policy: Option<RetryPolicy>,
    token_counter: Option<Arc<dyn TokenCounter>>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig, store: Arc<dyn AgentStore>) -> Self {
        Self {
            config,
            store,
            primary_transport: None,
            research_transport: None,
            retry_policy: None,
            token_counter: None,
        }
    }

    /// 替换两种角色的传输（默认按 [llm] / [research] 配置创建 HttpTransport）
    pub fn with_transports(
        mut self,
        primary: Arc<dyn ChatTransport>,
        research: Arc<dyn ChatTransport>,
    ) -> Self {
        self.primary_transport = Some(primary);
        self.research_transport = Some(research);
        self
    }

    /// 覆盖 [llm.retry] 中的策略
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.token_counter = Some(counter);
        self
    }

    fn build_transport(&self, role: ClientRole) -> Result<Arc<dyn ChatTransport>, AgentError> {
        let injected = match role {
            ClientRole::Primary => &self.primary_transport,
            ClientRole::Research => &self.research_transport,
        };
        if let Some(t) = injected {
            return Ok(t.clone());
        }

        let endpoint = match role {
            ClientRole::Primary => None,
            ClientRole::Research => self.config.research.endpoint.as_deref(),
        };
        let transport = HttpTransport::new(&self.config.llm, endpoint)
            .map_err(|e| AgentError::Config(e.to_string()))?;
        tracing::debug!(role = %role, endpoint = transport.endpoint(), "inference transport created");
        Ok(Arc::new(transport))
    }

    fn build_client(&self, role: ClientRole) -> Result<Arc<RetryingInferenceClient>, AgentError> {
        let policy = self
            .retry_policy
            .unwrap_or_else(|| RetryPolicy::from(&self.config.llm.retry));
        Ok(Arc::new(RetryingInferenceClient::new(
            self.build_transport(role)?,
            policy,
            role,
        )))
    }

    pub fn build(self) -> Result<AgentOrchestrator, AgentError> {
        let primary = self.build_client(ClientRole::Primary)?;
        let research_client = self.build_client(ClientRole::Research)?;

        let context = ContextBuilder::new(
            self.config.context.max_tokens,
            self.config.context.reserved_for_response,
        );
        let source_policy = Value::String(self.config.research.source_policy.clone());
        let mut exploratory = ExploratoryService::new(primary.clone(), context, source_policy);
        if let Some(counter) = self.token_counter.clone() {
            exploratory = exploratory.with_token_counter(counter);
        }

        let research = ResearchToolService::new(research_client)
            .with_model(self.config.research.model.clone())
            .with_max_protocol_attempts(self.config.research.max_protocol_attempts);

        let verified = VerifiedAnswerService::new(primary, self.store.clone());

        tracing::info!(
            research_model = %self.config.research.model,
            max_tokens = self.config.context.max_tokens,
            "orchestrator ready"
        );
        Ok(AgentOrchestrator::new(self.store, exploratory, research, verified))
    }
}
