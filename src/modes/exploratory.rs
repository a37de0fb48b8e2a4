//! 探索模式（Mode A）
//!
//! 系统提示 = 平台控制契约 + 工具段 + agent 自己的系统提示；上下文由 ContextBuilder 在预算内构建。
//! 主模型的回复被分类为直接回答或研究请求信号。

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::{extract_content, ChatRequest, RetryingInferenceClient};
use crate::memory::{ContextBuilder, Message, TokenCounter, WhitespaceTokenCounter};
use crate::modes::contract::{PLATFORM_CONTROL_CONTRACT, REQUEST_RESEARCH_TOKEN};
use crate::research::{strip_reasoning, ResearchQuery};
use crate::store::AgentProfile;
use crate::tools::AgentCapability;

/// 主模型请求研究的控制信号
#[derive(Debug, Clone, PartialEq)]
pub struct ToolControlSignal {
    pub query: ResearchQuery,
}

/// 主模型回复的分类结果
#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryResponse {
    /// 直接回答，终态
    Answer(String),
    /// 转入研究模式
    Research(ToolControlSignal),
}

pub struct ExploratoryService {
    client: Arc<RetryingInferenceClient>,
    context: ContextBuilder,
    counter: Arc<dyn TokenCounter>,
    source_policy: Value,
}

impl ExploratoryService {
    pub fn new(client: Arc<RetryingInferenceClient>, context: ContextBuilder, source_policy: Value) -> Self {
        Self {
            client,
            context,
            counter: Arc::new(WhitespaceTokenCounter),
            source_policy,
        }
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    /// 探索模式的完整系统提示
    pub fn system_prompt(profile: &AgentProfile) -> String {
        let capability = AgentCapability::from_tools(profile.attached_tools.iter().cloned());
        format!(
            "{}{}\n{}",
            PLATFORM_CONTROL_CONTRACT,
            capability.tool_prompt(),
            profile.system_prompt
        )
    }

    /// 构建上下文（history 按时间顺序给出）并调用主模型
    pub async fn respond(
        &self,
        profile: &AgentProfile,
        history: &[Message],
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<PrimaryResponse, AgentError> {
        let system_prompt = Self::system_prompt(profile);
        let messages = self.context.build(
            &profile.model,
            &system_prompt,
            history.iter().rev(),
            prompt,
            self.counter.as_ref(),
        );

        let body = ChatRequest::new(profile.model.clone(), messages);
        let raw = self.client.call_cancellable(&body, cancel).await?;
        let content = extract_content(&raw)?;

        Ok(classify(&content, prompt, &self.source_policy))
    }
}

/// 去掉推理块后，整段回复恰为研究标记（不含其他内容）才视为研究请求
pub fn classify(content: &str, prompt: &str, source_policy: &Value) -> PrimaryResponse {
    let visible = strip_reasoning(content);

    if visible.trim() == REQUEST_RESEARCH_TOKEN {
        PrimaryResponse::Research(ToolControlSignal {
            query: ResearchQuery::new(prompt, source_policy.clone()),
        })
    } else {
        PrimaryResponse::Answer(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::llm::{ClientRole, RetryPolicy, ScriptedTransport};
    use crate::memory::Role;
    use crate::tools::RESEARCH_TOOL;

    fn profile(tools: Vec<String>) -> AgentProfile {
        AgentProfile {
            agent_id: "a1".into(),
            name: "historian".into(),
            model: "meta-llama/Llama-3.1-8B-Instruct".into(),
            system_prompt: "You are a careful historian.".into(),
            attached_tools: tools,
        }
    }

    fn service(transport: Arc<ScriptedTransport>) -> ExploratoryService {
        let client = RetryingInferenceClient::new(
            transport,
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
            ClientRole::Primary,
        );
        ExploratoryService::new(Arc::new(client), ContextBuilder::new(3000, 800), json!("prefer_authoritative"))
    }

    #[test]
    fn test_classify_plain_answer() {
        let r = classify("Paris is the capital.", "q", &json!(null));
        assert_eq!(r, PrimaryResponse::Answer("Paris is the capital.".into()));
    }

    #[test]
    fn test_classify_research_signal() {
        let policy = json!("prefer_authoritative");
        let expected = PrimaryResponse::Research(ToolControlSignal {
            query: ResearchQuery::new("who won?", policy.clone()),
        });
        assert_eq!(classify("  <<REQUEST_RESEARCH>>\n", "who won?", &policy), expected);
        assert_eq!(
            classify("<think>need data</think>\n<<REQUEST_RESEARCH>>", "who won?", &policy),
            expected
        );
        // 标记之外还有其他文字时按普通回答处理
        assert_eq!(
            classify("Checking.\n<<REQUEST_RESEARCH>>\n", "who won?", &policy),
            PrimaryResponse::Answer("Checking.\n<<REQUEST_RESEARCH>>\n".into())
        );
        assert!(matches!(
            classify("The protocol token is:\n<<REQUEST_RESEARCH>>\nNothing else is needed.", "q", &policy),
            PrimaryResponse::Answer(_)
        ));
        assert!(matches!(
            classify("I could emit <<REQUEST_RESEARCH>> here", "q", &policy),
            PrimaryResponse::Answer(_)
        ));
    }

    #[test]
    fn test_system_prompt_layout() {
        let prompt = ExploratoryService::system_prompt(&profile(vec![RESEARCH_TOOL.into()]));
        assert!(prompt.starts_with(PLATFORM_CONTROL_CONTRACT));
        assert!(prompt.contains("- Research Tool:"));
        assert!(prompt.ends_with("You are a careful historian."));

        let prompt = ExploratoryService::system_prompt(&profile(vec![]));
        assert!(prompt.contains("NO_TOOLS_ATTACHED\n"));
    }

    #[tokio::test]
    async fn test_respond_sends_context() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_chat_reply("It was 1969.");

        let history = vec![Message::user("hello"), Message::assistant("hi there")];
        let reply = service(transport.clone())
            .respond(&profile(vec![]), &history, "When was the landing?", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply, PrimaryResponse::Answer("It was 1969.".into()));

        let sent = &transport.requests()[0];
        assert_eq!(sent.model, "meta-llama/Llama-3.1-8B-Instruct");
        let roles: Vec<Role> = sent.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(sent.messages[1].content, "hello");
        assert_eq!(sent.messages[3].content, "When was the landing?");
    }

    #[tokio::test]
    async fn test_empty_reply_is_malformed() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_chat_reply("");

        let err = service(transport)
            .respond(&profile(vec![]), &[], "hi", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse(_)));
    }
}
