//! 多 agent 并发：一个 agent 的 Mode B 调用进行中时，其他 agent 的轮次照常写入

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;
    use veritas::config::AppConfig;
    use veritas::core::{ModeState, OrchestratorBuilder};
    use veritas::llm::{ChatRequest, ChatTransport, LlmError, RawResponse, RetryPolicy, ScriptedTransport};
    use veritas::memory::Message;
    use veritas::store::{AgentStore, SqliteAgentStore};
    use veritas::tools::RESEARCH_TOOL;

    const RESEARCH_PROMPT: &str = "When did Apollo 11 land?";
    const MODE_B_DELAY: Duration = Duration::from_millis(1500);

    /// 按请求内容路由：Mode B 请求（系统提示带研究载荷）延迟后回复
    struct RoutingTransport;

    fn reply(content: &str) -> RawResponse {
        RawResponse {
            status: 200,
            body: json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string(),
        }
    }

    #[async_trait]
    impl ChatTransport for RoutingTransport {
        async fn post(&self, body: &ChatRequest) -> Result<RawResponse, LlmError> {
            let system = body.messages.first().map(|m| m.content.as_str()).unwrap_or_default();
            if system.contains("https://history.nasa.gov") {
                tokio::time::sleep(MODE_B_DELAY).await;
                return Ok(reply("Apollo 11 landed on July 20, 1969."));
            }
            match body.messages.last() {
                Some(m) if m.content == RESEARCH_PROMPT => Ok(reply("<<REQUEST_RESEARCH>>")),
                _ => Ok(reply("hello back")),
            }
        }
    }

    #[tokio::test]
    async fn test_other_agent_writes_during_verified_answer() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteAgentStore::open(dir.path().join("veritas.db")).await.unwrap());
        let researcher = store.create_agent("researcher", "m", "p").await.unwrap();
        store.attach_tool(&researcher.agent_id, RESEARCH_TOOL).await.unwrap();
        let chatter = store.create_agent("chatter", "m", "p").await.unwrap();

        let research = Arc::new(ScriptedTransport::new());
        research.push_chat_reply(
            "<<RESEARCH_RESULTS>>\n<<ITEM>>\n<<ANSWER>>Apollo 11 landed on July 20, 1969.<<END_ANSWER>>\n\
             <<SOURCE>>https://history.nasa.gov<<END_SOURCE>>\n<<END_ITEM>>\n<<END_RESEARCH_RESULTS>>",
        );
        let orchestrator = OrchestratorBuilder::new(AppConfig::default(), store.clone())
            .with_transports(Arc::new(RoutingTransport), research)
            .with_retry_policy(RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
            })
            .build()
            .unwrap();

        let started = Instant::now();
        let slow = async {
            let r = orchestrator.handle(&researcher.agent_id, RESEARCH_PROMPT).await;
            (r, started.elapsed())
        };
        let fast = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            let r = orchestrator.handle(&chatter.agent_id, "hello").await;
            (r, started.elapsed())
        };
        let ((slow_reply, slow_at), (fast_reply, fast_at)) = tokio::join!(slow, fast);

        let fast_reply = fast_reply.unwrap();
        assert_eq!(fast_reply.content, "hello back");
        assert_eq!(fast_reply.mode, ModeState::Exploratory);
        assert!(fast_at < slow_at);
        assert!(fast_at < MODE_B_DELAY);

        let slow_reply = slow_reply.unwrap();
        assert_eq!(slow_reply.mode, ModeState::Verified);
        assert!(slow_reply.verified_payload_id.is_some());

        assert_eq!(
            store.conversation_turns(&chatter.agent_id).await.unwrap(),
            vec![Message::user("hello"), Message::assistant("hello back")]
        );
        assert_eq!(store.conversation_turns(&researcher.agent_id).await.unwrap().len(), 2);
    }
}
