//! 带重试的推理客户端
//!
//! 每次尝试：5xx 与传输失败可重试，4xx 立即上抛；成功响应解析为 JSON 后返回（解析失败不重试）。
//! 退避为指数：`base_delay * 2^(attempt-1)`，最后一次失败后不再等待，原错误原样上抛。
//! 探索/验证角色与研究角色各持有一个实例，连接池、重试状态与 token 统计互不共享。

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::LlmRetrySection;
use crate::llm::{extract_usage, ChatRequest, ChatTransport, LlmError, TokenUsage};

/// 客户端所服务的模式角色（仅用于日志与诊断）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRole {
    /// 探索 / 验证模式共用的主模型
    Primary,
    /// 研究模型
    Research,
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientRole::Primary => f.write_str("primary"),
            ClientRole::Research => f.write_str("research"),
        }
    }
}

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl From<&LlmRetrySection> for RetryPolicy {
    fn from(cfg: &LlmRetrySection) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: cfg.base_delay(),
        }
    }
}

/// 单次尝试的退避信息；最后一次尝试没有 delay_before_next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    pub attempt_number: u32,
    pub delay_before_next: Option<Duration>,
}

impl RetryPolicy {
    /// 第 attempt 次（从 1 开始）失败后的等待时长
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        Some(self.base_delay.saturating_mul(factor))
    }

    /// 完整的尝试计划
    pub fn attempts(&self) -> Vec<RetryAttempt> {
        (1..=self.max_attempts)
            .map(|n| RetryAttempt {
                attempt_number: n,
                delay_before_next: self.delay_after(n),
            })
            .collect()
    }

    /// 尝试之间的等待序列，如默认策略为 [0.5s, 1s]
    pub fn schedule(&self) -> Vec<Duration> {
        self.attempts()
            .into_iter()
            .filter_map(|a| a.delay_before_next)
            .collect()
    }
}

/// 带重试的推理客户端：持有传输（连接池）、策略与本角色的 token 统计
pub struct RetryingInferenceClient {
    transport: Arc<dyn ChatTransport>,
    policy: RetryPolicy,
    role: ClientRole,
    usage: TokenUsage,
}

impl RetryingInferenceClient {
    pub fn new(transport: Arc<dyn ChatTransport>, policy: RetryPolicy, role: ClientRole) -> Self {
        Self {
            transport,
            policy,
            role,
            usage: TokenUsage::new(),
        }
    }

    pub fn role(&self) -> ClientRole {
        self.role
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 本角色累计 token 使用：(prompt, completion, total)
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    /// 发送请求并返回解析后的 JSON
    pub async fn call(&self, body: &ChatRequest) -> Result<Value, LlmError> {
        self.call_cancellable(body, &CancellationToken::new()).await
    }

    /// 同 call，但 token 触发时中止在途请求或退避等待，返回 Cancelled
    pub async fn call_cancellable(
        &self,
        body: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<Value, LlmError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let started = Instant::now();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err(LlmError::Cancelled),
                r = self.attempt_once(body) => r,
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let err = match outcome {
                Ok(value) => {
                    tracing::debug!(role = %self.role, attempt, elapsed_ms, "inference call succeeded");
                    if let Some(usage) = extract_usage(&value) {
                        self.usage.add(&usage);
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                tracing::debug!(role = %self.role, attempt, elapsed_ms, error = %err, "inference call failed, not retryable");
                return Err(err);
            }

            let Some(delay) = self.policy.delay_after(attempt) else {
                tracing::error!(role = %self.role, attempts = attempt, error = %err, "inference call failed after all attempts");
                return Err(err);
            };

            tracing::warn!(
                role = %self.role,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "inference call failed, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn attempt_once(&self, body: &ChatRequest) -> Result<Value, LlmError> {
        let resp = self.transport.post(body).await?;
        tracing::debug!(role = %self.role, status = resp.status, "inference response received");

        match resp.status {
            s if s >= 500 => Err(LlmError::Server {
                status: s,
                body: resp.body,
            }),
            s if s >= 400 => Err(LlmError::Client {
                status: s,
                body: resp.body,
            }),
            _ => serde_json::from_str(&resp.body).map_err(|e| LlmError::Decode(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedTransport;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    fn request() -> ChatRequest {
        ChatRequest::new("m", vec![crate::memory::Message::user("hi")])
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.schedule(),
            vec![Duration::from_millis(500), Duration::from_millis(1000)]
        );
        assert_eq!(policy.delay_after(3), None);

        let longer = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
        };
        assert_eq!(longer.delay_after(3), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn test_attempt_plan() {
        let attempts = RetryPolicy::default().attempts();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[0].attempt_number, 1);
        assert_eq!(attempts[2].delay_before_next, None);
    }

    #[tokio::test]
    async fn test_server_error_is_retried_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(500, "boom");
        transport.push_status(503, "busy");
        transport.push_chat_reply("ok");
        let client = RetryingInferenceClient::new(transport.clone(), fast_policy(), ClientRole::Primary);

        let value = client.call(&request()).await.unwrap();
        assert_eq!(value["choices"][0]["message"]["content"], "ok");
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(404, "not found");
        transport.push_chat_reply("never reached");
        let client = RetryingInferenceClient::new(transport.clone(), fast_policy(), ClientRole::Primary);

        let err = client.call(&request()).await.unwrap_err();
        assert_eq!(err, LlmError::Client { status: 404, body: "not found".into() });
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_last_error_propagates_after_exhaustion() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_transport_error("connection reset", false);
        transport.push_transport_error("timed out", true);
        transport.push_status(502, "bad gateway");
        let client = RetryingInferenceClient::new(transport.clone(), fast_policy(), ClientRole::Research);

        let err = client.call(&request()).await.unwrap_err();
        assert_eq!(err, LlmError::Server { status: 502, body: "bad gateway".into() });
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_invalid_json_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(200, "<html>oops</html>");
        let client = RetryingInferenceClient::new(transport.clone(), fast_policy(), ClientRole::Primary);

        let err = client.call(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Decode(_)));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(500, "boom");
        transport.push_chat_reply("late");
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(30),
        };
        let client = RetryingInferenceClient::new(transport.clone(), policy, ClientRole::Primary);

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = client.call_cancellable(&request(), &token).await.unwrap_err();
        assert_eq!(err, LlmError::Cancelled);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_usage_tracked_per_client() {
        let primary_transport = Arc::new(ScriptedTransport::new());
        primary_transport.push_json(serde_json::json!({
            "choices": [{"message": {"content": "a"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}
        }));
        let research_transport = Arc::new(ScriptedTransport::new());

        let primary = RetryingInferenceClient::new(primary_transport, fast_policy(), ClientRole::Primary);
        let research = RetryingInferenceClient::new(research_transport, fast_policy(), ClientRole::Research);

        primary.call(&request()).await.unwrap();
        assert_eq!(primary.token_usage(), (3, 4, 7));
        assert_eq!(research.token_usage(), (0, 0, 0));
    }
}
