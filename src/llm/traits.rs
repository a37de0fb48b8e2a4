//! 推理传输抽象
//!
//! 所有后端（reqwest HTTP / 测试用 Scripted）实现 ChatTransport：只负责一次 POST，返回状态码与原始 body。
//! 重试、状态码分类、JSON 解析由 RetryingInferenceClient 统一处理。

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::memory::Message;

/// chat-completion 请求体：`{"model": ..., "messages": [...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }
}

/// 一次 HTTP 往返的原始结果（任意状态码）
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// 推理调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// 连接失败 / 连接重置 / 超时，可重试
    #[error("Upstream transport error: {message}")]
    Transport { message: String, timed_out: bool },

    /// 5xx，可重试
    #[error("Upstream server error: HTTP {status}")]
    Server { status: u16, body: String },

    /// 4xx，立即上抛，不重试
    #[error("Upstream client error: HTTP {status}")]
    Client { status: u16, body: String },

    /// 2xx 但 body 不是 JSON，不重试
    #[error("Upstream response is not valid JSON: {0}")]
    Decode(String),

    /// JSON 结构不含可用的 choices[0].message.content
    #[error("Malformed chat completion: {0}")]
    MalformedResponse(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl LlmError {
    /// 仅传输层失败与 5xx 可重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Transport { .. } | LlmError::Server { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, LlmError::Transport { timed_out: true, .. })
    }
}

/// 推理传输 trait：一次请求一次往返，不做重试
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post(&self, body: &ChatRequest) -> Result<RawResponse, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let req = ChatRequest::new(
            "meta-llama/Llama-3.1-8B-Instruct",
            vec![Message::system("be brief"), Message::user("hi")],
        );
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["model"], "meta-llama/Llama-3.1-8B-Instruct");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_retry_classification() {
        assert!(LlmError::Server { status: 503, body: String::new() }.is_retryable());
        assert!(LlmError::Transport { message: "reset".into(), timed_out: false }.is_retryable());
        assert!(!LlmError::Client { status: 404, body: String::new() }.is_retryable());
        assert!(!LlmError::Decode("eof".into()).is_retryable());
        assert!(!LlmError::Cancelled.is_retryable());
    }
}
