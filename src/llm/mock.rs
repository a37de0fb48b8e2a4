//! Scripted 推理传输（用于测试，无需网络）
//!
//! 按顺序回放预置的状态码 / body / 传输错误，并记录收到的每个请求与调用次数。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{ChatRequest, ChatTransport, LlmError, RawResponse};

/// Scripted 传输：脚本耗尽后返回 HTTP 418，便于测试立即暴露多余调用
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<RawResponse, LlmError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_status(&self, status: u16, body: &str) {
        self.push(Ok(RawResponse {
            status,
            body: body.to_string(),
        }));
    }

    pub fn push_json(&self, value: Value) {
        self.push_status(200, &value.to_string());
    }

    /// 追加一个标准 chat-completion 成功响应
    pub fn push_chat_reply(&self, content: &str) {
        self.push_json(json!({
            "id": "chatcmpl-scripted",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
        }));
    }

    pub fn push_transport_error(&self, message: &str, timed_out: bool) {
        self.push(Err(LlmError::Transport {
            message: message.to_string(),
            timed_out,
        }));
    }

    fn push(&self, item: Result<RawResponse, LlmError>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(item);
    }

    /// 已收到的调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 已收到的请求（按顺序）
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn post(&self, body: &ChatRequest) -> Result<RawResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(body.clone());

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        next.unwrap_or_else(|| {
            Ok(RawResponse {
                status: 418,
                body: "script exhausted".to_string(),
            })
        })
    }
}
