//! chat-completion 响应处理：提取 content 与 usage，累计 token 统计

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::llm::LlmError;

/// 响应中可选的 usage 对象
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// 提取 `choices[0].message.content`；缺失、非字符串或为空白均视为畸形响应
pub fn extract_content(response: &Value) -> Result<String, LlmError> {
    let content = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .ok_or_else(|| {
            LlmError::MalformedResponse("missing choices[0].message.content".to_string())
        })?;

    let text = content.as_str().ok_or_else(|| {
        LlmError::MalformedResponse("choices[0].message.content is not a string".to_string())
    })?;

    if text.trim().is_empty() {
        return Err(LlmError::MalformedResponse(
            "choices[0].message.content is empty".to_string(),
        ));
    }
    Ok(text.to_string())
}

/// 提取可选的 usage；结构不符时返回 None
pub fn extract_usage(response: &Value) -> Option<Usage> {
    response
        .get("usage")
        .and_then(|u| serde_json::from_value(u.clone()).ok())
}

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, usage: &Usage) {
        let total = if usage.total_tokens > 0 {
            usage.total_tokens
        } else {
            usage.prompt_tokens + usage.completion_tokens
        };
        self.prompt_tokens.fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(usage.completion_tokens, Ordering::Relaxed);
        self.total_tokens.fetch_add(total, Ordering::Relaxed);
    }

    /// (prompt_tokens, completion_tokens, total_tokens)
    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}
