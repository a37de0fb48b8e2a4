//! 编排错误与状态分类
//!
//! 下层错误（LlmError / StoreError）经 From 转为 AgentError；调用方通过 status() 得到
//! bad-request / not-found / timeout / unprocessable / internal 五类之一。

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::llm::LlmError;
use crate::store::StoreError;

/// 编排过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    /// 必填字段缺失或为空，不重试
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// 超时 / 连接失败，传输层已按策略重试
    #[error("Upstream transport error: {message}")]
    UpstreamTransport { message: String, timed_out: bool },

    /// 5xx，传输层已按策略重试
    #[error("Upstream server error: HTTP {status}")]
    UpstreamServer { status: u16 },

    /// 4xx，未重试
    #[error("Upstream client error: HTTP {status}")]
    UpstreamClient { status: u16 },

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    /// 研究模型未遵守 TAG 协议，或没有可用的事实
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Mode B 响应再次请求研究
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// 主模型请求研究，但该 agent 未挂载研究工具
    #[error("Tool not attached: {0}")]
    ToolNotAttached(String),

    /// 存储写入失败，所在事务已回滚
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),
}

/// 调用方可见的状态分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    BadRequest,
    NotFound,
    Timeout,
    Unprocessable,
    Internal,
}

impl StatusClass {
    /// HTTP 语义的状态码
    pub fn code(&self) -> u16 {
        match self {
            StatusClass::BadRequest => 400,
            StatusClass::NotFound => 404,
            StatusClass::Timeout => 504,
            StatusClass::Unprocessable => 422,
            StatusClass::Internal => 500,
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusClass::BadRequest => "bad_request",
            StatusClass::NotFound => "not_found",
            StatusClass::Timeout => "timeout",
            StatusClass::Unprocessable => "unprocessable",
            StatusClass::Internal => "internal",
        };
        write!(f, "{} {}", self.code(), name)
    }
}

impl AgentError {
    pub fn status(&self) -> StatusClass {
        match self {
            AgentError::Validation(_) => StatusClass::BadRequest,
            AgentError::NotFound(_) => StatusClass::NotFound,
            AgentError::UpstreamTransport { timed_out: true, .. } => StatusClass::Timeout,
            AgentError::ProtocolViolation(_) | AgentError::ToolNotAttached(_) => {
                StatusClass::Unprocessable
            }
            AgentError::UpstreamTransport { .. }
            | AgentError::UpstreamServer { .. }
            | AgentError::UpstreamClient { .. }
            | AgentError::MalformedResponse(_)
            | AgentError::ContractViolation(_)
            | AgentError::Persistence(_)
            | AgentError::Cancelled
            | AgentError::Config(_) => StatusClass::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status().code()
    }
}

impl From<LlmError> for AgentError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Transport { message, timed_out } => {
                AgentError::UpstreamTransport { message, timed_out }
            }
            LlmError::Server { status, .. } => AgentError::UpstreamServer { status },
            LlmError::Client { status, .. } => AgentError::UpstreamClient { status },
            LlmError::Decode(msg) | LlmError::MalformedResponse(msg) => {
                AgentError::MalformedResponse(msg)
            }
            LlmError::Cancelled => AgentError::Cancelled,
        }
    }
}

impl From<StoreError> for AgentError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => AgentError::NotFound(msg),
            StoreError::Validation(msg) => AgentError::Validation(msg),
            other => AgentError::Persistence(other.to_string()),
        }
    }
}
