//! 存储层：agent / 系统提示 / 对话历史 / 验证载荷
//!
//! AgentStore 是编排器依赖的外部协作者接口；StoreTransaction 让载荷与本轮 user / assistant 轮次处于同一事务。
//! 默认实现为 sqlx SQLite（SqliteAgentStore）。

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::{Message, Role};
use crate::research::VerifiedPayload;

pub use sqlite::SqliteAgentStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// agent 的模型、系统提示与挂载工具
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: String,
    pub name: String,
    pub model: String,
    pub system_prompt: String,
    pub attached_tools: Vec<String>,
}

/// 已持久化的验证载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPayload {
    pub id: i64,
    pub agent_id: String,
    pub payload: VerifiedPayload,
    pub created_at: String,
}

/// 编排器依赖的存储接口
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// 系统提示与模型（附带挂载工具）
    async fn agent_profile(&self, agent_id: &str) -> Result<AgentProfile, StoreError>;

    /// 对话历史，按时间顺序
    async fn conversation_turns(&self, agent_id: &str) -> Result<Vec<Message>, StoreError>;

    async fn append_turn(&self, agent_id: &str, role: Role, content: &str) -> Result<i64, StoreError>;

    async fn persist_verified_payload(
        &self,
        agent_id: &str,
        payload: &VerifiedPayload,
    ) -> Result<i64, StoreError>;

    /// 最近一次研究周期的载荷（以最新一行为准）
    async fn latest_verified_payload(&self, agent_id: &str) -> Result<Option<StoredPayload>, StoreError>;

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// 存储事务；未 commit 即 drop 等同于 rollback
#[async_trait]
pub trait StoreTransaction: Send {
    async fn append_turn(&mut self, agent_id: &str, role: Role, content: &str) -> Result<i64, StoreError>;

    async fn persist_verified_payload(
        &mut self,
        agent_id: &str,
        payload: &VerifiedPayload,
    ) -> Result<i64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
