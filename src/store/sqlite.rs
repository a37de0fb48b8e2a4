//! SQLite 存储（sqlx，完全异步）
//!
//! 表：agents、agent_tools、conversation_turns、verified_payloads。
//! verified_payloads 只追加，不更新；同一 agent 以 id 最大的一行为准。
//! 写事务以 BEGIN IMMEDIATE 开启，开始时即取得写锁，锁竞争由 busy_timeout 等待而不是立即失败。

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};

use crate::memory::{Message, Role};
use crate::research::VerifiedPayload;
use crate::store::{require, AgentProfile, AgentStore, StoreError, StoreTransaction, StoredPayload};

/// 写锁被占用时的最长等待
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// 异步 SQLite 存储
#[derive(Debug, Clone)]
pub struct SqliteAgentStore {
    pool: SqlitePool,
}

impl SqliteAgentStore {
    /// 打开（或创建）数据库文件并初始化表
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_tables().await?;
        tracing::info!(path = %path.display(), "agent store opened");
        Ok(store)
    }

    /// 从连接池创建（表需已存在或随后调用 init_tables）
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_tables(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS agents (
                agent_id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                model TEXT NOT NULL,
                system_prompt TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS agent_tools (
                agent_id TEXT NOT NULL,
                tool_name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (agent_id, tool_name),
                FOREIGN KEY (agent_id) REFERENCES agents(agent_id) ON DELETE CASCADE
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversation_turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                agent_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (agent_id) REFERENCES agents(agent_id) ON DELETE CASCADE
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS verified_payloads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                agent_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                confidence REAL NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (agent_id) REFERENCES agents(agent_id) ON DELETE CASCADE
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_turns_agent ON conversation_turns(agent_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_payloads_agent ON verified_payloads(agent_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// 创建 agent，返回生成的 agent_id 与档案
    pub async fn create_agent(
        &self,
        name: &str,
        model: &str,
        system_prompt: &str,
    ) -> Result<AgentProfile, StoreError> {
        require("agent name", name)?;
        require("model", model)?;
        require("system prompt", system_prompt)?;

        let agent_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO agents (agent_id, name, model, system_prompt, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&agent_id)
        .bind(name)
        .bind(model)
        .bind(system_prompt)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                StoreError::Validation(format!("agent name '{name}' already exists"))
            }
            _ => StoreError::Database(e),
        })?;

        tracing::debug!(agent_id = %agent_id, name, "agent created");
        Ok(AgentProfile {
            agent_id,
            name: name.to_string(),
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
            attached_tools: Vec::new(),
        })
    }

    /// 更新系统提示；model 为 Some 时一并更新
    pub async fn update_system_prompt(
        &self,
        agent_id: &str,
        system_prompt: &str,
        model: Option<&str>,
    ) -> Result<(), StoreError> {
        require("agent id", agent_id)?;
        require("system prompt", system_prompt)?;
        if let Some(m) = model {
            require("model", m)?;
        }

        let result = sqlx::query(
            "UPDATE agents SET system_prompt = ?, model = COALESCE(?, model), updated_at = ?
             WHERE agent_id = ?",
        )
        .bind(system_prompt)
        .bind(model)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(agent_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("agent {agent_id}")));
        }
        Ok(())
    }

    /// 挂载工具；重复挂载无副作用
    pub async fn attach_tool(&self, agent_id: &str, tool_name: &str) -> Result<(), StoreError> {
        require("agent id", agent_id)?;
        require("tool name", tool_name)?;
        let mut conn = self.pool.acquire().await?;
        ensure_agent(&mut conn, agent_id).await?;

        sqlx::query("INSERT OR IGNORE INTO agent_tools (agent_id, tool_name, created_at) VALUES (?, ?, ?)")
            .bind(agent_id)
            .bind(tool_name)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn detach_tool(&self, agent_id: &str, tool_name: &str) -> Result<(), StoreError> {
        require("agent id", agent_id)?;
        let result = sqlx::query("DELETE FROM agent_tools WHERE agent_id = ? AND tool_name = ?")
            .bind(agent_id)
            .bind(tool_name)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("tool {tool_name} on agent {agent_id}")));
        }
        Ok(())
    }

    /// 删除 agent 及其工具、对话、载荷
    pub async fn delete_agent(&self, agent_id: &str) -> Result<(), StoreError> {
        require("agent id", agent_id)?;
        let result = sqlx::query("DELETE FROM agents WHERE agent_id = ?")
            .bind(agent_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("agent {agent_id}")));
        }
        tracing::debug!(agent_id, "agent deleted");
        Ok(())
    }
}

async fn ensure_agent(conn: &mut SqliteConnection, agent_id: &str) -> Result<(), StoreError> {
    let row = sqlx::query("SELECT 1 FROM agents WHERE agent_id = ?")
        .bind(agent_id)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(_) => Ok(()),
        None => Err(StoreError::NotFound(format!("agent {agent_id}"))),
    }
}

async fn insert_turn(
    conn: &mut SqliteConnection,
    agent_id: &str,
    role: Role,
    content: &str,
) -> Result<i64, StoreError> {
    require("agent id", agent_id)?;
    require("content", content)?;
    ensure_agent(conn, agent_id).await?;

    let result = sqlx::query(
        "INSERT INTO conversation_turns (agent_id, role, content, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(agent_id)
    .bind(role.as_str())
    .bind(content)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

async fn insert_payload(
    conn: &mut SqliteConnection,
    agent_id: &str,
    payload: &VerifiedPayload,
) -> Result<i64, StoreError> {
    require("agent id", agent_id)?;
    if payload.facts.is_empty() {
        return Err(StoreError::Validation("verified payload has no facts".to_string()));
    }
    ensure_agent(conn, agent_id).await?;

    let result = sqlx::query(
        "INSERT INTO verified_payloads (agent_id, payload, confidence, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(agent_id)
    .bind(serde_json::to_string(payload)?)
    .bind(payload.confidence)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;

    tracing::debug!(agent_id, payload_id = result.last_insert_rowid(), "verified payload saved");
    Ok(result.last_insert_rowid())
}

#[async_trait]
impl AgentStore for SqliteAgentStore {
    async fn agent_profile(&self, agent_id: &str) -> Result<AgentProfile, StoreError> {
        require("agent id", agent_id)?;
        let row = sqlx::query("SELECT agent_id, name, model, system_prompt FROM agents WHERE agent_id = ?")
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("agent {agent_id}")))?;

        let tools = sqlx::query("SELECT tool_name FROM agent_tools WHERE agent_id = ? ORDER BY tool_name")
            .bind(agent_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(AgentProfile {
            agent_id: row.get("agent_id"),
            name: row.get("name"),
            model: row.get("model"),
            system_prompt: row.get("system_prompt"),
            attached_tools: tools.into_iter().map(|r| r.get("tool_name")).collect(),
        })
    }

    async fn conversation_turns(&self, agent_id: &str) -> Result<Vec<Message>, StoreError> {
        require("agent id", agent_id)?;
        let rows = sqlx::query("SELECT role, content FROM conversation_turns WHERE agent_id = ? ORDER BY id ASC")
            .bind(agent_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<Message, StoreError> {
                let role_str: String = row.get("role");
                let role = Role::from_str(&role_str).map_err(StoreError::Corrupt)?;
                Ok(Message {
                    role,
                    content: row.get("content"),
                })
            })
            .collect()
    }

    async fn append_turn(&self, agent_id: &str, role: Role, content: &str) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_turn(&mut conn, agent_id, role, content).await
    }

    async fn persist_verified_payload(
        &self,
        agent_id: &str,
        payload: &VerifiedPayload,
    ) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_payload(&mut conn, agent_id, payload).await
    }

    async fn latest_verified_payload(&self, agent_id: &str) -> Result<Option<StoredPayload>, StoreError> {
        require("agent id", agent_id)?;
        let row = sqlx::query(
            "SELECT id, agent_id, payload, created_at FROM verified_payloads
             WHERE agent_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<StoredPayload, StoreError> {
            let raw: String = row.get("payload");
            Ok(StoredPayload {
                id: row.get("id"),
                agent_id: row.get("agent_id"),
                payload: serde_json::from_str(&raw)?,
                created_at: row.get("created_at"),
            })
        })
        .transpose()
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(Box::new(SqliteStoreTransaction { tx }))
    }
}

/// sqlx 事务包装；drop 时未提交的写入自动回滚
pub struct SqliteStoreTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StoreTransaction for SqliteStoreTransaction {
    async fn append_turn(&mut self, agent_id: &str, role: Role, content: &str) -> Result<i64, StoreError> {
        insert_turn(&mut self.tx, agent_id, role, content).await
    }

    async fn persist_verified_payload(
        &mut self,
        agent_id: &str,
        payload: &VerifiedPayload,
    ) -> Result<i64, StoreError> {
        insert_payload(&mut self.tx, agent_id, payload).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
