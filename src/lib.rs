//! Veritas - 带研究验证的 LLM 编排
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排器状态机、错误分类、构建器
//! - **llm**: 推理传输抽象（reqwest / Scripted）、带重试的客户端、响应提取
//! - **memory**: 对话轮次、token 计数、上下文窗口构建
//! - **modes**: 探索模式（Mode A）与验证回答模式（Mode B）
//! - **observability**: tracing 日志
//! - **research**: TAG 协议解析、来源置信度、研究工具服务
//! - **store**: agent / 对话 / 验证载荷存储（sqlx SQLite）
//! - **tools**: 挂载工具与能力提示

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod modes;
pub mod observability;
pub mod research;
pub mod store;
pub mod tools;

pub use crate::core::{AgentError, AgentOrchestrator, OrchestratorBuilder, OrchestratorReply, StatusClass};
