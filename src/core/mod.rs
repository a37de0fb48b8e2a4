//! 核心编排层：错误分类、模式状态、编排器、构建器与中断分派

pub mod builder;
pub mod error;
pub mod interrupt;
pub mod orchestrator;
pub mod state;

pub use builder::OrchestratorBuilder;
pub use error::{AgentError, StatusClass};
pub use interrupt::{Interrupt, TurnGuard, TurnInterrupter};
pub use orchestrator::{AgentOrchestrator, OrchestratorReply};
pub use state::ModeState;
