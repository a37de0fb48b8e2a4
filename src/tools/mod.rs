//! 工具：agent 可挂载的工具名与能力提示

pub mod capability;

pub use capability::{build_tool_prompt, AgentCapability, RESEARCH_TOOL};
