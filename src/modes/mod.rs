//! 主模型的两种模式：探索（Mode A）与验证回答（Mode B），以及两者共用的平台控制契约

pub mod contract;
pub mod exploratory;
pub mod verified;

pub use contract::{PLATFORM_CONTROL_CONTRACT, REQUEST_RESEARCH_TOKEN};
pub use exploratory::{classify, ExploratoryService, PrimaryResponse, ToolControlSignal};
pub use verified::VerifiedAnswerService;
