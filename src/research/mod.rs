//! 研究子流水线：TAG 协议解析、来源可信度评分、研究工具服务

pub mod confidence;
pub mod contract;
pub mod parser;
pub mod service;
pub mod types;

pub use confidence::compute_confidence;
pub use contract::{RESEARCH_MODEL, RESEARCH_SYSTEM_PROMPT, STRICT_REMINDER};
pub use parser::{parse_research_tags, strip_reasoning};
pub use service::ResearchToolService;
pub use types::{ResearchFact, ResearchQuery, VerifiedPayload};
