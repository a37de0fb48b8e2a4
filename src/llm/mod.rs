//! LLM 层：推理传输抽象与实现（reqwest HTTP / Scripted）、带重试的客户端、响应提取

pub mod http;
pub mod mock;
pub mod response;
pub mod retry;
pub mod traits;

pub use http::HttpTransport;
pub use mock::ScriptedTransport;
pub use response::{extract_content, extract_usage, TokenUsage, Usage};
pub use retry::{ClientRole, RetryAttempt, RetryPolicy, RetryingInferenceClient};
pub use traits::{ChatRequest, ChatTransport, LlmError, RawResponse};
