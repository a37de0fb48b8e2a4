//! 记忆层：对话轮次、token 计数、上下文窗口构建

pub mod context;
pub mod conversation;
pub mod tokenizer;

pub use context::ContextBuilder;
pub use conversation::{Message, Role};
pub use tokenizer::{HeuristicTokenCounter, TokenCounter, WhitespaceTokenCounter};
