//! Token 计数
//!
//! 上下文构建只依赖 TokenCounter trait；默认实现按空白切词计数，另提供按字符估算的启发式实现。

/// Token 计数器：同一输入必须返回同一结果（上下文构建的确定性依赖于此）
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str, model: &str) -> usize;
}

/// 按空白切词计数，空文本为 0
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenCounter;

impl TokenCounter for WhitespaceTokenCounter {
    fn count(&self, text: &str, _model: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// 启发式估算：英文约 4 字符/token，中文约 1.5 字符/token
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str, _model: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let mut ascii_chars = 0;
        let mut non_ascii_chars = 0;
        for c in text.chars() {
            if c.is_ascii() {
                ascii_chars += 1;
            } else {
                non_ascii_chars += 1;
            }
        }

        let tokens = ascii_chars / 4 + (non_ascii_chars as f64 / 1.5).ceil() as usize;
        tokens.max(1)
    }
}

impl<F> TokenCounter for F
where
    F: Fn(&str, &str) -> usize + Send + Sync,
{
    fn count(&self, text: &str, model: &str) -> usize {
        self(text, model)
    }
}
