//! 上下文窗口构建（token 预算）
//!
//! 输出顺序：一条 system，随后按时间顺序排列的历史轮次，最后是本轮 user。
//! 历史从最近一条往前挑选，超出 `max_tokens - reserved_for_response` 即停止，更早的轮次直接丢弃。
//! 本轮 user 不受预算约束，总是追加在末尾。

use crate::memory::{Message, TokenCounter};

/// 上下文构建器：持有总预算与为回复预留的 token 数
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    max_tokens: usize,
    reserved_for_response: usize,
}

impl ContextBuilder {
    pub fn new(max_tokens: usize, reserved_for_response: usize) -> Self {
        Self {
            max_tokens,
            reserved_for_response,
        }
    }

    /// 历史（含 system）可用的 token 数
    pub fn history_budget(&self) -> usize {
        self.max_tokens.saturating_sub(self.reserved_for_response)
    }

    /// 构建上下文窗口；`history_newest_first` 需按从新到旧的顺序给出
    pub fn build<'a, I>(
        &self,
        model: &str,
        system_prompt: &str,
        history_newest_first: I,
        new_user_prompt: &str,
        counter: &dyn TokenCounter,
    ) -> Vec<Message>
    where
        I: IntoIterator<Item = &'a Message>,
    {
        let budget = self.history_budget();
        let mut token_count = counter.count(system_prompt, model);

        let mut selected: Vec<Message> = Vec::new();
        for turn in history_newest_first {
            let turn_tokens = counter.count(&turn.content, model);
            if token_count + turn_tokens > budget {
                break;
            }
            selected.push(turn.clone());
            token_count += turn_tokens;
        }

        let mut messages = Vec::with_capacity(selected.len() + 2);
        messages.push(Message::system(system_prompt));
        messages.extend(selected.into_iter().rev());
        messages.push(Message::user(new_user_prompt));

        tracing::debug!(
            history_budget = budget,
            token_count,
            turns = messages.len(),
            "context window built"
        );
        messages
    }
}
