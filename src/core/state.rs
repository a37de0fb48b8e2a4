//! 单次编排调用内的模式状态（不持久化）

use std::fmt;

use serde::Serialize;

/// 编排状态：EXPLORATORY → {完成 | RESEARCH} → VERIFIED → 完成
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModeState {
    #[default]
    Exploratory,
    Research,
    Verified,
}

impl ModeState {
    /// 合法的状态转移
    pub fn can_transition_to(self, next: ModeState) -> bool {
        matches!(
            (self, next),
            (ModeState::Exploratory, ModeState::Research) | (ModeState::Research, ModeState::Verified)
        )
    }
}

impl fmt::Display for ModeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModeState::Exploratory => "EXPLORATORY",
            ModeState::Research => "RESEARCH",
            ModeState::Verified => "VERIFIED",
        };
        f.write_str(s)
    }
}
