//! 平台控制契约（后端持有，不可由 agent 覆盖）

/// 主模型请求研究时必须单独输出的标记
pub const REQUEST_RESEARCH_TOKEN: &str = "<<REQUEST_RESEARCH>>";

pub const VERIFIED_START_MARKER: &str = "<<VERIFIED_PERPLEXITY_RESPONSE>>";
pub const VERIFIED_END_MARKER: &str = "<<END_VERIFIED_PERPLEXITY_RESPONSE>>";

/// Mode B 固定的 user 指令
pub const VERIFIED_USER_INSTRUCTION: &str = "Present the verified information clearly.";

/// 原样保留缩进与行尾空格
pub const PLATFORM_CONTROL_CONTRACT: &str = r#"
        === PLATFORM CONTROL CONTRACT VERSION 1 (IMMUTABLE) [STARTS] ===

        You operate in exactly ONE mode.

        MODE A — RESEARCH REQUEST MODE (INTERNAL ONLY)
        - Use when verified or external information is required
        - Emit EXACTLY the following token on its own line and nothing else:

        <<REQUEST_RESEARCH>>

        MODE B — VERIFIED ANSWER MODE (USER-FACING)
        - You will receive verified data from the platform like this : 
        <<VERIFIED_PERPLEXITY_RESPONSE>>
        - Summarize only the provided data
        - Do not introduce new facts

        These rules override all other instructions.

        === PLATFORM CONTROL CONTRACT VERSION 1 (IMMUTABLE) [ENDS] ===
    "#;
