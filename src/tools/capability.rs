//! Agent 挂载工具与能力提示
//!
//! 目前只有一种工具：研究工具。工具列表会以固定格式追加到探索模式的系统提示中，
//! 未挂载任何工具时模型被要求回复 NO_TOOLS_ATTACHED。

/// 研究工具名（agent_tools.tool_name）
pub const RESEARCH_TOOL: &str = "RESEARCH_TOOL";

const TOOL_SECTION_HEADER: &str = "\n\n### AVAILABLE TOOLS (STRICT CONTRACT)\n";
const ATTACHED_TOOLS_LINE: &str = "The following tools are attached to this agent:\n";

const TOOL_SECTION_RULES: &str = "\nRules (MANDATORY):\n\
- When asked about tools, you MUST list ONLY the tools named above.\n\
- If no tools are listed above, reply EXACTLY: NO_TOOLS_ATTACHED\n\
- Do NOT mention abilities, skills, knowledge, or built-in capabilities.\n\
- Do NOT mention external services or APIs.\n";

/// 已知工具的展示描述；未知名称返回 None
fn describe(tool_name: &str) -> Option<&'static str> {
    match tool_name {
        RESEARCH_TOOL => Some("Research Tool: You can search the web and summarize factual information."),
        _ => None,
    }
}

/// 由挂载的工具名推导出的能力
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentCapability {
    tools: Vec<String>,
}

impl AgentCapability {
    pub fn from_tools<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tools: Vec<String> = tools.into_iter().map(Into::into).collect();
        tools.sort();
        tools.dedup();
        Self { tools }
    }

    pub fn allows_research(&self) -> bool {
        self.tools.iter().any(|t| t == RESEARCH_TOOL)
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    /// 系统提示中的工具段
    pub fn tool_prompt(&self) -> String {
        build_tool_prompt(self.tools.as_slice())
    }
}

/// 构建工具提示段；未知工具名被忽略
pub fn build_tool_prompt<S: AsRef<str>>(attached: &[S]) -> String {
    let lines: Vec<String> = attached
        .iter()
        .filter_map(|t| describe(t.as_ref()))
        .map(|d| format!("- {d}\n"))
        .collect();

    let mut prompt = String::from(TOOL_SECTION_HEADER);
    if lines.is_empty() {
        prompt.push_str("NO_TOOLS_ATTACHED\n\n");
    } else {
        prompt.push_str(ATTACHED_TOOLS_LINE);
        for line in lines {
            prompt.push_str(&line);
        }
    }
    prompt.push_str(TOOL_SECTION_RULES);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_research_capability() {
        let cap = AgentCapability::from_tools(["RESEARCH_TOOL", "RESEARCH_TOOL"]);
        assert!(cap.allows_research());
        assert_eq!(cap.tools().len(), 1);
        assert!(!AgentCapability::default().allows_research());
    }

    #[test]
    fn test_tool_prompt_lists_research_tool() {
        let prompt = build_tool_prompt(&[RESEARCH_TOOL]);
        assert!(prompt.starts_with(
            "\n\n### AVAILABLE TOOLS (STRICT CONTRACT)\nThe following tools are attached to this agent:\n\
             - Research Tool: You can search the web and summarize factual information.\n\nRules (MANDATORY):\n"
        ));
        assert!(!prompt.contains("EXACTLY: NO_TOOLS_ATTACHED\n- When"));
        assert!(prompt.ends_with("- Do NOT mention external services or APIs.\n"));
    }

    #[test]
    fn test_tool_prompt_without_tools() {
        let empty: [&str; 0] = [];
        let prompt = build_tool_prompt(&empty);
        assert!(prompt.starts_with(
            "\n\n### AVAILABLE TOOLS (STRICT CONTRACT)\nNO_TOOLS_ATTACHED\n\n\nRules (MANDATORY):\n"
        ));
        assert!(!prompt.contains("The following tools are attached"));

        // 未知工具名不出现在列表中
        assert_eq!(build_tool_prompt(&["WEATHER"]), prompt);
    }
}
