//! 研究数据模型：查询、事实、验证载荷

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 主模型发出的研究请求：查询文本与不透明的来源策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchQuery {
    pub query: String,
    pub source_policy: Value,
}

impl ResearchQuery {
    pub fn new(query: impl Into<String>, source_policy: Value) -> Self {
        Self {
            query: query.into(),
            source_policy,
        }
    }
}

/// 从研究模型输出中解析出的单条事实
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchFact {
    pub answer: String,
    pub source: String,
}

impl ResearchFact {
    /// answer 非空且 source 以 http 开头
    pub fn is_valid(&self) -> bool {
        !self.answer.is_empty() && self.source.starts_with("http")
    }
}

/// 一次研究周期的验证结果，创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedPayload {
    pub facts: Vec<ResearchFact>,
    pub confidence: f64,
    pub source_policy: Value,
}

impl VerifiedPayload {
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.facts.iter().map(|f| f.source.as_str())
    }

    /// 嵌入 Mode B 系统提示时使用的文本形式
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fact_validation() {
        let ok = ResearchFact { answer: "x".into(), source: "https://a.gov".into() };
        assert!(ok.is_valid());
        assert!(!ResearchFact { answer: String::new(), source: "https://a.gov".into() }.is_valid());
        assert!(!ResearchFact { answer: "x".into(), source: "www.a.gov".into() }.is_valid());
    }

    #[test]
    fn test_payload_prompt_json_contains_facts() {
        let payload = VerifiedPayload {
            facts: vec![ResearchFact { answer: "Water boils at 100C".into(), source: "https://nist.gov".into() }],
            confidence: 0.4,
            source_policy: Value::String("prefer_authoritative".into()),
        };
        let text = payload.to_prompt_json();
        assert!(text.contains("Water boils at 100C"));
        assert!(text.contains("\"confidence\": 0.4"));
        assert_eq!(payload.sources().collect::<Vec<_>>(), vec!["https://nist.gov"]);
    }
}
