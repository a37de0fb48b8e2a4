//! TAG 协议解析
//!
//! 先去掉 `<think>...</think>` 推理块，再取第一个 `<<RESEARCH_RESULTS>>` 块，逐个解析 `<<ITEM>>`。
//! 缺少 ANSWER 或 SOURCE 的条目直接跳过；内容校验（非空、URL）由调用方负责。

use std::sync::OnceLock;

use regex::Regex;

use crate::research::ResearchFact;

struct TagPatterns {
    think: Regex,
    results: Regex,
    item: Regex,
    answer: Regex,
    source: Regex,
}

static PATTERNS: OnceLock<TagPatterns> = OnceLock::new();

fn patterns() -> &'static TagPatterns {
    PATTERNS.get_or_init(|| TagPatterns {
        think: Regex::new(r"(?s)<think>.*?</think>").expect("static regex"),
        results: Regex::new(r"(?s)<<RESEARCH_RESULTS>>(.*?)<<END_RESEARCH_RESULTS>>")
            .expect("static regex"),
        item: Regex::new(r"(?s)<<ITEM>>(.*?)<<END_ITEM>>").expect("static regex"),
        answer: Regex::new(r"(?s)<<ANSWER>>(.*?)<<END_ANSWER>>").expect("static regex"),
        source: Regex::new(r"(?s)<<SOURCE>>(.*?)<<END_SOURCE>>").expect("static regex"),
    })
}

/// 去掉 `<think>...</think>` 推理块（非贪婪，可跨行）
pub fn strip_reasoning(text: &str) -> String {
    patterns().think.replace_all(text, "").into_owned()
}

/// 解析研究结果；没有 RESEARCH_RESULTS 块时返回空
pub fn parse_research_tags(text: &str) -> Vec<ResearchFact> {
    let p = patterns();
    let cleaned = strip_reasoning(text);

    let Some(block) = p.results.captures(&cleaned).and_then(|c| c.get(1)) else {
        return Vec::new();
    };

    p.item
        .captures_iter(block.as_str())
        .filter_map(|item| {
            let body = item.get(1)?.as_str();
            let answer = p.answer.captures(body)?.get(1)?.as_str().trim();
            let source = p.source.captures(body)?.get(1)?.as_str().trim();
            Some(ResearchFact {
                answer: answer.to_string(),
                source: source.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_ITEMS: &str = "<<RESEARCH_RESULTS>>
<<ITEM>>
<<ANSWER>>
The Moon orbits the Earth.
<<END_ANSWER>>
<<SOURCE>>
https://science.nasa.gov
<<END_SOURCE>>
<<END_ITEM>>
<<ITEM>>
<<ANSWER>>Water boils at 100 C at sea level.<<END_ANSWER>>
<<SOURCE>>https://en.wikipedia.org/wiki/Water<<END_SOURCE>>
<<END_ITEM>>
<<END_RESEARCH_RESULTS>>";

    #[test]
    fn test_two_items_in_order() {
        let facts = parse_research_tags(TWO_ITEMS);
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].answer, "The Moon orbits the Earth.");
        assert_eq!(facts[0].source, "https://science.nasa.gov");
        assert_eq!(facts[1].source, "https://en.wikipedia.org/wiki/Water");
    }

    #[test]
    fn test_missing_block_returns_empty() {
        assert!(parse_research_tags("The Moon orbits the Earth.").is_empty());
        assert!(parse_research_tags("<<RESEARCH_RESULTS>> never closed").is_empty());
    }

    #[test]
    fn test_item_without_source_is_skipped() {
        let text = "<<RESEARCH_RESULTS>>
<<ITEM>><<ANSWER>>orphan<<END_ANSWER>><<END_ITEM>>
<<ITEM>><<ANSWER>>kept<<END_ANSWER>><<SOURCE>>https://x.edu<<END_SOURCE>><<END_ITEM>>
<<END_RESEARCH_RESULTS>>";
        let facts = parse_research_tags(text);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].answer, "kept");
    }

    #[test]
    fn test_reasoning_block_is_stripped() {
        let text = format!(
            "<think>\nmaybe I should output <<RESEARCH_RESULTS>><<END_RESEARCH_RESULTS>>\n</think>\n{TWO_ITEMS}"
        );
        assert_eq!(parse_research_tags(&text).len(), 2);
    }

    #[test]
    fn test_empty_results_block() {
        assert!(parse_research_tags("<<RESEARCH_RESULTS>>\n<<END_RESEARCH_RESULTS>>").is_empty());
    }

    #[test]
    fn test_unvalidated_items_are_returned() {
        let text = "<<RESEARCH_RESULTS>><<ITEM>><<ANSWER>>  <<END_ANSWER>><<SOURCE>>not a url<<END_SOURCE>><<END_ITEM>><<END_RESEARCH_RESULTS>>";
        let facts = parse_research_tags(text);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].answer, "");
        assert_eq!(facts[0].source, "not a url");
    }
}
