//! 来源可信度评分
//!
//! 每个来源按域名加权：以 `.gov` 结尾 0.4，含 `.edu` 0.3，含 `wikipedia.org` 0.25，其它 0.15；求和后截断到 1.0。

const GOV_WEIGHT: f64 = 0.4;
const EDU_WEIGHT: f64 = 0.3;
const WIKIPEDIA_WEIGHT: f64 = 0.25;
const OTHER_WEIGHT: f64 = 0.15;

fn source_weight(url: &str) -> f64 {
    if url.ends_with(".gov") {
        GOV_WEIGHT
    } else if url.contains(".edu") {
        EDU_WEIGHT
    } else if url.contains("wikipedia.org") {
        WIKIPEDIA_WEIGHT
    } else {
        OTHER_WEIGHT
    }
}

/// 计算一组来源的置信度，范围 [0, 1]
pub fn compute_confidence<S: AsRef<str>>(sources: &[S]) -> f64 {
    let score: f64 = sources.iter().map(|s| source_weight(s.as_ref())).sum();
    score.min(1.0)
}
