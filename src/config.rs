//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `VERITAS__*` 覆盖（双下划线表示嵌套，如 `VERITAS__LLM__ENDPOINT=...`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub research: ResearchSection,
    #[serde(default)]
    pub context: ContextSection,
}

/// [app] 段：应用名、日志级别、数据库路径
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// RUST_LOG 未设置时的默认级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            log_level: default_log_level(),
            database_path: default_database_path(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/veritas.db")
}

/// [llm] 段：推理端点、鉴权、超时、连接池与重试
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
    #[serde(default)]
    pub pool: LlmPoolSection,
    #[serde(default)]
    pub retry: LlmRetrySection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            timeouts: LlmTimeoutsSection::default(),
            pool: LlmPoolSection::default(),
            retry: LlmRetrySection::default(),
        }
    }
}

impl LlmSection {
    /// 配置优先，其次 HF_TOKEN / HUGGING_FACE_AUTH_TOKEN
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("HF_TOKEN").ok())
            .or_else(|| std::env::var("HUGGING_FACE_AUTH_TOKEN").ok())
    }
}

fn default_endpoint() -> String {
    "https://router.huggingface.co/v1/chat/completions".to_string()
}

/// [llm.timeouts]：推理延迟高，read 取长值，其余取短值（秒）
#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
    #[serde(default = "default_read_secs")]
    pub read_secs: u64,
    #[serde(default = "default_short_secs")]
    pub write_secs: u64,
    #[serde(default = "default_short_secs")]
    pub pool_secs: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            read_secs: default_read_secs(),
            write_secs: default_short_secs(),
            pool_secs: default_short_secs(),
        }
    }
}

fn default_connect_secs() -> u64 {
    5
}

fn default_read_secs() -> u64 {
    120
}

fn default_short_secs() -> u64 {
    5
}

/// [llm.pool]：每个角色独立连接池的空闲连接上限与空闲保活时长
#[derive(Debug, Clone, Deserialize)]
pub struct LlmPoolSection {
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,
    /// 空闲连接保留多久后关闭
    #[serde(default = "default_idle_secs")]
    pub idle_secs: u64,
}

impl Default for LlmPoolSection {
    fn default() -> Self {
        Self {
            max_idle_per_host: default_max_idle_per_host(),
            idle_secs: default_idle_secs(),
        }
    }
}

fn default_max_idle_per_host() -> usize {
    20
}

fn default_idle_secs() -> u64 {
    90
}

/// [llm.retry]：传输层重试（5xx / 超时 / 连接失败）
#[derive(Debug, Clone, Deserialize)]
pub struct LlmRetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for LlmRetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl LlmRetrySection {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

/// [research] 段：研究模型、协议重试次数、来源策略
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchSection {
    #[serde(default = "default_research_model")]
    pub model: String,
    /// 未设置时与 [llm].endpoint 相同
    pub endpoint: Option<String>,
    #[serde(default = "default_max_protocol_attempts")]
    pub max_protocol_attempts: u32,
    #[serde(default = "default_source_policy")]
    pub source_policy: String,
}

impl Default for ResearchSection {
    fn default() -> Self {
        Self {
            model: default_research_model(),
            endpoint: None,
            max_protocol_attempts: default_max_protocol_attempts(),
            source_policy: default_source_policy(),
        }
    }
}

fn default_research_model() -> String {
    crate::research::RESEARCH_MODEL.to_string()
}

fn default_max_protocol_attempts() -> u32 {
    3
}

fn default_source_policy() -> String {
    "prefer_authoritative".to_string()
}

/// [context] 段：上下文 token 预算
#[derive(Debug, Clone, Deserialize)]
pub struct ContextSection {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_reserved_for_response")]
    pub reserved_for_response: usize,
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            reserved_for_response: default_reserved_for_response(),
        }
    }
}

fn default_max_tokens() -> usize {
    3000
}

fn default_reserved_for_response() -> usize {
    800
}

/// 从 config 目录加载配置，环境变量 VERITAS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 VERITAS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("VERITAS")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_inference_profile() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.retry.max_attempts, 3);
        assert_eq!(cfg.llm.retry.base_delay(), Duration::from_millis(500));
        assert_eq!(cfg.llm.timeouts.read_secs, 120);
        assert!(cfg.llm.timeouts.connect_secs < cfg.llm.timeouts.read_secs);
        assert_eq!(cfg.context.max_tokens, 3000);
        assert_eq!(cfg.context.reserved_for_response, 800);
        assert_eq!(cfg.research.max_protocol_attempts, 3);
    }

    #[test]
    fn test_load_explicit_file_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("override.toml");
        std::fs::write(
            &path,
            "[context]\nmax_tokens = 1200\n\n[research]\nmodel = \"custom/model\"\n\n[llm.pool]\nidle_secs = 30\n",
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.context.max_tokens, 1200);
        assert_eq!(cfg.research.model, "custom/model");
        assert_eq!(cfg.llm.pool.idle_secs, 30);
        assert_eq!(cfg.llm.pool.max_idle_per_host, 20);
        assert_eq!(cfg.context.reserved_for_response, 800);
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let section = LlmSection {
            api_key: Some("hf_explicit".to_string()),
            ..LlmSection::default()
        };
        assert_eq!(section.resolve_api_key().as_deref(), Some("hf_explicit"));
    }
}
