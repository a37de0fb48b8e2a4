//! reqwest 推理传输
//!
//! 每个实例持有独立的 reqwest::Client（独立连接池）；探索/验证角色与研究角色各建一个，互不干扰。
//! reqwest 没有单独的写超时，也没有"从连接池取连接"的等待超时（连接数不设上限，取不到空闲连接就新建），
//! 因此 write_secs 与 pool_secs 都只能计入整个请求的上限：connect + write + pool + read。
//! 空闲连接的保活时长来自 [llm.pool].idle_secs，与上述超时无关。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::{LlmSection, LlmTimeoutsSection};
use crate::llm::{ChatRequest, ChatTransport, LlmError, RawResponse};

/// HTTP 推理传输：POST JSON，Bearer 鉴权
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTransport {
    /// 按 [llm] 配置创建；endpoint 可覆盖（研究角色可指向不同端点）
    pub fn new(cfg: &LlmSection, endpoint: Option<&str>) -> Result<Self, LlmError> {
        let t = &cfg.timeouts;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(t.connect_secs))
            .read_timeout(Duration::from_secs(t.read_secs))
            .timeout(request_deadline(t))
            .pool_idle_timeout(Duration::from_secs(cfg.pool.idle_secs))
            .pool_max_idle_per_host(cfg.pool.max_idle_per_host)
            .build()
            .map_err(|e| LlmError::Transport {
                message: format!("Failed to build HTTP client: {e}"),
                timed_out: false,
            })?;

        let api_key = cfg.resolve_api_key();
        if api_key.is_none() {
            tracing::warn!("No inference API key configured, requests will be unauthenticated");
        }

        Ok(Self {
            client,
            endpoint: endpoint.unwrap_or(&cfg.endpoint).to_string(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// 单次请求的总上限
fn request_deadline(t: &LlmTimeoutsSection) -> Duration {
    Duration::from_secs(t.connect_secs + t.write_secs + t.pool_secs + t.read_secs)
}

fn map_reqwest_error(e: reqwest::Error) -> LlmError {
    LlmError::Transport {
        timed_out: e.is_timeout(),
        message: e.to_string(),
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn post(&self, body: &ChatRequest) -> Result<RawResponse, LlmError> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await.map_err(map_reqwest_error)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(map_reqwest_error)?;

        Ok(RawResponse { status, body })
    }
}
