//! JSON-RPC over HTTP 传输
//!
//! Bugzilla 风格的请求体：`{"method": "Bug.get", "params": [{...}], "id": 1}`，
//! 响应中 `error` 非空时视为服务器拒绝（`TransportError::Fault`）。

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::RemoteTransport;
use crate::config::{RetryConfig, TransportConfig};
use crate::error::{BugTrackerError, TransportError};
use crate::wire::{map_to_json, WireMap, WireValue};

/// JSON-RPC 错误对象
#[derive(Debug, Clone, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// JSON-RPC 响应
#[derive(Debug, Clone, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

pub struct JsonRpcTransport {
    client: Client,
    config: TransportConfig,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    pub fn new(config: TransportConfig) -> Result<Self, BugTrackerError> {
        let mut builder = Client::builder();

        if let Some(timeout) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }

        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| BugTrackerError::Config(format!("创建 HTTP 客户端失败: {}", e)))?;

        info!("✅ JSON-RPC 传输已创建 (endpoint: {})", config.endpoint);

        Ok(Self {
            client,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// 构造请求体（注入 API key）
    fn request_body(&self, id: u64, method: &str, mut params: WireMap) -> Value {
        if let Some(api_key) = &self.config.api_key {
            params.insert(
                self.config.api_key_param.clone(),
                WireValue::String(api_key.clone()),
            );
        }
        json!({
            "method": method,
            "params": [map_to_json(params)],
            "id": id,
        })
    }

    async fn send_once(&self, body: &Value) -> Result<WireMap, TransportError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let text = response.text().await.map_err(classify)?;

        // Bugzilla 出错时也可能返回非 2xx，但响应体仍是 JSON-RPC 错误对象
        let parsed: RpcResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => {
                return Err(TransportError::Protocol(format!("解析 JSON-RPC 响应失败: {}", e)));
            }
            Err(_) => {
                return Err(TransportError::Protocol(format!("HTTP 状态异常: {}", status)));
            }
        };

        parse_response(parsed)
    }
}

fn parse_response(response: RpcResponse) -> Result<WireMap, TransportError> {
    if let Some(error) = response.error {
        return Err(TransportError::Fault {
            code: error.code,
            message: error.message,
        });
    }

    match response.result.map(WireValue::from) {
        Some(WireValue::Map(map)) => Ok(map),
        Some(other) => Err(TransportError::Protocol(format!(
            "JSON-RPC result 应为对象，实际为 {}",
            other.type_name()
        ))),
        None => Err(TransportError::Protocol("JSON-RPC 响应缺少 result".to_string())),
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_connect() {
        TransportError::Connection(error.to_string())
    } else {
        TransportError::Protocol(error.to_string())
    }
}

/// 按重试配置执行一次远端调用，连接失败时退避重发
async fn call_with_retry<F, Fut>(
    retry: &RetryConfig,
    method: &str,
    mut send: F,
) -> Result<WireMap, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<WireMap, TransportError>>,
{
    let mut attempt = 0;
    loop {
        match send().await {
            Err(e) if retry.should_retry(&e, attempt) => {
                let delay = retry.delay_for(attempt);
                warn!(
                    "JSON-RPC {} 连接失败，{:?} 后重试 ({}/{}): {}",
                    method,
                    delay,
                    attempt + 1,
                    retry.max_retries,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[async_trait]
impl RemoteTransport for JsonRpcTransport {
    async fn call(&self, method: &str, params: WireMap) -> Result<WireMap, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = self.request_body(id, method, params);

        debug!("调用 JSON-RPC: method={}, id={}", method, id);

        call_with_retry(&self.config.retry_config, method, || self.send_once(&body)).await
    }
}
