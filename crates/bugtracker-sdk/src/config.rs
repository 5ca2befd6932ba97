//! SDK 配置
//!
//! 传输配置 + 应用层提供的实体模型定义。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BugTrackerError, Result, TransportError};
use crate::model::EntityModelConfig;

/// 默认 API key 参数名（Bugzilla 5）
pub const DEFAULT_API_KEY_PARAM: &str = "Bugzilla_api_key";

/// 重试配置（只作用于请求未到达服务器的连接失败）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 最大重试次数
    pub max_retries: u32,
    /// 基础延迟（毫秒）
    pub base_delay_ms: u64,
    /// 最大延迟（毫秒）
    pub max_delay_ms: u64,
    /// 指数退避因子
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// 不重试
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// 第 attempt 次失败后是否重发
    ///
    /// 只有连接失败（请求未到达服务器）可以重发；超时和服务器错误可能已经生效。
    pub fn should_retry(&self, error: &TransportError, attempt: u32) -> bool {
        error.is_connection() && attempt < self.max_retries
    }

    /// 第 attempt 次重试前的等待时间（attempt 从 0 开始）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_ms as f64 * self.backoff_factor.powi(attempt as i32);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }
}

/// 传输配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// JSON-RPC 端点，例如 https://bugzilla.example.org/jsonrpc.cgi
    pub endpoint: String,
    /// API key（可选）
    pub api_key: Option<String>,
    /// API key 注入到参数中的键名
    pub api_key_param: String,
    /// 连接超时（秒）
    pub connect_timeout_secs: Option<u64>,
    /// 请求超时（秒）
    pub request_timeout_secs: Option<u64>,
    /// 重试配置
    pub retry_config: RetryConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost/jsonrpc.cgi".to_string(),
            api_key: None,
            api_key_param: DEFAULT_API_KEY_PARAM.to_string(),
            connect_timeout_secs: Some(10),
            request_timeout_secs: Some(60),
            retry_config: RetryConfig::default(),
        }
    }
}

/// SDK 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// 传输配置
    #[serde(default)]
    pub transport: TransportConfig,
    /// 实体模型定义（除内置预设外的额外实体）
    #[serde(default)]
    pub models: Vec<EntityModelConfig>,
    /// 是否注册内置的 Bugzilla 模型（bug / comment / attachment）
    #[serde(default)]
    pub use_bugzilla_presets: bool,
}

impl TrackerConfig {
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::new()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let endpoint = self.transport.endpoint.as_str();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(BugTrackerError::Config(format!(
                "endpoint must be an http(s) URL: {}",
                endpoint
            )));
        }
        if self.transport.retry_config.backoff_factor < 1.0 {
            return Err(BugTrackerError::Config(
                "backoff_factor must be at least 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

/// SDK 配置构建器
pub struct TrackerConfigBuilder {
    config: TrackerConfig,
}

impl TrackerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TrackerConfig::default(),
        }
    }

    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.config.transport.endpoint = endpoint.into();
        self
    }

    pub fn api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.config.transport.api_key = Some(api_key.into());
        self
    }

    pub fn api_key_param<S: Into<String>>(mut self, param: S) -> Self {
        self.config.transport.api_key_param = param.into();
        self
    }

    pub fn connect_timeout(mut self, secs: u64) -> Self {
        self.config.transport.connect_timeout_secs = Some(secs);
        self
    }

    pub fn request_timeout(mut self, secs: u64) -> Self {
        self.config.transport.request_timeout_secs = Some(secs);
        self
    }

    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.config.transport.retry_config = config;
        self
    }

    /// 添加一个实体模型定义
    pub fn model(mut self, model: EntityModelConfig) -> Self {
        self.config.models.push(model);
        self
    }

    pub fn bugzilla_presets(mut self) -> Self {
        self.config.use_bugzilla_presets = true;
        self
    }

    pub fn build(self) -> Result<TrackerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for TrackerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
