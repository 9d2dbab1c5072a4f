//! Client configuration module / 客户端配置模块
//!
//! Manages SDK configuration loaded from a JSON file
//! Creates default config file on first run / 首次运行时创建默认配置文件

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Default slice size: 3 MiB / 默认分片大小
pub const DEFAULT_SLICE_SIZE: u64 = 3 * 1024 * 1024;

/// Files at or above this size go through slice upload / 分片上传阈值
pub const DEFAULT_SLICE_THRESHOLD: u64 = 8 * 1024 * 1024;

/// Client configuration / 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Application id, first segment of every resource / 应用ID
    #[serde(default)]
    pub app_id: String,
    /// Service endpoint, e.g. http://localhost:9000 / 服务地址
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Default bucket when options carry none / 默认存储桶
    #[serde(default)]
    pub bucket: String,
    /// Region label, informational / 区域
    #[serde(default)]
    pub region: String,
    /// HTTP timeout in seconds / 请求超时(秒)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Slice size used when options carry none / 默认分片大小
    #[serde(default = "default_slice_size")]
    pub slice_size: u64,
    /// Auto upload switches to slices at this size / 自动分片阈值
    #[serde(default = "default_slice_threshold")]
    pub slice_threshold: u64,
    /// Lifetime of reusable signatures / 多次有效签名的有效期(秒)
    #[serde(default = "default_sign_expire")]
    pub sign_expire_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Pre-issued authorization token (CLI only) / 预签发令牌
    #[serde(default)]
    pub auth_token: String,
}

fn default_endpoint() -> String {
    "http://localhost:9000".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_slice_size() -> u64 {
    DEFAULT_SLICE_SIZE
}

fn default_slice_threshold() -> u64 {
    DEFAULT_SLICE_THRESHOLD
}

fn default_sign_expire() -> u64 {
    3600
}

fn default_user_agent() -> String {
    format!("yaolist-cos-sdk/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            endpoint: default_endpoint(),
            bucket: String::new(),
            region: String::new(),
            timeout_secs: default_timeout(),
            slice_size: default_slice_size(),
            slice_threshold: default_slice_threshold(),
            sign_expire_secs: default_sign_expire(),
            user_agent: default_user_agent(),
            auth_token: String::new(),
        }
    }
}

impl ClientConfig {
    /// Check values the client cannot work without / 校验必填项
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(Error::InvalidConfig("app_id is required".to_string()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(Error::InvalidConfig("endpoint is required".to_string()));
        }
        if self.slice_size == 0 {
            return Err(Error::InvalidSliceSize(0));
        }
        Ok(())
    }

    /// Override fields from environment variables / 使用环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("YAOLIST_COS_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Ok(bucket) = std::env::var("YAOLIST_COS_BUCKET") {
            self.bucket = bucket;
        }
        if let Ok(token) = std::env::var("YAOLIST_COS_TOKEN") {
            self.auth_token = token;
        }
    }
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config(config_path: &Path) -> Result<ClientConfig> {
    if config_path.exists() {
        // Load existing config / 加载现有配置
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: ClientConfig = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        // Create default config / 创建默认配置
        let config = ClientConfig::default();
        save_config(config_path, &config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(config_path: &Path, config: &ClientConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(config_path, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

    Ok(())
}
