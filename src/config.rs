//! 服务配置
//!
//! 加载顺序（后者覆盖前者）：默认值 → YAML 文件 → 环境变量 → 命令行参数。
//! 环境变量：
//! ```text
//! CRM_HOST=0.0.0.0
//! CRM_PORT=8080
//! CRM_STORE_PATH=~/.crm_hub/store.json
//! CRM_STATUS_POLICY=progress_threshold   # 或 member_status_set
//! CRM_NOTIFY_TIMEOUT_MS=3000
//! ```
//! `store_path` 未设置时使用内存存储。

use crate::error::{ConfigError, Result};
use crate::tasks::StatusPolicy;
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// JSON 文件存储路径，`None` 表示内存存储
    pub store_path: Option<PathBuf>,
    pub status_policy: StatusPolicy,
    /// 单条通知投递的超时（毫秒）
    pub notify_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            store_path: None,
            status_policy: StatusPolicy::default(),
            notify_timeout_ms: 3000,
        }
    }
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self> {
        let file =
            std::fs::File::open(path).map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        let config: AppConfig = serde_yaml::from_reader(file)?;
        Ok(config)
    }

    /// 读取 `.env` 后用 `CRM_*` 环境变量覆盖
    pub fn with_env(self) -> Result<Self> {
        dotenv().ok();
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(host) = lookup("CRM_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("CRM_PORT") {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "CRM_PORT".to_string(),
                message: format!("`{port}` is not a valid port"),
            })?;
        }
        if let Some(path) = lookup("CRM_STORE_PATH") {
            self.store_path = Some(PathBuf::from(path)).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(policy) = lookup("CRM_STATUS_POLICY") {
            self.status_policy = policy.parse().map_err(|message| ConfigError::InvalidValue {
                field: "CRM_STATUS_POLICY".to_string(),
                message,
            })?;
        }
        if let Some(ms) = lookup("CRM_NOTIFY_TIMEOUT_MS") {
            self.notify_timeout_ms = ms.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "CRM_NOTIFY_TIMEOUT_MS".to_string(),
                message: format!("`{ms}` is not a number of milliseconds"),
            })?;
        }
        Ok(self)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
