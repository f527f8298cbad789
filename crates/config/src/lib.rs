//! 统一配置中心
//!
//! 配置按以下顺序叠加，后者覆盖前者：
//! - 内置默认值
//! - `APP_CONFIG_FILE` 指定的文件（按扩展名识别 TOML/YAML/JSON）
//! - `APP_` 前缀的环境变量，层级用 `__` 分隔，例如 `APP_SERVER__PORT`

use std::str::FromStr;

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_ENV: &str = "APP_CONFIG_FILE";
pub const ENV_PREFIX: &str = "APP_";

/// 全局应用配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub address: AddressConfig,
}

/// 服务器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8888,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 外部存储相关配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// 登记表写入、删除和队列创建的总尝试次数
    pub retry_budget: u32,
    /// 文件链接前缀，链接为 `{object_base_url}{roomID}/{文件名}`
    pub object_base_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retry_budget: 5,
            object_base_url: "http://s3.amazonaws.com/tcnj-csc470-nodejs-".into(),
        }
    }
}

/// 公网地址探测配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressConfig {
    /// 设置后跳过探测，直接使用该地址
    #[serde(default)]
    pub public_address: Option<String>,
    /// 返回纯文本 IP 的探测地址
    pub discovery_url: String,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            public_address: None,
            discovery_url: "https://api.ipify.org".into(),
        }
    }
}

impl AppConfig {
    /// 默认值叠加配置文件和环境变量后的 figment
    pub fn figment() -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            figment = if path.ends_with(".yml") || path.ends_with(".yaml") {
                figment.merge(Yaml::file(path))
            } else if path.ends_with(".json") {
                figment.merge(Json::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        let config: AppConfig = Self::figment().extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::InvalidServerConfig(
                "host cannot be empty".into(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::InvalidServerPort(
                "port must be between 1 and 65535".into(),
            ));
        }
        if self.store.retry_budget == 0 {
            return Err(ConfigError::InvalidStoreConfig(
                "retry_budget must allow at least one attempt".into(),
            ));
        }
        if self.store.object_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidStoreConfig(
                "object_base_url cannot be empty".into(),
            ));
        }
        if let Some(address) = &self.address.public_address {
            if address.trim().is_empty() {
                return Err(ConfigError::InvalidAddressConfig(
                    "public_address cannot be blank when set".into(),
                ));
            }
        } else if self.address.discovery_url.trim().is_empty() {
            return Err(ConfigError::InvalidAddressConfig(
                "discovery_url is required without public_address".into(),
            ));
        }
        Ok(())
    }
}

/// 从 TOML/YAML/JSON 文本解析，缺省字段取默认值
impl FromStr for AppConfig {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let base = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        let trimmed = text.trim_start();
        let figment = if trimmed.starts_with('{') {
            base.merge(Json::string(text))
        } else if trimmed.starts_with('[') || text.contains('=') {
            base.merge(Toml::string(text))
        } else {
            base.merge(Yaml::string(text))
        };
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server port: {0}")]
    InvalidServerPort(String),
    #[error("Invalid server configuration: {0}")]
    InvalidServerConfig(String),
    #[error("Invalid store configuration: {0}")]
    InvalidStoreConfig(String),
    #[error("Invalid address configuration: {0}")]
    InvalidAddressConfig(String),
    #[error("Failed to read configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
}
