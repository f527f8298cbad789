//! 公网地址探测
//!
//! 启动时只调用一次；失败由调用方决定是否终止启动。

use std::net::IpAddr;
use std::time::Duration;

use application::{AddressResolver, CollaboratorError};
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("address discovery request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("discovery endpoint returned an invalid address: {0:?}")]
    InvalidAddress(String),
}

impl From<ResolveError> for CollaboratorError {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::Http(err) => CollaboratorError::unavailable(err.to_string()),
            err @ ResolveError::InvalidAddress(_) => CollaboratorError::rejected(err.to_string()),
        }
    }
}

/// 使用配置中给定的地址
#[derive(Debug, Clone)]
pub struct StaticAddressResolver {
    address: String,
}

impl StaticAddressResolver {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl AddressResolver for StaticAddressResolver {
    async fn discover_public_address(&self) -> Result<String, CollaboratorError> {
        Ok(self.address.clone())
    }
}

/// 请求一个返回纯文本 IP 的 HTTP 端点
#[derive(Debug, Clone)]
pub struct HttpAddressResolver {
    client: reqwest::Client,
    discovery_url: String,
}

impl HttpAddressResolver {
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(discovery_url: impl Into<String>) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self {
            client,
            discovery_url: discovery_url.into(),
        })
    }

    pub async fn resolve(&self) -> Result<IpAddr, ResolveError> {
        let body = self
            .client
            .get(&self.discovery_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let text = body.trim();
        let ip = text
            .parse::<IpAddr>()
            .map_err(|_| ResolveError::InvalidAddress(text.to_owned()))?;
        info!(%ip, url = %self.discovery_url, "public address discovered");
        Ok(ip)
    }
}

#[async_trait]
impl AddressResolver for HttpAddressResolver {
    async fn discover_public_address(&self) -> Result<String, CollaboratorError> {
        Ok(self.resolve().await?.to_string())
    }
}
