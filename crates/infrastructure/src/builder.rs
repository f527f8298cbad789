use std::sync::Arc;

use application::{AddressResolver, RetryPolicy, StoreGatewayDependencies};
use config::AppConfig;

use crate::{
    address::{HttpAddressResolver, ResolveError, StaticAddressResolver},
    chat_queue::InMemoryChatQueue,
    directory::InMemoryRoomDirectory,
    mailer::LoggingInvitationMailer,
    object_store::InMemoryObjectStore,
};

/// 进程内的全部协作方实现
#[derive(Clone, Default)]
pub struct Infrastructure {
    pub directory: Arc<InMemoryRoomDirectory>,
    pub queue: Arc<InMemoryChatQueue>,
    pub objects: Arc<InMemoryObjectStore>,
    pub mailer: Arc<LoggingInvitationMailer>,
}

impl Infrastructure {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn gateway_dependencies(&self, policy: RetryPolicy) -> StoreGatewayDependencies {
        StoreGatewayDependencies {
            directory: self.directory.clone(),
            queue: self.queue.clone(),
            objects: self.objects.clone(),
            mailer: self.mailer.clone(),
            policy,
        }
    }
}

/// 配置了固定地址就直接使用，否则走 HTTP 探测
pub fn address_resolver(config: &AppConfig) -> Result<Arc<dyn AddressResolver>, ResolveError> {
    match &config.address.public_address {
        Some(address) => Ok(Arc::new(StaticAddressResolver::new(address.clone()))),
        None => Ok(Arc::new(HttpAddressResolver::new(
            config.address.discovery_url.clone(),
        )?)),
    }
}
