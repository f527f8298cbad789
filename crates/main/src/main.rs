//! 主应用程序入口
//!
//! 加载配置、探测公网地址，然后启动 Axum 服务。

use std::sync::Arc;

use anyhow::Context;
use application::{
    LocalRoomBroadcaster, RetryPolicy, RouterSettings, SessionRouter, SessionRouterDependencies,
    StoreGateway, SystemClock,
};
use config::AppConfig;
use infrastructure::{address_resolver, Infrastructure};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    // 地址探测失败直接终止启动
    let resolver = address_resolver(&config)?;
    let ip = resolver
        .discover_public_address()
        .await
        .context("failed to discover public address")?;
    let public_address = format!("{}:{}", ip, config.server.port);
    tracing::info!(%public_address, "public address resolved");

    let infrastructure = Infrastructure::in_memory();
    let gateway = StoreGateway::new(
        infrastructure.gateway_dependencies(RetryPolicy::new(config.store.retry_budget)),
    );
    let broadcaster = LocalRoomBroadcaster::new();

    let session_router = SessionRouter::new(SessionRouterDependencies {
        gateway,
        broadcaster: Arc::new(broadcaster.clone()),
        clock: Arc::new(SystemClock),
        settings: RouterSettings {
            object_base_url: config.store.object_base_url.clone(),
            public_address,
        },
    });

    let app = router(AppState::new(session_router, broadcaster));
    let bind_address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;

    tracing::info!(address = %bind_address, "classroom server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
