//! 主应用程序入口
//!
//! 加载配置，连接数据库并启动私信服务的 HTTP / WebSocket 接口。

use std::{sync::Arc, time::Duration};

use application::{
    ChatService, ChatServiceDependencies, ConnectionRegistry, DeliveryDispatcher, PageLimits,
};
use config::AppConfig;
use infrastructure::{Infrastructure, InfrastructureConfig};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // RUST_LOG 优先，否则使用配置中的日志级别
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(config = %config.sanitize(), "配置加载完成");

    let infra = Infrastructure::connect(InfrastructureConfig {
        database_url: config.database.url.clone(),
        max_connections: config.database.max_connections,
    })
    .await?;

    let registry = Arc::new(ConnectionRegistry::new());
    let dispatcher = Arc::new(DeliveryDispatcher::new(
        registry.clone(),
        Duration::from_millis(config.chat.delivery_timeout_ms),
    ));

    let chat_service = ChatService::new(ChatServiceDependencies {
        message_repository: infra.message_repository(),
        user_repository: infra.user_repository(),
        dispatcher,
        limits: PageLimits {
            chat_list: config.chat.chat_list_limit,
            history: config.chat.history_limit,
            search: config.chat.search_limit,
            max_search: config.chat.max_search_limit,
        },
    });

    let jwt_service = JwtService::new(config.jwt.clone(), infra.user_repository());

    let state = AppState::new(
        Arc::new(chat_service),
        registry.clone(),
        Arc::new(jwt_service),
        config.chat.outbound_buffer,
    );

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("私信服务启动在 http://{}", address);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    infra.pool().close().await;
    tracing::info!("服务已停止");
    Ok(())
}

/// 等待 Ctrl+C，然后关闭所有在线连接
async fn shutdown_signal(registry: Arc<ConnectionRegistry>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "无法监听关闭信号");
        std::future::pending::<()>().await;
    }

    let handles = registry.drain().await;
    tracing::info!(connections = handles.len(), "收到关闭信号，断开在线连接");
    for handle in handles {
        handle.close();
    }
}
