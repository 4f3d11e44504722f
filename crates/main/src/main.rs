//! 主应用程序入口
//!
//! 启动顺序：日志 → 配置 → 数据库与迁移 → 未读计数播种 →
//! 实时引擎 → 用例服务 → Axum Web 服务。

use std::sync::Arc;
use std::time::Duration;

use application::{
    ChatService, ChatServiceDependencies, ConnectionRegistry, MessageRepository, PresenceTracker,
    RoomService, RoomServiceDependencies, SystemClock, UnreadCounts,
};
use config::AppConfig;
use infrastructure::{create_pg_pool, HttpFileStorage, PgStorage, MIGRATOR};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env();

    tracing::info!(
        "连接数据库: {}",
        config.database.url.split('@').next_back().unwrap_or("unknown")
    );
    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;
    MIGRATOR.run(&pg_pool).await?;

    let storage = PgStorage::new(pg_pool);

    // 启动时从持久化消息重建未读计数表
    let unread = Arc::new(UnreadCounts::new());
    let totals = storage.message_repository.unread_totals().await?;
    tracing::info!(rows = totals.len(), "未读计数已重建");
    unread.seed(totals).await;

    let registry = Arc::new(ConnectionRegistry::new(config.realtime.send_queue_capacity));
    let presence = Arc::new(PresenceTracker::new(registry.clone()));

    let clock = Arc::new(SystemClock);
    let operation_timeout = Duration::from_millis(config.realtime.operation_timeout_ms);

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        participants: storage.participant_repository.clone(),
        messages: storage.message_repository.clone(),
        registry: registry.clone(),
        unread: unread.clone(),
        clock: clock.clone(),
        operation_timeout,
    }));

    let room_service = Arc::new(RoomService::new(RoomServiceDependencies {
        rooms: storage.room_repository.clone(),
        participants: storage.participant_repository.clone(),
        unread,
        clock,
        operation_timeout,
    }));

    let file_storage = Arc::new(HttpFileStorage::new(
        config.storage.upload_url.clone(),
        config.storage.upload_preset.clone().unwrap_or_default(),
    ));

    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));

    let state = AppState {
        chat_service,
        room_service,
        registry: registry.clone(),
        presence,
        file_storage,
        jwt_service,
        realtime: config.realtime.clone(),
    };

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;

    tracing::info!("消息服务启动在 http://{}", config.bind_addr());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    Ok(())
}

/// 等待 Ctrl-C，然后关闭所有已注册连接，让各连接任务走正常清理路径。
async fn shutdown_signal(registry: Arc<ConnectionRegistry>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "无法监听关闭信号");
        return;
    }
    tracing::info!("收到关闭信号，断开所有实时连接");
    registry.close_all().await;
}
