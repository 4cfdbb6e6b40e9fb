//! Web 服务器入口点

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lanzou_relay::{config::Config, web, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lanzou_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 蓝奏云解析 Web 服务器启动中...");

    // 加载配置（支持环境变量 CONFIG_PATH 或命令行参数）
    let config_path = std::env::var("CONFIG_PATH")
        .ok()
        .or_else(|| std::env::args().nth(1))
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;
    if std::path::Path::new(&config_path).exists() {
        tracing::info!("✅ 配置加载完成: {}", config_path);
    } else {
        tracing::info!("✅ 使用默认配置");
    }

    // 初始化应用状态
    let state = Arc::new(AppState::new(config)?);
    tracing::info!("✅ HTTP Client 初始化完成");

    let addr = format!("{}:{}", state.config.web.host, state.config.web.port);
    let port = state.config.web.port;
    let shutdown = state.shutdown.clone();

    // 创建路由
    let app = web::create_router(state);

    tracing::info!("🌐 Web 服务器启动在: http://{}", addr);
    tracing::info!("📝 解析示例: http://localhost:{}/?url=https://www.lanzoux.com/i9S0o3immkfg", port);
    tracing::info!("💚 健康检查: http://localhost:{}/health", port);

    // 启动服务器
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("👋 服务器已停止");
    Ok(())
}

/// Ctrl+C 后停止接受新连接，并取消正在等待中的解析请求
async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ 无法监听退出信号: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 收到退出信号，正在关闭...");
    token.cancel();
}
