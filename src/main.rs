use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lanzou_relay::{
    config::Config,
    lanzou::{self, Resolution, ShareRequest},
    web::{FileResponse, FolderResponse},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lanzou_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("🚀 蓝奏云解析工具启动中...");

    // 用法：lanzou-relay <share_url> [pwd] [page]
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        return Err(anyhow!(
            "用法: {} <share_url> [pwd] [page]",
            args.first().map(|s| s.as_str()).unwrap_or("lanzou-relay")
        ));
    }

    let share_url = args[1].clone();
    let pwd = args.get(2).cloned().unwrap_or_default();
    let page = match args.get(3) {
        Some(pg) => pg
            .parse::<u32>()
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| anyhow!("页码必须是大于 0 的整数: {}", pg))?,
        None => 1,
    };
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

    // 加载配置（支持环境变量）
    let config = Config::load(&config_path)?;
    if std::path::Path::new(&config_path).exists() {
        tracing::info!("✅ 配置加载完成: {}", config_path);
    } else {
        tracing::info!("✅ 使用默认配置");
    }

    let state = Arc::new(AppState::new(config)?);
    tracing::info!("✅ HTTP Client 初始化完成");

    let req = ShareRequest::new(share_url, pwd).with_page(page);
    let output = match lanzou::resolve(state.as_ref(), &req).await? {
        Resolution::File(file) => serde_json::to_string_pretty(&FileResponse::from(file))?,
        Resolution::Folder(listing) => {
            serde_json::to_string_pretty(&FolderResponse::from(listing))?
        }
    };

    println!("{}", output);
    Ok(())
}
