//! 测试真实蓝奏云链接的解析（需要外网）
//!
//! 使用方法：
//! cargo test --test test_download -- --ignored --nocapture

use anyhow::Result;
use lanzou_relay::lanzou::{self, ShareRequest};
use lanzou_relay::{config::Config, AppState};

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行
async fn test_resolve_live_link() -> Result<()> {
    // 初始化日志
    let _ = tracing_subscriber::fmt()
        .with_env_filter("lanzou_relay=debug")
        .try_init();

    println!("\n🧪 测试解析真实分享链接\n");

    let config = Config::load("config.toml")?;
    println!("📋 基础域名: {}", config.lanzou.base_domain);
    let state = AppState::new(config)?;

    let url = std::env::var("LANZOU_TEST_URL")
        .unwrap_or_else(|_| "https://www.lanzoux.com/i9S0o3immkfg".to_string());
    let pwd = std::env::var("LANZOU_TEST_PWD").unwrap_or_default();

    match lanzou::resolve_file(&state, &ShareRequest::new(url.as_str(), pwd)).await {
        Ok(file) => {
            println!("✅ 文件名: {}", file.name);
            println!("✅ 大小: {}", file.display_size);
            println!("✅ 直链: {}\n", file.download_url);
            assert!(file.download_url.starts_with("http"));
            assert!(!file.download_url.contains("pid="));
        }
        Err(e) => {
            println!("\n❌ 解析失败: {}\n", e);
            return Err(e.into());
        }
    }

    Ok(())
}
