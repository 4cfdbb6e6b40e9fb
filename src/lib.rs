//! 蓝奏云分享链接解析与下载中转

pub mod config;
pub mod lanzou;
pub mod state;
pub mod web;

pub use config::Config;
pub use state::AppState;

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
