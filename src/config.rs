//! 配置文件加载

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub lanzou: LanzouConfig,
    #[serde(default)] // 如果配置文件没有 [web] 就用默认值
    pub web: WebConfig,
}

/// 蓝奏云相关配置：域名、请求头、接口路径、超时与防机器人等待
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LanzouConfig {
    /// 所有别名域名最终统一到这个域名
    #[serde(default = "default_base_domain")]
    pub base_domain: String,
    /// 已知的蓝奏云别名域名（含子域名也会被识别）
    #[serde(default = "default_alias_domains")]
    pub alias_domains: Vec<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// 单次请求超时（秒）
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// 代理下载只限制连接超时，传输本身不限时
    #[serde(default = "default_stream_connect_timeout_secs")]
    pub stream_connect_timeout_secs: u64,
    /// 发送 ajax 请求前的固定等待（毫秒）
    #[serde(default = "default_anti_bot_delay_ms")]
    pub anti_bot_delay_ms: u64,
    /// 是否附带随机的 X-Forwarded-For / Client-IP
    #[serde(default = "default_true")]
    pub spoof_client_ip: bool,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_ajax_path")]
    pub ajax_path: String,
    #[serde(default = "default_folder_ajax_path")]
    pub folder_ajax_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 允许的跨域来源，留空表示允许任意来源
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_base_domain() -> String {
    std::env::var("LANZOU_BASE_DOMAIN").unwrap_or_else(|_| "https://www.lanzouf.com".to_string())
}

fn default_alias_domains() -> Vec<String> {
    [
        "lanzou.com",
        "lanzoub.com",
        "lanzouc.com",
        "lanzoue.com",
        "lanzouf.com",
        "lanzoug.com",
        "lanzouh.com",
        "lanzoui.com",
        "lanzoul.com",
        "lanzoum.com",
        "lanzouo.com",
        "lanzoup.com",
        "lanzouq.com",
        "lanzous.com",
        "lanzout.com",
        "lanzouu.com",
        "lanzouv.com",
        "lanzouw.com",
        "lanzoux.com",
        "lanzouy.com",
        "lanzn.com",
        "lanzv.com",
        "ilanzou.com",
        "woozooo.com",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_user_agent() -> String {
    Config::browser_ua().to_string()
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_stream_connect_timeout_secs() -> u64 {
    15
}

fn default_anti_bot_delay_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_ajax_path() -> String {
    "/ajaxm.php".to_string()
}

fn default_folder_ajax_path() -> String {
    "/filemoreajax.php".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    // 优先使用环境变量 PORT
    std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(8000)
}

impl Default for LanzouConfig {
    fn default() -> Self {
        Self {
            base_domain: default_base_domain(),
            alias_domains: default_alias_domains(),
            user_agent: default_user_agent(),
            http_timeout_secs: default_http_timeout_secs(),
            stream_connect_timeout_secs: default_stream_connect_timeout_secs(),
            anti_bot_delay_ms: default_anti_bot_delay_ms(),
            spoof_client_ip: default_true(),
            accept_invalid_certs: false,
            ajax_path: default_ajax_path(),
            folder_ajax_path: default_folder_ajax_path(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl LanzouConfig {
    /// 去掉末尾斜杠的基础域名
    pub fn base(&self) -> &str {
        self.base_domain.trim_end_matches('/')
    }

    pub fn anti_bot_delay(&self) -> Duration {
        Duration::from_millis(self.anti_bot_delay_ms)
    }

    pub fn ajax_url(&self, file_id: &str) -> String {
        format!("{}{}?file={}", self.base(), self.ajax_path, file_id)
    }

    pub fn folder_ajax_url(&self, fid: &str) -> String {
        format!("{}{}?file={}", self.base(), self.folder_ajax_path, fid)
    }
}

impl Config {
    /// 读取 TOML 配置；文件不存在时使用默认值（默认值会读取环境变量）
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn browser_ua() -> &'static str {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/72.0.3626.121 Safari/537.36"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [lanzou]
            anti_bot_delay_ms = 0

            [web]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.lanzou.anti_bot_delay_ms, 0);
        assert_eq!(config.lanzou.http_timeout_secs, 10);
        assert_eq!(config.lanzou.ajax_path, "/ajaxm.php");
        assert!(config.lanzou.alias_domains.iter().any(|d| d == "lanzoux.com"));
        assert_eq!(config.web.port, 9000);
        assert!(config.web.cors_origins.is_empty());
    }

    #[test]
    fn test_endpoint_urls() {
        let config = LanzouConfig {
            base_domain: "http://127.0.0.1:8080/".to_string(),
            ..LanzouConfig::default()
        };
        assert_eq!(config.ajax_url("123"), "http://127.0.0.1:8080/ajaxm.php?file=123");
        assert_eq!(
            config.folder_ajax_url("456"),
            "http://127.0.0.1:8080/filemoreajax.php?file=456"
        );
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load("/nonexistent/lanzou-relay.toml").unwrap();
        assert_eq!(config.lanzou.anti_bot_delay_ms, 2000);
    }
}
