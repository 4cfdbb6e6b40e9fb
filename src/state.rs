//! 应用状态（配置 + 出站请求客户端）

use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::Config;
use crate::lanzou::Fetcher;

pub struct AppState {
    pub config: Config,
    pub fetcher: Fetcher,
    /// 服务关闭时取消，正在等待的防机器人延时会立即结束
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let base = Url::parse(config.lanzou.base())
            .map_err(|e| anyhow!("base_domain 配置无效 ({}): {}", config.lanzou.base_domain, e))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(anyhow!(
                "base_domain 必须是 http/https 地址: {}",
                config.lanzou.base_domain
            ));
        }
        if config.lanzou.http_timeout_secs == 0 {
            return Err(anyhow!("http_timeout_secs 必须大于 0"));
        }

        let fetcher = Fetcher::new(&config.lanzou)?;

        Ok(Self {
            config,
            fetcher,
            shutdown: CancellationToken::new(),
        })
    }
}
