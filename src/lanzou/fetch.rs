//! 出站请求封装
//!
//! 所有阶段都通过 [`Fetcher`] 发请求，统一附带浏览器 UA、Referer 与伪造的客户端 IP。
//! 需要检查 Location 的中转页请求走 [`Session`]（不自动跟随跳转、独立 Cookie）。

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::{cookie::Jar, header, redirect::Policy, Client, RequestBuilder, Response, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::error::LanzouError;
use crate::config::LanzouConfig;

/// 伪造 IP 的首段（蓝奏云 CDN 对这些网段比较宽松）
const IP_FIRST_OCTETS: [&str; 32] = [
    "218", "218", "66", "66", "218", "218", "60", "60", "202", "204", "66", "66", "66", "59",
    "61", "60", "222", "221", "66", "59", "60", "60", "66", "218", "218", "62", "63", "64", "66",
    "66", "122", "211",
];

/// 一次请求的结果：状态码、正文、未跟随的跳转地址
#[derive(Debug, Clone)]
pub struct Page {
    pub status: u16,
    pub url: String,
    pub location: Option<String>,
    pub body: String,
}

impl Page {
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.location.is_some()
    }
}

/// 生成一个随机 IP，用于 X-Forwarded-For / Client-IP
pub fn rand_ip() -> String {
    let mut rng = rand::thread_rng();
    let first = IP_FIRST_OCTETS.choose(&mut rng).copied().unwrap_or("218");
    format!(
        "{}.{}.{}.{}",
        first,
        rng.gen_range(60u8..=255),
        rng.gen_range(60u8..=255),
        rng.gen_range(60u8..=255)
    )
}

#[derive(Clone)]
pub struct Fetcher {
    config: LanzouConfig,
    /// 页面请求（允许跟随跳转）
    client: Client,
    /// 代理下载（跟随跳转，只限制连接超时）
    stream_client: Client,
}

impl Fetcher {
    pub fn new(config: &LanzouConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .redirect(Policy::limited(10))
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        let stream_client = Client::builder()
            .redirect(Policy::limited(10))
            .connect_timeout(Duration::from_secs(config.stream_connect_timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            config: config.clone(),
            client,
            stream_client,
        })
    }

    /// GET 一个 HTML 页面
    pub async fn get_page(&self, url: &str, referer: Option<&str>) -> Result<Page, LanzouError> {
        debug!("🌐 GET {}", url);
        let req = self.decorate(self.client.get(url), referer);
        read_page(req.send().await?).await
    }

    /// 以表单方式 POST 到 ajax 接口
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        referer: Option<&str>,
    ) -> Result<Page, LanzouError> {
        debug!("📡 POST {} ({} 个字段)", url, form.len());
        let req = self
            .decorate(self.client.post(url), referer)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(header::ORIGIN, self.config.base())
            .form(form);
        read_page(req.send().await?).await
    }

    /// 打开最终文件的下载流（跟随跳转）
    pub async fn open_stream(&self, url: &str) -> Result<Response, LanzouError> {
        debug!("📥 打开下载流: {}", url);
        let req = self
            .decorate(self.stream_client.get(url), None)
            .header(header::ACCEPT, "*/*");
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(LanzouError::UpstreamError(status.as_u16()));
        }
        Ok(resp)
    }

    /// 为一次解析创建独立的 Cookie 会话（不自动跟随跳转）
    pub fn session(&self) -> Result<Session<'_>, LanzouError> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .redirect(Policy::none())
            .timeout(Duration::from_secs(self.config.http_timeout_secs))
            .danger_accept_invalid_certs(self.config.accept_invalid_certs)
            .build()?;
        Ok(Session {
            fetcher: self,
            client,
            jar,
        })
    }

    fn decorate(&self, req: RequestBuilder, referer: Option<&str>) -> RequestBuilder {
        let mut req = req
            .header(header::USER_AGENT, self.config.user_agent.as_str())
            .header(header::ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9");
        if self.config.spoof_client_ip {
            let ip = rand_ip();
            req = req
                .header("X-Forwarded-For", ip.as_str())
                .header("Client-IP", ip.as_str());
        }
        if let Some(referer) = referer {
            req = req.header(header::REFERER, referer);
        }
        req
    }
}

/// 中转页会话：自带 Cookie，不跟随跳转，便于读取 Location
pub struct Session<'a> {
    fetcher: &'a Fetcher,
    client: Client,
    jar: Arc<Jar>,
}

impl Session<'_> {
    pub fn set_cookie(&self, url: &str, name: &str, value: &str) {
        match url.parse::<Url>() {
            Ok(url) => self
                .jar
                .add_cookie_str(&format!("{}={}; Path=/", name, value), &url),
            Err(e) => debug!("⚠️ 无法为 {} 设置 Cookie {}: {}", url, name, e),
        }
    }

    pub async fn get(&self, url: &str, referer: Option<&str>) -> Result<Page, LanzouError> {
        debug!("🌐 GET (no redirect) {}", url);
        let req = self.fetcher.decorate(self.client.get(url), referer);
        read_page(req.send().await?).await
    }

    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        referer: &str,
        origin: &str,
    ) -> Result<Page, LanzouError> {
        debug!("📡 POST (session) {}", url);
        let req = self
            .fetcher
            .decorate(self.client.post(url), Some(referer))
            .header("X-Requested-With", "XMLHttpRequest")
            .header(header::ORIGIN, origin)
            .form(form);
        read_page(req.send().await?).await
    }
}

async fn read_page(resp: Response) -> Result<Page, LanzouError> {
    let status = resp.status();
    if !(status.is_success() || status.is_redirection()) {
        debug!("❌ 上游返回 HTTP {}: {}", status, resp.url());
        return Err(LanzouError::UpstreamError(status.as_u16()));
    }

    let url = resp.url().to_string();
    let location = resp
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let body = resp.text().await?;
    debug!("📄 {} 返回 {} 字节 (status={})", url, body.len(), status);

    Ok(Page {
        status: status.as_u16(),
        url,
        location,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_rand_ip_shape() {
        for _ in 0..100 {
            let ip = rand_ip();
            let parsed: Ipv4Addr = ip.parse().unwrap();
            let octets = parsed.octets();
            assert!(IP_FIRST_OCTETS.contains(&octets[0].to_string().as_str()));
            assert!(octets[1..].iter().all(|o| *o >= 60));
        }
    }

    #[test]
    fn test_page_redirect_requires_location() {
        let mut page = Page {
            status: 302,
            url: "http://localhost/file/?x".to_string(),
            location: None,
            body: String::new(),
        };
        assert!(!page.is_redirect());
        page.location = Some("http://localhost/final".to_string());
        assert!(page.is_redirect());
    }
}
