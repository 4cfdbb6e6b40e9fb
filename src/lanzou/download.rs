//! 中转页 → 最终直链
//!
//! ajaxm.php 返回的 `dom` + `url` 指向一个中转页（`<dom>/file/<url>`）：
//! - 旧流程：中转页直接 302 到真实下载地址
//! - 新流程：中转页是验证页，等待 2 秒后 POST `<dom>/file/ajax.php` 拿到真实地址
//! - 有时还会先返回 acw_sc__v2 挑战脚本

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::acw;
use super::error::LanzouError;
use super::extract::{extract_acw_arg, extract_verify_params, parse_verify_response};
use crate::AppState;

/// 最终直链里暴露解析服务器 IP 的参数
pub const LEAK_PARAM: &str = "pid";

/// 中转页解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalUrl {
    /// 拿到了真实下载地址
    Resolved(String),
    /// 没能解析，退回中转页地址（浏览器打开中转页仍可下载）
    Fallback(String),
}

impl FinalUrl {
    pub fn as_str(&self) -> &str {
        match self {
            FinalUrl::Resolved(url) | FinalUrl::Fallback(url) => url,
        }
    }
}

/// 防机器人等待：只挂起当前请求；服务关闭时立即返回 Cancelled
pub async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<(), LanzouError> {
    if delay.is_zero() {
        return Ok(());
    }
    debug!("⏳ 等待 {} ms 再发送 ajax 请求", delay.as_millis());
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = cancel.cancelled() => Err(LanzouError::Cancelled),
    }
}

/// 访问中转页，解析真实下载地址
pub async fn resolve_final_url(
    state: &AppState,
    dom: &str,
    file_url: &str,
) -> Result<FinalUrl, LanzouError> {
    let dom = dom.trim_end_matches('/');
    let intermediate = format!("{}/file/{}", dom, file_url);
    info!("🔗 访问中转页: {}", intermediate);

    let session = state.fetcher.session()?;
    session.set_cookie(&intermediate, "down_ip", "1");

    let mut page = session.get(&intermediate, None).await?;
    if page.is_redirect() {
        if let Some(location) = redirect_target(&intermediate, page.location.as_deref()) {
            info!("✅ 中转页直接跳转");
            return Ok(FinalUrl::Resolved(location));
        }
    }

    if let Some(arg1) = extract_acw_arg(&page.body) {
        match acw::solve(&arg1) {
            Some(cookie) => {
                debug!("🍪 计算 {} 完成", acw::COOKIE_NAME);
                session.set_cookie(&intermediate, acw::COOKIE_NAME, &cookie);
                page = session.get(&intermediate, None).await?;
                if page.is_redirect() {
                    if let Some(location) = redirect_target(&intermediate, page.location.as_deref()) {
                        info!("✅ 通过 acw 校验后跳转");
                        return Ok(FinalUrl::Resolved(location));
                    }
                }
            }
            None => warn!("⚠️ acw 挑战参数格式异常: {}", arg1),
        }
    }

    if let Some(params) = extract_verify_params(&page.body) {
        // 验证页里有 2 秒的 setTimeout，提前提交会被拒绝
        pause(state.config.lanzou.anti_bot_delay(), &state.shutdown).await?;

        let ajax_url = format!("{}/file/ajax.php", dom);
        let form = [
            ("file", params.file.as_str()),
            ("el", "2"),
            ("sign", params.sign.as_str()),
        ];
        let resp = session
            .post_form(&ajax_url, &form, &intermediate, dom)
            .await?;
        if let Some(url) = parse_verify_response(&resp.body) {
            if url.starts_with("http") {
                info!("✅ 验证页返回真实下载地址");
                return Ok(FinalUrl::Resolved(url));
            }
        }
        warn!("⚠️ 验证页 ajax 未返回下载地址");
    }

    warn!("⚠️ 无法解析真实下载地址，退回中转页: {}", intermediate);
    Ok(FinalUrl::Fallback(intermediate))
}

/// Location 可能是相对路径，按中转页地址补全
fn redirect_target(base: &str, location: Option<&str>) -> Option<String> {
    let location = location?.trim();
    if location.is_empty() {
        return None;
    }
    if location.starts_with("http://") || location.starts_with("https://") {
        return Some(location.to_string());
    }
    Url::parse(base)
        .and_then(|b| b.join(location))
        .map(|u| u.to_string())
        .ok()
}

/// 去掉查询参数 `name`，其余参数保持原样（签名不能被重新编码）
pub fn strip_query_param(url: &str, name: &str) -> String {
    let Some((base, rest)) = url.split_once('?') else {
        return url.to_string();
    };
    let (query, fragment) = match rest.split_once('#') {
        Some((q, f)) => (q, Some(f)),
        None => (rest, None),
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty() && pair.split('=').next() != Some(name))
        .collect();

    let mut out = base.to_string();
    if !kept.is_empty() {
        out.push('?');
        out.push_str(&kept.join("&"));
    }
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

/// 在扩展名前插入后缀：`Example.rar` + `custom` → `Examplecustom.rar`
pub fn splice_suffix(name: &str, suffix: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => format!("{}{}{}", &name[..idx], suffix, &name[idx..]),
        _ => format!("{}{}", name, suffix),
    }
}

/// 把文件名后缀（URL 编码后）写进直链
///
/// 优先改 `fn=` 参数，没有时改路径最后一段；签名参数原样保留。
pub fn apply_filename_suffix(url: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return url.to_string();
    }
    let encoded = urlencoding::encode(suffix);

    if let Some((base, query)) = url.split_once('?') {
        let params: Vec<&str> = query.split('&').collect();
        if params.iter().any(|p| p.starts_with("fn=")) {
            let rebuilt: Vec<String> = params
                .iter()
                .map(|p| match p.strip_prefix("fn=") {
                    Some(value) => format!("fn={}", splice_suffix(value, &encoded)),
                    None => p.to_string(),
                })
                .collect();
            return format!("{}?{}", base, rebuilt.join("&"));
        }
    }

    let (path_part, query_part) = match url.find('?') {
        Some(idx) => url.split_at(idx),
        None => (url, ""),
    };
    let authority_start = path_part.find("://").map(|i| i + 3).unwrap_or(0);
    let Some(slash) = path_part[authority_start..].find('/') else {
        return url.to_string();
    };
    let path_start = authority_start + slash;
    let seg_start = path_start + path_part[path_start..].rfind('/').unwrap_or(0) + 1;
    let segment = &path_part[seg_start..];
    if segment.is_empty() {
        return url.to_string();
    }

    format!(
        "{}{}{}",
        &path_part[..seg_start],
        splice_suffix(segment, &encoded),
        query_part
    )
}
