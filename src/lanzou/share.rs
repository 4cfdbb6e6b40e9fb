//! 单文件分享链接解析
//!
//! 分享页 → ajaxm.php → 中转页 → 直链，每一步是一个独立的函数，
//! 输入上一步的结果，失败即终止（不重试）。

use tracing::{debug, info, warn};

use super::download::{self, FinalUrl, LEAK_PARAM};
use super::error::LanzouError;
use super::extract::{self, DownloadInfo};
use super::parser::normalize;
use super::password::{self, Credential, Protection};
use super::types::{LinkKind, NormalizedLink, ResolvedFile, ShareRequest};
use crate::AppState;

/// 分享页的抓取结果
#[derive(Debug, Clone)]
pub struct SharePage {
    pub url: String,
    pub html: String,
    pub name: String,
    pub size: String,
}

/// 准备发往 ajaxm.php 的请求
#[derive(Debug, Clone)]
pub struct AjaxRequest {
    pub url: String,
    pub referer: String,
    pub form: Vec<(&'static str, String)>,
}

/// 解析单文件分享链接（主入口）
pub async fn resolve_file(
    state: &AppState,
    req: &ShareRequest,
) -> Result<ResolvedFile, LanzouError> {
    let link = normalize(&state.config.lanzou, &req.raw_url)?;
    if link.kind != LinkKind::File {
        warn!("❌ 文件夹链接不能按单文件解析: {}", link.canonical_url);
        return Err(LanzouError::InvalidLink);
    }
    resolve_link(state, &link, req).await
}

/// 对已规范化的文件链接执行完整解析流程
pub async fn resolve_link(
    state: &AppState,
    link: &NormalizedLink,
    req: &ShareRequest,
) -> Result<ResolvedFile, LanzouError> {
    info!("📥 解析分享链接: {}", link.canonical_url);

    // Step 1: 分享页
    let page = fetch_share_page(state, link).await?;

    // Step 2: 提取参数 + 提取码检查
    let protection = Protection::from_flag(extract::is_password_protected(&page.html));
    let credential = password::gate(protection, &req.password)?;
    let ajax = build_ajax_request(state, &page, credential).await?;

    // Step 3-4: 等待后请求 ajaxm.php
    let info = send_ajax(state, &ajax, credential).await?;
    let name = match (credential, info.file_name()) {
        (Credential::Password(_), Some(name)) => name.to_string(),
        _ => page.name.clone(),
    };

    // Step 5-6: 中转页
    let final_url = download::resolve_final_url(state, &info.dom, &info.url).await?;

    // Step 7: 清理直链
    let download_url = finalize_url(&final_url, req.filename_override.as_deref());
    info!("✅ 解析完成: {} ({})", name, page.size);

    Ok(ResolvedFile {
        name,
        display_size: page.size,
        download_url,
    })
}

/// 抓取分享页，检查分享是否已取消，并读出文件名 / 大小
pub async fn fetch_share_page(
    state: &AppState,
    link: &NormalizedLink,
) -> Result<SharePage, LanzouError> {
    let resp = state
        .fetcher
        .get_page(&link.canonical_url, None)
        .await?;
    debug!("📄 分享页长度: {} 字节", resp.body.len());

    extract::check_cancelled(&resp.body)?;

    let name = extract::extract_file_name(&resp.body);
    let size = extract::extract_file_size(&resp.body);
    debug!("📦 文件名: {:?}, 大小: {:?}", name, size);

    Ok(SharePage {
        url: link.canonical_url.clone(),
        html: resp.body,
        name,
        size,
    })
}

/// 根据页面类型构造 ajaxm.php 请求
///
/// - 有提取码：分享页里直接有 sign 和 ajaxm 的 file id
/// - 无提取码：需要再抓 iframe 页拿 wp_sign / ajaxdata
pub async fn build_ajax_request(
    state: &AppState,
    page: &SharePage,
    credential: Credential<'_>,
) -> Result<AjaxRequest, LanzouError> {
    let lanzou = &state.config.lanzou;

    match credential {
        Credential::Password(pwd) => {
            let params = extract::extract_protected_params(&page.html)?;
            debug!("🔑 提取码页面: file_id={}", params.file_id);
            Ok(AjaxRequest {
                url: lanzou.ajax_url(&params.file_id),
                referer: page.url.clone(),
                form: vec![
                    ("action", "downprocess".to_string()),
                    ("sign", params.sign),
                    ("p", pwd.to_string()),
                    ("kd", "1".to_string()),
                ],
            })
        }
        Credential::NotNeeded => {
            let iframe_path = extract::extract_iframe_path(&page.html)?;
            let iframe_url = format!("{}/{}", lanzou.base(), iframe_path);
            info!("🪟 获取 iframe 页: {}", iframe_url);

            let iframe = state
                .fetcher
                .get_page(&iframe_url, Some(&page.url))
                .await?;
            let params = extract::extract_iframe_params(&iframe.body)?;
            debug!("🔑 iframe 页: file_id={}", params.file_id);

            Ok(AjaxRequest {
                url: lanzou.ajax_url(&params.file_id),
                referer: iframe_url,
                form: vec![
                    ("action", "downprocess".to_string()),
                    ("websignkey", params.ajaxdata.clone()),
                    ("signs", params.ajaxdata),
                    ("sign", params.wp_sign),
                    ("websign", String::new()),
                    ("kd", "1".to_string()),
                    ("ves", "1".to_string()),
                ],
            })
        }
    }
}

/// 固定等待后发送 ajaxm.php 请求，并检查返回
pub async fn send_ajax(
    state: &AppState,
    ajax: &AjaxRequest,
    credential: Credential<'_>,
) -> Result<DownloadInfo, LanzouError> {
    download::pause(state.config.lanzou.anti_bot_delay(), &state.shutdown).await?;

    let form: Vec<(&str, &str)> = ajax.form.iter().map(|(k, v)| (*k, v.as_str())).collect();
    let resp = state
        .fetcher
        .post_form(&ajax.url, &form, Some(&ajax.referer))
        .await?;
    debug!("📨 ajaxm 响应: {}", extract::truncate(&resp.body, 300));

    let info = extract::parse_download_info(&resp.body)?;
    if !info.is_ok() {
        warn!("❌ ajaxm 返回 zt={}, inf={}", info.zt, info.inf);
        return Err(credential.rejection(LanzouError::DownloadRejected(info.inf.clone())));
    }
    if info.dom.is_empty() || info.url.is_empty() {
        warn!("❌ ajaxm 响应缺少 dom/url");
        return Err(LanzouError::DownloadInfoParseError);
    }
    Ok(info)
}

/// 去掉泄露参数，并按需写入文件名后缀
///
/// 退回中转页时不改文件名（中转页地址里没有文件名）。
pub fn finalize_url(final_url: &FinalUrl, suffix: Option<&str>) -> String {
    let url = match (final_url, suffix) {
        (FinalUrl::Resolved(url), Some(suffix)) => download::apply_filename_suffix(url, suffix),
        _ => final_url.as_str().to_string(),
    };
    download::strip_query_param(&url, LEAK_PARAM)
}
