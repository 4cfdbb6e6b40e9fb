//! 文件夹分享：分页列出文件

use tracing::{debug, info, warn};

use super::error::LanzouError;
use super::extract;
use super::parser::{canonical_share_url, normalize};
use super::password::{self, Protection};
use super::types::{FolderEntry, FolderListing, LinkKind, NormalizedLink, ShareRequest};
use crate::AppState;

/// filemoreajax.php 每页固定返回的条数
pub const FOLDER_PAGE_SIZE: usize = 50;

/// 占位条目的 id
const PLACEHOLDER_ID: &str = "-1";

/// 列出文件夹分享（主入口）
pub async fn list_folder(
    state: &AppState,
    req: &ShareRequest,
) -> Result<FolderListing, LanzouError> {
    let link = normalize(&state.config.lanzou, &req.raw_url)?;
    if link.kind != LinkKind::Folder {
        warn!("❌ 文件链接不能按文件夹解析: {}", link.canonical_url);
        return Err(LanzouError::InvalidLink);
    }
    list_link(state, &link, req).await
}

pub async fn list_link(
    state: &AppState,
    link: &NormalizedLink,
    req: &ShareRequest,
) -> Result<FolderListing, LanzouError> {
    let lanzou = &state.config.lanzou;
    let page = req.page.max(1);
    info!("📁 解析文件夹: {} (第 {} 页)", link.canonical_url, page);

    // Step 1: 文件夹页
    let resp = state
        .fetcher
        .get_page(&link.canonical_url, None)
        .await?;
    extract::check_cancelled(&resp.body)?;

    let params = extract::extract_folder_params(&resp.body)?;
    debug!("🔑 文件夹参数: fid={}, uid={}", params.fid, params.uid);

    let protection = Protection::from_flag(extract::is_folder_password_protected(&resp.body));
    let credential = password::gate(protection, &req.password)?;
    // 未检测到提取码表单时仍把调用方给的提取码带上，交给蓝奏云判断
    let pwd = credential.password().unwrap_or(req.password.as_str());

    // Step 2: 分页请求
    let pg = page.to_string();
    let form = [
        ("lx", "2"),
        ("fid", params.fid.as_str()),
        ("uid", params.uid.as_str()),
        ("pg", pg.as_str()),
        ("rep", "0"),
        ("t", params.t.as_str()),
        ("k", params.k.as_str()),
        ("up", "1"),
        ("ls", "1"),
        ("pwd", pwd),
    ];
    let ajax = state
        .fetcher
        .post_form(
            &lanzou.folder_ajax_url(&params.fid),
            &form,
            Some(&link.canonical_url),
        )
        .await?;
    debug!("📨 filemoreajax 响应: {}", extract::truncate(&ajax.body, 300));

    let listing = extract::parse_folder_response(&ajax.body)?;
    let items = match listing.zt {
        1 => listing.items,
        // 超出页码范围：蓝奏云返回“没有了”，按空列表处理
        2 => {
            debug!("📭 第 {} 页没有更多文件: {}", page, listing.info);
            Vec::new()
        }
        3 if pwd.is_empty() => return Err(LanzouError::PasswordRequired),
        3 => {
            warn!("❌ 文件夹提取码错误: {}", listing.info);
            return Err(LanzouError::IncorrectPassword);
        }
        zt => {
            warn!("❌ filemoreajax 返回 zt={}, info={}", zt, listing.info);
            return Err(LanzouError::FolderRejected(listing.info));
        }
    };

    let entries: Vec<FolderEntry> = items
        .into_iter()
        .filter(|item| item.id != PLACEHOLDER_ID)
        .map(|item| FolderEntry {
            source_url: if item.id.is_empty() {
                String::new()
            } else {
                canonical_share_url(lanzou, &item.id)
            },
            name: item.name_all,
            size: item.size,
            date: item.time,
            type_icon: item.icon,
        })
        .collect();

    info!("✅ 文件夹 {} 第 {} 页共 {} 个文件", params.name, page, entries.len());

    Ok(FolderListing {
        name: params.name,
        file_count: entries.len(),
        page,
        page_size: FOLDER_PAGE_SIZE,
        entries,
    })
}
