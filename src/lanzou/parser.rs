//! 链接解析：统一域名并判断是文件还是文件夹

use tracing::debug;
use url::Url;

use super::error::LanzouError;
use super::types::{LinkKind, NormalizedLink};
use crate::config::LanzouConfig;

/// 文件夹分享的 id 以该字符开头，例如 /b0raxqelc
pub const FOLDER_MARKER: char = 'b';

const ID_MIN_LEN: usize = 5;
const ID_MAX_LEN: usize = 32;

/// 把任意别名域名的分享链接统一到配置的基础域名
///
/// 支持：
/// - https://www.lanzoux.com/i9S0o3immkfg
/// - lanzoui.com/b0raxqelc（省略协议）
/// - https://wwa.lanzouf.com/tp/i9S0o3immkfg（移动端页面）
/// - https://xxx.lanzoux.com/i9S0o3immkfg?w=1#top
pub fn normalize(config: &LanzouConfig, raw_url: &str) -> Result<NormalizedLink, LanzouError> {
    let raw = raw_url.trim();
    if raw.is_empty() {
        return Err(LanzouError::MissingUrl);
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    let parsed = Url::parse(&with_scheme).map_err(|_| LanzouError::InvalidLink)?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(LanzouError::InvalidLink);
    }
    let host = parsed.host_str().ok_or(LanzouError::InvalidLink)?;
    if !is_known_host(config, host) {
        debug!("⚠️ 非已知蓝奏云域名，按路径规则继续解析: {}", host);
    }

    let mut segments = parsed
        .path_segments()
        .ok_or(LanzouError::InvalidLink)?
        .filter(|s| !s.is_empty());
    let first = segments.next().ok_or(LanzouError::InvalidLink)?;
    let id = if first == "tp" {
        segments.next().ok_or(LanzouError::InvalidLink)?
    } else {
        first
    };

    if !is_valid_id(id) {
        return Err(LanzouError::InvalidLink);
    }

    let kind = if id.starts_with(FOLDER_MARKER) {
        LinkKind::Folder
    } else {
        LinkKind::File
    };

    Ok(NormalizedLink {
        canonical_url: canonical_share_url(config, id),
        kind,
        id: id.to_string(),
    })
}

/// 根据 id 拼出规范化的分享链接
pub fn canonical_share_url(config: &LanzouConfig, id: &str) -> String {
    format!("{}/{}", config.base(), id)
}

/// 域名是否属于已知别名（含子域名）或基础域名
pub fn is_known_host(config: &LanzouConfig, host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let base_host = Url::parse(config.base())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()));
    if base_host.as_deref() == Some(host.as_str()) {
        return true;
    }
    config.alias_domains.iter().any(|alias| {
        let alias = alias.to_ascii_lowercase();
        host == alias || host.ends_with(&format!(".{}", alias))
    })
}

fn is_valid_id(id: &str) -> bool {
    (ID_MIN_LEN..=ID_MAX_LEN).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
