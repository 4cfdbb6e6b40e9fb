//! 数据类型

use serde::Serialize;

/// 一次解析请求（每次调用构造一次，之后只读）
#[derive(Debug, Clone, Default)]
pub struct ShareRequest {
    pub raw_url: String,
    /// 空字符串表示未提供提取码
    pub password: String,
    /// 文件夹页码，从 1 开始
    pub page: u32,
    pub filename_override: Option<String>,
}

impl ShareRequest {
    pub fn new(raw_url: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            raw_url: raw_url.into(),
            password: password.into(),
            page: 1,
            filename_override: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_filename_override(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.filename_override = if name.is_empty() { None } else { Some(name) };
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLink {
    pub canonical_url: String,
    pub kind: LinkKind,
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedFile {
    pub name: String,
    pub display_size: String,
    /// 蓝奏云签发的限时直链，不要长期缓存
    pub download_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderEntry {
    pub name: String,
    pub size: String,
    pub date: String,
    pub type_icon: String,
    /// 可再次交给 resolve_file 解析的文件分享链接
    pub source_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderListing {
    pub name: String,
    pub file_count: usize,
    pub page: u32,
    pub page_size: usize,
    pub entries: Vec<FolderEntry>,
}
