//! 蓝奏云分享链接解析模块

pub mod acw;
pub mod download;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod folder;
pub mod parser;
pub mod password;
pub mod share;
pub mod stream;
pub mod types;

// 导出常用函数
pub use error::LanzouError;
pub use fetch::Fetcher;
pub use folder::list_folder;
pub use parser::normalize;
pub use share::resolve_file;
pub use stream::{open_stream, ProxyStream};
pub use types::{
    FolderEntry, FolderListing, LinkKind, NormalizedLink, ResolvedFile, ShareRequest,
};

use crate::AppState;

/// 按链接类型分发后的结果
#[derive(Debug, Clone)]
pub enum Resolution {
    File(ResolvedFile),
    Folder(FolderListing),
}

/// 规范化链接后自动选择单文件解析或文件夹列表
pub async fn resolve(state: &AppState, req: &ShareRequest) -> Result<Resolution, LanzouError> {
    let link = normalize(&state.config.lanzou, &req.raw_url)?;
    match link.kind {
        LinkKind::File => share::resolve_link(state, &link, req)
            .await
            .map(Resolution::File),
        LinkKind::Folder => folder::list_link(state, &link, req)
            .await
            .map(Resolution::Folder),
    }
}
