//! 解析失败的分类
//!
//! 每种错误的提示文案是对外约定的一部分，不要随意修改。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LanzouError {
    #[error("Please provide a URL")]
    MissingUrl,

    #[error("Invalid Lanzou link")]
    InvalidLink,

    #[error("File sharing has been cancelled")]
    SharingCancelled,

    #[error("Please provide the share password")]
    PasswordRequired,

    #[error("Incorrect share password")]
    IncorrectPassword,

    #[error("Failed to parse page parameters")]
    PageParseError,

    #[error("Failed to parse download info")]
    DownloadInfoParseError,

    #[error("Download request rejected: {0}")]
    DownloadRejected(String),

    #[error("Failed to find iframe link")]
    IframeNotFound,

    #[error("Failed to parse iframe parameters")]
    IframeParseError,

    #[error("Failed to parse folder parameters")]
    FolderParseError,

    #[error("Failed to parse folder response")]
    FolderListParseError,

    #[error("Folder request rejected: {0}")]
    FolderRejected(String),

    #[error("Upstream service unavailable")]
    UpstreamUnavailable(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {0}")]
    UpstreamError(u16),

    #[error("Request cancelled")]
    Cancelled,
}

impl LanzouError {
    /// 稳定的错误标识，供外层映射响应码
    pub fn kind(&self) -> &'static str {
        match self {
            LanzouError::MissingUrl => "missing_url",
            LanzouError::InvalidLink => "invalid_link",
            LanzouError::SharingCancelled => "sharing_cancelled",
            LanzouError::PasswordRequired => "password_required",
            LanzouError::IncorrectPassword => "incorrect_password",
            LanzouError::PageParseError => "page_parse_error",
            LanzouError::DownloadInfoParseError => "download_info_parse_error",
            LanzouError::DownloadRejected(_) => "download_rejected",
            LanzouError::IframeNotFound => "iframe_not_found",
            LanzouError::IframeParseError => "iframe_parse_error",
            LanzouError::FolderParseError => "folder_parse_error",
            LanzouError::FolderListParseError => "folder_list_parse_error",
            LanzouError::FolderRejected(_) => "folder_rejected",
            LanzouError::UpstreamUnavailable(_) => "upstream_unavailable",
            LanzouError::UpstreamError(_) => "upstream_error",
            LanzouError::Cancelled => "cancelled",
        }
    }

    /// 是否是上游（网络 / 蓝奏云服务器）导致的失败
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            LanzouError::UpstreamUnavailable(_)
                | LanzouError::UpstreamError(_)
                | LanzouError::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_stable() {
        assert_eq!(
            LanzouError::PasswordRequired.to_string(),
            "Please provide the share password"
        );
        assert_eq!(
            LanzouError::SharingCancelled.to_string(),
            "File sharing has been cancelled"
        );
        assert_eq!(LanzouError::PageParseError.to_string(), "Failed to parse page parameters");
        assert_eq!(LanzouError::UpstreamError(404).to_string(), "Upstream returned HTTP 404");
    }

    #[test]
    fn test_kind_and_upstream_classification() {
        assert_eq!(LanzouError::IframeNotFound.kind(), "iframe_not_found");
        assert!(!LanzouError::IncorrectPassword.is_upstream());
        assert!(LanzouError::UpstreamError(500).is_upstream());
    }
}
