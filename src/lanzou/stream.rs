//! 代理下载：把直链的响应体原样转发给调用方

use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use tracing::info;

use super::error::LanzouError;
use super::types::ResolvedFile;
use crate::AppState;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// 可转发的下载流；丢弃它即释放上游连接
pub struct ProxyStream {
    pub status: u16,
    pub filename: String,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes, reqwest::Error>>,
}

impl ProxyStream {
    pub fn content_type(&self) -> &'static str {
        // 不信任上游的 Content-Type
        OCTET_STREAM
    }

    pub fn content_disposition(&self) -> String {
        content_disposition(&self.filename)
    }
}

/// `filename` 给只认 ASCII 的客户端，`filename*` 带原始的 UTF-8 文件名
pub fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_fallback(filename),
        urlencoding::encode(filename)
    )
}

fn ascii_fallback(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect()
}

/// 选择下载文件名：调用方指定 > 页面文件名 > "download"
pub fn download_name(file: &ResolvedFile, filename_override: Option<&str>) -> String {
    filename_override
        .filter(|s| !s.trim().is_empty())
        .or(Some(file.name.as_str()).filter(|s| !s.trim().is_empty()))
        .unwrap_or("download")
        .to_string()
}

/// 打开直链并返回可逐块转发的流，不会把整个文件读进内存
pub async fn open_stream(
    state: &AppState,
    file: &ResolvedFile,
    filename_override: Option<&str>,
) -> Result<ProxyStream, LanzouError> {
    let resp = state.fetcher.open_stream(&file.download_url).await?;
    let filename = download_name(file, filename_override);
    let content_length = resp.content_length();

    info!(
        "✅ 开始转发文件: {} ({} bytes)",
        filename,
        content_length.map(|l| l.to_string()).unwrap_or_else(|| "?".into())
    );

    Ok(ProxyStream {
        status: resp.status().as_u16(),
        filename,
        content_length,
        body: resp.bytes_stream().boxed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> ResolvedFile {
        ResolvedFile {
            name: name.to_string(),
            display_size: "1 K".to_string(),
            download_url: "https://d.example/a.rar".to_string(),
        }
    }

    #[test]
    fn test_download_name_priority() {
        assert_eq!(download_name(&file("Example.rar"), Some("mine.rar")), "mine.rar");
        assert_eq!(download_name(&file("Example.rar"), None), "Example.rar");
        assert_eq!(download_name(&file("Example.rar"), Some("  ")), "Example.rar");
        assert_eq!(download_name(&file(""), None), "download");
    }

    #[test]
    fn test_content_disposition_keeps_name() {
        assert_eq!(
            content_disposition("Example 1.rar"),
            "attachment; filename=\"Example 1.rar\"; filename*=UTF-8''Example%201.rar"
        );
        assert_eq!(
            content_disposition("测试 1.rar"),
            "attachment; filename=\"__ 1.rar\"; filename*=UTF-8''%E6%B5%8B%E8%AF%95%201.rar"
        );
        assert_eq!(
            content_disposition("a\"b\\c.zip"),
            "attachment; filename=\"a_b_c.zip\"; filename*=UTF-8''a%22b%5Cc.zip"
        );
    }
}
