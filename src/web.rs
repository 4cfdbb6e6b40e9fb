//! Web 服务器模块
//!
//! `GET /?url=&pwd=&type=&n=&pg=`：
//! - 默认返回 JSON
//! - `type=down` 307 到直链
//! - `type=file` 由本服务代理下载
//!
//! 文件夹链接总是返回 JSON 列表。

use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::lanzou::{
    self, folder, share, FolderListing, LanzouError, LinkKind, ProxyStream, ResolvedFile,
    ShareRequest,
};
use crate::AppState;

const SUCCESS_MSG: &str = "Parse successful";

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub pwd: String,
    #[serde(default, rename = "type")]
    pub response_type: String,
    /// 自定义文件名（后缀）
    #[serde(default)]
    pub n: String,
    /// 原样接收，由 validate_page 解析，非数字也返回统一的错误格式
    #[serde(default)]
    pub pg: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Json,
    Redirect,
    Stream,
}

impl ResponseMode {
    pub fn parse(value: &str) -> Self {
        match value {
            "down" => ResponseMode::Redirect,
            "file" => ResponseMode::Stream,
            _ => ResponseMode::Json,
        }
    }
}

/// 统一错误响应 `{code, msg}`
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: u16,
    pub msg: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            code: StatusCode::BAD_REQUEST.as_u16(),
            msg: msg.into(),
        }
    }
}

impl From<LanzouError> for ApiError {
    fn from(err: LanzouError) -> Self {
        debug!("解析错误类型: {}", err.kind());
        Self {
            code: error_code(&err).as_u16(),
            msg: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::BAD_REQUEST);
        (status, Json(self)).into_response()
    }
}

/// 错误类型 → 响应码：解析 / 提取码类都是 400，上游问题是 5xx
pub fn error_code(err: &LanzouError) -> StatusCode {
    match err {
        LanzouError::UpstreamError(_) => StatusCode::BAD_GATEWAY,
        err if err.is_upstream() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    }
}

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub code: u16,
    pub msg: &'static str,
    pub name: String,
    pub filesize: String,
    #[serde(rename = "downUrl")]
    pub down_url: String,
}

impl From<ResolvedFile> for FileResponse {
    fn from(file: ResolvedFile) -> Self {
        Self {
            code: 200,
            msg: SUCCESS_MSG,
            name: file.name,
            filesize: file.display_size,
            down_url: file.download_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FolderFile {
    pub name: String,
    pub size: String,
    pub time: String,
    pub icon: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderResponse {
    pub code: u16,
    pub msg: &'static str,
    pub name: String,
    pub file_count: usize,
    pub page: u32,
    pub page_size: usize,
    pub files: Vec<FolderFile>,
}

impl From<FolderListing> for FolderResponse {
    fn from(listing: FolderListing) -> Self {
        Self {
            code: 200,
            msg: SUCCESS_MSG,
            name: listing.name,
            file_count: listing.file_count,
            page: listing.page,
            page_size: listing.page_size,
            files: listing
                .entries
                .into_iter()
                .map(|e| FolderFile {
                    name: e.name,
                    size: e.size,
                    time: e.date,
                    icon: e.type_icon,
                    url: e.source_url,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
}

/// 健康检查端点
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION,
    })
}

/// 解析 API 端点
pub async fn resolve_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ResolveQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(e) => {
            warn!("❌ 查询参数无效: {}", e);
            return ApiError::bad_request(e.body_text()).into_response();
        }
    };
    info!("📥 收到解析请求: url={}, type={:?}, pg={}", query.url, query.response_type, query.pg);

    match handle_resolve(state.as_ref(), query).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!("❌ 解析失败: {} ({})", e.msg, e.code);
            e.into_response()
        }
    }
}

async fn handle_resolve(state: &AppState, query: ResolveQuery) -> Result<Response, ApiError> {
    let page = validate_page(&query.pg)?;
    let mode = ResponseMode::parse(&query.response_type);
    let req = ShareRequest::new(query.url, query.pwd)
        .with_page(page)
        .with_filename_override(query.n);

    let link = lanzou::normalize(&state.config.lanzou, &req.raw_url)?;

    match link.kind {
        LinkKind::Folder => {
            let listing = folder::list_link(state, &link, &req).await?;
            Ok(Json(FolderResponse::from(listing)).into_response())
        }
        LinkKind::File => {
            let file = share::resolve_link(state, &link, &req).await?;
            match mode {
                ResponseMode::Json => Ok(Json(FileResponse::from(file)).into_response()),
                ResponseMode::Redirect => {
                    info!("🔁 重定向到直链");
                    Ok(Redirect::temporary(&file.download_url).into_response())
                }
                ResponseMode::Stream => {
                    let stream =
                        lanzou::open_stream(state, &file, req.filename_override.as_deref())
                            .await?;
                    proxy_response(stream)
                }
            }
        }
    }
}

/// 把下载流包装成响应，逐块转发
fn proxy_response(stream: ProxyStream) -> Result<Response, ApiError> {
    let status = StatusCode::from_u16(stream.status).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_DISPOSITION, stream.content_disposition())
        .header(header::CONTENT_TYPE, stream.content_type())
        .header(header::CACHE_CONTROL, "no-cache");

    if let Some(len) = stream.content_length {
        builder = builder.header(header::CONTENT_LENGTH, len);
    }

    builder.body(Body::from_stream(stream.body)).map_err(|e| {
        error!("❌ 构建下载响应失败: {}", e);
        ApiError {
            code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            msg: "Failed to build download response".to_string(),
        }
    })
}

/// 验证页码：必须是从 1 开始的整数，未提供时为 1
pub fn validate_page(pg: &str) -> Result<u32, ApiError> {
    let pg = pg.trim();
    if pg.is_empty() {
        return Ok(1);
    }
    let pg: i64 = pg
        .parse()
        .map_err(|_| ApiError::bad_request("Page number must be an integer"))?;
    if pg < 1 {
        return Err(ApiError::bad_request("Page number must be at least 1"));
    }
    u32::try_from(pg).map_err(|_| ApiError::bad_request("Page number is too large"))
}

/// 跨域：未配置来源时允许任意来源
pub fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("⚠️ 无效的跨域来源: {}", o);
                None
            }
        })
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// 创建 Web 路由
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.config.web.cors_origins);
    Router::new()
        .route("/", get(resolve_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lanzou::FolderEntry;

    #[test]
    fn test_validate_page() {
        assert_eq!(validate_page("").unwrap(), 1);
        assert_eq!(validate_page("1").unwrap(), 1);
        assert_eq!(validate_page(" 42 ").unwrap(), 42);
        for pg in ["0", "-1", "abc", "1.5", "9223372036854775807"] {
            let err = validate_page(pg).unwrap_err();
            assert_eq!(err.code, 400, "page should be invalid: {}", pg);
        }
        assert_eq!(
            validate_page("abc").unwrap_err().msg,
            "Page number must be an integer"
        );
    }

    #[test]
    fn test_response_mode() {
        assert_eq!(ResponseMode::parse("down"), ResponseMode::Redirect);
        assert_eq!(ResponseMode::parse("file"), ResponseMode::Stream);
        assert_eq!(ResponseMode::parse(""), ResponseMode::Json);
        assert_eq!(ResponseMode::parse("json"), ResponseMode::Json);
    }

    #[test]
    fn test_error_envelope() {
        let err = ApiError::from(LanzouError::PasswordRequired);
        assert_eq!(err.code, 400);
        assert_eq!(err.msg, "Please provide the share password");

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"code": 400, "msg": "Please provide the share password"})
        );

        assert_eq!(error_code(&LanzouError::UpstreamError(500)), StatusCode::BAD_GATEWAY);
        assert_eq!(error_code(&LanzouError::Cancelled), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error_code(&LanzouError::IframeParseError), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_folder_response_shape() {
        let listing = FolderListing {
            name: "测试文件夹".to_string(),
            file_count: 1,
            page: 2,
            page_size: 50,
            entries: vec![FolderEntry {
                name: "a.rar".to_string(),
                size: "1 M".to_string(),
                date: "2024-01-01".to_string(),
                type_icon: "rar".to_string(),
                source_url: "https://www.lanzouf.com/iAbc123x".to_string(),
            }],
        };
        let json = serde_json::to_value(FolderResponse::from(listing)).unwrap();
        assert_eq!(json["code"], 200);
        assert_eq!(json["fileCount"], 1);
        assert_eq!(json["pageSize"], 50);
        assert_eq!(json["files"][0]["time"], "2024-01-01");
        assert_eq!(json["files"][0]["url"], "https://www.lanzouf.com/iAbc123x");
    }

    #[test]
    fn test_file_response_shape() {
        let json = serde_json::to_value(FileResponse::from(ResolvedFile {
            name: "Example.rar".to_string(),
            display_size: "12.3 M".to_string(),
            download_url: "https://d.example/Example.rar?st=1".to_string(),
        }))
        .unwrap();
        assert_eq!(json["msg"], "Parse successful");
        assert_eq!(json["filesize"], "12.3 M");
        assert_eq!(json["downUrl"], "https://d.example/Example.rar?st=1");
    }
}
