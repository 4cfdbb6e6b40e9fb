//! 页面参数提取
//!
//! 蓝奏云的分享页、iframe 页、中转页和文件夹页都把关键参数写在内联脚本里。
//! 这里集中维护所有正则，页面结构变化时只需要改这个文件。

use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::sync::OnceLock;
use tracing::debug;

use super::error::LanzouError;

static CANCELLED_MARKERS: [&str; 2] = ["File sharing has been cancelled", "文件取消分享了"];
const PASSWORD_FORM_MARKER: &str = "function down_p(){";

static NAME_RES: OnceLock<Vec<Regex>> = OnceLock::new();
static SIZE_RES: OnceLock<Vec<Regex>> = OnceLock::new();
static SIGN_RE: OnceLock<Regex> = OnceLock::new();
static AJAXM_RE: OnceLock<Regex> = OnceLock::new();
static IFRAME_RE: OnceLock<Regex> = OnceLock::new();
static WP_SIGN_RE: OnceLock<Regex> = OnceLock::new();
static AJAXDATA_RE: OnceLock<Regex> = OnceLock::new();
static ARG1_RE: OnceLock<Regex> = OnceLock::new();
static VERIFY_FILE_RE: OnceLock<Regex> = OnceLock::new();
static VERIFY_SIGN_RE: OnceLock<Regex> = OnceLock::new();
static TITLE_RE: OnceLock<Regex> = OnceLock::new();
static FID_RE: OnceLock<Regex> = OnceLock::new();
static UID_RE: OnceLock<Regex> = OnceLock::new();
static FOLDER_PWD_RE: OnceLock<Regex> = OnceLock::new();

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("built-in pattern must compile"))
}

fn regexes(cell: &'static OnceLock<Vec<Regex>>, patterns: &[&str]) -> &'static [Regex] {
    cell.get_or_init(|| {
        patterns
            .iter()
            .map(|p| Regex::new(p).expect("built-in pattern must compile"))
            .collect()
    })
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn all_captures(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// 分享页：分享已取消
pub fn check_cancelled(html: &str) -> Result<(), LanzouError> {
    if CANCELLED_MARKERS.iter().any(|m| html.contains(m))
        || html.to_lowercase().contains("file sharing cancelled")
    {
        return Err(LanzouError::SharingCancelled);
    }
    Ok(())
}

/// 分享页：是否带提取码表单
pub fn is_password_protected(html: &str) -> bool {
    html.contains(PASSWORD_FORM_MARKER)
}

pub fn extract_file_name(html: &str) -> String {
    let patterns = regexes(
        &NAME_RES,
        &[
            r#"(?s)style="font-size: 30px;text-align: center;padding: 56px 0px 20px 0px;">(.*?)</div>"#,
            r#"(?s)<div class="n_box_3fn".*?>(.*?)</div>"#,
            r"(?s)var filename = '(.*?)';",
            r#"(?s)div class="b"><span>(.*?)</span></div>"#,
        ],
    );
    patterns
        .iter()
        .find_map(|re| first_capture(re, html))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

pub fn extract_file_size(html: &str) -> String {
    let patterns = regexes(
        &SIZE_RES,
        &[
            r#"(?s)<div class="n_filesize".*?>大小：(.*?)</div>"#,
            r#"(?s)<span class="p7">文件大小：</span>(.*?)<br>"#,
        ],
    );
    patterns
        .iter()
        .find_map(|re| first_capture(re, html))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// 带提取码的分享页参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedParams {
    pub sign: String,
    pub file_id: String,
}

/// 提取码页面：第二个 `'sign':'…'` 才是 down_p() 用的签名
pub fn extract_protected_params(html: &str) -> Result<ProtectedParams, LanzouError> {
    let signs = all_captures(regex(&SIGN_RE, r"'sign':'(.*?)',"), html);
    let file_ids = all_captures(regex(&AJAXM_RE, r"ajaxm\.php\?file=(\d+)"), html);

    match (signs.get(1), file_ids.first()) {
        (Some(sign), Some(file_id)) => Ok(ProtectedParams {
            sign: sign.clone(),
            file_id: file_id.clone(),
        }),
        _ => {
            debug!(
                "❌ 提取码页面参数不全: sign={} 个, ajaxm={} 个",
                signs.len(),
                file_ids.len()
            );
            Err(LanzouError::PageParseError)
        }
    }
}

/// 无提取码页面：下载按钮放在 iframe 里，返回去掉前导 `/` 的路径
pub fn extract_iframe_path(html: &str) -> Result<String, LanzouError> {
    first_capture(
        regex(&IFRAME_RE, r#"<iframe[^>]*name="[\s\S]*?"[\s]+src="/(.*?)""#),
        html,
    )
    .filter(|s| !s.is_empty())
    .ok_or(LanzouError::IframeNotFound)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IframeParams {
    pub wp_sign: String,
    pub ajaxdata: String,
    pub file_id: String,
}

/// iframe 页：wp_sign / ajaxdata，以及第二个 ajaxm.php?file=（第一个在注释里）
pub fn extract_iframe_params(html: &str) -> Result<IframeParams, LanzouError> {
    let wp_sign = first_capture(regex(&WP_SIGN_RE, r"wp_sign = '(.*?)'"), html);
    let ajaxdata = first_capture(regex(&AJAXDATA_RE, r"ajaxdata = '(.*?)'"), html);
    let file_ids = all_captures(regex(&AJAXM_RE, r"ajaxm\.php\?file=(\d+)"), html);

    match (wp_sign, ajaxdata, file_ids.get(1)) {
        (Some(wp_sign), Some(ajaxdata), Some(file_id)) => Ok(IframeParams {
            wp_sign,
            ajaxdata,
            file_id: file_id.clone(),
        }),
        _ => Err(LanzouError::IframeParseError),
    }
}

/// 支持字符串或数字的字段（inf 在无提取码时是 0，有提取码时是文件名）
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<StringOrNumber>::deserialize(deserializer)? {
        Some(StringOrNumber::Str(s)) => s,
        Some(StringOrNumber::Int(n)) => n.to_string(),
        Some(StringOrNumber::Float(n)) => n.to_string(),
        None => String::new(),
    })
}

/// ajaxm.php 的响应
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadInfo {
    #[serde(default)]
    pub zt: i64,
    #[serde(default, deserialize_with = "string_or_number")]
    pub dom: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub url: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub inf: String,
}

impl DownloadInfo {
    pub fn is_ok(&self) -> bool {
        self.zt == 1
    }

    /// `inf` 里带的文件名（数字占位符不算）
    pub fn file_name(&self) -> Option<&str> {
        let inf = self.inf.trim();
        if inf.is_empty() || inf.parse::<f64>().is_ok() {
            None
        } else {
            Some(inf)
        }
    }
}

pub fn parse_download_info(body: &str) -> Result<DownloadInfo, LanzouError> {
    serde_json::from_str(body.trim()).map_err(|e| {
        debug!("❌ 解析 ajax 响应失败: {} (body={})", e, truncate(body, 200));
        LanzouError::DownloadInfoParseError
    })
}

/// 中转页的 acw_sc__v2 挑战参数
pub fn extract_acw_arg(html: &str) -> Option<String> {
    first_capture(regex(&ARG1_RE, r"arg1='(.*?)'"), html).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyParams {
    pub file: String,
    pub sign: String,
}

/// 新版验证页：down_r() 里 ajax data 的 file / sign
pub fn extract_verify_params(html: &str) -> Option<VerifyParams> {
    let file = first_capture(regex(&VERIFY_FILE_RE, r"'file'\s*:\s*'([^']+)'"), html)?;
    let sign = first_capture(regex(&VERIFY_SIGN_RE, r"'sign'\s*:\s*'([^']+)'"), html)?;
    Some(VerifyParams { file, sign })
}

/// 验证页 ajax.php 的响应，成功时返回真实下载地址
pub fn parse_verify_response(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct VerifyResponse {
        #[serde(default)]
        zt: i64,
        #[serde(default, deserialize_with = "string_or_number")]
        url: String,
    }

    let resp: VerifyResponse = serde_json::from_str(body.trim()).ok()?;
    if resp.zt == 1 && !resp.url.is_empty() {
        Some(resp.url)
    } else {
        None
    }
}

/// 文件夹页参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderParams {
    pub name: String,
    pub fid: String,
    pub uid: String,
    pub t: String,
    pub k: String,
}

pub fn extract_folder_params(html: &str) -> Result<FolderParams, LanzouError> {
    let name = first_capture(regex(&TITLE_RE, r"(?s)<title>(.*?)</title>"), html)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let fid = first_capture(regex(&FID_RE, r"filemoreajax\.php\?file=(\d+)"), html);
    let uid = first_capture(regex(&UID_RE, r"'uid'\s*:\s*'(\d+)'"), html);
    let t = extract_ajax_var("t", html);
    let k = extract_ajax_var("k", html);

    match (fid, uid, t, k) {
        (Some(fid), Some(uid), Some(t), Some(k)) => Ok(FolderParams {
            name,
            fid,
            uid,
            t,
            k,
        }),
        (fid, uid, t, k) => {
            debug!(
                "❌ 文件夹参数不全: fid={:?} uid={:?} t={} k={}",
                fid,
                uid,
                t.is_some(),
                k.is_some()
            );
            Err(LanzouError::FolderParseError)
        }
    }
}

/// 文件夹页是否要求输入提取码
pub fn is_folder_password_protected(html: &str) -> bool {
    regex(&FOLDER_PWD_RE, r#"<input[^>]*id="pwd""#).is_match(html)
}

/// 取出 ajax data 里间接引用的变量：`'t':ib3h1e` … `var ib3h1e = '1700000000';`
/// 找不到变量时才退回字面量 `'t':'1700000000'`
fn extract_ajax_var(key: &str, html: &str) -> Option<String> {
    let key = regex::escape(key);

    let reference = Regex::new(&format!(r"'{}'\s*:\s*(\w+)", key)).ok()?;
    if let Some(var_name) = first_capture(&reference, html) {
        let value_re = Regex::new(&format!(
            r"var\s+{}\s*=\s*'([^']*)'",
            regex::escape(&var_name)
        ))
        .ok()?;
        if let Some(value) = first_capture(&value_re, html) {
            return Some(value);
        }
    }

    let literal = Regex::new(&format!(r"'{}'\s*:\s*'([^']*)'", key)).ok()?;
    first_capture(&literal, html)
}

/// filemoreajax.php 的单个条目
#[derive(Debug, Clone, Deserialize)]
pub struct FolderItem {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub name_all: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub size: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub time: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub icon: String,
}

/// filemoreajax.php 的响应
#[derive(Debug, Clone)]
pub struct FolderResponse {
    pub zt: i64,
    pub info: String,
    pub items: Vec<FolderItem>,
}

pub fn parse_folder_response(body: &str) -> Result<FolderResponse, LanzouError> {
    #[derive(Deserialize)]
    struct Raw {
        #[serde(default)]
        zt: i64,
        #[serde(default, deserialize_with = "string_or_number")]
        info: String,
        #[serde(default)]
        text: serde_json::Value,
    }

    let raw: Raw = serde_json::from_str(body.trim()).map_err(|e| {
        debug!("❌ 解析文件夹响应失败: {} (body={})", e, truncate(body, 200));
        LanzouError::FolderListParseError
    })?;

    // text 在没有数据时是字符串或 null
    let items: Vec<FolderItem> = match raw.text {
        serde_json::Value::Array(_) => serde_json::from_value(raw.text).map_err(|e| {
            debug!("❌ 文件夹条目格式异常: {}", e);
            LanzouError::FolderListParseError
        })?,
        _ => Vec::new(),
    };

    Ok(FolderResponse {
        zt: raw.zt,
        info: raw.info,
        items,
    })
}

/// 截断日志中的长文本（按字符边界）
pub fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN_PAGE: &str = r#"
<html><head><title>Example.rar - 蓝奏云</title></head><body>
<div class="n_box_3fn" id="filenajax">Example.rar</div>
<div class="n_filesize">大小：12.3 M</div>
<iframe class="ifr2" name="1700000000" src="/fn?AGZVbQ4_bUTQBMQVrAjJRYlA" frameborder="0" scrolling="no"></iframe>
</body></html>"#;

    const PROTECTED_PAGE: &str = r#"
<div class="n_filesize">大小：1.0 M</div>
<script>
function down_p(){
    var pwd = document.getElementById('pwd').value;
    $.ajax({
        type : 'post',
        url : '/ajaxm.php?file=998877',
        //data : { 'action':'downprocess','sign':'OLD_SIGN','p':pwd,},
        data : { 'action':'downprocess','sign':'REAL_SIGN','p':pwd,'kd':1 },
        dataType : 'json',
    });
}
</script>"#;

    const IFRAME_PAGE: &str = r#"
<script>
var wp_sign = 'WPSIGN123';
var ajaxdata = '?ctdf';
//url : '/ajaxm.php?file=111',
$.ajax({ type : 'post', url : '/ajaxm.php?file=222',
  data : { 'action':'downprocess','websignkey':ajaxdata,'signs':ajaxdata,'sign':wp_sign,'websign':'','kd':1,'ves':1 },
});
</script>"#;

    const FOLDER_PAGE: &str = r#"
<html><head><title>测试文件夹</title></head><body>
<input type="text" name="pwd" id="pwd" placeholder="输入密码">
<script>
var ib3h1e = '1700000000';
var _h8kx2 = 'abcdef0123456789';
$.ajax({
    url : '/filemoreajax.php?file=7654321',
    data : { 'lx':2, 'fid':7654321, 'uid':'1234567', 'pg':pgs, 'rep':'0', 't':ib3h1e, 'k':_h8kx2, 'up':1, 'ls':1, 'pwd':pwd },
});
</script>
</body></html>"#;

    #[test]
    fn test_cancelled_banner() {
        assert!(matches!(
            check_cancelled("<div>来晚啦...文件取消分享了</div>"),
            Err(LanzouError::SharingCancelled)
        ));
        assert!(matches!(
            check_cancelled("<p>File Sharing Cancelled</p>"),
            Err(LanzouError::SharingCancelled)
        ));
        assert!(check_cancelled(OPEN_PAGE).is_ok());
    }

    #[test]
    fn test_name_and_size() {
        assert_eq!(extract_file_name(OPEN_PAGE), "Example.rar");
        assert_eq!(extract_file_size(OPEN_PAGE), "12.3 M");
        assert_eq!(extract_file_name("var filename = 'a.zip';"), "a.zip");
        assert_eq!(
            extract_file_size(r#"<span class="p7">文件大小：</span>3 K<br>"#),
            "3 K"
        );
        assert_eq!(extract_file_name("<html></html>"), "");
    }

    #[test]
    fn test_protected_params() {
        assert!(is_password_protected(PROTECTED_PAGE));
        assert!(!is_password_protected(OPEN_PAGE));

        let params = extract_protected_params(PROTECTED_PAGE).unwrap();
        assert_eq!(params.sign, "REAL_SIGN");
        assert_eq!(params.file_id, "998877");

        let broken = PROTECTED_PAGE.replace("'sign':'OLD_SIGN',", "");
        assert!(matches!(
            extract_protected_params(&broken),
            Err(LanzouError::PageParseError)
        ));
    }

    #[test]
    fn test_iframe_path_and_params() {
        assert_eq!(extract_iframe_path(OPEN_PAGE).unwrap(), "fn?AGZVbQ4_bUTQBMQVrAjJRYlA");
        assert!(matches!(
            extract_iframe_path("<div>no frame</div>"),
            Err(LanzouError::IframeNotFound)
        ));

        let params = extract_iframe_params(IFRAME_PAGE).unwrap();
        assert_eq!(params.wp_sign, "WPSIGN123");
        assert_eq!(params.ajaxdata, "?ctdf");
        assert_eq!(params.file_id, "222");

        let only_one_ajaxm = IFRAME_PAGE.replace("//url : '/ajaxm.php?file=111',", "");
        assert!(matches!(
            extract_iframe_params(&only_one_ajaxm),
            Err(LanzouError::IframeParseError)
        ));
    }

    #[test]
    fn test_download_info() {
        let info = parse_download_info(
            r#"{"zt":1,"dom":"https:\/\/developer.lanzoug.com","url":"?BmAAPw","inf":0}"#,
        )
        .unwrap();
        assert!(info.is_ok());
        assert_eq!(info.dom, "https://developer.lanzoug.com");
        assert_eq!(info.url, "?BmAAPw");
        assert_eq!(info.file_name(), None);

        let info = parse_download_info(r#"{"zt":1,"dom":"d","url":"u","inf":"Secret.apk"}"#).unwrap();
        assert_eq!(info.file_name(), Some("Secret.apk"));

        let rejected = parse_download_info(r#"{"zt":0,"inf":"密码不正确"}"#).unwrap();
        assert!(!rejected.is_ok());

        assert!(matches!(
            parse_download_info("<html>502</html>"),
            Err(LanzouError::DownloadInfoParseError)
        ));
    }

    #[test]
    fn test_intermediate_page_tokens() {
        assert_eq!(
            extract_acw_arg("<script>var arg1='ABCDEF0123';</script>").as_deref(),
            Some("ABCDEF0123")
        );
        assert_eq!(extract_acw_arg("<html></html>"), None);

        let verify = extract_verify_params(
            "function down_r(){ $.ajax({ data : { 'file' : 'F123', 'el' : 2, 'sign' : 'S456' } }); }",
        )
        .unwrap();
        assert_eq!(verify.file, "F123");
        assert_eq!(verify.sign, "S456");

        assert_eq!(
            parse_verify_response(r#"{"zt":1,"url":"https://x.example/a.rar?st=1"}"#).as_deref(),
            Some("https://x.example/a.rar?st=1")
        );
        assert_eq!(parse_verify_response(r#"{"zt":0,"url":""}"#), None);
    }

    #[test]
    fn test_folder_params() {
        let params = extract_folder_params(FOLDER_PAGE).unwrap();
        assert_eq!(params.name, "测试文件夹");
        assert_eq!(params.fid, "7654321");
        assert_eq!(params.uid, "1234567");
        assert_eq!(params.t, "1700000000");
        assert_eq!(params.k, "abcdef0123456789");
        assert!(is_folder_password_protected(FOLDER_PAGE));

        let literal = FOLDER_PAGE
            .replace("'t':ib3h1e", "'t':'42'")
            .replace(r#"<input type="text" name="pwd" id="pwd" placeholder="输入密码">"#, "");
        let params = extract_folder_params(&literal).unwrap();
        assert_eq!(params.t, "42");
        assert!(!is_folder_password_protected(&literal));

        let commented = FOLDER_PAGE.replace(
            "$.ajax({",
            "//data : { 'lx':2, 't':'1600000000', 'k':'stale' },\n$.ajax({",
        );
        let params = extract_folder_params(&commented).unwrap();
        assert_eq!(params.t, "1700000000");
        assert_eq!(params.k, "abcdef0123456789");

        let missing_k = FOLDER_PAGE.replace("var _h8kx2 = 'abcdef0123456789';", "");
        assert!(matches!(
            extract_folder_params(&missing_k),
            Err(LanzouError::FolderParseError)
        ));
    }

    #[test]
    fn test_folder_response() {
        let resp = parse_folder_response(
            r#"{"zt":1,"info":"sucess","text":[
                {"icon":"rar","t":0,"id":"iAbc123x","name_all":"a.rar","size":"1.2 M","time":"2024-01-01","duan":"x"},
                {"icon":"","id":"-1","name_all":"","size":"","time":""}
            ]}"#,
        )
        .unwrap();
        assert_eq!(resp.zt, 1);
        assert_eq!(resp.items.len(), 2);
        assert_eq!(resp.items[0].name_all, "a.rar");

        let empty = parse_folder_response(r#"{"zt":2,"info":"没有了","text":null}"#).unwrap();
        assert_eq!(empty.zt, 2);
        assert!(empty.items.is_empty());

        assert!(matches!(
            parse_folder_response("not json"),
            Err(LanzouError::FolderListParseError)
        ));
    }

    #[test]
    fn test_truncate_char_boundary() {
        assert_eq!(truncate("蓝奏云盘", 2), "蓝奏");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
