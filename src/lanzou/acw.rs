//! 中转页 acw_sc__v2 Cookie 计算
//!
//! 中转页有时先返回一段混淆脚本：`var arg1='…'`，浏览器按固定顺序重排 arg1，
//! 再与固定掩码逐字节异或，结果写入 Cookie `acw_sc__v2` 后刷新页面。

pub const COOKIE_NAME: &str = "acw_sc__v2";

const POS_LIST: [usize; 40] = [
    15, 35, 29, 24, 33, 16, 1, 38, 10, 9, 19, 31, 40, 27, 22, 23, 25, 13, 6, 11, 39, 18, 20, 8,
    14, 21, 32, 26, 2, 30, 7, 4, 17, 5, 3, 28, 34, 37, 12, 36,
];

const MASK: &str = "3000176000856006061501533003690027800375";

/// 根据 arg1 计算 acw_sc__v2；arg1 不是十六进制串时返回 None
pub fn solve(arg1: &str) -> Option<String> {
    if !arg1.is_ascii() {
        return None;
    }
    let arg1 = arg1.as_bytes();

    let reordered: Vec<u8> = POS_LIST
        .iter()
        .filter_map(|pos| arg1.get(pos - 1).copied())
        .collect();

    let mask = MASK.as_bytes();
    let len = reordered.len().min(mask.len());

    let mut out = String::with_capacity(len);
    for i in (0..len).step_by(2) {
        let end = (i + 2).min(len);
        let left = u8::from_str_radix(std::str::from_utf8(&reordered[i..end]).ok()?, 16).ok()?;
        let right = u8::from_str_radix(std::str::from_utf8(&mask[i..(i + 2).min(mask.len())]).ok()?, 16).ok()?;
        out.push_str(&format!("{:02x}", left ^ right));
    }
    Some(out)
}
