//! 作品页内嵌脚本变量（`__LZ_PRODUCT__` 等）的提取与解析。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::base_system::json_extract::{
    collect_maps, find_in, pick_bool, pick_i64, pick_string, pick_u64,
};
use crate::download::models::{ComicInfo, Episode};

pub const PRODUCT_VAR: &str = "__LZ_PRODUCT__";

fn re_token() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r#"(?s)\btoken\s*:\s*['"]([A-Za-z0-9._\-]+)['"]"#).expect("compile RE_TOKEN")
    })
}

fn re_user_id() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r#"(?s)\buserId\s*:\s*['"]?(\d+)"#).expect("compile RE_USER_ID")
    })
}

/// 取出 `name = {...}` 中的对象字面量（按括号配对，忽略字符串内的括号）。
pub fn extract_js_object<'a>(html: &'a str, name: &str) -> Option<&'a str> {
    let var_pos = html.find(name)?;
    let rest = &html[var_pos + name.len()..];
    let open = rest.find('{')?;
    // 变量名与 '{' 之间只允许出现赋值符号和空白
    if !rest[..open].chars().all(|c| c == '=' || c.is_whitespace()) {
        return None;
    }
    let body = &rest[open..];

    let mut depth = 0usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in body.char_indices() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => in_string = Some(ch),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[..=idx]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn extract_session_parts(html: &str) -> Option<(String, u64)> {
    let token = re_token().captures(html)?.get(1)?.as_str().to_string();
    let user_id = re_user_id()
        .captures(html)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .unwrap_or(0);
    Some((token, user_id))
}

/// 解析作品信息。`now_ms` 用于判断限免是否已生效。
pub fn parse_comic_info(raw: &Value, alias: &str, now_ms: i64) -> Result<ComicInfo, String> {
    let product = raw.get("product").unwrap_or(raw);
    let maps = collect_maps(product);

    let id = find_in(&maps, |m| pick_u64(m, &["id", "contentId"]))
        .ok_or_else(|| "作品信息缺少 id".to_string())?;
    let title = find_in(&maps, |m| pick_string(m, &["title", "displayName"]))
        .unwrap_or_else(|| alias.to_string());
    let alias = find_in(&maps, |m| pick_string(m, &["alias"])).unwrap_or_else(|| alias.to_string());
    let expired = find_in(&maps, |m| pick_bool(m, &["expired", "isExpired"])).unwrap_or(false)
        || find_in(&maps, |m| pick_string(m, &["state"]))
            .map(|s| matches!(s.as_str(), "expired" | "library"))
            .unwrap_or(false);
    let updated_at = find_in(&maps, |m| pick_i64(m, &["updatedAt", "updated_at"])).unwrap_or(0);

    let list = raw
        .get("all")
        .or_else(|| product.get("episodes"))
        .and_then(Value::as_array)
        .ok_or_else(|| "作品信息缺少单话列表".to_string())?;

    let mut episodes: Vec<Episode> = list
        .iter()
        .enumerate()
        .filter_map(|(idx, v)| parse_episode(v, idx, now_ms))
        .collect();
    episodes.sort_by_key(|e| e.seq);

    Ok(ComicInfo {
        id,
        alias,
        title,
        expired,
        updated_at,
        episodes,
    })
}

fn parse_episode(raw: &Value, idx: usize, now_ms: i64) -> Option<Episode> {
    let maps = collect_maps(raw);
    let id = find_in(&maps, |m| pick_u64(m, &["id"]))?;
    let name = find_in(&maps, |m| pick_string(m, &["name"])).unwrap_or_else(|| id.to_string());
    let title = find_in(&maps, |m| pick_string(m, &["title", "displayName"]))
        .unwrap_or_else(|| name.clone());
    let seq = find_in(&maps, |m| pick_u64(m, &["seq"]))
        .map(|s| s as u32)
        .unwrap_or(idx as u32 + 1);
    let freed = find_in(&maps, |m| pick_i64(m, &["freedAt"]))
        .map(|at| at <= now_ms)
        .unwrap_or(false);
    let free = freed || find_in(&maps, |m| pick_bool(m, &["isFree", "free"])).unwrap_or(false);

    Some(Episode {
        id,
        name,
        title,
        seq,
        free,
    })
}
