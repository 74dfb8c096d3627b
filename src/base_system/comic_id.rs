//! 作品标识（alias）/链接解析与规范化。

use regex::Regex;
use std::sync::OnceLock;

static RE_URL: OnceLock<Regex> = OnceLock::new();
static RE_ALIAS: OnceLock<Regex> = OnceLock::new();
static RE_COMIC_PATH: OnceLock<Regex> = OnceLock::new();

fn re_url() -> &'static Regex {
    RE_URL.get_or_init(|| Regex::new(r"https?://\S+").expect("compile RE_URL"))
}

fn re_alias() -> &'static Regex {
    RE_ALIAS.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("compile RE_ALIAS"))
}

fn re_comic_path() -> &'static Regex {
    RE_COMIC_PATH
        .get_or_init(|| Regex::new(r"/comic/([A-Za-z0-9_\-]+)").expect("compile RE_COMIC_PATH"))
}

/// 接受纯 alias，或含 `/comic/<alias>` 的作品/单话链接。
pub fn parse_comic_alias(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if re_alias().is_match(trimmed) {
        return Some(trimmed.to_string());
    }

    // 用户可能粘贴了带前后文字的链接，先提取 URL。
    let target = re_url()
        .find(trimmed)
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    re_comic_path()
        .captures(target)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
