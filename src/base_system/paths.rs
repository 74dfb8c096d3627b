use std::path::{Path, PathBuf};

use crate::download::models::Episode;

pub fn comic_folder_name(alias: &str, title: Option<&str>) -> String {
    let safe_title = safe_fs_name(title.unwrap_or(alias), "_", 120);
    if title.is_none() {
        return safe_title;
    }
    format!("{}_{}", safe_fs_name(alias, "_", 60), safe_title)
}

/// 单话目录：`<序号三位>_<标题>`，保证按文件名排序即为阅读顺序。
pub fn episode_folder_path(comic_dir: &Path, episode: &Episode) -> PathBuf {
    let title = if episode.title.trim().is_empty() {
        episode.name.as_str()
    } else {
        episode.title.as_str()
    };
    comic_dir.join(format!(
        "{:03}_{}",
        episode.seq,
        safe_fs_name(title, "_", 120)
    ))
}

pub fn safe_fs_name(name: &str, replacement: &str, max_len: usize) -> String {
    let fallback = replacement.chars().next().unwrap_or('_');
    let mut cleaned: String = name
        .chars()
        .map(|ch| match ch {
            ':' | '"' | '<' | '>' | '/' | '\\' | '|' | '?' | '*' => fallback,
            c if (c as u32) < 32 => fallback,
            _ => ch,
        })
        .collect();

    let trimmed_len = cleaned.trim_end_matches([' ', '.']).len();
    cleaned.truncate(trimmed_len);

    if cleaned.is_empty() {
        cleaned.push_str("unnamed");
    }

    const RESERVED: [&str; 22] = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    if RESERVED.contains(&cleaned.to_uppercase().as_str()) {
        cleaned = format!("_{}", cleaned);
    }

    if cleaned.len() > max_len {
        // 避免在多字节 UTF-8 字符（如韩文）中间截断导致 panic
        let mut end = max_len;
        while end > 0 && !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned.truncate(end);
        let trimmed_len = cleaned.trim_end_matches([' ', '.']).len();
        cleaned.truncate(trimmed_len);
        if cleaned.is_empty() {
            cleaned.push_str("unnamed");
        }
    }

    cleaned
}
