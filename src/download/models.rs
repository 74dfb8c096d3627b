//! 下载相关的数据模型定义。
//!
//! 包含语言区域、图片格式、执行模式、作品/单话元数据、账号会话与下载统计。

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Locale {
    #[default]
    Korean,
    English,
    Japanese,
}

impl Locale {
    pub fn as_tag(&self) -> &'static str {
        match self {
            Locale::Korean => "ko-KR",
            Locale::English => "en-US",
            Locale::Japanese => "ja-JP",
        }
    }

    /// 站点路径中使用的语言段，如 `/ko/comic/...`。
    pub fn path_segment(&self) -> &'static str {
        match self {
            Locale::Korean => "ko",
            Locale::English => "en",
            Locale::Japanese => "ja",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ko-kr" | "ko" | "kr" => Ok(Locale::Korean),
            "en-us" | "en" | "us" => Ok(Locale::English),
            "ja-jp" | "ja" | "jp" => Ok(Locale::Japanese),
            other => Err(format!("不支持的语言区域: {other}")),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageFormat {
    #[default]
    Webp,
    Jpg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Webp => "webp",
            ImageFormat::Jpg => "jpg",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(ImageFormat::Webp),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpg),
            other => Err(format!("不支持的图片格式: {other}")),
        }
    }
}

/// 单话内图片的执行方式：逐张顺序下载，或提交到共享线程池。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Concurrent { workers: usize },
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Some(password.into()),
        }
    }

    /// 登录后抹掉密码，只保留账号用于日志。
    pub fn redacted(&self) -> Self {
        Self {
            username: self.username.clone(),
            password: None,
        }
    }

    #[cfg(test)]
    pub fn is_redacted(&self) -> bool {
        self.password.is_none()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub user_id: u64,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"***")
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub id: u64,
    /// 站点内部的单话名（页面路径、张数映射表都以它为键）。
    pub name: String,
    pub title: String,
    pub seq: u32,
    pub free: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicInfo {
    pub id: u64,
    pub alias: String,
    pub title: String,
    /// 作品整体处于过期/仅书架可见状态时，免费话不可再下载。
    pub expired: bool,
    pub updated_at: i64,
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Purchases {
    pub episode_ids: HashSet<u64>,
}

impl Purchases {
    pub fn contains(&self, episode_id: u64) -> bool {
        self.episode_ids.contains(&episode_id)
    }
}

/// 图片地址模板，占位符形如 `{comic_id}`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUrlTemplate {
    pub template: String,
    pub cdn: String,
}

pub struct ImageUrlParams<'a> {
    pub comic_id: u64,
    pub episode_id: u64,
    pub index: u32,
    pub format: ImageFormat,
    pub purchased: bool,
    pub updated: i64,
    pub policy: &'a str,
    pub signature: &'a str,
    pub key_pair_id: &'a str,
}

impl ImageUrlTemplate {
    pub fn render(&self, p: &ImageUrlParams<'_>) -> String {
        let cdn = self.cdn.trim_end_matches('/');
        [
            ("{cdn}", cdn.to_string()),
            ("{comic_id}", p.comic_id.to_string()),
            ("{episode_id}", p.episode_id.to_string()),
            ("{index}", p.index.to_string()),
            ("{format}", p.format.extension().to_string()),
            ("{purchased}", p.purchased.to_string()),
            ("{updated}", p.updated.to_string()),
            ("{policy}", p.policy.to_string()),
            ("{signature}", p.signature.to_string()),
            ("{key_pair_id}", p.key_pair_id.to_string()),
        ]
        .iter()
        .fold(self.template.clone(), |url, (key, value)| {
            url.replace(*key, value)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub format: ImageFormat,
    pub mode: ExecutionMode,
    pub save_root: PathBuf,
    pub url_template: ImageUrlTemplate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub episodes_downloaded: usize,
    pub episodes_skipped: usize,
    pub images_saved: usize,
    pub images_failed: usize,
}

impl DownloadReport {
    pub fn absorb(&mut self, episode: &EpisodeOutcome) {
        match episode {
            EpisodeOutcome::Skipped(_) => self.episodes_skipped += 1,
            EpisodeOutcome::Downloaded { saved, failed } => {
                self.episodes_downloaded += 1;
                self.images_saved += saved;
                self.images_failed += failed;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotPurchased,
    NoImages,
    ImageCountUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeOutcome {
    Skipped(SkipReason),
    Downloaded { saved: usize, failed: usize },
}
