//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};
use crate::download::models::{
    DownloadOptions, ExecutionMode, ImageFormat, ImageUrlTemplate, Locale,
};

pub const ENV_USERNAME: &str = "COMIC_DL_USERNAME";
pub const ENV_PASSWORD: &str = "COMIC_DL_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 账号配置
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,

    // 保存配置
    #[serde(default)]
    pub save_path: String,
    #[serde(default = "default_image_format")]
    pub image_format: String,

    // 下载配置
    #[serde(default = "default_false")]
    pub concurrent: bool,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    // 站点配置
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_cdn_url")]
    pub cdn_url: String,
    #[serde(default = "default_image_url_template")]
    pub image_url_template: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            username: String::new(),
            password: String::new(),
            save_path: String::new(),
            image_format: default_image_format(),
            concurrent: default_false(),
            max_workers: default_max_workers(),
            request_timeout: default_request_timeout(),
            base_url: default_base_url(),
            cdn_url: default_cdn_url(),
            image_url_template: default_image_url_template(),
            user_agent: default_user_agent(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 12] = [
            FieldMeta {
                name: "locale",
                description: "站点语言区域, 可选: [ko-KR, en-US, ja-JP]",
            },
            FieldMeta {
                name: "username",
                description: "登录账号（也可通过环境变量 COMIC_DL_USERNAME 提供）",
            },
            FieldMeta {
                name: "password",
                description: "登录密码（也可通过环境变量 COMIC_DL_PASSWORD 提供）",
            },
            FieldMeta {
                name: "save_path",
                description: "保存路径（留空为当前目录）",
            },
            FieldMeta {
                name: "image_format",
                description: "图片格式, 可选: [webp, jpg]",
            },
            FieldMeta {
                name: "concurrent",
                description: "是否在单话内并发下载图片",
            },
            FieldMeta {
                name: "max_workers",
                description: "并发下载线程数",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒）",
            },
            FieldMeta {
                name: "base_url",
                description: "站点地址",
            },
            FieldMeta {
                name: "cdn_url",
                description: "图片 CDN 地址",
            },
            FieldMeta {
                name: "image_url_template",
                description: "图片地址模板，可用占位符: {cdn} {comic_id} {episode_id} {index} {format} {purchased} {updated} {policy} {signature} {key_pair_id}",
            },
            FieldMeta {
                name: "user_agent",
                description: "请求使用的 User-Agent",
            },
        ];
        &FIELDS
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var(ENV_USERNAME)
            && !v.trim().is_empty()
        {
            self.username = v.trim().to_string();
        }
        if let Ok(v) = std::env::var(ENV_PASSWORD)
            && !v.is_empty()
        {
            self.password = v;
        }
    }

    fn validate(&self) -> Result<(), String> {
        self.locale.parse::<Locale>()?;
        self.image_format.parse::<ImageFormat>()?;
        if self.max_workers == 0 {
            return Err("max_workers 必须大于 0".to_string());
        }
        if self.request_timeout == 0 {
            return Err("request_timeout 必须大于 0".to_string());
        }
        Ok(())
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        } else {
            PathBuf::from(&self.save_path)
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale.parse().unwrap_or_default()
    }

    pub fn image_format(&self) -> ImageFormat {
        self.image_format.parse().unwrap_or_default()
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        if self.concurrent {
            ExecutionMode::Concurrent {
                workers: self.max_workers.max(1),
            }
        } else {
            ExecutionMode::Sequential
        }
    }

    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            format: self.image_format(),
            mode: self.execution_mode(),
            save_root: self.default_save_dir(),
            url_template: ImageUrlTemplate {
                template: self.image_url_template.clone(),
                cdn: self.cdn_url.clone(),
            },
        }
    }
}

fn default_false() -> bool {
    false
}

fn default_locale() -> String {
    Locale::default().as_tag().to_string()
}

fn default_image_format() -> String {
    ImageFormat::default().extension().to_string()
}

fn default_max_workers() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    15
}

fn default_base_url() -> String {
    "https://www.lezhin.com".to_string()
}

fn default_cdn_url() -> String {
    "https://rcdn.lezhin.com".to_string()
}

fn default_image_url_template() -> String {
    "{cdn}/v2/comics/{comic_id}/episodes/{episode_id}/contents/scrolls/{index}.{format}?purchased={purchased}&q=30&updated={updated}&Policy={policy}&Signature={signature}&Key-Pair-Id={key_pair_id}".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36".to_string()
}
