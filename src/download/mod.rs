//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`       — 数据模型（Locale / ComicInfo / DownloadOptions / DownloadReport 等）
//! - `range`        — 单话范围表达式解析与展开
//! - `authority`    — 图片访问凭证解码与过期判断
//! - `image_count`  — 单话图片张数解析（服务接口 / 页面统计）
//! - `progress`     — 单话进度计数与 CLI 进度条
//! - `engine`       — 下载主流程

pub mod authority;
pub mod engine;
pub mod image_count;
pub mod models;
pub(crate) mod progress;
pub mod range;
