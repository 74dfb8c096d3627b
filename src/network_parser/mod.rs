//! 站点交互层。
//!
//! - `ComicSource`：下载流程依赖的全部网络操作（登录、作品信息、已购、张数、阅读页、凭证、图片）
//! - `web`       — 基于 reqwest 的实现
//! - `product`   — 页面内嵌 JSON 的提取与解析

pub mod product;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashMap;

use thiserror::Error;

use crate::download::authority::SignedPolicy;
use crate::download::models::{ComicInfo, Credentials, Episode, Locale, Purchases, Session};

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} 返回状态码 {status}")]
    Status { url: String, status: u16 },
    #[error("登录失败: {0}")]
    Login(String),
    #[error("响应解析失败: {0}")]
    Parse(String),
}

pub trait ComicSource: Send + Sync {
    fn login(&self, locale: Locale, credentials: &Credentials) -> Result<Session, NetworkError>;

    fn fetch_comic(
        &self,
        locale: Locale,
        session: &Session,
        alias: &str,
    ) -> Result<ComicInfo, NetworkError>;

    fn fetch_purchases(
        &self,
        session: &Session,
        comic: &ComicInfo,
    ) -> Result<Purchases, NetworkError>;

    /// 整部作品的 单话名→张数 映射（服务接口可能缺最新几话）。
    fn fetch_image_counts(
        &self,
        session: &Session,
        comic: &ComicInfo,
    ) -> Result<HashMap<String, u32>, NetworkError>;

    /// 阅读页 HTML；`library` 为 true 时走书架路径（作品已过期）。
    fn fetch_episode_page(
        &self,
        locale: Locale,
        session: &Session,
        comic: &ComicInfo,
        episode: &Episode,
        library: bool,
    ) -> Result<String, NetworkError>;

    fn issue_authority(
        &self,
        session: &Session,
        comic: &ComicInfo,
        episode: &Episode,
        purchased: bool,
    ) -> Result<SignedPolicy, NetworkError>;

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, NetworkError>;
}
