//! 单话图片张数解析。
//!
//! 两种策略：
//! - `ServiceLookup`：首次使用时一次性拉取整部作品的 单话名→张数 映射并缓存；
//! - `PageScrape`：逐话加载阅读页，统计图片切片元素（不含首尾的 top/bottom 版权/封面切片）。
//!
//! 服务接口不认识的话（通常是刚更新的）只对该话回退到页面统计一次。

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use super::models::{ComicInfo, Episode, Locale, Session};
use crate::network_parser::{ComicSource, NetworkError};

#[derive(Debug, Error)]
pub enum ImageCountError {
    #[error("未找到单话 {episode} 的图片张数")]
    NotFound { episode: String },
    #[error(transparent)]
    Source(#[from] NetworkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCountStrategy {
    ServiceLookup,
    PageScrape,
}

impl ImageCountStrategy {
    pub fn for_locale(locale: Locale) -> Self {
        match locale {
            Locale::Korean => ImageCountStrategy::ServiceLookup,
            Locale::English | Locale::Japanese => ImageCountStrategy::PageScrape,
        }
    }
}

pub struct ImageCountResolver<'a> {
    source: &'a dyn ComicSource,
    session: &'a Session,
    comic: &'a ComicInfo,
    locale: Locale,
    primary: ImageCountStrategy,
    service_counts: Option<HashMap<String, u32>>,
}

impl<'a> ImageCountResolver<'a> {
    pub fn new(
        source: &'a dyn ComicSource,
        session: &'a Session,
        comic: &'a ComicInfo,
        locale: Locale,
    ) -> Self {
        Self {
            source,
            session,
            comic,
            locale,
            primary: ImageCountStrategy::for_locale(locale),
            service_counts: None,
        }
    }

    /// 先走默认策略；服务接口缺该话或请求失败时，再对这一话做一次页面统计。
    pub fn resolve(&mut self, episode: &Episode) -> Result<u32, ImageCountError> {
        let result = self.count_with(self.primary, episode);
        if self.primary != ImageCountStrategy::ServiceLookup {
            return result;
        }
        match result {
            Err(ImageCountError::NotFound { .. }) => {
                warn!(
                    target: "download",
                    episode = %episode.name,
                    "服务接口未收录该话张数，回退到页面统计"
                );
                self.count_with(ImageCountStrategy::PageScrape, episode)
            }
            Err(ImageCountError::Source(e)) => {
                warn!(
                    target: "download",
                    episode = %episode.name,
                    error = %e,
                    "张数服务请求失败，回退到页面统计"
                );
                self.count_with(ImageCountStrategy::PageScrape, episode)
            }
            ok => ok,
        }
    }

    pub fn count_with(
        &mut self,
        strategy: ImageCountStrategy,
        episode: &Episode,
    ) -> Result<u32, ImageCountError> {
        match strategy {
            ImageCountStrategy::ServiceLookup => self.lookup_service(episode),
            ImageCountStrategy::PageScrape => self.scrape_page(episode),
        }
    }

    fn lookup_service(&mut self, episode: &Episode) -> Result<u32, ImageCountError> {
        if self.service_counts.is_none() {
            let counts = self.source.fetch_image_counts(self.session, self.comic)?;
            debug!(target: "download", entries = counts.len(), "已缓存作品张数映射");
            self.service_counts = Some(counts);
        }
        self.service_counts
            .as_ref()
            .and_then(|m| m.get(&episode.name).copied())
            .ok_or_else(|| ImageCountError::NotFound {
                episode: episode.name.clone(),
            })
    }

    fn scrape_page(&self, episode: &Episode) -> Result<u32, ImageCountError> {
        let html = self.source.fetch_episode_page(
            self.locale,
            self.session,
            self.comic,
            episode,
            self.comic.expired,
        )?;
        let count = count_cuts(&html);
        debug!(target: "download", episode = %episode.name, count, "页面统计张数");
        Ok(count)
    }
}

fn re_tag() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?is)<[a-z][a-z0-9]*\b[^>]*>").expect("compile RE_TAG"))
}

fn re_class() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r#"(?is)\bclass\s*=\s*["']([^"']*)["']"#).expect("compile RE_CLASS")
    })
}

fn re_cut_type() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r#"(?is)\bdata-cut-type\s*=\s*["']([^"']*)["']"#).expect("compile RE_CUT_TYPE")
    })
}

/// 统计阅读页中的图片切片数量。首个 `top` 与末尾 `bottom` 切片是版权页/封面，不计入。
pub fn count_cuts(html: &str) -> u32 {
    let cut_types: Vec<String> = re_tag()
        .find_iter(html)
        .filter_map(|tag| {
            let tag = tag.as_str();
            let class = re_class().captures(tag)?.get(1)?.as_str();
            if !class.split_whitespace().any(|c| c == "cut") {
                return None;
            }
            let kind = re_cut_type()
                .captures(tag)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_ascii_lowercase())
                .unwrap_or_default();
            Some(kind)
        })
        .collect();

    let mut slice = cut_types.as_slice();
    if let Some((first, rest)) = slice.split_first()
        && first == "top"
    {
        slice = rest;
    }
    if let Some((last, rest)) = slice.split_last()
        && last == "bottom"
    {
        slice = rest;
    }
    slice.len() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network_parser::testing::FakeSource;

    fn episode(name: &str) -> Episode {
        Episode {
            id: 1,
            name: name.to_string(),
            title: name.to_string(),
            seq: 1,
            free: true,
        }
    }

    #[test]
    fn strategy_follows_locale() {
        assert_eq!(
            ImageCountStrategy::for_locale(Locale::Korean),
            ImageCountStrategy::ServiceLookup
        );
        assert_eq!(
            ImageCountStrategy::for_locale(Locale::English),
            ImageCountStrategy::PageScrape
        );
    }

    #[test]
    fn counts_cuts_excluding_license_and_cover() {
        let html = r#"
            <div class="cut" data-cut-type="top"><img src="license.png"></div>
            <div class="cut" data-cut-type="cut"><img src="1.webp"></div>
            <div class="cut lazy" data-cut-type="cut"><img src="2.webp"></div>
            <div class="cut-wrapper"></div>
            <div data-cut-type="cut" class='cut'></div>
            <div class="cut" data-cut-type="bottom"></div>
        "#;
        assert_eq!(count_cuts(html), 3);
    }

    #[test]
    fn top_and_bottom_only_excluded_at_edges() {
        let html = r#"
            <div class="cut" data-cut-type="cut"></div>
            <div class="cut" data-cut-type="top"></div>
            <div class="cut" data-cut-type="bottom"></div>
            <div class="cut" data-cut-type="cut"></div>
        "#;
        assert_eq!(count_cuts(html), 4);
        assert_eq!(count_cuts("<html><body></body></html>"), 0);
    }

    #[test]
    fn service_map_is_fetched_once_per_run() {
        let source = FakeSource::default().with_counts(&[("e1", 5), ("e2", 7)]);
        let comic = source.comic.clone();
        let session = source.session();
        let mut resolver = ImageCountResolver::new(&source, &session, &comic, Locale::Korean);

        assert_eq!(resolver.resolve(&episode("e1")).unwrap(), 5);
        assert_eq!(resolver.resolve(&episode("e2")).unwrap(), 7);
        assert_eq!(source.calls.image_counts(), 1);
        assert_eq!(source.calls.pages(), 0);
    }

    #[test]
    fn missing_service_entry_falls_back_for_that_episode_only() {
        let source = FakeSource::default()
            .with_counts(&[("e1", 5), ("e3", 2)])
            .with_page("e2", 4);
        let comic = source.comic.clone();
        let session = source.session();
        let mut resolver = ImageCountResolver::new(&source, &session, &comic, Locale::Korean);

        assert_eq!(resolver.resolve(&episode("e1")).unwrap(), 5);
        assert_eq!(resolver.resolve(&episode("e2")).unwrap(), 4);
        assert_eq!(resolver.resolve(&episode("e3")).unwrap(), 2);

        assert_eq!(source.calls.pages_for("e2"), 1);
        assert_eq!(source.calls.pages_for("e1"), 0);
        assert_eq!(source.calls.pages_for("e3"), 0);
        assert_eq!(source.calls.image_counts(), 1);
    }

    #[test]
    fn failed_service_request_falls_back_to_page() {
        let source = FakeSource::default()
            .with_counts(&[("e1", 5)])
            .with_failing_counts()
            .with_page("e1", 3);
        let comic = source.comic.clone();
        let session = source.session();
        let mut resolver = ImageCountResolver::new(&source, &session, &comic, Locale::Korean);

        assert_eq!(resolver.resolve(&episode("e1")).unwrap(), 3);
        assert_eq!(source.calls.image_counts(), 1);
        assert_eq!(source.calls.pages_for("e1"), 1);
    }

    #[test]
    fn expired_comic_scrapes_the_library_page() {
        let mut source = FakeSource::default().with_page("e2", 2);
        source.comic.expired = true;
        let comic = source.comic.clone();
        let session = source.session();
        let mut resolver = ImageCountResolver::new(&source, &session, &comic, Locale::English);

        assert_eq!(resolver.resolve(&episode("e2")).unwrap(), 2);
        assert_eq!(source.calls.page_calls(), vec![("e2".to_string(), true)]);
    }

    #[test]
    fn page_scrape_primary_never_touches_service() {
        let source = FakeSource::default().with_page("e1", 9);
        let comic = source.comic.clone();
        let session = source.session();
        let mut resolver = ImageCountResolver::new(&source, &session, &comic, Locale::Japanese);

        assert_eq!(resolver.resolve(&episode("e1")).unwrap(), 9);
        assert_eq!(source.calls.image_counts(), 0);
        assert_eq!(source.calls.page_calls(), vec![("e1".to_string(), false)]);
    }
}
