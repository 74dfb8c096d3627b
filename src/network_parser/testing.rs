//! 测试用的内存替身站点。

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use time::OffsetDateTime;

use super::{ComicSource, NetworkError};
use crate::download::authority::{SignedPolicy, encode_policy};
use crate::download::models::{ComicInfo, Credentials, Episode, Locale, Purchases, Session};

#[derive(Default)]
pub(crate) struct CallLog {
    logins: AtomicUsize,
    image_counts: AtomicUsize,
    authorities: AtomicUsize,
    pages: Mutex<Vec<(String, bool)>>,
    fetched: Mutex<Vec<String>>,
}

impl CallLog {
    pub(crate) fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub(crate) fn image_counts(&self) -> usize {
        self.image_counts.load(Ordering::SeqCst)
    }

    pub(crate) fn authorities(&self) -> usize {
        self.authorities.load(Ordering::SeqCst)
    }

    pub(crate) fn pages(&self) -> usize {
        self.pages.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub(crate) fn pages_for(&self, episode: &str) -> usize {
        self.pages
            .lock()
            .map(|p| p.iter().filter(|(e, _)| e.as_str() == episode).count())
            .unwrap_or(0)
    }

    /// 每次阅读页请求的（单话名, 是否书架路径）。
    pub(crate) fn page_calls(&self) -> Vec<(String, bool)> {
        self.pages.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub(crate) fn fetched(&self) -> Vec<String> {
        self.fetched.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

pub(crate) struct FakeSource {
    pub(crate) comic: ComicInfo,
    pub(crate) purchases: HashSet<u64>,
    pub(crate) calls: CallLog,
    counts: HashMap<String, u32>,
    pages: HashMap<String, u32>,
    failing_images: HashSet<u32>,
    failing_pages: HashSet<String>,
    failing_counts: bool,
    expires_in_secs: i64,
}

impl Default for FakeSource {
    fn default() -> Self {
        let episodes = (1..=3)
            .map(|i| Episode {
                id: 10 + i as u64,
                name: format!("e{i}"),
                title: format!("제{i}화"),
                seq: i,
                free: true,
            })
            .collect();
        Self {
            comic: ComicInfo {
                id: 100,
                alias: "sample".to_string(),
                title: "Sample".to_string(),
                expired: false,
                updated_at: 1_700_000_000_000,
                episodes,
            },
            purchases: HashSet::new(),
            calls: CallLog::default(),
            counts: HashMap::new(),
            pages: HashMap::new(),
            failing_images: HashSet::new(),
            failing_pages: HashSet::new(),
            failing_counts: false,
            expires_in_secs: 600,
        }
    }
}

impl FakeSource {
    pub(crate) fn with_counts(mut self, counts: &[(&str, u32)]) -> Self {
        self.counts = counts.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        self
    }

    pub(crate) fn with_page(mut self, episode: &str, cuts: u32) -> Self {
        self.pages.insert(episode.to_string(), cuts);
        self
    }

    pub(crate) fn with_failing_images(mut self, indices: &[u32]) -> Self {
        self.failing_images = indices.iter().copied().collect();
        self
    }

    pub(crate) fn with_failing_pages(mut self, episodes: &[&str]) -> Self {
        self.failing_pages = episodes.iter().map(|e| e.to_string()).collect();
        self
    }

    pub(crate) fn with_failing_counts(mut self) -> Self {
        self.failing_counts = true;
        self
    }

    pub(crate) fn with_expiry(mut self, secs_from_now: i64) -> Self {
        self.expires_in_secs = secs_from_now;
        self
    }

    pub(crate) fn session(&self) -> Session {
        Session {
            access_token: "token".to_string(),
            user_id: 7,
        }
    }

    fn image_index(url: &str) -> Option<u32> {
        let after = url.split("/scrolls/").nth(1)?;
        after.split('.').next()?.parse().ok()
    }
}

impl ComicSource for FakeSource {
    fn login(&self, _locale: Locale, credentials: &Credentials) -> Result<Session, NetworkError> {
        self.calls.logins.fetch_add(1, Ordering::SeqCst);
        match credentials.password.as_deref() {
            Some("secret") => Ok(self.session()),
            _ => Err(NetworkError::Login("bad credentials".to_string())),
        }
    }

    fn fetch_comic(
        &self,
        _locale: Locale,
        _session: &Session,
        alias: &str,
    ) -> Result<ComicInfo, NetworkError> {
        if alias != self.comic.alias {
            return Err(NetworkError::Status {
                url: alias.to_string(),
                status: 404,
            });
        }
        Ok(self.comic.clone())
    }

    fn fetch_purchases(
        &self,
        _session: &Session,
        _comic: &ComicInfo,
    ) -> Result<Purchases, NetworkError> {
        Ok(Purchases {
            episode_ids: self.purchases.clone(),
        })
    }

    fn fetch_image_counts(
        &self,
        _session: &Session,
        _comic: &ComicInfo,
    ) -> Result<HashMap<String, u32>, NetworkError> {
        self.calls.image_counts.fetch_add(1, Ordering::SeqCst);
        if self.failing_counts {
            return Err(NetworkError::Status {
                url: "image-counts".to_string(),
                status: 503,
            });
        }
        Ok(self.counts.clone())
    }

    fn fetch_episode_page(
        &self,
        _locale: Locale,
        _session: &Session,
        _comic: &ComicInfo,
        episode: &Episode,
        library: bool,
    ) -> Result<String, NetworkError> {
        if let Ok(mut pages) = self.calls.pages.lock() {
            pages.push((episode.name.clone(), library));
        }
        if self.failing_pages.contains(&episode.name) {
            return Err(NetworkError::Status {
                url: format!("page/{}", episode.name),
                status: 503,
            });
        }
        let cuts = self.pages.get(&episode.name).copied().unwrap_or(0);
        let mut html = String::from(r#"<div class="cut" data-cut-type="top"></div>"#);
        for _ in 0..cuts {
            html.push_str(r#"<div class="cut" data-cut-type="cut"></div>"#);
        }
        html.push_str(r#"<div class="cut" data-cut-type="bottom"></div>"#);
        Ok(html)
    }

    fn issue_authority(
        &self,
        _session: &Session,
        comic: &ComicInfo,
        episode: &Episode,
        _purchased: bool,
    ) -> Result<SignedPolicy, NetworkError> {
        self.calls.authorities.fetch_add(1, Ordering::SeqCst);
        let expires = OffsetDateTime::now_utc().unix_timestamp() + self.expires_in_secs;
        Ok(encode_policy(comic.id, episode.id, expires))
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        if let Ok(mut fetched) = self.calls.fetched.lock() {
            fetched.push(url.to_string());
        }
        match Self::image_index(url) {
            Some(idx) if self.failing_images.contains(&idx) => Err(NetworkError::Status {
                url: url.to_string(),
                status: 500,
            }),
            Some(idx) => Ok(format!("image-{idx}").into_bytes()),
            None => Err(NetworkError::Parse(format!("unexpected url {url}"))),
        }
    }
}
