use std::collections::{HashMap, HashSet};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CONNECTION, HeaderMap, HeaderName, HeaderValue,
    REFERER, USER_AGENT,
};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info};

use super::product::{PRODUCT_VAR, extract_js_object, extract_session_parts, parse_comic_info};
use super::{ComicSource, NetworkError};
use crate::base_system::settings::Config;
use crate::download::authority::SignedPolicy;
use crate::download::models::{ComicInfo, Credentials, Episode, Locale, Purchases, Session};

const LOCALE_HEADER: &str = "x-lz-locale";

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl WebConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            base_url: cfg.base_url.trim().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(cfg.request_timeout.max(1)),
            user_agent: cfg.user_agent.clone(),
        }
    }
}

pub struct WebClient {
    client: Client,
    config: WebConfig,
}

impl WebClient {
    pub fn new(config: WebConfig) -> Result<Self, NetworkError> {
        let mut default_headers = HeaderMap::new();
        // 未启用 gzip 解码，要求原样返回
        default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let client = Client::builder()
            .default_headers(default_headers)
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    fn page_headers(&self, locale: Locale) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.config.user_agent)
                .unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );
        headers.insert(
            HeaderName::from_static(LOCALE_HEADER),
            HeaderValue::from_static(locale.as_tag()),
        );
        headers
    }

    fn api_headers(&self, session: &Session) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.config.user_agent)
                .unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );
        if let Ok(v) = HeaderValue::from_str(&format!("Bearer {}", session.access_token)) {
            headers.insert(AUTHORIZATION, v);
        }
        if let Ok(v) = HeaderValue::from_str(&self.config.base_url) {
            headers.insert(REFERER, v);
        }
        headers
    }

    fn checked(url: &str, resp: Response) -> Result<Response, NetworkError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }

    fn get_text(&self, url: &str, headers: HeaderMap) -> Result<String, NetworkError> {
        debug!(target: "network", url, "GET");
        let resp = self.client.get(url).headers(headers).send()?;
        Ok(Self::checked(url, resp)?.text()?)
    }

    fn get_json(&self, url: &str, session: &Session) -> Result<Value, NetworkError> {
        debug!(target: "network", url, "GET (json)");
        let resp = self
            .client
            .get(url)
            .headers(self.api_headers(session))
            .send()?;
        Ok(Self::checked(url, resp)?.json::<Value>()?)
    }

    fn data_of(value: Value) -> Value {
        match value {
            Value::Object(mut map) if map.contains_key("data") => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        }
    }
}

impl ComicSource for WebClient {
    fn login(&self, locale: Locale, credentials: &Credentials) -> Result<Session, NetworkError> {
        let password = credentials
            .password
            .as_deref()
            .ok_or_else(|| NetworkError::Login("密码已被清除，无法再次登录".to_string()))?;

        let url = self.url(&format!("{}/login/submit", locale.path_segment()));
        info!(target: "network", username = %credentials.username, "登录中");
        let resp = self
            .client
            .post(&url)
            .headers(self.page_headers(locale))
            .form(&[
                ("username", credentials.username.as_str()),
                ("password", password),
                ("remember_me", "false"),
            ])
            .send()?;
        Self::checked(&url, resp)?;

        let home = self.get_text(&self.url(locale.path_segment()), self.page_headers(locale))?;
        let (access_token, user_id) = extract_session_parts(&home)
            .ok_or_else(|| NetworkError::Login("未能从页面取得访问令牌".to_string()))?;
        Ok(Session {
            access_token,
            user_id,
        })
    }

    fn fetch_comic(
        &self,
        locale: Locale,
        _session: &Session,
        alias: &str,
    ) -> Result<ComicInfo, NetworkError> {
        let url = self.url(&format!("{}/comic/{}", locale.path_segment(), alias));
        let html = self.get_text(&url, self.page_headers(locale))?;
        let object = extract_js_object(&html, PRODUCT_VAR)
            .ok_or_else(|| NetworkError::Parse(format!("{url} 中未找到 {PRODUCT_VAR}")))?;
        let raw: Value =
            serde_json::from_str(object).map_err(|e| NetworkError::Parse(e.to_string()))?;
        let now_ms = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        parse_comic_info(&raw, alias, now_ms).map_err(NetworkError::Parse)
    }

    fn fetch_purchases(
        &self,
        session: &Session,
        comic: &ComicInfo,
    ) -> Result<Purchases, NetworkError> {
        let url = self.url(&format!(
            "lz-api/v2/users/{}/contents/{}/purchases",
            session.user_id, comic.id
        ));
        let data = Self::data_of(self.get_json(&url, session)?);
        let list = data
            .as_array()
            .or_else(|| data.get("episodeIds").and_then(Value::as_array))
            .ok_or_else(|| NetworkError::Parse("已购列表格式不正确".to_string()))?;

        let episode_ids: HashSet<u64> = list
            .iter()
            .filter_map(|v| {
                v.as_u64()
                    .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
            })
            .collect();
        debug!(target: "network", count = episode_ids.len(), "已购单话");
        Ok(Purchases { episode_ids })
    }

    fn fetch_image_counts(
        &self,
        session: &Session,
        comic: &ComicInfo,
    ) -> Result<HashMap<String, u32>, NetworkError> {
        let url = self.url(&format!("lz-api/v2/comics/{}/episodes/image-counts", comic.id));
        let data = Self::data_of(self.get_json(&url, session)?);
        let map = data
            .as_object()
            .ok_or_else(|| NetworkError::Parse("张数映射格式不正确".to_string()))?;
        Ok(map
            .iter()
            .filter_map(|(name, v)| v.as_u64().map(|n| (name.clone(), n as u32)))
            .collect())
    }

    fn fetch_episode_page(
        &self,
        locale: Locale,
        _session: &Session,
        comic: &ComicInfo,
        episode: &Episode,
        library: bool,
    ) -> Result<String, NetworkError> {
        let path = if library {
            format!(
                "{}/library/comic/{}/{}",
                locale.path_segment(),
                comic.alias,
                episode.name
            )
        } else {
            format!(
                "{}/comic/{}/{}",
                locale.path_segment(),
                comic.alias,
                episode.name
            )
        };
        self.get_text(&self.url(&path), self.page_headers(locale))
    }

    fn issue_authority(
        &self,
        session: &Session,
        comic: &ComicInfo,
        episode: &Episode,
        purchased: bool,
    ) -> Result<SignedPolicy, NetworkError> {
        let url = self.url(&format!(
            "lz-api/v2/cloudfront/signed-url/generate?contentId={}&episodeId={}&purchased={}&q=30&firstCheckType=P",
            comic.id, episode.id, purchased
        ));
        let data = Self::data_of(self.get_json(&url, session)?);
        serde_json::from_value(data).map_err(|e| NetworkError::Parse(e.to_string()))
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("image/*,*/*;q=0.8"));
        if let Ok(v) = HeaderValue::from_str(&self.config.user_agent) {
            headers.insert(USER_AGENT, v);
        }
        let resp = self.client.get(url).headers(headers).send()?;
        let bytes = Self::checked(url, resp)?.bytes()?;
        Ok(bytes.to_vec())
    }
}
