//! 单话图片访问凭证（CloudFront 签名策略）解码与过期判断。
//!
//! 每话下载前申请一次，整话共用；过期后不会原地刷新，只能重新申请。

use std::fmt;
use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("签名策略 Base64 解码失败: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("签名策略文档无效: {0}")]
    Document(#[from] serde_json::Error),
    #[error("签名策略缺少 Statement")]
    MissingStatement,
    #[error("签名策略 Resource 不符合预期: {0}")]
    Resource(String),
    #[error("签名策略过期时间无效: {0}")]
    Expiry(i64),
    #[error("单话 {episode_id} 的访问凭证已于 {expires_at} 过期")]
    Expired {
        episode_id: u64,
        expires_at: OffsetDateTime,
    },
}

/// 发放接口返回的原始三元组。
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct SignedPolicy {
    #[serde(rename = "Policy")]
    pub policy: String,
    #[serde(rename = "Signature")]
    pub signature: String,
    #[serde(rename = "Key-Pair-Id")]
    pub key_pair_id: String,
}

impl fmt::Debug for SignedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedPolicy")
            .field("key_pair_id", &self.key_pair_id)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct PolicyDocument {
    #[serde(rename = "Statement")]
    statement: Vec<PolicyStatement>,
}

#[derive(Deserialize)]
struct PolicyStatement {
    #[serde(rename = "Resource")]
    resource: String,
    #[serde(rename = "Condition")]
    condition: PolicyCondition,
}

#[derive(Deserialize)]
struct PolicyCondition {
    #[serde(rename = "DateLessThan")]
    date_less_than: EpochCondition,
}

#[derive(Deserialize)]
struct EpochCondition {
    #[serde(rename = "AWS:EpochTime")]
    epoch_time: i64,
}

fn re_resource() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"/v2/.+?/(\d+)/episodes/(\d+)/contents").expect("compile RE_RESOURCE")
    })
}

#[derive(Clone)]
pub struct AccessAuthority {
    signed: SignedPolicy,
    comic_id: u64,
    episode_id: u64,
    expires_at: OffsetDateTime,
}

impl AccessAuthority {
    pub fn decode(signed: SignedPolicy) -> Result<Self, AuthorityError> {
        // CloudFront 的 URL 安全替换：'+'→'-'，'='→'_'，'/'→'~'
        let normalized: String = signed
            .policy
            .chars()
            .map(|c| match c {
                '-' => '+',
                '_' => '=',
                '~' => '/',
                other => other,
            })
            .collect();
        let bytes = STANDARD.decode(normalized.as_bytes())?;
        let document: PolicyDocument = serde_json::from_slice(&bytes)?;

        let statement = document
            .statement
            .into_iter()
            .next()
            .ok_or(AuthorityError::MissingStatement)?;

        let caps = re_resource()
            .captures(&statement.resource)
            .ok_or_else(|| AuthorityError::Resource(statement.resource.clone()))?;
        let parse_id = |idx: usize| {
            caps.get(idx)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .ok_or_else(|| AuthorityError::Resource(statement.resource.clone()))
        };
        let comic_id = parse_id(1)?;
        let episode_id = parse_id(2)?;

        let epoch = statement.condition.date_less_than.epoch_time;
        let expires_at =
            OffsetDateTime::from_unix_timestamp(epoch).map_err(|_| AuthorityError::Expiry(epoch))?;

        Ok(Self {
            signed,
            comic_id,
            episode_id,
            expires_at,
        })
    }

    pub fn comic_id(&self) -> u64 {
        self.comic_id
    }

    pub fn episode_id(&self) -> u64 {
        self.episode_id
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    pub fn policy(&self) -> &str {
        &self.signed.policy
    }

    pub fn signature(&self) -> &str {
        &self.signed.signature
    }

    pub fn key_pair_id(&self) -> &str {
        &self.signed.key_pair_id
    }

    /// 每次使用前都要用当前时刻重新判断，解码与使用之间时间在流逝。
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at < now
    }

    pub fn ensure_valid_at(&self, now: OffsetDateTime) -> Result<(), AuthorityError> {
        if self.is_expired_at(now) {
            return Err(AuthorityError::Expired {
                episode_id: self.episode_id,
                expires_at: self.expires_at,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for AccessAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessAuthority")
            .field("comic_id", &self.comic_id)
            .field("episode_id", &self.episode_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// 按 CloudFront 规则编码策略文档，供测试与本地替身服务使用。
#[cfg(test)]
pub(crate) fn encode_policy(comic_id: u64, episode_id: u64, expires_epoch: i64) -> SignedPolicy {
    let doc = serde_json::json!({
        "Statement": [{
            "Resource": format!(
                "https://rcdn.example.com/v2/comics/{comic_id}/episodes/{episode_id}/contents/scrolls/*"
            ),
            "Condition": { "DateLessThan": { "AWS:EpochTime": expires_epoch } }
        }]
    });
    let encoded: String = STANDARD
        .encode(doc.to_string())
        .chars()
        .map(|c| match c {
            '+' => '-',
            '=' => '_',
            '/' => '~',
            other => other,
        })
        .collect();
    SignedPolicy {
        policy: encoded,
        signature: "sig".to_string(),
        key_pair_id: "KPID".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn now_epoch() -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }

    #[test]
    fn decodes_ids_and_expiry() {
        let signed = encode_policy(5671946405658624, 5647133616750592, 1_900_000_000);
        let authority = AccessAuthority::decode(signed).unwrap();
        assert_eq!(authority.comic_id(), 5671946405658624);
        assert_eq!(authority.episode_id(), 5647133616750592);
        assert_eq!(authority.expires_at().unix_timestamp(), 1_900_000_000);
        assert_eq!(authority.signature(), "sig");
        assert_eq!(authority.key_pair_id(), "KPID");
    }

    #[test]
    fn past_expiry_is_expired() {
        let authority = AccessAuthority::decode(encode_policy(1, 2, now_epoch() - 60)).unwrap();
        let now = OffsetDateTime::now_utc();
        assert!(authority.is_expired_at(now));
        assert!(matches!(
            authority.ensure_valid_at(now),
            Err(AuthorityError::Expired { episode_id: 2, .. })
        ));
    }

    #[test]
    fn future_expiry_is_not_expired() {
        let authority = AccessAuthority::decode(encode_policy(1, 2, now_epoch() + 600)).unwrap();
        let now = OffsetDateTime::now_utc();
        assert!(!authority.is_expired_at(now));
        assert!(authority.ensure_valid_at(now).is_ok());
    }

    #[test]
    fn expiry_is_evaluated_at_call_time() {
        let authority = AccessAuthority::decode(encode_policy(1, 2, now_epoch() + 600)).unwrap();
        let later = OffsetDateTime::now_utc() + Duration::minutes(20);
        assert!(!authority.is_expired_at(OffsetDateTime::now_utc()));
        assert!(authority.is_expired_at(later));
        assert!(authority.ensure_valid_at(later).is_err());
    }

    #[test]
    fn garbage_policy_is_a_decode_error() {
        let signed = SignedPolicy {
            policy: "%%%not-base64%%%".to_string(),
            signature: String::new(),
            key_pair_id: String::new(),
        };
        assert!(matches!(
            AccessAuthority::decode(signed),
            Err(AuthorityError::Base64(_))
        ));
    }

    #[test]
    fn missing_condition_is_a_decode_error() {
        let doc = r#"{"Statement":[{"Resource":"https://x/v2/comics/1/episodes/2/contents/*"}]}"#;
        let signed = SignedPolicy {
            policy: STANDARD.encode(doc),
            signature: String::new(),
            key_pair_id: String::new(),
        };
        assert!(matches!(
            AccessAuthority::decode(signed),
            Err(AuthorityError::Document(_))
        ));
    }

    #[test]
    fn unexpected_resource_is_rejected() {
        let doc = r#"{"Statement":[{"Resource":"https://x/v1/other","Condition":{"DateLessThan":{"AWS:EpochTime":1}}}]}"#;
        let signed = SignedPolicy {
            policy: STANDARD.encode(doc),
            signature: String::new(),
            key_pair_id: String::new(),
        };
        assert!(matches!(
            AccessAuthority::decode(signed),
            Err(AuthorityError::Resource(_))
        ));
    }

    #[test]
    fn empty_statement_is_rejected() {
        let signed = SignedPolicy {
            policy: STANDARD.encode(r#"{"Statement":[]}"#),
            signature: String::new(),
            key_pair_id: String::new(),
        };
        assert!(matches!(
            AccessAuthority::decode(signed),
            Err(AuthorityError::MissingStatement)
        ));
    }
}
