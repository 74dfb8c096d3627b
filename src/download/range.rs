//! 单话范围表达式解析。
//!
//! 支持的写法：留空（全部）、`N`、`N~`、`~N`、`N~M`，序号从 1 开始。

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("无效的范围表达式: {0:?}（应形如 8、8~、~25、1~10）")]
    InvalidRange(String),
    #[error("范围 {range} 超出单话总数 {total}")]
    OutOfBounds { range: EpisodeRange, total: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeRange {
    All,
    One(usize),
    ToEnd(usize),
    FromBeginning(usize),
    Some { start: usize, end: usize },
}

fn re_range() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"^(?:\d+|\d+~(\d+)?|(\d+)?~\d+)$").expect("compile RE_RANGE"))
}

impl EpisodeRange {
    pub fn parse(token: &str) -> Result<Self, RangeError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(EpisodeRange::All);
        }
        if !re_range().is_match(token) {
            return Err(RangeError::InvalidRange(token.to_string()));
        }

        let number = |s: &str| {
            s.parse::<usize>()
                .map_err(|_| RangeError::InvalidRange(token.to_string()))
        };

        let range = if !token.contains('~') {
            EpisodeRange::One(number(token)?)
        } else if let Some(start) = token.strip_suffix('~') {
            EpisodeRange::ToEnd(number(start)?)
        } else if let Some(end) = token.strip_prefix('~') {
            EpisodeRange::FromBeginning(number(end)?)
        } else {
            let (start, end) = token
                .split_once('~')
                .ok_or_else(|| RangeError::InvalidRange(token.to_string()))?;
            let (start, end) = (number(start)?, number(end)?);
            if start == end {
                EpisodeRange::One(start)
            } else {
                EpisodeRange::Some { start, end }
            }
        };
        Ok(range)
    }

    /// 调用方在 `resolve` 之前做的越界检查：序号需落在 `1..=total`，区间需升序。
    pub fn validate(&self, total: usize) -> Result<(), RangeError> {
        let in_bounds = |n: usize| n >= 1 && n <= total;
        let ok = match *self {
            EpisodeRange::All => true,
            EpisodeRange::One(n) | EpisodeRange::ToEnd(n) | EpisodeRange::FromBeginning(n) => {
                in_bounds(n)
            }
            EpisodeRange::Some { start, end } => start < end && in_bounds(start) && in_bounds(end),
        };
        if ok {
            Ok(())
        } else {
            Err(RangeError::OutOfBounds {
                range: *self,
                total,
            })
        }
    }

    /// 转换为从 0 开始、升序且不重复的单话下标。不做截断。
    pub fn resolve(&self, episode_count: usize) -> Vec<usize> {
        match *self {
            EpisodeRange::All => (0..episode_count).collect(),
            EpisodeRange::One(n) => vec![n.saturating_sub(1)],
            EpisodeRange::ToEnd(start) => (start.saturating_sub(1)..episode_count).collect(),
            EpisodeRange::FromBeginning(end) => (0..end).collect(),
            EpisodeRange::Some { start, end } => (start.saturating_sub(1)..end).collect(),
        }
    }
}

impl fmt::Display for EpisodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpisodeRange::All => f.write_str("全部"),
            EpisodeRange::One(n) => write!(f, "{n}"),
            EpisodeRange::ToEnd(n) => write!(f, "{n}~"),
            EpisodeRange::FromBeginning(n) => write!(f, "~{n}"),
            EpisodeRange::Some { start, end } => write!(f, "{start}~{end}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_token_shapes() {
        assert_eq!(EpisodeRange::parse("8~"), Ok(EpisodeRange::ToEnd(8)));
        assert_eq!(EpisodeRange::parse("~25"), Ok(EpisodeRange::FromBeginning(25)));
        assert_eq!(
            EpisodeRange::parse("1~10"),
            Ok(EpisodeRange::Some { start: 1, end: 10 })
        );
        assert_eq!(EpisodeRange::parse("7"), Ok(EpisodeRange::One(7)));
        assert_eq!(EpisodeRange::parse(""), Ok(EpisodeRange::All));
        assert_eq!(EpisodeRange::parse("  "), Ok(EpisodeRange::All));
    }

    #[test]
    fn equal_bounds_degrade_to_single() {
        assert_eq!(EpisodeRange::parse("5~5"), Ok(EpisodeRange::One(5)));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        for bad in ["abc", "~", "1~2~3", "-3", "1-5", "1 ~ 5"] {
            assert!(
                matches!(EpisodeRange::parse(bad), Err(RangeError::InvalidRange(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn resolve_is_zero_based_and_inclusive() {
        let some = EpisodeRange::Some { start: 1, end: 10 };
        assert_eq!(some.resolve(50), (0..=9).collect::<Vec<_>>());
        assert_eq!(EpisodeRange::All.resolve(3), vec![0, 1, 2]);
        assert_eq!(EpisodeRange::One(5).resolve(50), vec![4]);
        assert_eq!(EpisodeRange::ToEnd(48).resolve(50), vec![47, 48, 49]);
        assert_eq!(EpisodeRange::FromBeginning(2).resolve(50), vec![0, 1]);
    }

    #[test]
    fn validate_checks_bounds_against_total() {
        assert!(EpisodeRange::All.validate(0).is_ok());
        assert!(EpisodeRange::One(3).validate(3).is_ok());
        assert!(EpisodeRange::One(0).validate(3).is_err());
        assert!(EpisodeRange::ToEnd(4).validate(3).is_err());
        assert!(EpisodeRange::Some { start: 3, end: 1 }.validate(5).is_err());
        assert_eq!(
            EpisodeRange::Some { start: 2, end: 9 }.validate(5),
            Err(RangeError::OutOfBounds {
                range: EpisodeRange::Some { start: 2, end: 9 },
                total: 5
            })
        );
    }
}
