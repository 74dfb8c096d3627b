//! 流水线在各阶段之间传递的属性值。
//!
//! 每种属性是一个独立类型，`Attribute` 为它们的闭合和类型，
//! `AttributeKind` 为对应的判别值，顺序即声明顺序。

use std::path::PathBuf;

use crate::download::models::{
    ComicInfo, Credentials, DownloadOptions, DownloadReport, Locale, Purchases, Session,
};

/// 作品标识（alias）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicAlias(pub String);

/// 未解析的范围表达式原文。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeToken(pub String);

/// 已展开的单话下标（从 0 开始，升序去重）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeSelection(pub Vec<usize>);

/// 作品保存目录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDirectory(pub PathBuf);

/// 从属性中按类型取值。
pub trait AttributeValue {
    const KIND: AttributeKind;

    fn from_attribute(attr: &Attribute) -> Option<&Self>;
}

macro_rules! attributes {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum Attribute {
            $($variant($ty),)+
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum AttributeKind {
            $($variant,)+
        }

        impl AttributeKind {
            pub const ALL: &'static [AttributeKind] = &[$(AttributeKind::$variant,)+];
        }

        impl Attribute {
            pub fn kind(&self) -> AttributeKind {
                match self {
                    $(Attribute::$variant(_) => AttributeKind::$variant,)+
                }
            }
        }

        $(
            impl AttributeValue for $ty {
                const KIND: AttributeKind = AttributeKind::$variant;

                fn from_attribute(attr: &Attribute) -> Option<&Self> {
                    match attr {
                        Attribute::$variant(v) => Some(v),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Attribute {
                fn from(value: $ty) -> Self {
                    Attribute::$variant(value)
                }
            }
        )+
    };
}

attributes! {
    Credentials(Credentials),
    Locale(Locale),
    ComicAlias(ComicAlias),
    RangeToken(RangeToken),
    DownloadOptions(DownloadOptions),
    Session(Session),
    ComicInfo(ComicInfo),
    Purchases(Purchases),
    EpisodeSelection(EpisodeSelection),
    TargetDirectory(TargetDirectory),
    DownloadReport(DownloadReport),
}
