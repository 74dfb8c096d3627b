//! 属性上下文：每种属性一个槽位，每个槽位至多一个值。
//!
//! 三个操作都不会失败：
//! - `create`：同种属性取输入中第一个，后续同种与空值忽略；
//! - `merge`：生成新上下文，输入覆盖已有值；
//! - `update_in_place`：原地覆盖，相等的值不重复写入。
//!
//! 上下文可以限定形状（只接受部分属性种类），形状之外的值直接丢弃。

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, anyhow};

use super::attribute::{Attribute, AttributeKind, AttributeValue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeContext {
    shape: BTreeSet<AttributeKind>,
    slots: BTreeMap<AttributeKind, Attribute>,
}

impl Default for AttributeContext {
    fn default() -> Self {
        Self::with_shape(AttributeKind::ALL)
    }
}

impl AttributeContext {
    pub fn with_shape(kinds: &[AttributeKind]) -> Self {
        Self {
            shape: kinds.iter().copied().collect(),
            slots: BTreeMap::new(),
        }
    }

    pub fn create<I, C>(candidates: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Option<Attribute>>,
    {
        Self::default().filled(candidates)
    }

    #[cfg(test)]
    pub fn create_with_shape<I, C>(kinds: &[AttributeKind], candidates: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Option<Attribute>>,
    {
        Self::with_shape(kinds).filled(candidates)
    }

    /// 空槽按输入顺序填入第一个匹配值。
    fn filled<I, C>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Option<Attribute>>,
    {
        for candidate in candidates {
            let Some(attr): Option<Attribute> = candidate.into() else {
                continue;
            };
            let kind = attr.kind();
            if self.shape.contains(&kind) {
                self.slots.entry(kind).or_insert(attr);
            }
        }
        self
    }

    pub fn merge<I, C>(&self, candidates: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Option<Attribute>>,
    {
        let mut merged = Self {
            shape: self.shape.clone(),
            slots: BTreeMap::new(),
        }
        .filled(candidates);
        for (kind, attr) in &self.slots {
            merged.slots.entry(*kind).or_insert_with(|| attr.clone());
        }
        merged
    }

    /// 返回实际写入的槽位数。
    pub fn update_in_place<I, C>(&mut self, candidates: I) -> usize
    where
        I: IntoIterator<Item = C>,
        C: Into<Option<Attribute>>,
    {
        let incoming = Self {
            shape: self.shape.clone(),
            slots: BTreeMap::new(),
        }
        .filled(candidates);

        let mut writes = 0;
        for (kind, attr) in incoming.slots {
            if self.slots.get(&kind) != Some(&attr) {
                self.slots.insert(kind, attr);
                writes += 1;
            }
        }
        writes
    }

    pub fn get<T: AttributeValue>(&self) -> Option<&T> {
        self.slots.get(&T::KIND).and_then(T::from_attribute)
    }

    pub fn require<T: AttributeValue>(&self) -> Result<&T> {
        self.get::<T>()
            .ok_or_else(|| anyhow!("上下文缺少属性 {:?}", T::KIND))
    }

    #[cfg(test)]
    pub fn contains(&self, kind: AttributeKind) -> bool {
        self.slots.contains_key(&kind)
    }

    #[cfg(test)]
    pub fn accepts(&self, kind: AttributeKind) -> bool {
        self.shape.contains(&kind)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 按声明顺序列出已有属性。
    #[cfg(test)]
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.slots.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::models::{Credentials, Locale};
    use crate::pipeline::attribute::{ComicAlias, RangeToken};

    fn alias(s: &str) -> Attribute {
        ComicAlias(s.to_string()).into()
    }

    #[test]
    fn first_candidate_of_each_kind_wins() {
        let ctx = AttributeContext::create([
            Some(alias("first")),
            None,
            Some(Locale::English.into()),
            Some(alias("second")),
        ]);
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.get::<ComicAlias>().unwrap().0, "first");
        assert_eq!(ctx.get::<Locale>(), Some(&Locale::English));
        assert!(ctx.get::<RangeToken>().is_none());
    }

    #[test]
    fn kinds_outside_shape_are_discarded() {
        let ctx = AttributeContext::create_with_shape(
            &[AttributeKind::Locale],
            [alias("x"), Locale::Japanese.into()],
        );
        assert_eq!(ctx.len(), 1);
        assert!(!ctx.contains(AttributeKind::ComicAlias));
        assert!(!ctx.accepts(AttributeKind::ComicAlias));

        let merged = ctx.merge([alias("y")]);
        assert_eq!(merged, ctx);
    }

    #[test]
    fn merge_with_nothing_is_identity() {
        let ctx = AttributeContext::create([alias("a"), Locale::Korean.into()]);
        assert_eq!(ctx.merge(Vec::<Attribute>::new()), ctx);
        assert_eq!(ctx.merge([None::<Attribute>, None]), ctx);

        let empty = AttributeContext::create(Vec::<Option<Attribute>>::new());
        assert!(empty.is_empty());
    }

    #[test]
    fn merge_overrides_existing_values() {
        let ctx = AttributeContext::create([alias("a"), Locale::Korean.into()]);
        let next = ctx.merge([alias("b")]);
        assert_eq!(next.get::<ComicAlias>().unwrap().0, "b");
        assert_eq!(next.get::<Locale>(), Some(&Locale::Korean));
        // 原上下文不变
        assert_eq!(ctx.get::<ComicAlias>().unwrap().0, "a");
    }

    #[test]
    fn update_in_place_writes_once_for_equal_values() {
        let mut ctx = AttributeContext::create([alias("a")]);
        let creds: Attribute = Credentials::new("reader", "pw").into();

        assert_eq!(ctx.update_in_place([creds.clone()]), 1);
        assert_eq!(ctx.update_in_place([creds]), 0);

        let redacted: Attribute = Credentials::new("reader", "pw").redacted().into();
        assert_eq!(ctx.update_in_place([redacted]), 1);
        assert!(ctx.get::<Credentials>().unwrap().is_redacted());
        assert_eq!(ctx.update_in_place(Vec::<Attribute>::new()), 0);
    }

    #[test]
    fn require_reports_missing_kind() {
        let ctx = AttributeContext::default();
        let err = ctx.require::<ComicAlias>().unwrap_err();
        assert!(err.to_string().contains("ComicAlias"));
    }

    #[test]
    fn attributes_are_listed_in_declaration_order() {
        let ctx = AttributeContext::create([
            Attribute::from(RangeToken("1~3".to_string())),
            Locale::Korean.into(),
            Credentials::new("u", "p").into(),
        ]);
        let kinds: Vec<_> = ctx.attributes().map(Attribute::kind).collect();
        assert_eq!(
            kinds,
            vec![
                AttributeKind::Credentials,
                AttributeKind::Locale,
                AttributeKind::RangeToken
            ]
        );
    }
}
