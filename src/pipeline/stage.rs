use anyhow::Result;

use super::attribute::Attribute;
use super::context::AttributeContext;

/// 阶段声明的前驱。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    /// 流水线的唯一起点。
    Independent,
    After(&'static str),
}

pub trait Stage {
    fn name(&self) -> &'static str;

    /// `None` 表示阶段没有声明依赖，排序时视为配置错误。
    fn dependency(&self) -> Option<Dependency>;

    /// 读取当前上下文，产出至多一个新属性；需要原地修改已有属性时直接写 `ctx`。
    fn execute(&self, ctx: &mut AttributeContext) -> Result<Option<Attribute>>;
}
