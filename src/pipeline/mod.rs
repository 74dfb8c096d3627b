//! 阶段流水线。
//!
//! - `attribute` — 阶段之间传递的属性（闭合和类型）
//! - `context`   — 属性上下文（每种属性一个槽位）
//! - `stage`     — 阶段接口与依赖声明
//! - `order`     — 由依赖声明得到线性执行顺序
//! - `runner`    — 依序执行并串联上下文
//! - `stages`    — 登录 / 作品 / 已购 / 范围 / 目录 / 下载 各阶段

pub mod attribute;
pub mod context;
pub mod order;
pub mod runner;
pub mod stage;
pub mod stages;
