use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::context::AttributeContext;
use super::order::{PipelineError, resolve_order};
use super::stage::Stage;

/// 按依赖顺序执行阶段，阶段产出并入上下文后交给下一个阶段。
pub struct PipelineRunner {
    stages: Vec<Box<dyn Stage>>,
    order: Vec<usize>,
}

impl PipelineRunner {
    /// 排序在执行任何阶段之前完成，配置错误在这里直接返回。
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self, PipelineError> {
        let specs: Vec<_> = stages.iter().map(|s| (s.name(), s.dependency())).collect();
        let order = resolve_order(&specs)?;
        let runner = Self { stages, order };
        debug!(target: "pipeline", order = ?runner.stage_names(), "阶段顺序已确定");
        Ok(runner)
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.order.iter().map(|i| self.stages[*i].name()).collect()
    }

    pub fn run(&self, initial: AttributeContext) -> Result<AttributeContext> {
        let mut ctx = initial;
        for idx in &self.order {
            let stage = &self.stages[*idx];
            let started = Instant::now();
            info!(target: "pipeline", stage = stage.name(), "阶段开始");

            let produced = stage
                .execute(&mut ctx)
                .with_context(|| format!("阶段 {} 执行失败", stage.name()))?;
            let kind = produced.as_ref().map(|a| a.kind());
            ctx = ctx.merge([produced]);

            info!(
                target: "pipeline",
                stage = stage.name(),
                produced = ?kind,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "阶段完成"
            );
        }
        Ok(ctx)
    }
}
