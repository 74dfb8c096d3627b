//! 阶段排序：由“阶段 → 前驱”映射得到唯一的线性执行顺序。
//!
//! 只接受单链：恰好一个起点，其余阶段各有一个前驱，且任何阶段至多被一个阶段依赖。

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::stage::Dependency;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("阶段 {0} 未声明依赖")]
    MissingSpecification(&'static str),
    #[error("阶段 {stage} 的依赖无效: {reason}")]
    InvalidSpecification {
        stage: &'static str,
        reason: String,
    },
    #[error("没有起点阶段")]
    NoRoot,
    #[error("存在多个起点阶段: {0:?}")]
    MultipleRoots(Vec<&'static str>),
    #[error("阶段依赖不是一条单链: {0}")]
    NonLinearGraph(String),
}

/// 返回按执行顺序排列的下标。
pub fn resolve_order(
    specs: &[(&'static str, Option<Dependency>)],
) -> Result<Vec<usize>, PipelineError> {
    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(specs.len());
    for (idx, (name, _)) in specs.iter().enumerate() {
        if index_of.insert(*name, idx).is_some() {
            return Err(PipelineError::InvalidSpecification {
                stage: *name,
                reason: "阶段名重复".to_string(),
            });
        }
    }

    let mut roots = Vec::new();
    let mut successors: HashMap<usize, Vec<usize>> = HashMap::new();
    for (idx, (name, dependency)) in specs.iter().enumerate() {
        match dependency.ok_or(PipelineError::MissingSpecification(*name))? {
            Dependency::Independent => roots.push(idx),
            Dependency::After(target) if target == *name => {
                return Err(PipelineError::InvalidSpecification {
                    stage: *name,
                    reason: "依赖自身".to_string(),
                });
            }
            Dependency::After(target) => {
                let pred = *index_of.get(target).ok_or_else(|| {
                    PipelineError::InvalidSpecification {
                        stage: *name,
                        reason: format!("依赖的阶段 {target} 不存在"),
                    }
                })?;
                successors.entry(pred).or_default().push(idx);
            }
        }
    }

    let root = match roots.as_slice() {
        [] => return Err(PipelineError::NoRoot),
        [root] => *root,
        many => {
            return Err(PipelineError::MultipleRoots(
                many.iter().map(|i| specs[*i].0).collect(),
            ));
        }
    };

    if let Some((pred, next)) = successors.iter().find(|(_, next)| next.len() > 1) {
        let names: Vec<&str> = next.iter().map(|i| specs[*i].0).collect();
        return Err(PipelineError::NonLinearGraph(format!(
            "{} 之后有多个阶段 {:?}",
            specs[*pred].0, names
        )));
    }

    let mut order = Vec::with_capacity(specs.len());
    let mut seen = HashSet::new();
    let mut current = Some(root);
    while let Some(idx) = current {
        if !seen.insert(idx) {
            break;
        }
        order.push(idx);
        current = successors.get(&idx).and_then(|next| next.first().copied());
    }

    if order.len() != specs.len() {
        let unreached: Vec<&str> = (0..specs.len())
            .filter(|i| !seen.contains(i))
            .map(|i| specs[i].0)
            .collect();
        return Err(PipelineError::NonLinearGraph(format!(
            "从起点无法到达 {unreached:?}"
        )));
    }
    Ok(order)
}
