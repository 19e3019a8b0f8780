//! 分帧预热
//!
//! 实例化开销较大，预热任务每次 `step` 只创建少量实例，由外部每 tick 推进。

use std::collections::VecDeque;

use crate::config::CloneTypeConfig;
use crate::skeleton::SkeletonRig;

use super::{CloneInstance, CloneInstancePool};

/// 创建回放骨架
pub trait CloneFactory {
    fn create(&mut self, type_index: usize, config: &CloneTypeConfig) -> Box<dyn SkeletonRig>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarmupStatus {
    Pending,
    Done,
}

/// 可恢复的预热任务
#[derive(Debug)]
pub struct WarmupTask {
    pending: VecDeque<usize>,
    per_step: usize,
    created: usize,
}

impl WarmupTask {
    /// 为所有启用的类型排队
    pub fn new(types: &[CloneTypeConfig], per_step: usize) -> Self {
        let pending = types
            .iter()
            .enumerate()
            .filter(|(_, config)| config.active)
            .map(|(index, _)| index)
            .collect();

        Self {
            pending,
            per_step: per_step.max(1),
            created: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    /// 已创建的实例数
    pub fn created(&self) -> usize {
        self.created
    }

    /// 推进一步；全部完成后把池标记为就绪
    pub fn step(
        &mut self,
        pool: &mut CloneInstancePool,
        factory: &mut dyn CloneFactory,
        types: &[CloneTypeConfig],
    ) -> WarmupStatus {
        for _ in 0..self.per_step {
            let Some(type_index) = self.pending.pop_front() else {
                break;
            };
            let Some(config) = types.get(type_index) else {
                continue;
            };

            let rig = factory.create(type_index, config);
            if pool.insert(CloneInstance::new(type_index, rig)) {
                self.created += 1;
                log::debug!("预热回声实例: {} ({})", config.name, type_index);
            }
        }

        if self.pending.is_empty() {
            if !pool.is_ready() {
                log::info!("回声实例池预热完成: {} 个实例", pool.len());
                pool.mark_ready();
            }
            WarmupStatus::Done
        } else {
            WarmupStatus::Pending
        }
    }
}
