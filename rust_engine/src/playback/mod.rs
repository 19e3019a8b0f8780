//! 回声回放：实例池、距离 LOD 与分帧预热

mod clone_instance;
mod pool;
mod warmup;

pub use clone_instance::CloneInstance;
pub use pool::CloneInstancePool;
pub use warmup::{CloneFactory, WarmupStatus, WarmupTask};

use crate::config::LodConfig;

/// 距离 LOD 等级
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LodLevel {
    /// 每帧更新全部骨骼
    #[default]
    Full,
    /// 隔帧更新，隔一根骨骼
    Half,
    /// 每 4 帧更新，每 4 根骨骼
    Quarter,
}

impl LodLevel {
    /// 按距离分级
    pub fn classify(distance: f32, config: &LodConfig) -> Self {
        if distance > config.far_distance {
            LodLevel::Quarter
        } else if distance > config.near_distance {
            LodLevel::Half
        } else {
            LodLevel::Full
        }
    }

    /// 0 / 1 / 2
    pub fn index(self) -> u8 {
        match self {
            LodLevel::Full => 0,
            LodLevel::Half => 1,
            LodLevel::Quarter => 2,
        }
    }

    /// 帧间隔与骨骼步长：1 / 2 / 4
    pub fn skip(self) -> usize {
        match self {
            LodLevel::Full => 1,
            LodLevel::Half => 2,
            LodLevel::Quarter => 4,
        }
    }
}
