//! Echo Engine - 动作录制与回声回放引擎
//!
//! 在有限时间窗口内录制玩家角色的动作，之后由多个“回声”实例并行回放：
//! - 定频采样与阈值压缩
//! - 样条重建与时间平滑
//! - 骨骼缓冲池与回放实例池（含距离 LOD）
//! - 阶段状态机与玩家时钟缩放

pub mod animation;
pub mod config;
pub mod engine;
pub mod phase;
pub mod playback;
pub mod skeleton;

#[cfg(test)]
mod testing;

pub use animation::{EventKind, Frame, RecordedEvent, Recording, RecordingStore, Sampler, Surface};
pub use config::{CloneTypeConfig, EngineConfig};
pub use engine::{EchoEngine, LiveActor};
pub use phase::{EngineEvent, EventBus, Phase, PhaseController, Trigger};
pub use playback::{CloneFactory, CloneInstance, CloneInstancePool, LodLevel, WarmupTask};
pub use skeleton::{BoneBufferPool, BoneData, SkeletonProvider, SkeletonRig};

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EchoError {
    #[error("Recording has no frames")]
    EmptyRecording,

    #[error("No stored recordings")]
    NoRecordings,

    #[error("Clone pool warm-up not finished")]
    PoolNotReady,

    #[error("Unknown clone type: {0}")]
    UnknownType(usize),

    #[error("Skeleton mismatch: expected {expected} bones, got {actual}")]
    SkeletonMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, EchoError>;
