//! 阶段状态机

mod controller;
mod events;
mod time_scale;

pub use controller::PhaseController;
pub use events::{EngineEvent, EventBus};
pub use time_scale::TimeScale;

/// 全局阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    Recording,
    Rewinding,
    Review,
    Playback,
}

impl Phase {
    /// 转移表
    pub fn can_transition_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Idle, Phase::Recording)
                | (Phase::Recording, Phase::Rewinding)
                | (Phase::Rewinding, Phase::Review)
                | (Phase::Review, Phase::Recording)
                | (Phase::Review, Phase::Playback)
                | (Phase::Playback, Phase::Idle)
        )
    }

    pub const ALL: [Phase; 5] = [
        Phase::Idle,
        Phase::Recording,
        Phase::Rewinding,
        Phase::Review,
        Phase::Playback,
    ];
}

/// 外部触发
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// 开始/停止录制
    ToggleRecording,
    StartPlayback,
    /// 提前结束回放
    EndPlayback,
    SetPaused(bool),
    SelectType(usize),
}
