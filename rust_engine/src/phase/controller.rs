//! 阶段控制器
//!
//! 持有当前阶段、所选类型、暂停状态与玩家时钟缩放。非法转移静默忽略，
//! 因为外部输入可能与自动转移竞争。

use crate::config::TimeScaleConfig;
use crate::{EchoError, Result};

use super::{EngineEvent, EventBus, Phase, TimeScale};

pub struct PhaseController {
    phase: Phase,
    paused: bool,
    selected_type: usize,
    type_count: usize,
    bus: EventBus,
    time_scale: TimeScale,
}

impl PhaseController {
    pub fn new(type_count: usize, time_scale: TimeScaleConfig) -> Self {
        Self {
            phase: Phase::Idle,
            paused: false,
            selected_type: 0,
            type_count,
            bus: EventBus::new(),
            time_scale: TimeScale::new(time_scale),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn selected_type(&self) -> usize {
        self.selected_type
    }

    pub fn type_count(&self) -> usize {
        self.type_count
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn time_scale(&self) -> &TimeScale {
        &self.time_scale
    }

    /// 倒带期间禁用玩家输入
    pub fn live_input_enabled(&self) -> bool {
        self.phase != Phase::Rewinding
    }

    /// 按转移表切换阶段，非法转移返回 false
    pub fn transition(&mut self, next: Phase) -> bool {
        let old = self.phase;
        if !old.can_transition_to(next) {
            log::debug!("忽略非法阶段转移: {:?} -> {:?}", old, next);
            return false;
        }

        self.phase = next;
        if old == Phase::Playback {
            self.paused = false;
        }
        log::info!("阶段切换: {:?} -> {:?}", old, next);
        self.bus.publish(EngineEvent::PhaseChanged { old, new: next });
        true
    }

    /// 选择要录制的类型，录制与倒带期间忽略
    pub fn select_type(&mut self, type_index: usize) -> Result<bool> {
        if type_index >= self.type_count {
            return Err(EchoError::UnknownType(type_index));
        }
        if matches!(self.phase, Phase::Recording | Phase::Rewinding) {
            return Ok(false);
        }
        self.selected_type = type_index;
        Ok(true)
    }

    /// 暂停/恢复回放，只在回放阶段有效
    pub fn set_paused(&mut self, paused: bool) -> bool {
        if self.phase != Phase::Playback || self.paused == paused {
            return false;
        }

        self.paused = paused;
        self.bus.publish(if paused {
            EngineEvent::PlaybackPaused
        } else {
            EngineEvent::PlaybackResumed
        });
        true
    }

    /// 更新玩家时钟缩放
    pub fn update_time_scale(
        &mut self,
        recorded_scales: impl IntoIterator<Item = f32>,
        delta_time: f32,
    ) -> f32 {
        self.time_scale
            .update(self.phase, self.paused, recorded_scales, delta_time)
    }
}
