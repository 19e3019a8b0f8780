//! 玩家时钟缩放
//!
//! 回放期间按已录制的类型放慢玩家时钟；其它阶段立即恢复正常速度。
//! 回声自身始终使用未缩放时间。

use crate::config::TimeScaleConfig;

use super::Phase;

#[derive(Debug, Clone)]
pub struct TimeScale {
    config: TimeScaleConfig,
    current: f32,
    target: f32,
}

impl TimeScale {
    pub fn new(config: TimeScaleConfig) -> Self {
        Self {
            config,
            current: 1.0,
            target: 1.0,
        }
    }

    /// 当前缩放
    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// 由已录制类型的缩放求目标值：取最慢者并钳制
    pub fn derive_target(&self, recorded_scales: impl IntoIterator<Item = f32>) -> f32 {
        recorded_scales
            .into_iter()
            .fold(None, |slowest: Option<f32>, scale| {
                Some(slowest.map_or(scale, |s| s.min(scale)))
            })
            .unwrap_or(1.0)
            .clamp(self.config.min_scale, self.config.max_scale)
    }

    /// 每 tick 更新，`delta_time` 为未缩放帧间隔
    pub fn update(
        &mut self,
        phase: Phase,
        paused: bool,
        recorded_scales: impl IntoIterator<Item = f32>,
        delta_time: f32,
    ) -> f32 {
        if phase != Phase::Playback || paused {
            self.target = 1.0;
            self.current = 1.0;
            return self.current;
        }

        self.target = self.derive_target(recorded_scales);
        let blend = 1.0 - (-self.config.smoothing_speed * delta_time.max(0.0)).exp();
        self.current += (self.target - self.current) * blend;
        self.current = self.current.clamp(self.config.min_scale, self.config.max_scale);
        self.current
    }
}
