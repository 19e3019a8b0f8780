//! 录制数据与重建
//!
//! [`Recording::frame_at_time`] 在稀疏、不等间隔的关键帧之间用 Catmull-Rom
//! 样条重建位置，球面插值重建旋转，并在连续查询之间做时间平滑。
//! 平滑状态跨调用保留，只在新录制或显式 [`Recording::reset_smoothing`] 时清空。

use glam::{Quat, Vec3};

use crate::config::ReconstructConfig;
use crate::skeleton::{BoneBufferPool, BoneData};
use crate::{EchoError, Result};

use super::frame::{Frame, RecordedEvent};
use super::interpolation::{catmull_rom, coefficient, smooth_damp, smoothstep};

/// 跨查询保留的平滑状态
#[derive(Debug, Default, Clone, Copy)]
struct SmoothingState {
    last_query_time: Option<f32>,
    position: Vec3,
    velocity: Vec3,
    rotation: Option<Quat>,
}

/// 最近一次查询结果所在位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameSlot {
    None,
    Keyframe(usize),
    Scratch,
}

/// 一段录制：关键帧 + 离散事件
#[derive(Debug)]
pub struct Recording {
    type_index: usize,
    frames: Vec<Frame>,
    events: Vec<RecordedEvent>,
    /// 重建输出，每次查询原地覆盖
    scratch: Frame,
    smoothing: SmoothingState,
    current: FrameSlot,
    config: ReconstructConfig,
}

impl Recording {
    pub fn new(type_index: usize, config: ReconstructConfig) -> Self {
        Self {
            type_index,
            frames: Vec::new(),
            events: Vec::new(),
            scratch: Frame::empty(),
            smoothing: SmoothingState::default(),
            current: FrameSlot::None,
            config,
        }
    }

    /// 产生该录制的角色类型
    pub fn type_index(&self) -> usize {
        self.type_index
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 最后一帧的时间，空录制为 0
    pub fn duration(&self) -> f32 {
        self.frames.last().map(|f| f.time).unwrap_or(0.0)
    }

    pub fn first_frame(&self) -> Option<&Frame> {
        self.frames.first()
    }

    /// 追加关键帧，时间早于末帧时钳制到末帧时间以保持有序
    pub fn push_frame(&mut self, mut frame: Frame) {
        if let Some(last) = self.frames.last() {
            if frame.time < last.time {
                log::warn!("关键帧时间倒退: {} < {}", frame.time, last.time);
                frame.time = last.time;
            }
        }
        self.frames.push(frame);
    }

    pub fn push_event(&mut self, event: RecordedEvent) {
        self.events.push(event);
    }

    /// 清空平滑状态
    ///
    /// 除新录制外，倒带开始、倒带结束与回放检出这几处跳转前也会调用，
    /// 旋转阻尼不跨跳转延续。
    pub fn reset_smoothing(&mut self) {
        self.smoothing = SmoothingState::default();
        self.current = FrameSlot::None;
    }

    /// 最近一次 [`frame_at_time`](Self::frame_at_time) 的结果
    pub fn current_frame(&self) -> Option<&Frame> {
        match self.current {
            FrameSlot::None => None,
            FrameSlot::Keyframe(index) => self.frames.get(index),
            FrameSlot::Scratch => Some(&self.scratch),
        }
    }

    /// 求值任意时刻的姿态
    ///
    /// `delta_time` 为未缩放的帧间隔，驱动位置平滑。由于旋转与位置平滑跨调用
    /// 累积，每个模拟 tick 只能调用一次；同一 `t` 重复调用会重复施加阻尼。
    ///
    /// 返回的引用在下次调用前有效。
    pub fn frame_at_time(&mut self, t: f32, delta_time: f32) -> Result<&Frame> {
        let n = self.frames.len();
        if n == 0 {
            return Err(EchoError::EmptyRecording);
        }

        if t <= 0.0 {
            return Ok(self.settle_on_keyframe(0, t));
        }
        if t >= self.duration() {
            return Ok(self.settle_on_keyframe(n - 1, t));
        }

        let i = self.segment_index(t);
        let p0 = i.saturating_sub(1);
        let p1 = i;
        let p2 = (i + 1).min(n - 1);
        let p3 = (i + 2).min(n - 1);

        let config = &self.config;
        let frames = &self.frames;
        let f1 = &frames[p1];
        let f2 = &frames[p2];

        let mut u = coefficient(f1.time, f2.time, t, config.segment_epsilon);
        if config.ease {
            u = smoothstep(u);
        }

        let spline = catmull_rom(
            frames[p0].position,
            f1.position,
            f2.position,
            frames[p3].position,
            u,
        );

        // 旋转：段内球面插值，再向上一次输出做阻尼混合
        let base = f1.rotation.slerp(f2.rotation, u);
        let rotation = match self.smoothing.rotation {
            Some(previous) => previous.slerp(base, config.rotation_damping),
            None => base,
        };

        // 位置：正常帧间隔时做弹簧平滑，跳转时直接使用样条结果
        let smoothing = &mut self.smoothing;
        let position = match smoothing.last_query_time {
            Some(last) if (t - last).abs() <= config.seek_threshold => smooth_damp(
                smoothing.position,
                spline,
                &mut smoothing.velocity,
                config.position_smooth_time,
                delta_time,
            ),
            _ => {
                smoothing.velocity = Vec3::ZERO;
                spline
            }
        };

        smoothing.last_query_time = Some(t);
        smoothing.position = position;
        smoothing.rotation = Some(rotation);

        interpolate_bones(&f1.bones, &f2.bones, u, &mut self.scratch.bones);
        self.scratch.time = t;
        self.scratch.position = position;
        self.scratch.rotation = rotation.normalize();
        self.current = FrameSlot::Scratch;

        Ok(&self.scratch)
    }

    /// 边界处直接返回关键帧，平滑状态对齐到该帧
    fn settle_on_keyframe(&mut self, index: usize, t: f32) -> &Frame {
        let frame = &self.frames[index];
        self.smoothing = SmoothingState {
            last_query_time: Some(t),
            position: frame.position,
            velocity: Vec3::ZERO,
            rotation: Some(frame.rotation),
        };
        self.current = FrameSlot::Keyframe(index);
        frame
    }

    /// 满足 `frames[i].time <= t < frames[i + 1].time` 的 i
    fn segment_index(&self, t: f32) -> usize {
        let upper = self.frames.partition_point(|f| f.time <= t);
        upper.saturating_sub(1).min(self.frames.len().saturating_sub(2))
    }

    /// 把所有帧的骨骼缓冲区还给缓冲池并清空帧
    pub fn release_into(&mut self, pool: &mut BoneBufferPool) {
        for frame in &mut self.frames {
            frame.release_bones(pool);
        }
        self.frames.clear();
        self.events.clear();
        self.reset_smoothing();
    }
}

/// 骨骼逐元素插值，长度不一致时退回其中一侧
fn interpolate_bones(from: &[BoneData], to: &[BoneData], u: f32, out: &mut Vec<BoneData>) {
    let fallback = match (from.is_empty(), to.is_empty()) {
        (true, true) => {
            out.clear();
            return;
        }
        (false, true) => Some(from),
        (true, false) => Some(to),
        (false, false) if from.len() != to.len() => Some(if u < 0.5 { from } else { to }),
        (false, false) => None,
    };

    if let Some(source) = fallback {
        out.clear();
        out.extend_from_slice(source);
        return;
    }

    out.resize(from.len(), BoneData::default());
    for ((slot, a), b) in out.iter_mut().zip(from).zip(to) {
        *slot = a.interpolate(b, u);
    }
}
