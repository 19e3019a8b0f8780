//! 定频采样器
//!
//! 累积帧间隔，超过采样间隔时读取一次角色姿态，余量带入下一次。
//! 采样只有在满足以下任一条件时才保留：
//! - 录制的第一帧
//! - 距上一保留帧超过强制间隔
//! - 位置变化超过阈值
//! - 旋转变化超过阈值

use glam::{Quat, Vec3};

use crate::config::{ReconstructConfig, SamplerConfig};
use crate::skeleton::{BoneBufferPool, SkeletonProvider};

use super::frame::{EventKind, Frame, RecordedEvent};
use super::Recording;

/// 采样器单步结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerStatus {
    /// 未在录制
    Idle,
    Capturing,
    /// 到达最大录制时长
    CapReached,
}

#[derive(Debug, Clone, Copy)]
struct KeptSample {
    time: f32,
    position: Vec3,
    rotation: Quat,
}

/// 定频采样器
pub struct Sampler {
    config: SamplerConfig,
    reconstruct: ReconstructConfig,
    /// 录制的骨架节点索引，顺序即帧内骨骼顺序
    bone_indices: Vec<usize>,
    recording: Option<Recording>,
    accumulator: f32,
    elapsed: f32,
    /// 最近一次 tick 的姿态时间，帧与事件共用
    tick_time: f32,
    last_kept: Option<KeptSample>,
    samples_taken: usize,
}

impl Sampler {
    pub fn new(config: SamplerConfig, reconstruct: ReconstructConfig, bone_indices: Vec<usize>) -> Self {
        Self {
            config,
            reconstruct,
            bone_indices,
            recording: None,
            accumulator: 0.0,
            elapsed: 0.0,
            tick_time: 0.0,
            last_kept: None,
            samples_taken: 0,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.recording.is_some()
    }

    /// 录制开始以来的秒数
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn bone_indices(&self) -> &[usize] {
        &self.bone_indices
    }

    /// 已保留的帧数
    pub fn kept_frames(&self) -> usize {
        self.recording.as_ref().map(|r| r.len()).unwrap_or(0)
    }

    /// 本次录制触发的采样次数（含被丢弃的）
    pub fn samples_taken(&self) -> usize {
        self.samples_taken
    }

    /// 开始录制，已在录制时返回 false
    pub fn begin(&mut self, type_index: usize) -> bool {
        if self.recording.is_some() {
            return false;
        }

        self.recording = Some(Recording::new(type_index, self.reconstruct.clone()));
        // 第一个 tick 立即采样
        self.accumulator = self.config.sample_interval();
        self.elapsed = 0.0;
        self.tick_time = 0.0;
        self.last_kept = None;
        self.samples_taken = 0;
        true
    }

    /// 推进一个 tick
    pub fn step<P: SkeletonProvider + ?Sized>(
        &mut self,
        delta_time: f32,
        live: &P,
        pool: &mut BoneBufferPool,
    ) -> SamplerStatus {
        if self.recording.is_none() {
            return SamplerStatus::Idle;
        }
        if self.elapsed >= self.config.max_record_duration {
            return SamplerStatus::CapReached;
        }

        self.tick_time = self.elapsed;
        let interval = self.config.sample_interval();
        self.accumulator += delta_time.max(0.0);
        if self.accumulator >= interval {
            self.accumulator -= interval;
            if self.accumulator >= interval {
                // 长帧不补采，只保留余量
                self.accumulator %= interval;
            }
            self.sample(live, pool);
        }

        self.elapsed += delta_time.max(0.0);
        if self.elapsed >= self.config.max_record_duration {
            SamplerStatus::CapReached
        } else {
            SamplerStatus::Capturing
        }
    }

    fn sample<P: SkeletonProvider + ?Sized>(&mut self, live: &P, pool: &mut BoneBufferPool) {
        let Some(recording) = self.recording.as_mut() else {
            return;
        };
        self.samples_taken += 1;

        let time = self.tick_time;
        let (position, rotation) = live.root();

        let keep = match self.last_kept {
            None => true,
            Some(last) => {
                time - last.time > self.config.forced_keyframe_interval
                    || position.distance(last.position) > self.config.position_threshold
                    || last.rotation.angle_between(rotation).to_degrees()
                        > self.config.rotation_threshold_deg
            }
        };
        if !keep {
            return;
        }

        let mut bones = pool.acquire(self.bone_indices.len());
        let nodes = live.nodes();
        for (slot, &node_index) in bones.iter_mut().zip(&self.bone_indices) {
            *slot = nodes
                .get(node_index)
                .map(|node| node.bone_data())
                .unwrap_or_default();
        }

        recording.push_frame(Frame::new(time, position, rotation, bones));
        self.last_kept = Some(KeptSample {
            time,
            position,
            rotation,
        });
    }

    /// 记录离散事件，仅在录制期间生效
    pub fn push_event(&mut self, kind: EventKind) -> bool {
        match self.recording.as_mut() {
            Some(recording) => {
                recording.push_event(RecordedEvent {
                    time: self.tick_time,
                    kind,
                });
                true
            }
            None => false,
        }
    }

    /// 结束录制
    ///
    /// 没有保留任何帧时丢弃录制并返回 `None`。
    pub fn finish(&mut self) -> Option<Recording> {
        let recording = self.recording.take()?;
        self.accumulator = 0.0;
        self.last_kept = None;

        if recording.is_empty() {
            log::debug!("录制没有保留任何帧，已丢弃");
            return None;
        }
        Some(recording)
    }
}
