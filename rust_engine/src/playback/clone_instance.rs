//! 回放实例

use std::ops::Range;

use glam::{Quat, Vec3};

use crate::animation::{Frame, Recording};
use crate::config::LodConfig;
use crate::skeleton::SkeletonRig;
use crate::{EchoError, Result};

use super::LodLevel;

/// 池化的回放角色
///
/// 预热阶段创建一次，之后只在空闲与回放两种状态之间切换。
pub struct CloneInstance {
    type_index: usize,
    rig: Box<dyn SkeletonRig>,
    /// 当前分配的录制（按类型索引），空闲时为 None
    recording: Option<usize>,
    /// 本实例开始回放以来的未缩放秒数
    playback_time: f32,
    is_playing: bool,
    active: bool,
    distance_to_player: f32,
    lod: LodLevel,
    lod_counter: usize,
    /// 下一个待触发事件
    event_cursor: usize,
    /// 与录制骨骼数取较短者
    matched_bones: usize,
}

impl CloneInstance {
    pub fn new(type_index: usize, mut rig: Box<dyn SkeletonRig>) -> Self {
        rig.set_active(false);
        Self {
            type_index,
            rig,
            recording: None,
            playback_time: 0.0,
            is_playing: false,
            active: false,
            distance_to_player: 0.0,
            lod: LodLevel::Full,
            lod_counter: 0,
            event_cursor: 0,
            matched_bones: 0,
        }
    }

    pub fn type_index(&self) -> usize {
        self.type_index
    }

    pub fn rig(&self) -> &dyn SkeletonRig {
        self.rig.as_ref()
    }

    pub fn recording(&self) -> Option<usize> {
        self.recording
    }

    pub fn playback_time(&self) -> f32 {
        self.playback_time
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// 空闲：未播放、未激活、无录制
    pub fn is_idle(&self) -> bool {
        !self.is_playing && !self.active && self.recording.is_none()
    }

    pub fn distance_to_player(&self) -> f32 {
        self.distance_to_player
    }

    pub fn current_lod(&self) -> LodLevel {
        self.lod
    }

    pub fn bone_update_skip(&self) -> usize {
        self.lod.skip()
    }

    fn check_skeleton(&self, frame: &Frame) -> Result<()> {
        let expected = self.rig.bone_count();
        let actual = frame.bones.len();
        if expected != actual {
            return Err(EchoError::SkeletonMismatch { expected, actual });
        }
        Ok(())
    }

    /// 分配录制并把姿态对齐到第一帧
    pub fn assign(&mut self, recording: &mut Recording) -> Result<()> {
        recording.reset_smoothing();
        let first = recording.first_frame().ok_or(EchoError::EmptyRecording)?;

        if let Err(err) = self.check_skeleton(first) {
            log::warn!("回声类型 {}: {}，只驱动前若干骨骼", self.type_index, err);
        }
        self.matched_bones = self.rig.bone_count().min(first.bones.len());

        self.rig.set_root(first.position, first.rotation);
        for (index, bone) in first.bones.iter().take(self.matched_bones).enumerate() {
            self.rig.set_bone(index, bone);
        }

        self.recording = Some(recording.type_index());
        self.playback_time = 0.0;
        self.event_cursor = 0;
        self.lod = LodLevel::Full;
        self.lod_counter = 0;
        self.distance_to_player = 0.0;
        self.is_playing = true;
        self.active = true;
        self.rig.set_active(true);
        Ok(())
    }

    /// 推进本实例时钟
    pub fn advance(&mut self, delta_time: f32) {
        self.playback_time += delta_time.max(0.0);
    }

    /// 已到期事件在 `events` 中的范围，并前移游标
    pub fn take_due_events(&mut self, recording: &Recording) -> Range<usize> {
        let events = recording.events();
        let start = self.event_cursor.min(events.len());
        let end = start
            + events[start..]
                .iter()
                .take_while(|event| event.time <= self.playback_time)
                .count();
        self.event_cursor = end;
        start..end
    }

    pub fn apply_root(&mut self, position: Vec3, rotation: Quat) {
        self.rig.set_root(position, rotation);
    }

    /// 按与玩家的距离更新 LOD
    pub fn update_lod(&mut self, player_position: Vec3, config: &LodConfig) {
        self.distance_to_player = self.rig.root_position().distance(player_position);
        self.lod = LodLevel::classify(self.distance_to_player, config);
    }

    /// 写入骨骼，返回实际写入的骨骼数
    ///
    /// 只在 LOD 选中的 tick 写入，且只写每第 N 根骨骼；关键骨骼总是写入。
    pub fn apply_bones(&mut self, frame: &Frame, critical: &[usize], lod_enabled: bool) -> usize {
        let skip = if lod_enabled { self.lod.skip() } else { 1 };
        let tick = self.lod_counter;
        self.lod_counter = self.lod_counter.wrapping_add(1);
        if tick % skip != 0 {
            return 0;
        }

        let count = self.matched_bones.min(frame.bones.len());
        let mut written = 0;
        for (index, bone) in frame.bones.iter().take(count).enumerate() {
            if index % skip == 0 || critical.contains(&index) {
                self.rig.set_bone(index, bone);
                written += 1;
            }
        }
        written
    }

    /// 回到空闲状态
    pub fn release(&mut self) {
        self.is_playing = false;
        self.active = false;
        self.recording = None;
        self.rig.set_active(false);
    }
}
