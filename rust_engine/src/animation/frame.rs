//! 帧与离散事件

use glam::{Quat, Vec3};

use crate::skeleton::{BoneBufferPool, BoneData};

/// 某一时刻的姿态快照（根 + 骨骼）
///
/// 骨骼缓冲区只有一个所有者，因此不实现 `Clone`。
#[derive(Debug)]
pub struct Frame {
    /// 相对录制开始的秒数
    pub time: f32,
    pub position: Vec3,
    pub rotation: Quat,
    /// 与角色骨骼列表按索引对齐
    pub bones: Vec<BoneData>,
}

impl Frame {
    pub fn new(time: f32, position: Vec3, rotation: Quat, bones: Vec<BoneData>) -> Self {
        Self {
            time,
            position,
            rotation,
            bones,
        }
    }

    /// 空帧（无骨骼缓冲区）
    pub fn empty() -> Self {
        Self::new(0.0, Vec3::ZERO, Quat::IDENTITY, Vec::new())
    }

    /// 把骨骼缓冲区还给缓冲池
    ///
    /// 零骨骼的缓冲区同样归还，否则池的借出计数无法回落。
    pub fn release_bones(&mut self, pool: &mut BoneBufferPool) {
        pool.release(std::mem::take(&mut self.bones));
    }
}

/// 地面材质
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Surface {
    #[default]
    Default,
    Concrete,
    Metal,
    Grass,
    Water,
}

/// 事件负载
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Footstep { surface: Surface, running: bool },
    Jump { surface: Surface },
}

/// 录制期间发生的离散事件
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordedEvent {
    /// 相对录制开始的秒数
    pub time: f32,
    pub kind: EventKind,
}
