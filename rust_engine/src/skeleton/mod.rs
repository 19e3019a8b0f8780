//! 骨骼数据、缓冲池与骨骼发现

mod bone_pool;
mod rig;

pub use bone_pool::BoneBufferPool;
pub use rig::{discover_bones, HumanBone, SkeletonNode, SkeletonProvider, SkeletonRig};

use glam::{Quat, Vec3};

/// 单个关节的本地变换
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneData {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for BoneData {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl BoneData {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// 位置线性插值，旋转球面插值
    pub fn interpolate(&self, other: &BoneData, t: f32) -> BoneData {
        BoneData {
            position: self.position.lerp(other.position, t),
            rotation: self.rotation.slerp(other.rotation, t),
        }
    }
}
