//! 骨架接口与骨骼发现
//!
//! 读端 [`SkeletonProvider`] 由玩家角色实现，写端 [`SkeletonRig`] 由回放实例
//! （以及倒带时的玩家角色）实现。

use std::collections::HashSet;

use glam::{Quat, Vec3};
use once_cell::sync::Lazy;

use super::BoneData;

/// 人形骨骼，顺序即发现顺序
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HumanBone {
    Hips,
    Spine,
    Chest,
    Neck,
    Head,
    LeftUpperArm,
    LeftLowerArm,
    LeftHand,
    RightUpperArm,
    RightLowerArm,
    RightHand,
    LeftUpperLeg,
    LeftLowerLeg,
    LeftFoot,
    RightUpperLeg,
    RightLowerLeg,
    RightFoot,
}

impl HumanBone {
    pub const ALL: [HumanBone; 17] = [
        HumanBone::Hips,
        HumanBone::Spine,
        HumanBone::Chest,
        HumanBone::Neck,
        HumanBone::Head,
        HumanBone::LeftUpperArm,
        HumanBone::LeftLowerArm,
        HumanBone::LeftHand,
        HumanBone::RightUpperArm,
        HumanBone::RightLowerArm,
        HumanBone::RightHand,
        HumanBone::LeftUpperLeg,
        HumanBone::LeftLowerLeg,
        HumanBone::LeftFoot,
        HumanBone::RightUpperLeg,
        HumanBone::RightLowerLeg,
        HumanBone::RightFoot,
    ];
}

/// 非人形骨架按名称子串匹配时使用的关键字（小写）
static HUMANOID_NAME_KEYS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "hips", "pelvis", "spine", "chest", "neck", "head",
        "shoulder", "arm", "elbow", "hand",
        "thigh", "leg", "knee", "foot",
    ]
});

/// 骨架中的单个变换节点
#[derive(Clone, Debug)]
pub struct SkeletonNode {
    pub name: String,
    pub local_position: Vec3,
    pub local_rotation: Quat,
}

impl SkeletonNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local_position: Vec3::ZERO,
            local_rotation: Quat::IDENTITY,
        }
    }

    pub fn bone_data(&self) -> BoneData {
        BoneData::new(self.local_position, self.local_rotation)
    }
}

/// 可被采样的骨架
pub trait SkeletonProvider {
    /// 根变换（世界空间）
    fn root(&self) -> (Vec3, Quat);

    /// 所有变换节点，顺序固定
    fn nodes(&self) -> &[SkeletonNode];

    /// 是否支持标准人形映射
    fn is_humanoid(&self) -> bool {
        false
    }

    /// 人形骨骼对应的节点索引
    fn humanoid_bone(&self, _bone: HumanBone) -> Option<usize> {
        None
    }
}

/// 可被驱动的骨架
pub trait SkeletonRig {
    fn set_root(&mut self, position: Vec3, rotation: Quat);

    fn root_position(&self) -> Vec3;

    /// 骨骼句柄数量
    fn bone_count(&self) -> usize;

    fn set_bone(&mut self, index: usize, bone: &BoneData);

    /// 激活/停用（隐藏）实例
    fn set_active(&mut self, _active: bool) {}
}

/// 发现需要录制的骨骼，返回节点索引列表
///
/// 1. 人形映射
/// 2. 名称子串匹配
/// 3. 全部节点
pub fn discover_bones(provider: &dyn SkeletonProvider) -> Vec<usize> {
    let node_count = provider.nodes().len();
    let mut seen = HashSet::new();
    let mut indices = Vec::new();

    if provider.is_humanoid() {
        for bone in HumanBone::ALL {
            if let Some(index) = provider.humanoid_bone(bone) {
                if index < node_count && seen.insert(index) {
                    indices.push(index);
                }
            }
        }
        if !indices.is_empty() {
            return indices;
        }
        log::debug!("人形映射为空，改用名称匹配");
    }

    for (index, node) in provider.nodes().iter().enumerate() {
        let name = node.name.to_lowercase();
        if HUMANOID_NAME_KEYS.iter().any(|key| name.contains(key)) && seen.insert(index) {
            indices.push(index);
        }
    }
    if !indices.is_empty() {
        return indices;
    }

    log::debug!("名称匹配失败，录制全部 {} 个节点", node_count);
    (0..node_count).collect()
}
