//! 测试用骨架与工厂

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Quat, Vec3};

use crate::animation::{Frame, Recording};
use crate::config::{CloneTypeConfig, ReconstructConfig};
use crate::engine::LiveActor;
use crate::playback::CloneFactory;
use crate::skeleton::{BoneData, SkeletonNode, SkeletonProvider, SkeletonRig};

#[derive(Debug, Default)]
pub(crate) struct RigState {
    pub position: Vec3,
    pub rotation: Quat,
    pub bones: Vec<BoneData>,
    pub bone_writes: usize,
    pub active: bool,
}

/// 把写入记录到共享状态里的骨架
pub(crate) struct TestRig {
    pub state: Rc<RefCell<RigState>>,
}

impl TestRig {
    pub fn new(bone_count: usize) -> (Self, Rc<RefCell<RigState>>) {
        let state = Rc::new(RefCell::new(RigState {
            bones: vec![BoneData::default(); bone_count],
            ..RigState::default()
        }));
        (Self { state: state.clone() }, state)
    }
}

impl SkeletonRig for TestRig {
    fn set_root(&mut self, position: Vec3, rotation: Quat) {
        let mut state = self.state.borrow_mut();
        state.position = position;
        state.rotation = rotation;
    }

    fn root_position(&self) -> Vec3 {
        self.state.borrow().position
    }

    fn bone_count(&self) -> usize {
        self.state.borrow().bones.len()
    }

    fn set_bone(&mut self, index: usize, bone: &BoneData) {
        let mut state = self.state.borrow_mut();
        if let Some(slot) = state.bones.get_mut(index) {
            *slot = *bone;
        }
        state.bone_writes += 1;
    }

    fn set_active(&mut self, active: bool) {
        self.state.borrow_mut().active = active;
    }
}

/// 按类型记录创建出的骨架
pub(crate) struct TestFactory {
    pub bone_count: usize,
    pub created: Rc<RefCell<Vec<(usize, Rc<RefCell<RigState>>)>>>,
}

impl TestFactory {
    pub fn new(bone_count: usize) -> Self {
        Self {
            bone_count,
            created: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn rig_state(&self, type_index: usize) -> Option<Rc<RefCell<RigState>>> {
        self.created
            .borrow()
            .iter()
            .find(|(t, _)| *t == type_index)
            .map(|(_, state)| state.clone())
    }
}

impl CloneFactory for TestFactory {
    fn create(&mut self, type_index: usize, _config: &CloneTypeConfig) -> Box<dyn SkeletonRig> {
        let (rig, state) = TestRig::new(self.bone_count);
        self.created.borrow_mut().push((type_index, state));
        Box::new(rig)
    }
}

/// 玩家角色
pub(crate) struct TestActor {
    pub position: Vec3,
    pub rotation: Quat,
    pub nodes: Vec<SkeletonNode>,
    pub input_enabled: bool,
}

impl TestActor {
    pub fn new(bone_names: &[&str]) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            nodes: bone_names.iter().map(|n| SkeletonNode::new(*n)).collect(),
            input_enabled: true,
        }
    }
}

impl SkeletonProvider for TestActor {
    fn root(&self) -> (Vec3, Quat) {
        (self.position, self.rotation)
    }

    fn nodes(&self) -> &[SkeletonNode] {
        &self.nodes
    }
}

impl SkeletonRig for TestActor {
    fn set_root(&mut self, position: Vec3, rotation: Quat) {
        self.position = position;
        self.rotation = rotation;
    }

    fn root_position(&self) -> Vec3 {
        self.position
    }

    fn bone_count(&self) -> usize {
        self.nodes.len()
    }

    fn set_bone(&mut self, index: usize, bone: &BoneData) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.local_position = bone.position;
            node.local_rotation = bone.rotation;
        }
    }
}

impl LiveActor for TestActor {
    fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
    }
}

/// 直线运动的录制，每帧带 `bone_count` 根骨骼
pub(crate) fn linear_recording(type_index: usize, frames: usize, spacing: f32, bone_count: usize) -> Recording {
    let mut recording = Recording::new(type_index, ReconstructConfig::default());
    for k in 0..frames {
        let time = k as f32 * spacing;
        let bones = (0..bone_count)
            .map(|b| BoneData::new(Vec3::new(b as f32, time, 0.0), Quat::IDENTITY))
            .collect();
        recording.push_frame(Frame::new(time, Vec3::new(time, 0.0, 0.0), Quat::IDENTITY, bones));
    }
    recording
}
