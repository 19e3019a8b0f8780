//! 回声实例池
//!
//! 每个类型至多一个实例，预热后不再增长。回放期间每 tick 分两遍更新：
//! 先推进时钟并写根变换，稍后再按 LOD 写骨骼。

use glam::Vec3;

use crate::animation::RecordingStore;
use crate::config::LodConfig;
use crate::phase::{EngineEvent, EventBus};

use super::CloneInstance;

/// 回声实例池
pub struct CloneInstancePool {
    instances: Vec<CloneInstance>,
    ready: bool,
    lod: LodConfig,
}

impl CloneInstancePool {
    pub fn new(lod: LodConfig) -> Self {
        Self {
            instances: Vec::new(),
            ready: false,
            lod,
        }
    }

    /// 加入实例，同类型已存在时拒绝
    pub fn insert(&mut self, instance: CloneInstance) -> bool {
        if self.instance(instance.type_index()).is_some() {
            log::warn!("回声类型 {} 已有实例，忽略", instance.type_index());
            return false;
        }
        self.instances.push(instance);
        true
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// 预热是否完成
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instance(&self, type_index: usize) -> Option<&CloneInstance> {
        self.instances.iter().find(|i| i.type_index() == type_index)
    }

    pub fn instances(&self) -> &[CloneInstance] {
        &self.instances
    }

    pub fn lod_config(&self) -> &LodConfig {
        &self.lod
    }

    pub fn playing_count(&self) -> usize {
        self.instances.iter().filter(|i| i.is_playing()).count()
    }

    pub fn any_playing(&self) -> bool {
        self.instances.iter().any(|i| i.is_playing())
    }

    /// 为每段录制检出对应类型的实例，返回检出数量
    pub fn checkout(&mut self, recordings: &mut RecordingStore) -> usize {
        let mut count = 0;
        let types: Vec<usize> = recordings.type_indices().collect();

        for type_index in types {
            let Some(recording) = recordings.get_mut(type_index) else {
                continue;
            };
            let Some(instance) = self.instances.iter_mut().find(|i| i.type_index() == type_index) else {
                log::warn!("回声类型 {} 没有预热实例，跳过", type_index);
                continue;
            };

            match instance.assign(recording) {
                Ok(()) => count += 1,
                Err(err) => log::warn!("回声类型 {} 检出失败: {}", type_index, err),
            }
        }

        count
    }

    /// 根变换遍：推进时钟、触发事件、写根变换、更新 LOD
    ///
    /// `delta_time` 为未缩放帧间隔，暂停时时钟不前进、姿态保持。
    pub fn update_roots(
        &mut self,
        recordings: &mut RecordingStore,
        delta_time: f32,
        paused: bool,
        player_position: Option<Vec3>,
        bus: &mut EventBus,
    ) {
        let dt = if paused { 0.0 } else { delta_time };

        for instance in self.instances.iter_mut().filter(|i| i.is_playing()) {
            let type_index = instance.type_index();
            let recording = match instance.recording() {
                Some(key) => recordings.get_mut(key),
                None => None,
            };
            let Some(recording) = recording else {
                instance.release();
                continue;
            };

            instance.advance(dt);

            let due = instance.take_due_events(recording);
            for event in &recording.events()[due] {
                bus.publish(EngineEvent::EchoEvent {
                    type_index,
                    event: *event,
                });
            }

            if instance.playback_time() >= recording.duration() {
                instance.release();
                bus.publish(EngineEvent::EchoFinished { type_index });
                continue;
            }

            if !paused {
                match recording.frame_at_time(instance.playback_time(), dt) {
                    Ok(frame) => instance.apply_root(frame.position, frame.rotation),
                    Err(err) => {
                        log::warn!("回声类型 {} 求值失败: {}", type_index, err);
                        instance.release();
                        continue;
                    }
                }
            }

            if self.lod.enabled {
                if let Some(player) = player_position {
                    instance.update_lod(player, &self.lod);
                }
            }
        }
    }

    /// 骨骼遍：按 LOD 把当前帧的骨骼写入实例
    pub fn update_bones(&mut self, recordings: &RecordingStore) {
        for instance in self.instances.iter_mut().filter(|i| i.is_playing()) {
            let Some(frame) = instance
                .recording()
                .and_then(|key| recordings.get(key))
                .and_then(|recording| recording.current_frame())
            else {
                continue;
            };
            instance.apply_bones(frame, &self.lod.critical_bones, self.lod.enabled);
        }
    }

    /// 所有实例回到空闲状态
    pub fn release_all(&mut self) {
        for instance in &mut self.instances {
            instance.release();
        }
    }
}
