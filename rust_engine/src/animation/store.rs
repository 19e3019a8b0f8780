//! 按角色类型保存的录制

use std::collections::BTreeMap;

use crate::skeleton::BoneBufferPool;

use super::Recording;

/// 每个类型最多一段录制
#[derive(Debug, Default)]
pub struct RecordingStore {
    recordings: BTreeMap<usize, Recording>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存录制，返回被替换的旧录制
    pub fn insert(&mut self, recording: Recording) -> Option<Recording> {
        self.recordings.insert(recording.type_index(), recording)
    }

    pub fn contains(&self, type_index: usize) -> bool {
        self.recordings.contains_key(&type_index)
    }

    pub fn get(&self, type_index: usize) -> Option<&Recording> {
        self.recordings.get(&type_index)
    }

    pub fn get_mut(&mut self, type_index: usize) -> Option<&mut Recording> {
        self.recordings.get_mut(&type_index)
    }

    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }

    /// 已保存录制的类型，升序
    pub fn type_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.recordings.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recording> {
        self.recordings.values()
    }

    /// 清空所有录制并归还骨骼缓冲区
    pub fn clear_into(&mut self, pool: &mut BoneBufferPool) {
        for recording in self.recordings.values_mut() {
            recording.release_into(pool);
        }
        self.recordings.clear();
    }
}
