//! 骨骼缓冲池
//!
//! 录制期间每个保留的采样都需要一组骨骼数据。缓冲区在池 → Frame → 池之间
//! 转移所有权，稳态下不再分配。

use std::collections::VecDeque;

use super::BoneData;

/// 固定骨骼数的缓冲池
#[derive(Debug)]
pub struct BoneBufferPool {
    bone_count: usize,
    queue: VecDeque<Vec<BoneData>>,
    /// 队列长度上限，超出的缓冲区直接丢弃
    cap: usize,
    prewarmed: usize,
    fallback_allocations: usize,
    /// 当前借出的缓冲区数量
    outstanding: usize,
}

impl BoneBufferPool {
    /// 创建并预热 `prewarm` 个缓冲区
    pub fn new(bone_count: usize, prewarm: usize, cap: usize) -> Self {
        let cap = cap.max(prewarm);
        let mut queue = VecDeque::with_capacity(cap);
        for _ in 0..prewarm {
            queue.push_back(vec![BoneData::default(); bone_count]);
        }

        Self {
            bone_count,
            queue,
            cap,
            prewarmed: prewarm,
            fallback_allocations: 0,
            outstanding: 0,
        }
    }

    /// 获取长度恰好为 `bone_count` 的缓冲区
    ///
    /// 优先复用队列中的缓冲区；队列为空或长度与池不一致时直接分配。
    pub fn acquire(&mut self, bone_count: usize) -> Vec<BoneData> {
        self.outstanding += 1;

        if bone_count == self.bone_count {
            if let Some(buffer) = self.queue.pop_front() {
                return buffer;
            }
        }

        self.fallback_allocations += 1;
        log::debug!(
            "骨骼缓冲池回退分配: 请求 {} 根骨骼, 池骨骼数 {}, 累计 {} 次",
            bone_count,
            self.bone_count,
            self.fallback_allocations
        );
        vec![BoneData::default(); bone_count]
    }

    /// 归还缓冲区
    ///
    /// 长度不匹配或队列已满时丢弃。
    pub fn release(&mut self, buffer: Vec<BoneData>) {
        self.outstanding = self.outstanding.saturating_sub(1);

        if buffer.len() != self.bone_count || self.queue.len() >= self.cap {
            return;
        }
        self.queue.push_back(buffer);
    }

    /// 池的骨骼数
    pub fn bone_count(&self) -> usize {
        self.bone_count
    }

    /// 队列中可用的缓冲区数量
    pub fn available(&self) -> usize {
        self.queue.len()
    }

    /// 借出未归还的缓冲区数量
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// 预热数量
    pub fn prewarmed(&self) -> usize {
        self.prewarmed
    }

    /// 自上次重置以来的回退分配次数
    pub fn fallback_allocations(&self) -> usize {
        self.fallback_allocations
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// 重置统计（不影响队列内容）
    pub fn reset_stats(&mut self) {
        self.prewarmed = self.queue.len() + self.outstanding;
        self.fallback_allocations = 0;
    }
}
