//! 引擎事件总线

use std::collections::VecDeque;
use std::fmt;

use crate::animation::RecordedEvent;

use super::Phase;

/// 队列上限，超出时丢弃最旧事件
const MAX_QUEUED_EVENTS: usize = 256;

/// 引擎对外发布的事件
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EngineEvent {
    PhaseChanged { old: Phase, new: Phase },
    RecordingStarted { type_index: usize },
    RecordingStopped { type_index: usize, kept: bool, frames: usize },
    RewindFinished,
    PlaybackStarted { count: usize },
    PlaybackEnded,
    PlaybackPaused,
    PlaybackResumed,
    /// 某个回声播放完毕
    EchoFinished { type_index: usize },
    /// 回声重放录制时的离散事件（脚步、跳跃）
    EchoEvent { type_index: usize, event: RecordedEvent },
}

type Subscriber = Box<dyn FnMut(&EngineEvent)>;

/// 事件总线：同步回调 + 可拉取的队列
#[derive(Default)]
pub struct EventBus {
    queue: VecDeque<EngineEvent>,
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册回调，发布时同步调用
    pub fn subscribe(&mut self, subscriber: impl FnMut(&EngineEvent) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn publish(&mut self, event: EngineEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }

        if self.queue.len() >= MAX_QUEUED_EVENTS {
            self.queue.pop_front();
            log::debug!("事件队列已满，丢弃最旧事件");
        }
        self.queue.push_back(event);
    }

    /// 取出所有排队事件
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        self.queue.drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("queue", &self.queue)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
