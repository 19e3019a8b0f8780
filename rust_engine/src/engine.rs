//! 引擎上下文
//!
//! 把采样器、录制存储、缓冲池、实例池与阶段控制器连成一个 tick。
//! 每个 tick 的顺序固定：
//! 1. 预热推进一步（未完成时）
//! 2. 应用排队的外部触发
//! 3. 阶段内工作与自动转移（录制上限、倒带结束）
//! 4. 玩家时钟缩放
//! 5. 回放根变换遍，随后骨骼遍，全部结束时清理回到 Idle

use std::collections::VecDeque;

use crate::animation::{EventKind, Frame, Recording, RecordingStore, Sampler, SamplerStatus};
use crate::config::EngineConfig;
use crate::phase::{EngineEvent, EventBus, Phase, PhaseController, Trigger};
use crate::playback::{CloneFactory, CloneInstancePool, WarmupTask};
use crate::skeleton::{discover_bones, BoneBufferPool, SkeletonProvider, SkeletonRig};
use crate::{EchoError, Result};

/// 玩家角色：录制时被读取，倒带时被写入
pub trait LiveActor: SkeletonProvider + SkeletonRig {
    /// 倒带期间禁用移动输入
    fn set_input_enabled(&mut self, _enabled: bool) {}
}

#[derive(Debug, Clone, Copy)]
struct RewindState {
    type_index: usize,
    elapsed: f32,
}

pub struct EchoEngine {
    config: EngineConfig,
    controller: PhaseController,
    bone_pool: BoneBufferPool,
    sampler: Sampler,
    recordings: RecordingStore,
    clone_pool: CloneInstancePool,
    warmup: WarmupTask,
    factory: Box<dyn CloneFactory>,
    /// 录制骨骼对应的玩家节点索引
    live_bone_indices: Vec<usize>,
    rewind: Option<RewindState>,
    triggers: VecDeque<Trigger>,
}

impl EchoEngine {
    /// 创建引擎，按玩家骨架发现录制骨骼并预热缓冲池
    ///
    /// 回放实例的预热在之后的 tick 中分步完成。
    pub fn new(
        config: EngineConfig,
        factory: Box<dyn CloneFactory>,
        live: &dyn SkeletonProvider,
    ) -> Self {
        let live_bone_indices = discover_bones(live);
        let bone_pool = BoneBufferPool::new(
            live_bone_indices.len(),
            config.pool_prewarm(),
            config.pool_cap(),
        );
        log::info!(
            "回声引擎初始化: {} 根骨骼, 缓冲池预热 {} 个, {} 个类型",
            live_bone_indices.len(),
            config.pool_prewarm(),
            config.types.len()
        );

        Self {
            controller: PhaseController::new(config.types.len(), config.time_scale.clone()),
            sampler: Sampler::new(
                config.sampler.clone(),
                config.reconstruct.clone(),
                live_bone_indices.clone(),
            ),
            recordings: RecordingStore::new(),
            clone_pool: CloneInstancePool::new(config.lod.clone()),
            warmup: WarmupTask::new(&config.types, config.warmup_per_tick),
            factory,
            live_bone_indices,
            rewind: None,
            triggers: VecDeque::new(),
            bone_pool,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    pub fn is_paused(&self) -> bool {
        self.controller.is_paused()
    }

    pub fn selected_type(&self) -> usize {
        self.controller.selected_type()
    }

    pub fn recordings(&self) -> &RecordingStore {
        &self.recordings
    }

    pub fn recording(&self, type_index: usize) -> Option<&Recording> {
        self.recordings.get(type_index)
    }

    pub fn recording_count(&self) -> usize {
        self.recordings.len()
    }

    pub fn has_recording(&self, type_index: usize) -> bool {
        self.recordings.contains(type_index)
    }

    pub fn bone_pool(&self) -> &BoneBufferPool {
        &self.bone_pool
    }

    pub fn clone_pool(&self) -> &CloneInstancePool {
        &self.clone_pool
    }

    pub fn is_pool_ready(&self) -> bool {
        self.clone_pool.is_ready()
    }

    /// 宿主应用到玩家时钟的缩放
    pub fn live_time_scale(&self) -> f32 {
        self.controller.time_scale().current()
    }

    pub fn live_input_enabled(&self) -> bool {
        self.controller.live_input_enabled()
    }

    pub fn bus(&self) -> &EventBus {
        self.controller.bus()
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&EngineEvent) + 'static) {
        self.controller.bus_mut().subscribe(subscriber);
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.controller.bus_mut().drain()
    }

    /// 排队外部触发，在下一个 tick 开始时应用
    pub fn request(&mut self, trigger: Trigger) {
        self.triggers.push_back(trigger);
    }

    /// 开始或停止录制
    pub fn toggle_recording(&mut self) -> bool {
        match self.controller.phase() {
            Phase::Idle | Phase::Review => self.start_recording(),
            Phase::Recording => self.stop_recording(),
            phase => {
                log::debug!("{:?} 阶段不能切换录制", phase);
                false
            }
        }
    }

    /// 从 Review 进入回放
    ///
    /// 不在 Review 阶段时返回 `Ok(false)`。
    pub fn start_playback(&mut self) -> Result<bool> {
        if self.controller.phase() != Phase::Review {
            log::debug!("{:?} 阶段不能开始回放", self.controller.phase());
            return Ok(false);
        }
        if self.recordings.is_empty() {
            return Err(EchoError::NoRecordings);
        }
        if !self.clone_pool.is_ready() {
            return Err(EchoError::PoolNotReady);
        }

        let count = self.clone_pool.checkout(&mut self.recordings);
        self.controller.transition(Phase::Playback);
        self.controller
            .bus_mut()
            .publish(EngineEvent::PlaybackStarted { count });
        Ok(true)
    }

    /// 提前结束回放，仍执行完整清理
    pub fn end_playback(&mut self) -> bool {
        if self.controller.phase() != Phase::Playback {
            return false;
        }
        self.finish_playback();
        true
    }

    pub fn set_paused(&mut self, paused: bool) -> bool {
        self.controller.set_paused(paused)
    }

    pub fn select_type(&mut self, type_index: usize) -> Result<bool> {
        self.controller.select_type(type_index)
    }

    /// 记录离散事件（脚步、跳跃），只在录制阶段生效
    pub fn push_event(&mut self, kind: EventKind) -> bool {
        self.controller.phase() == Phase::Recording && self.sampler.push_event(kind)
    }

    /// 推进一帧，`delta_time` 为未缩放帧间隔
    pub fn tick(&mut self, delta_time: f32, live: &mut dyn LiveActor) {
        let delta_time = delta_time.max(0.0);

        if !self.warmup.is_done() {
            self.warmup
                .step(&mut self.clone_pool, self.factory.as_mut(), &self.config.types);
        }

        while let Some(trigger) = self.triggers.pop_front() {
            self.apply_trigger(trigger);
        }

        match self.controller.phase() {
            Phase::Recording => {
                let status = self.sampler.step(delta_time, &*live, &mut self.bone_pool);
                if status == SamplerStatus::CapReached {
                    log::info!("达到最大录制时长 {:.2}s", self.sampler.elapsed());
                    self.stop_recording();
                }
            }
            Phase::Rewinding => self.step_rewind(delta_time, live),
            _ => {}
        }

        let config = &self.config;
        let scales = self
            .recordings
            .type_indices()
            .filter_map(|type_index| config.type_config(type_index))
            .map(|type_config| type_config.live_time_scale);
        self.controller.update_time_scale(scales, delta_time);

        if self.controller.phase() == Phase::Playback {
            let paused = self.controller.is_paused();
            let (player_position, _) = live.root();
            self.clone_pool.update_roots(
                &mut self.recordings,
                delta_time,
                paused,
                Some(player_position),
                self.controller.bus_mut(),
            );
            self.clone_pool.update_bones(&self.recordings);

            if !self.clone_pool.any_playing() {
                self.finish_playback();
            }
        }
    }

    fn apply_trigger(&mut self, trigger: Trigger) {
        match trigger {
            Trigger::ToggleRecording => {
                self.toggle_recording();
            }
            Trigger::StartPlayback => {
                if let Err(err) = self.start_playback() {
                    log::warn!("无法开始回放: {}", err);
                }
            }
            Trigger::EndPlayback => {
                self.end_playback();
            }
            Trigger::SetPaused(paused) => {
                self.set_paused(paused);
            }
            Trigger::SelectType(type_index) => {
                if let Err(err) = self.select_type(type_index) {
                    log::warn!("无法选择类型: {}", err);
                }
            }
        }
    }

    fn start_recording(&mut self) -> bool {
        let type_index = self.controller.selected_type();
        if !self.config.is_type_active(type_index) {
            log::warn!("回声类型 {} 未启用，不能录制", type_index);
            return false;
        }
        if self.recordings.contains(type_index) {
            log::debug!("回声类型 {} 已有录制", type_index);
            return false;
        }
        if !self.controller.transition(Phase::Recording) {
            return false;
        }

        self.sampler.begin(type_index);
        self.controller
            .bus_mut()
            .publish(EngineEvent::RecordingStarted { type_index });
        true
    }

    fn stop_recording(&mut self) -> bool {
        if !self.controller.transition(Phase::Rewinding) {
            return false;
        }

        let type_index = self.controller.selected_type();
        let (kept, frames) = match self.sampler.finish() {
            Some(mut recording) => {
                let frames = recording.len();
                let key = recording.type_index();
                recording.reset_smoothing();
                if let Some(mut previous) = self.recordings.insert(recording) {
                    previous.release_into(&mut self.bone_pool);
                }
                self.rewind = Some(RewindState {
                    type_index: key,
                    elapsed: 0.0,
                });
                (true, frames)
            }
            None => {
                self.rewind = None;
                (false, 0)
            }
        };

        log::info!("录制结束: 类型 {}, 保留 {} 帧", type_index, frames);
        self.controller.bus_mut().publish(EngineEvent::RecordingStopped {
            type_index,
            kept,
            frames,
        });
        true
    }

    /// 倒带：按递减时间把录制写回玩家角色
    fn step_rewind(&mut self, delta_time: f32, live: &mut dyn LiveActor) {
        live.set_input_enabled(false);

        let Some(rewind) = self.rewind.as_mut() else {
            self.finish_rewind(live);
            return;
        };
        rewind.elapsed += delta_time;
        let type_index = rewind.type_index;
        let progress = if self.config.rewind_duration > 0.0 {
            (rewind.elapsed / self.config.rewind_duration).min(1.0)
        } else {
            1.0
        };
        if progress >= 1.0 {
            self.finish_rewind(live);
            return;
        }

        let Some(recording) = self.recordings.get_mut(type_index) else {
            self.finish_rewind(live);
            return;
        };
        let t = recording.duration() * (1.0 - progress);
        match recording.frame_at_time(t, delta_time) {
            Ok(frame) => write_pose(live, frame, &self.live_bone_indices),
            Err(err) => log::warn!("倒带求值失败: {}", err),
        }
    }

    fn finish_rewind(&mut self, live: &mut dyn LiveActor) {
        if let Some(rewind) = self.rewind.take() {
            if let Some(recording) = self.recordings.get_mut(rewind.type_index) {
                if let Some(first) = recording.first_frame() {
                    write_pose(&mut *live, first, &self.live_bone_indices);
                }
                recording.reset_smoothing();
            }
        }

        live.set_input_enabled(true);
        if self.controller.transition(Phase::Review) {
            self.controller.bus_mut().publish(EngineEvent::RewindFinished);
        }
    }

    /// 回放结束清理：实例回到空闲，录制清空，缓冲区归还
    fn finish_playback(&mut self) {
        self.clone_pool.release_all();
        self.recordings.clear_into(&mut self.bone_pool);
        log::debug!(
            "回放清理完成: 缓冲池可用 {}, 借出 {}",
            self.bone_pool.available(),
            self.bone_pool.outstanding()
        );

        if self.controller.transition(Phase::Idle) {
            self.controller.bus_mut().publish(EngineEvent::PlaybackEnded);
        }
    }
}

fn write_pose<R: SkeletonRig + ?Sized>(rig: &mut R, frame: &Frame, bone_indices: &[usize]) {
    rig.set_root(frame.position, frame.rotation);
    for (bone, &node_index) in frame.bones.iter().zip(bone_indices) {
        rig.set_bone(node_index, bone);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CloneTypeConfig;
    use crate::testing::{TestActor, TestFactory};
    use glam::Vec3;
    use proptest::prelude::*;

    const DT: f32 = 1.0 / 60.0;

    fn test_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.sampler.max_record_duration = 1.0;
        config.rewind_duration = 0.2;
        config
    }

    fn setup(config: EngineConfig) -> (EchoEngine, TestActor, TestFactory) {
        let actor = TestActor::new(&["b0", "b1", "b2", "b3"]);
        let factory = TestFactory::new(4);
        let probe = TestFactory {
            bone_count: 4,
            created: factory.created.clone(),
        };
        let engine = EchoEngine::new(config, Box::new(factory), &actor);
        (engine, actor, probe)
    }

    fn run_until(engine: &mut EchoEngine, actor: &mut TestActor, phase: Phase, max_ticks: usize) {
        for _ in 0..max_ticks {
            if engine.phase() == phase {
                return;
            }
            engine.tick(DT, &mut *actor);
        }
        assert_eq!(engine.phase(), phase);
    }

    fn record(engine: &mut EchoEngine, actor: &mut TestActor, type_index: usize, ticks: usize) {
        assert_eq!(engine.select_type(type_index), Ok(true));
        assert!(engine.toggle_recording());
        for _ in 0..ticks {
            actor.position.x += 0.05;
            engine.tick(DT, &mut *actor);
        }
        engine.toggle_recording();
        run_until(engine, actor, Phase::Review, 200);
    }

    #[test]
    fn test_three_types_play_back_and_clean_up() {
        let (mut engine, mut actor, probe) = setup(test_config());
        for type_index in 0..3 {
            record(&mut engine, &mut actor, type_index, 20);
        }
        assert_eq!(engine.recording_count(), 3);
        assert!(engine.is_pool_ready());
        engine.drain_events();

        assert_eq!(engine.start_playback(), Ok(true));
        assert_eq!(engine.phase(), Phase::Playback);
        assert_eq!(engine.clone_pool().playing_count(), 3);
        for type_index in 0..3 {
            let instance = engine.clone_pool().instance(type_index).unwrap();
            assert_eq!(instance.playback_time(), 0.0);

            let first = engine.recording(type_index).unwrap().first_frame().unwrap().position;
            let state = probe.rig_state(type_index).unwrap();
            assert_eq!(state.borrow().position, first);
            assert!(state.borrow().active);
        }

        run_until(&mut engine, &mut actor, Phase::Idle, 200);
        assert_eq!(engine.recording_count(), 0);
        assert!(engine.clone_pool().instances().iter().all(|i| i.is_idle()));
        assert_eq!(engine.bone_pool().outstanding(), 0);
        assert_eq!(engine.bone_pool().fallback_allocations(), 0);
        assert_eq!(engine.bone_pool().available(), engine.bone_pool().prewarmed());

        let events = engine.drain_events();
        assert!(events.contains(&EngineEvent::PlaybackStarted { count: 3 }));
        assert!(events.contains(&EngineEvent::PlaybackEnded));
        let finished = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::EchoFinished { .. }))
            .count();
        assert_eq!(finished, 3);
    }

    #[test]
    fn test_rewind_drives_live_actor() {
        let (mut engine, mut actor, _probe) = setup(test_config());
        engine.select_type(0).unwrap();
        engine.toggle_recording();
        for _ in 0..30 {
            actor.position.x += 0.05;
            engine.tick(DT, &mut actor);
        }
        let end_x = actor.position.x;

        assert!(engine.toggle_recording());
        engine.tick(DT, &mut actor);
        assert_eq!(engine.phase(), Phase::Rewinding);
        assert!(!engine.live_input_enabled());
        assert!(!actor.input_enabled);
        assert!(actor.position.x < end_x);

        run_until(&mut engine, &mut actor, Phase::Review, 60);
        assert!(actor.input_enabled);
        let first = engine.recording(0).unwrap().first_frame().unwrap().position;
        assert!(actor.position.distance(first) < 1e-5);
    }

    #[test]
    fn test_record_cap_transitions_automatically() {
        let (mut engine, mut actor, _probe) = setup(test_config());
        engine.toggle_recording();
        for _ in 0..70 {
            actor.position.x += 0.05;
            engine.tick(DT, &mut actor);
        }

        assert_ne!(engine.phase(), Phase::Recording);
        assert!(engine.recording(0).unwrap().duration() <= 1.0);
        assert!(engine.drain_events().iter().any(|e| matches!(
            e,
            EngineEvent::RecordingStopped {
                type_index: 0,
                kept: true,
                ..
            }
        )));
    }

    #[test]
    fn test_discarded_recording_blocks_playback() {
        let (mut engine, mut actor, _probe) = setup(test_config());
        assert!(engine.toggle_recording());
        assert!(engine.toggle_recording());
        assert_eq!(engine.phase(), Phase::Rewinding);
        assert!(engine.drain_events().contains(&EngineEvent::RecordingStopped {
            type_index: 0,
            kept: false,
            frames: 0,
        }));

        engine.tick(DT, &mut actor);
        assert_eq!(engine.phase(), Phase::Review);
        assert_eq!(engine.start_playback(), Err(EchoError::NoRecordings));
        assert_eq!(engine.phase(), Phase::Review);
    }

    #[test]
    fn test_playback_waits_for_warmup() {
        let mut config = test_config();
        config.types = (0..40)
            .map(|i| CloneTypeConfig::new(format!("type{}", i), 1.0))
            .collect();
        let (mut engine, mut actor, _probe) = setup(config);

        record(&mut engine, &mut actor, 0, 5);
        assert!(!engine.is_pool_ready());
        assert_eq!(engine.start_playback(), Err(EchoError::PoolNotReady));

        for _ in 0..40 {
            engine.tick(DT, &mut actor);
        }
        assert!(engine.is_pool_ready());
        assert_eq!(engine.start_playback(), Ok(true));
    }

    #[test]
    fn test_start_playback_outside_review_is_ignored() {
        let (mut engine, _actor, _probe) = setup(test_config());
        assert_eq!(engine.start_playback(), Ok(false));
        assert!(!engine.end_playback());
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn test_early_end_runs_full_cleanup() {
        let (mut engine, mut actor, _probe) = setup(test_config());
        record(&mut engine, &mut actor, 0, 20);
        record(&mut engine, &mut actor, 1, 20);
        engine.start_playback().unwrap();
        engine.tick(DT, &mut actor);
        engine.tick(DT, &mut actor);
        assert!(engine.clone_pool().any_playing());

        engine.request(Trigger::EndPlayback);
        engine.tick(DT, &mut actor);
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.recording_count(), 0);
        assert_eq!(engine.bone_pool().outstanding(), 0);
        assert!(engine.clone_pool().instances().iter().all(|i| i.is_idle()));
    }

    #[test]
    fn test_time_scale_and_pause() {
        let (mut engine, mut actor, _probe) = setup(EngineConfig::default());
        // jumper: live_time_scale 0.4
        record(&mut engine, &mut actor, 2, 60);
        engine.start_playback().unwrap();
        assert_eq!(engine.live_time_scale(), 1.0);

        for _ in 0..10 {
            engine.tick(DT, &mut actor);
        }
        let scale = engine.live_time_scale();
        assert!(scale < 1.0 && scale > 0.4, "scale {}", scale);

        assert!(engine.set_paused(true));
        engine.tick(DT, &mut actor);
        assert_eq!(engine.live_time_scale(), 1.0);
        let time = engine.clone_pool().instance(2).unwrap().playback_time();
        for _ in 0..10 {
            engine.tick(DT, &mut actor);
        }
        assert_eq!(engine.clone_pool().instance(2).unwrap().playback_time(), time);
        assert_eq!(engine.phase(), Phase::Playback);

        engine.request(Trigger::SetPaused(false));
        engine.tick(DT, &mut actor);
        assert!(engine.clone_pool().instance(2).unwrap().playback_time() > time);
    }

    #[test]
    fn test_events_recorded_and_replayed() {
        let (mut engine, mut actor, _probe) = setup(test_config());
        let jump = EventKind::Jump {
            surface: crate::animation::Surface::Concrete,
        };
        assert!(!engine.push_event(jump));

        engine.toggle_recording();
        for tick in 0..20 {
            actor.position.x += 0.05;
            engine.tick(DT, &mut actor);
            if tick == 5 {
                assert!(engine.push_event(jump));
            }
        }
        engine.toggle_recording();
        run_until(&mut engine, &mut actor, Phase::Review, 60);
        assert_eq!(engine.recording(0).unwrap().events().len(), 1);

        engine.drain_events();
        engine.start_playback().unwrap();
        run_until(&mut engine, &mut actor, Phase::Idle, 200);
        let replayed = engine
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, EngineEvent::EchoEvent { type_index: 0, .. }))
            .count();
        assert_eq!(replayed, 1);
    }

    #[test]
    fn test_inactive_type_cannot_record() {
        let mut config = test_config();
        config.types[1].active = false;
        let (mut engine, _actor, _probe) = setup(config);

        assert_eq!(engine.select_type(1), Ok(true));
        assert!(!engine.toggle_recording());
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.select_type(9), Err(EchoError::UnknownType(9)));
    }

    #[test]
    fn test_zero_bone_skeleton_returns_buffers() {
        let mut actor = TestActor::new(&[]);
        let factory = TestFactory::new(0);
        let mut engine = EchoEngine::new(test_config(), Box::new(factory), &actor);
        assert_eq!(engine.bone_pool().bone_count(), 0);

        record(&mut engine, &mut actor, 0, 30);
        assert!(engine.bone_pool().outstanding() > 0);

        engine.start_playback().unwrap();
        run_until(&mut engine, &mut actor, Phase::Idle, 200);
        assert_eq!(engine.bone_pool().outstanding(), 0);
        assert_eq!(engine.bone_pool().available(), engine.bone_pool().prewarmed());
    }

    #[test]
    fn test_recorded_type_cannot_record_again() {
        let (mut engine, mut actor, _probe) = setup(test_config());
        record(&mut engine, &mut actor, 0, 10);
        assert!(!engine.toggle_recording());
        assert_eq!(engine.phase(), Phase::Review);

        assert_eq!(engine.select_type(1), Ok(true));
        assert!(engine.toggle_recording());
        assert_eq!(engine.phase(), Phase::Recording);
    }

    fn trigger_for(op: usize, arg: usize) -> Trigger {
        match op {
            0 => Trigger::ToggleRecording,
            1 => Trigger::StartPlayback,
            2 => Trigger::EndPlayback,
            3 => Trigger::SetPaused(arg % 2 == 0),
            _ => Trigger::SelectType(arg),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_phase_changes_follow_transition_table(
            ops in proptest::collection::vec((0usize..5, 0usize..3, 1usize..8), 1..40)
        ) {
            let mut config = test_config();
            config.sampler.max_record_duration = 0.5;
            config.rewind_duration = 0.1;
            let (mut engine, mut actor, _probe) = setup(config);

            for (op, arg, ticks) in ops {
                engine.request(trigger_for(op, arg));
                for _ in 0..ticks {
                    actor.position += Vec3::new(0.02, 0.0, 0.01);
                    engine.tick(DT, &mut actor);
                }

                for event in engine.drain_events() {
                    if let EngineEvent::PhaseChanged { old, new } = event {
                        prop_assert!(old.can_transition_to(new), "{:?} -> {:?}", old, new);
                    }
                }
                prop_assert_eq!(engine.live_input_enabled(), engine.phase() != Phase::Rewinding);
                if engine.phase() == Phase::Idle {
                    prop_assert_eq!(engine.recording_count(), 0);
                    prop_assert_eq!(engine.bone_pool().outstanding(), 0);
                }
            }
        }
    }
}
