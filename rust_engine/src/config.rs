//! 引擎配置
//!
//! 参数按子系统分组，默认值直接写在 `Default` 实现里。

/// 采样器配置
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// 每秒采样次数，默认 30.0
    pub sample_rate: f32,
    /// 强制关键帧间隔（秒），默认 0.5
    pub forced_keyframe_interval: f32,
    /// 位置阈值（米），默认 0.01
    pub position_threshold: f32,
    /// 旋转阈值（角度），默认 1.0
    pub rotation_threshold_deg: f32,
    /// 最大录制时长（秒），默认 10.0
    pub max_record_duration: f32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            // 与渲染帧率无关，按累积时间触发
            sample_rate: 30.0,
            // 静止时也至少每 0.5 秒保留一帧
            forced_keyframe_interval: 0.5,
            position_threshold: 0.01,
            rotation_threshold_deg: 1.0,
            // 录制长度有上限，到达后强制结束录制
            max_record_duration: 10.0,
        }
    }
}

impl SamplerConfig {
    /// 采样间隔（秒）
    pub fn sample_interval(&self) -> f32 {
        1.0 / self.sample_rate.max(1.0)
    }

    /// 覆盖最大录制时长所需的骨骼缓冲区数量
    pub fn frames_per_recording(&self) -> usize {
        (self.max_record_duration * self.sample_rate).ceil().max(0.0) as usize
    }
}

/// 重建（样条插值 + 平滑）配置
#[derive(Debug, Clone)]
pub struct ReconstructConfig {
    /// 是否对局部参数 u 做 smoothstep，默认 true
    pub ease: bool,
    /// 旋转阻尼系数：每次查询从上一次输出向新结果靠近的比例，默认 0.2
    pub rotation_damping: f32,
    /// 位置 smooth-damp 时间常数（秒），默认 0.03
    pub position_smooth_time: f32,
    /// 两次查询时间差超过该值视为跳转，跳过位置平滑，默认 0.1
    pub seek_threshold: f32,
    /// 关键帧间隔小于该值时 u 取 0，默认 1e-4
    pub segment_epsilon: f32,
}

impl Default for ReconstructConfig {
    fn default() -> Self {
        Self {
            ease: true,
            rotation_damping: 0.2,
            position_smooth_time: 0.03,
            seek_threshold: 0.1,
            segment_epsilon: 1e-4,
        }
    }
}

/// 距离 LOD 配置
#[derive(Debug, Clone)]
pub struct LodConfig {
    /// 是否启用 LOD，默认 true
    pub enabled: bool,
    /// 超过该距离进入 LOD 1（隔帧更新），默认 10.0
    pub near_distance: f32,
    /// 超过该距离进入 LOD 2（每 4 帧更新），默认 25.0
    pub far_distance: f32,
    /// 关键骨骼索引（脊柱、头部等），任何 LOD 下都更新
    pub critical_bones: Vec<usize>,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            near_distance: 10.0,
            far_distance: 25.0,
            // 人形发现顺序中的 髋/脊柱/胸/颈/头
            critical_bones: vec![0, 1, 2, 3, 4],
        }
    }
}

/// 玩家时钟缩放配置
#[derive(Debug, Clone)]
pub struct TimeScaleConfig {
    /// 最小缩放，默认 0.2
    pub min_scale: f32,
    /// 最大缩放，默认 1.0
    pub max_scale: f32,
    /// 趋近目标的速度（每秒），默认 4.0
    pub smoothing_speed: f32,
}

impl Default for TimeScaleConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.2,
            max_scale: 1.0,
            smoothing_speed: 4.0,
        }
    }
}

/// 回声类型配置
#[derive(Debug, Clone)]
pub struct CloneTypeConfig {
    pub name: String,
    /// 未启用的类型不会预热实例，也不能被选中录制
    pub active: bool,
    /// 该类型有录制时，回放期间玩家时钟的目标缩放
    pub live_time_scale: f32,
}

impl CloneTypeConfig {
    pub fn new(name: impl Into<String>, live_time_scale: f32) -> Self {
        Self {
            name: name.into(),
            active: true,
            live_time_scale,
        }
    }
}

/// 引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sampler: SamplerConfig,
    pub reconstruct: ReconstructConfig,
    pub lod: LodConfig,
    pub time_scale: TimeScaleConfig,
    pub types: Vec<CloneTypeConfig>,

    /// 倒带动画时长（秒），与录制本身长度无关，默认 1.5
    pub rewind_duration: f32,
    /// 缓冲池预留的额外缓冲区数量，默认 8
    pub pool_headroom: usize,
    /// 每个预热 tick 创建的实例数，默认 1
    pub warmup_per_tick: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            reconstruct: ReconstructConfig::default(),
            lod: LodConfig::default(),
            time_scale: TimeScaleConfig::default(),
            types: vec![
                CloneTypeConfig::new("walker", 1.0),
                CloneTypeConfig::new("runner", 0.6),
                CloneTypeConfig::new("jumper", 0.4),
            ],
            rewind_duration: 1.5,
            pool_headroom: 8,
            // 实例化开销大，分散到多个 tick
            warmup_per_tick: 1,
        }
    }
}

impl EngineConfig {
    /// 缓冲池预热数量：覆盖一段完整录制再加余量
    pub fn pool_prewarm(&self) -> usize {
        self.sampler.frames_per_recording() + self.pool_headroom
    }

    /// 缓冲池队列上限
    pub fn pool_cap(&self) -> usize {
        self.pool_prewarm() * 2
    }

    pub fn type_config(&self, type_index: usize) -> Option<&CloneTypeConfig> {
        self.types.get(type_index)
    }

    pub fn is_type_active(&self, type_index: usize) -> bool {
        self.types.get(type_index).map(|t| t.active).unwrap_or(false)
    }
}
