//! 录制系统
//!
//! 采样器按固定频率捕获姿态并做阈值压缩，录制数据在回放时通过样条插值重建。

mod frame;
mod interpolation;
mod recording;
mod sampler;
mod store;

pub use frame::{EventKind, Frame, RecordedEvent, Surface};
pub use interpolation::{catmull_rom, coefficient, smooth_damp, smoothstep};
pub use recording::Recording;
pub use sampler::{Sampler, SamplerStatus};
pub use store::RecordingStore;
