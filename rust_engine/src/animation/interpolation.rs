//! 插值工具

use glam::Vec3;

/// smoothstep 缓动：u²(3 - 2u)
#[inline]
pub fn smoothstep(u: f32) -> f32 {
    let u = u.clamp(0.0, 1.0);
    u * u * (3.0 - 2.0 * u)
}

/// 区间内的局部参数，区间过短时返回 0
#[inline]
pub fn coefficient(start: f32, end: f32, t: f32, epsilon: f32) -> f32 {
    let span = end - start;
    if span < epsilon {
        return 0.0;
    }
    ((t - start) / span).clamp(0.0, 1.0)
}

/// Catmull-Rom 样条，曲线经过 p1 (u = 0) 与 p2 (u = 1)
#[inline]
pub fn catmull_rom(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, u: f32) -> Vec3 {
    let u2 = u * u;
    let u3 = u2 * u;

    0.5 * (2.0 * p1
        + (-p0 + p2) * u
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * u2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * u3)
}

/// 临界阻尼弹簧平滑，不限最大速度
///
/// `velocity` 在调用间保留。`delta_time <= 0` 时返回 `current`。
pub fn smooth_damp(
    current: Vec3,
    target: Vec3,
    velocity: &mut Vec3,
    smooth_time: f32,
    delta_time: f32,
) -> Vec3 {
    if delta_time <= 0.0 {
        return current;
    }

    let smooth_time = smooth_time.max(1e-4);
    let omega = 2.0 / smooth_time;
    let x = omega * delta_time;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = current - target;
    let temp = (*velocity + omega * change) * delta_time;
    *velocity = (*velocity - omega * temp) * exp;
    let mut output = target + (change + temp) * exp;

    // 防止越过目标
    if (target - current).dot(output - target) > 0.0 {
        output = target;
        *velocity = Vec3::ZERO;
    }

    output
}
