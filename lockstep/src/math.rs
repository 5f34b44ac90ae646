//! Quaternion helpers for root-state bookkeeping.
//!
//! Quaternion format is `[w, x, y, z]`. Euler angles use the roll-pitch-yaw
//! (XYZ intrinsic, ZYX extrinsic) convention.

use std::f32::consts::PI;

// ============================================================================
// Scalar Operations
// ============================================================================

/// Normalize a quaternion to unit length.
#[inline(always)]
pub fn quat_normalize(q: [f32; 4]) -> [f32; 4] {
    let norm = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if norm < 1e-10 {
        return [1.0, 0.0, 0.0, 0.0];
    }
    let inv = 1.0 / norm;
    [q[0] * inv, q[1] * inv, q[2] * inv, q[3] * inv]
}

/// Hamilton product `q1 * q2`.
#[inline(always)]
pub fn quat_mul(q1: [f32; 4], q2: [f32; 4]) -> [f32; 4] {
    let (w1, x1, y1, z1) = (q1[0], q1[1], q1[2], q1[3]);
    let (w2, x2, y2, z2) = (q2[0], q2[1], q2[2], q2[3]);
    [
        w1 * w2 - x1 * x2 - y1 * y2 - z1 * z2,
        w1 * x2 + x1 * w2 + y1 * z2 - z1 * y2,
        w1 * y2 - x1 * z2 + y1 * w2 + z1 * x2,
        w1 * z2 + x1 * y2 - y1 * x2 + z1 * w2,
    ]
}

#[inline(always)]
pub fn quat_conjugate(q: [f32; 4]) -> [f32; 4] {
    [q[0], -q[1], -q[2], -q[3]]
}

/// Quaternion from roll, pitch and yaw.
#[inline]
pub fn quat_from_euler_xyz(roll: f32, pitch: f32, yaw: f32) -> [f32; 4] {
    let (sr, cr) = (roll * 0.5).sin_cos();
    let (sp, cp) = (pitch * 0.5).sin_cos();
    let (sy, cy) = (yaw * 0.5).sin_cos();
    [
        cy * cr * cp + sy * sr * sp,
        cy * sr * cp - sy * cr * sp,
        cy * cr * sp + sy * sr * cp,
        sy * cr * cp - cy * sr * sp,
    ]
}

/// Roll, pitch and yaw of a quaternion.
#[inline]
pub fn quat_to_euler(q: [f32; 4]) -> [f32; 3] {
    let (w, x, y, z) = (q[0], q[1], q[2], q[3]);

    let sinr_cosp = 2.0 * (w * x + y * z);
    let cosr_cosp = 1.0 - 2.0 * (x * x + y * y);
    let roll = sinr_cosp.atan2(cosr_cosp);

    let sinp = 2.0 * (w * y - z * x);
    let pitch = if sinp.abs() >= 1.0 {
        (PI / 2.0).copysign(sinp)
    } else {
        sinp.asin()
    };

    let siny_cosp = 2.0 * (w * z + x * y);
    let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
    let yaw = siny_cosp.atan2(cosy_cosp);

    [roll, pitch, yaw]
}

/// Rotate `v` by `q` (body to world).
#[inline]
pub fn quat_apply(q: [f32; 4], v: [f32; 3]) -> [f32; 3] {
    let (w, u) = (q[0], [q[1], q[2], q[3]]);
    let t = scale(cross(u, v), 2.0);
    let ut = cross(u, t);
    [
        v[0] + w * t[0] + ut[0],
        v[1] + w * t[1] + ut[1],
        v[2] + w * t[2] + ut[2],
    ]
}

/// Rotate `v` by the inverse of `q` (world to body).
#[inline]
pub fn quat_apply_inverse(q: [f32; 4], v: [f32; 3]) -> [f32; 3] {
    quat_apply(quat_conjugate(q), v)
}

/// World gravity direction `(0, 0, -1)` expressed in the body frame.
#[inline]
pub fn projected_gravity(q: [f32; 4]) -> [f32; 3] {
    quat_apply_inverse(q, [0.0, 0.0, -1.0])
}

/// Integrate orientation with a world-frame angular velocity.
#[inline]
pub fn quat_integrate(q: [f32; 4], omega: [f32; 3], dt: f32) -> [f32; 4] {
    let norm = (omega[0] * omega[0] + omega[1] * omega[1] + omega[2] * omega[2]).sqrt();
    if norm < 1e-10 {
        return q;
    }
    let half_theta = norm * dt * 0.5;
    let s = half_theta.sin() / norm;
    let dq = [half_theta.cos(), s * omega[0], s * omega[1], s * omega[2]];
    quat_normalize(quat_mul(dq, q))
}

#[inline(always)]
fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline(always)]
fn scale(a: [f32; 3], s: f32) -> [f32; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}
