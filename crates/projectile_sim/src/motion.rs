//! MotionIntegrator
//!
//! Простая линейная интеграция: `pose.translation += velocity * dt`.
//! Hitbox = visual transform ∘ hitbox offset.

use bevy::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::config::{VelocityFn, VelocitySample, NOMINAL_FRAME_DT};
use crate::error::CallbackError;

/// Поза visual при spawn: origin, довёрнутый на rotation offset
pub fn spawn_pose(origin: Transform, rotation_offset: Quat) -> Transform {
    let mut pose = origin;
    pose.rotation = origin.rotation * rotation_offset;
    pose
}

pub fn hitbox_transform(visual: Transform, offset: Transform) -> Transform {
    visual.mul_transform(offset)
}

pub fn integrate(pose: Transform, velocity: Vec3, dt: f32) -> Transform {
    let mut next = pose;
    next.translation += velocity * dt;
    next
}

/// Пересчёт dynamic velocity. dt всегда номинальный (1/60).
/// Panic функции перехватывается и возвращается как `CallbackError::Panicked`.
pub fn sample_velocity(f: &mut VelocityFn, first: bool) -> Result<Vec3, CallbackError> {
    catch_unwind(AssertUnwindSafe(|| f(VelocitySample { first, dt: NOMINAL_FRAME_DT })))
        .map_err(CallbackError::from_panic)
}
