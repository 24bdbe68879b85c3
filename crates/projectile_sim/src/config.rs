//! Конфигурация projectile
//!
//! - `ProjectileTuning` - plain data (serde/TOML), все поля с default
//! - `ProjectileConfig` - runtime конфиг spawn'а (velocity source, targeting, ignore list)

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ConfigError, ProjectileError};

/// Время жизни по умолчанию (секунды)
pub const DEFAULT_LAST_TIME: f32 = 2.0;

/// Частота tick по умолчанию (Hz)
pub const DEFAULT_TICK_FREQUENCY: f32 = 60.0;

/// Номинальный frame interval, который получает dynamic velocity функция.
/// Всегда 1/60, независимо от tick frequency и реального dt.
pub const NOMINAL_FRAME_DT: f32 = 1.0 / 60.0;

/// Политика: какие акторы могут получить hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetingMode {
    #[default]
    Unrestricted,
    /// За всю жизнь projectile - максимум одна цель
    SingleHitEver,
    /// Только указанный актор
    SpecificActorOnly(Entity),
}

/// Аргумент dynamic velocity функции
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocitySample {
    /// true только при spawn
    pub first: bool,
    /// Всегда `NOMINAL_FRAME_DT`
    pub dt: f32,
}

pub type VelocityFn = Box<dyn FnMut(VelocitySample) -> Vec3 + Send>;

pub enum VelocitySource {
    Constant(Vec3),
    Dynamic(VelocityFn),
}

impl VelocitySource {
    pub fn dynamic(f: impl FnMut(VelocitySample) -> Vec3 + Send + 'static) -> Self {
        Self::Dynamic(Box::new(f))
    }
}

impl Default for VelocitySource {
    fn default() -> Self {
        Self::Constant(Vec3::ZERO)
    }
}

impl fmt::Debug for VelocitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VelocitySource::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            VelocitySource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Tuning projectile (TOML / пресеты)
///
/// Векторы как `[f32; 3]`, чтобы не тянуть serde feature в bevy math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileTuning {
    /// Скорость вдоль forward (м/с), используется `velocity_along`
    pub speed: f32,
    /// Максимальное время жизни (секунды)
    pub last_time: f32,
    /// Частота tick (Hz)
    pub tick_frequency: f32,
    /// Полный размер hitbox (не half extents)
    pub hitbox_size: [f32; 3],
    /// Смещение hitbox относительно visual (локальные координаты)
    pub hitbox_offset: [f32; 3],
    /// Доворот visual при spawn, euler XYZ в градусах
    pub rotation_offset_deg: [f32; 3],
    pub multi_hit: bool,
    pub ignore_walls: bool,
    pub destroy_on_hit: bool,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            speed: 30.0,
            last_time: DEFAULT_LAST_TIME,
            tick_frequency: DEFAULT_TICK_FREQUENCY,
            hitbox_size: [1.0, 1.0, 1.0],
            hitbox_offset: [0.0, 0.0, 0.0],
            rotation_offset_deg: [0.0, 0.0, 0.0],
            multi_hit: false,
            ignore_walls: false,
            destroy_on_hit: true,
        }
    }
}

impl ProjectileTuning {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn velocity_along(&self, forward: Vec3) -> Vec3 {
        forward.normalize_or_zero() * self.speed
    }

    pub fn rotation_offset(&self) -> Quat {
        let [x, y, z] = self.rotation_offset_deg;
        Quat::from_euler(EulerRot::XYZ, x.to_radians(), y.to_radians(), z.to_radians())
    }
}

/// Runtime конфиг для `ProjectileSystem::spawn`
#[derive(Debug)]
pub struct ProjectileConfig {
    pub velocity: VelocitySource,
    pub rotation_offset: Quat,
    pub last_time: f32,
    pub hitbox_size: Vec3,
    pub hitbox_offset: Transform,
    pub multi_hit: bool,
    pub ignore_walls: bool,
    pub destroy_on_hit: bool,
    pub targeting: TargetingMode,
    pub tick_frequency: f32,
    /// Дополнительно игнорируемые entity (вместе с потомками)
    pub ignore: Vec<Entity>,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self::from(&ProjectileTuning::default())
    }
}

impl From<&ProjectileTuning> for ProjectileConfig {
    fn from(tuning: &ProjectileTuning) -> Self {
        Self {
            velocity: VelocitySource::default(),
            rotation_offset: tuning.rotation_offset(),
            last_time: tuning.last_time,
            hitbox_size: Vec3::from_array(tuning.hitbox_size),
            hitbox_offset: Transform::from_translation(Vec3::from_array(tuning.hitbox_offset)),
            multi_hit: tuning.multi_hit,
            ignore_walls: tuning.ignore_walls,
            destroy_on_hit: tuning.destroy_on_hit,
            targeting: TargetingMode::Unrestricted,
            tick_frequency: tuning.tick_frequency,
            ignore: Vec::new(),
        }
    }
}

impl ProjectileConfig {
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = VelocitySource::Constant(velocity);
        self
    }

    pub fn with_dynamic_velocity(
        mut self,
        f: impl FnMut(VelocitySample) -> Vec3 + Send + 'static,
    ) -> Self {
        self.velocity = VelocitySource::dynamic(f);
        self
    }

    pub fn with_targeting(mut self, targeting: TargetingMode) -> Self {
        self.targeting = targeting;
        self
    }

    pub fn with_last_time(mut self, last_time: f32) -> Self {
        self.last_time = last_time;
        self
    }

    pub fn with_tick_frequency(mut self, hz: f32) -> Self {
        self.tick_frequency = hz;
        self
    }

    pub fn with_hitbox(mut self, size: Vec3, offset: Transform) -> Self {
        self.hitbox_size = size;
        self.hitbox_offset = offset;
        self
    }

    pub fn with_flags(mut self, multi_hit: bool, ignore_walls: bool, destroy_on_hit: bool) -> Self {
        self.multi_hit = multi_hit;
        self.ignore_walls = ignore_walls;
        self.destroy_on_hit = destroy_on_hit;
        self
    }

    pub fn with_ignored(mut self, entity: Entity) -> Self {
        self.ignore.push(entity);
        self
    }

    pub fn validate(&self) -> Result<(), ProjectileError> {
        if !self.tick_frequency.is_finite() || self.tick_frequency <= 0.0 {
            return Err(ProjectileError::InvalidConfig(format!(
                "tick_frequency must be positive, got {}",
                self.tick_frequency
            )));
        }
        if self.last_time.is_nan() || self.last_time < 0.0 {
            return Err(ProjectileError::InvalidConfig(format!(
                "last_time must be >= 0, got {}",
                self.last_time
            )));
        }
        if !self.hitbox_size.is_finite() || self.hitbox_size.min_element() <= 0.0 {
            return Err(ProjectileError::InvalidConfig(format!(
                "hitbox_size must be positive, got {:?}",
                self.hitbox_size
            )));
        }
        Ok(())
    }
}
