//! Bridge events
//!
//! - `SpawnProjectile` - запрос выстрела (gameplay → bridge)
//! - `ProjectileHit` - hit callback сработал (bridge → damage)
//! - `ProjectileDespawned` - despawn callback (hit / стена / timeout)

use bevy::prelude::*;
use projectile_sim::{ProjectileTuning, TargetingMode};

#[derive(Event, Debug, Clone)]
pub struct SpawnProjectile {
    pub owner: Entity,
    pub origin: Transform,
    pub tuning: ProjectileTuning,
    /// None → `origin.forward() * tuning.speed`
    pub velocity: Option<Vec3>,
    pub targeting: TargetingMode,
    pub damage: u32,
}

impl SpawnProjectile {
    pub fn new(owner: Entity, origin: Transform, damage: u32) -> Self {
        Self {
            owner,
            origin,
            tuning: ProjectileTuning::default(),
            velocity: None,
            targeting: TargetingMode::Unrestricted,
            damage,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_tuning(mut self, tuning: ProjectileTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_targeting(mut self, targeting: TargetingMode) -> Self {
        self.targeting = targeting;
        self
    }

    pub fn resolved_velocity(&self) -> Vec3 {
        self.velocity
            .unwrap_or_else(|| self.tuning.velocity_along(*self.origin.forward()))
    }
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectileHit {
    /// Кто выстрелил
    pub shooter: Entity,
    /// В кого попали
    pub target: Entity,
    pub damage: u32,
    pub visual: Entity,
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectileDespawned {
    pub visual: Entity,
    pub hit: bool,
    pub hit_wall: bool,
}
