//! ECS компоненты bridge
//!
//! Transform у Hurtbox / Obstacle / ProjectileVisual трактуется как world-space
//! (bridge не зависит от transform propagation).

use bevy::prelude::*;

/// Активный персонаж (может быть целью и owner'ом)
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Character;

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub current: u32,
    pub max: u32,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Health {
    pub fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    pub fn take_damage(&mut self, amount: u32) {
        self.current = self.current.saturating_sub(amount);
    }
}

/// Тело персонажа. На самом Character или на его child.
#[derive(Component, Debug, Clone, Copy)]
pub struct Hurtbox {
    pub half_extents: Vec3,
}

/// Статическая геометрия
#[derive(Component, Debug, Clone, Copy)]
pub struct Obstacle {
    pub half_extents: Vec3,
    /// Проходимая (стекло, листва) - projectile не останавливает
    pub passable: bool,
}

impl Obstacle {
    pub fn solid(half_extents: Vec3) -> Self {
        Self { half_extents, passable: false }
    }
}

/// Visual entity живого projectile
#[derive(Component, Debug, Clone, Copy)]
pub struct ProjectileVisual {
    pub owner: Entity,
    pub damage: u32,
}

/// Завершить projectile на следующем tick
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ForceStop;

/// Остановить движение (время жизни продолжает идти)
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Frozen;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_damage_saturates() {
        let mut health = Health::new(30);
        health.take_damage(20);
        assert_eq!(health.current, 10);
        health.take_damage(50);
        assert_eq!(health.current, 0);
        assert!(!health.is_alive());
    }
}
