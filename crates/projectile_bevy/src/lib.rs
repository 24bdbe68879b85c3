//! Projectile Bevy bridge
//!
//! Подключает `projectile_sim` к Bevy ECS:
//! - ECS владеет gameplay state (Health, Character, тела, препятствия)
//! - projectile_sim владеет lifecycle projectile (tick, probe, hit, teardown)
//!
//! Всё происходит в `ProjectileSystems` (Update), см. `systems`.

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use std::time::Duration;

pub mod components;
pub mod events;
pub mod logger;
pub mod runtime;
pub mod systems;

pub use components::{Character, ForceStop, Frozen, Health, Hurtbox, Obstacle, ProjectileVisual};
pub use events::{ProjectileDespawned, ProjectileHit, SpawnProjectile};
pub use logger::BridgeLogger;
pub use runtime::ProjectileRuntime;

/// Цепочка projectile систем - для `.after(ProjectileSystems)` в gameplay коде
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectileSystems;

pub struct ProjectilePlugin;

impl Plugin for ProjectilePlugin {
    fn build(&self, app: &mut App) {
        projectile_sim::logger::set_logger_if_needed(Box::new(BridgeLogger));

        app.init_resource::<ProjectileRuntime>()
            .add_event::<SpawnProjectile>()
            .add_event::<ProjectileHit>()
            .add_event::<ProjectileDespawned>();

        app.add_systems(
            Update,
            (
                // Фаза 1: новые выстрелы
                systems::spawn_projectiles,

                // Фаза 2: ECS → scene mirror, удалённые owner'ы
                systems::mirror_scene,
                systems::notify_owner_removals,

                // Фаза 3: projectile tick'и
                systems::advance_projectile_ticks,

                // Фаза 4: результаты → events, scene → ECS
                systems::collect_outcomes,
                systems::sync_projectile_visuals,

                // Фаза 5: урон
                systems::apply_projectile_damage,
            )
                .chain()
                .in_set(ProjectileSystems),
        );

        projectile_sim::logger::log_info("ProjectilePlugin initialized");
    }
}

/// Headless App: MinimalPlugins + ProjectilePlugin, фиксированный шаг кадра
pub fn create_headless_app(frame_dt: f32) -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f32(frame_dt)))
        .add_plugins(ProjectilePlugin);
    app
}
