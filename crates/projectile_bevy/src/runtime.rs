//! ProjectileRuntime resource
//!
//! Держит ProjectileSystem и его collaborators. SandboxScene здесь - зеркало
//! ECS мира: системы bridge каждый кадр копируют туда тела и флаги, а
//! обратно забирают позиции visual'ов.
//!
//! Hit / despawn callbacks не имеют доступа к World: результаты складываются
//! в outbox и превращаются в events в `collect_outcomes`.

use bevy::prelude::*;
use std::sync::{Arc, Mutex, MutexGuard};

use projectile_sim::{
    Collaborators, FixedTickScheduler, OwnerRemovalHub, ProjectileConfig, ProjectileController,
    ProjectileError, ProjectileSystem, SandboxScene, SpawnRequest,
};

use crate::events::{ProjectileDespawned, ProjectileHit, SpawnProjectile};

#[derive(Default)]
pub(crate) struct Outbox {
    pub hits: Vec<ProjectileHit>,
    pub despawns: Vec<ProjectileDespawned>,
}

#[derive(Resource, Clone)]
pub struct ProjectileRuntime {
    pub system: ProjectileSystem,
    pub scene: Arc<SandboxScene>,
    pub owners: Arc<OwnerRemovalHub>,
    pub ticks: Arc<FixedTickScheduler>,
    outbox: Arc<Mutex<Outbox>>,
}

impl Default for ProjectileRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectileRuntime {
    pub fn new() -> Self {
        let scene = Arc::new(SandboxScene::new());
        let owners = Arc::new(OwnerRemovalHub::new());
        let ticks = Arc::new(FixedTickScheduler::new());

        let system = ProjectileSystem::new(Collaborators {
            visuals: scene.clone(),
            spatial: scene.clone(),
            owners: owners.clone(),
            ticks: ticks.clone(),
        });

        Self {
            system,
            scene,
            owners,
            ticks,
            outbox: Arc::new(Mutex::new(Outbox::default())),
        }
    }

    /// Spawn projectile на уже созданном visual entity
    pub fn launch(
        &self,
        visual: Entity,
        request: &SpawnProjectile,
    ) -> Result<ProjectileController, ProjectileError> {
        let config = ProjectileConfig::from(&request.tuning)
            .with_velocity(request.resolved_velocity())
            .with_targeting(request.targeting);

        self.scene.insert_visual(visual, request.origin);

        let shooter = request.owner;
        let damage = request.damage;
        let hits = self.outbox.clone();
        let despawns = self.outbox.clone();

        let spawn = SpawnRequest::new(shooter, visual, request.origin, config, move |target| {
            lock(&hits).hits.push(ProjectileHit { shooter, target, damage, visual });
            Ok(true)
        })
        .with_despawn(move |event| {
            lock(&despawns).despawns.push(ProjectileDespawned {
                visual: event.visual,
                hit: event.hit,
                hit_wall: event.hit_wall,
            });
            Ok(())
        });

        let result = self.system.spawn(spawn);
        if result.is_err() {
            self.scene.remove_visual(visual);
        }
        result
    }

    pub(crate) fn take_outbox(&self) -> Outbox {
        std::mem::take(&mut *lock(&self.outbox))
    }

    /// Сносит все живые projectile (например при выходе из уровня)
    pub fn shutdown(&self) {
        for result in self.system.shutdown() {
            if let Err(error) = result {
                projectile_sim::logger::log_error(&format!("❌ {}", error));
            }
        }
    }
}

fn lock(outbox: &Mutex<Outbox>) -> MutexGuard<'_, Outbox> {
    outbox.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
