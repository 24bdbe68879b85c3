//! Общий harness для integration тестов
//!
//! SandboxScene + OwnerRemovalHub + FixedTickScheduler, собранные в один
//! ProjectileSystem. Recorder копит hit / despawn вызовы.

#![allow(dead_code)]

use bevy::prelude::*;
use std::sync::{Arc, Mutex};

use projectile_sim::*;

pub struct Harness {
    pub scene: Arc<SandboxScene>,
    pub owners: Arc<OwnerRemovalHub>,
    pub ticks: Arc<FixedTickScheduler>,
    pub system: ProjectileSystem,
}

impl Harness {
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

        Self { scene, owners, ticks, system }
    }

    /// Owner как живой персонаж в точке spawn
    pub fn spawn_owner(&self) -> Entity {
        self.scene.spawn_character(Vec3::ZERO, Vec3::splat(0.5), 100.0)
    }

    pub fn spawn(
        &self,
        owner: Entity,
        config: ProjectileConfig,
        recorder: &Recorder,
    ) -> Result<(Entity, ProjectileController), ProjectileError> {
        self.spawn_with(owner, config, recorder, |_| Ok(true))
    }

    /// Spawn с собственным решением hit callback (результат всё равно пишется в recorder)
    pub fn spawn_with(
        &self,
        owner: Entity,
        config: ProjectileConfig,
        recorder: &Recorder,
        mut decide: impl FnMut(Entity) -> Result<bool, CallbackError> + Send + 'static,
    ) -> Result<(Entity, ProjectileController), ProjectileError> {
        let visual = self.scene.spawn_visual(Transform::IDENTITY);
        let hits = recorder.hits.clone();
        let despawns = recorder.despawns.clone();

        let request = SpawnRequest::new(owner, visual, Transform::IDENTITY, config, move |target| {
            hits.lock().unwrap().push(target);
            decide(target)
        })
        .with_despawn(move |event| {
            despawns.lock().unwrap().push(event);
            Ok(())
        });

        let controller = self.system.spawn(request)?;
        Ok((visual, controller))
    }

    pub fn tick(&self, count: usize) {
        for _ in 0..count {
            self.ticks.tick_once();
        }
    }

    /// Tick'и + ожидание async despawn
    pub fn settle(&self, count: usize) -> Vec<DespawnResult> {
        self.tick(count);
        self.system.wait_for_despawns()
    }

    pub fn position(&self, visual: Entity) -> Option<Vec3> {
        self.scene.transform(visual).map(|transform| transform.translation)
    }
}

#[derive(Clone, Default)]
pub struct Recorder {
    pub hits: Arc<Mutex<Vec<Entity>>>,
    pub despawns: Arc<Mutex<Vec<DespawnEvent>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> Vec<Entity> {
        self.hits.lock().unwrap().clone()
    }

    pub fn despawns(&self) -> Vec<DespawnEvent> {
        self.despawns.lock().unwrap().clone()
    }
}

/// Projectile вдоль -Z
pub fn forward_config(speed: f32) -> ProjectileConfig {
    ProjectileConfig::default().with_velocity(Vec3::new(0.0, 0.0, -speed))
}
