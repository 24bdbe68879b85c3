//! ProjectileSystem - корень подсистемы
//!
//! Владеет Registry и pending despawn tasks; создаётся при init host'а,
//! `shutdown()` сносит все живые instance. Collaborators передаются явно.

use bevy::prelude::*;
use std::sync::{Arc, Mutex};

use crate::config::{ProjectileConfig, VelocitySource};
use crate::despawn::{DespawnResult, PendingDespawns};
use crate::error::{CallbackError, ProjectileError};
use crate::lifecycle;
use crate::logger;
use crate::motion;
use crate::ports::{OwnerRemovedFn, OwnerWatch, SpatialQuery, TickDriver, TickFn, VisualHost};
use crate::registry::Registry;
use crate::state::{
    lock, DespawnCallback, DespawnEvent, HitCallback, HitboxProbe, Phase, ProjectileState,
    ProjectileView, Settings, StateParts,
};

/// Внешние collaborators
#[derive(Clone)]
pub struct Collaborators {
    pub visuals: Arc<dyn VisualHost>,
    pub spatial: Arc<dyn SpatialQuery>,
    pub owners: Arc<dyn OwnerWatch>,
    pub ticks: Arc<dyn TickDriver>,
}

pub(crate) struct Environment {
    pub visuals: Arc<dyn VisualHost>,
    pub spatial: Arc<dyn SpatialQuery>,
    pub owners: Arc<dyn OwnerWatch>,
    pub ticks: Arc<dyn TickDriver>,
    pub registry: Registry,
    pub despawns: PendingDespawns,
    faults: Mutex<Vec<ProjectileError>>,
}

impl Environment {
    fn record_fault(&self, error: ProjectileError) {
        lock(&self.faults).push(error);
    }
}

/// Параметры одного spawn
pub struct SpawnRequest {
    pub owner: Entity,
    pub visual: Entity,
    pub origin: Transform,
    pub config: ProjectileConfig,
    pub on_hit: HitCallback,
    pub on_despawn: Option<DespawnCallback>,
}

impl SpawnRequest {
    pub fn new(
        owner: Entity,
        visual: Entity,
        origin: Transform,
        config: ProjectileConfig,
        on_hit: impl FnMut(Entity) -> Result<bool, CallbackError> + Send + 'static,
    ) -> Self {
        Self {
            owner,
            visual,
            origin,
            config,
            on_hit: Box::new(on_hit),
            on_despawn: None,
        }
    }

    pub fn with_despawn(
        mut self,
        on_despawn: impl FnOnce(DespawnEvent) -> Result<(), CallbackError> + Send + 'static,
    ) -> Self {
        self.on_despawn = Some(Box::new(on_despawn));
        self
    }
}

#[derive(Clone)]
pub struct ProjectileSystem {
    env: Arc<Environment>,
}

impl ProjectileSystem {
    pub fn new(collaborators: Collaborators) -> Self {
        let Collaborators { visuals, spatial, owners, ticks } = collaborators;
        Self {
            env: Arc::new(Environment {
                visuals,
                spatial,
                owners,
                ticks,
                registry: Registry::new(),
                despawns: PendingDespawns::new(),
                faults: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn spawn(&self, request: SpawnRequest) -> Result<ProjectileController, ProjectileError> {
        let SpawnRequest { owner, visual, origin, config, on_hit, on_despawn } = request;

        config.validate()?;
        if self.env.registry.contains(visual) {
            return Err(ProjectileError::AlreadyActive(visual));
        }

        let pose = motion::spawn_pose(origin, config.rotation_offset);
        self.env.visuals.set_transform(visual, pose);

        let settings = Settings::from_config(&config);
        let (velocity, velocity_fn) = match config.velocity {
            VelocitySource::Constant(velocity) => (velocity, None),
            VelocitySource::Dynamic(mut f) => match motion::sample_velocity(&mut f, true) {
                Ok(velocity) => (velocity, Some(f)),
                Err(source) => return Err(ProjectileError::VelocityCallback { visual, source }),
            },
        };
        let probe = HitboxProbe::new(
            motion::hitbox_transform(pose, settings.hitbox_offset),
            settings.hitbox_size,
        );
        let tick_frequency = settings.tick_frequency;

        let state = Arc::new(ProjectileState::new(StateParts {
            visual,
            owner,
            settings,
            velocity,
            velocity_fn,
            probe,
            on_hit,
            on_despawn,
        }));

        if !self.env.registry.register(visual, state.clone()) {
            return Err(ProjectileError::AlreadyActive(visual));
        }

        let watch = self.env.owners.on_removed(owner, owner_removed_callback(&state, &self.env));
        let tick = self.env.ticks.register(tick_callback(&state, &self.env), tick_frequency);
        state.attach_hooks(tick, watch);

        // OwnerWatch мог выстрелить сразу (owner уже удалён) до attach_hooks
        if state.phase() == Phase::Destroyed {
            state.stop_ticking();
            if let Some(watch) = state.take_watch() {
                self.env.owners.unsubscribe(watch);
            }
        }

        logger::log(&format!(
            "🚀 Projectile spawned: visual={:?} owner={:?} velocity={:?} last_time={}",
            visual, owner, velocity, state.settings.last_time
        ));

        Ok(ProjectileController { state, env: self.env.clone() })
    }

    /// Read-only lookup для внешних систем
    pub fn find_by_visual(&self, visual: Entity) -> Option<ProjectileView> {
        self.env.registry.lookup(visual).map(|state| state.view())
    }

    pub fn is_active(&self, visual: Entity) -> bool {
        self.env.registry.contains(visual)
    }

    pub fn active_count(&self) -> usize {
        self.env.registry.len()
    }

    pub fn registry(&self) -> &Registry {
        &self.env.registry
    }

    pub fn pending_despawns(&self) -> usize {
        self.env.despawns.len()
    }

    pub fn poll_despawns(&self) -> Vec<DespawnResult> {
        self.env.despawns.poll()
    }

    pub fn wait_for_despawns(&self) -> Vec<DespawnResult> {
        self.env.despawns.wait_all()
    }

    /// Ошибки hit callbacks и velocity функций, случившиеся внутри tick
    pub fn drain_faults(&self) -> Vec<ProjectileError> {
        std::mem::take(&mut *lock(&self.env.faults))
    }

    /// Сносит все живые instance и дожидается pending despawn tasks
    pub fn shutdown(&self) -> Vec<DespawnResult> {
        let states = self.env.registry.states();
        let count = states.len();
        for state in states {
            lifecycle::destroy(&state, &self.env);
        }
        let results = self.env.despawns.wait_all();
        self.env.registry.clear();

        logger::log_info(&format!(
            "Projectile system shut down ({} live, {} pending despawns)",
            count,
            results.len()
        ));
        results
    }
}

fn tick_callback(state: &Arc<ProjectileState>, env: &Arc<Environment>) -> TickFn {
    let state = Arc::downgrade(state);
    let env = Arc::downgrade(env);

    Box::new(move |dt| {
        let (Some(state), Some(env)) = (state.upgrade(), env.upgrade()) else {
            return false;
        };
        match lifecycle::update(&state, &env, dt) {
            Ok(outcome) => outcome.is_continue(),
            Err(error) => {
                env.record_fault(error);
                false
            }
        }
    })
}

fn owner_removed_callback(state: &Arc<ProjectileState>, env: &Arc<Environment>) -> OwnerRemovedFn {
    let state = Arc::downgrade(state);
    let env = Arc::downgrade(env);

    Box::new(move || {
        let (Some(state), Some(env)) = (state.upgrade(), env.upgrade()) else {
            return;
        };
        logger::log_info(&format!(
            "Owner {:?} removed, destroying projectile {:?}",
            state.owner, state.visual
        ));
        lifecycle::destroy(&state, &env);
    })
}

/// Capability на один projectile
#[derive(Clone)]
pub struct ProjectileController {
    state: Arc<ProjectileState>,
    env: Arc<Environment>,
}

impl ProjectileController {
    pub fn visual(&self) -> Entity {
        self.state.visual
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn view(&self) -> ProjectileView {
        self.state.view()
    }

    /// Есть ли ещё запись в Registry для этого instance
    pub fn is_active(&self) -> bool {
        self.env
            .registry
            .lookup(self.state.visual)
            .is_some_and(|current| Arc::ptr_eq(&current, &self.state))
    }

    /// Идемпотентно: tick, probe, owner watch, visual, registry
    pub fn destroy(&self) {
        lifecycle::destroy(&self.state, &self.env);
    }
}
