//! LifecycleManager - per-tick state machine projectile
//!
//! Traveling → Removing → Destroyed.
//!
//! Порядок одного tick (`update`):
//! 1. Expiry (time_passed >= last_time или ForceStop) → teardown, stop
//! 2. Dynamic velocity refresh (first = false)
//! 3. Hitbox sync к visual transform (всегда)
//! 4. Уже removing → continue (guard на re-entrant tick во время async teardown)
//! 5. Character probe
//! 6. Hit resolution
//! 7. Wall probe (только если не было character hit)
//! 8. Hit / стена → teardown, stop
//! 9. Движение + time_passed += dt, continue
//!
//! Teardown идемпотентен по шагам: tick, owner watch, explicit destroy и
//! despawn continuation могут пересекаться в любом порядке.

use bevy::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::collision;
use crate::error::{CallbackError, ProjectileError};
use crate::hits;
use crate::logger;
use crate::motion;
use crate::ports::VisualFlag;
use crate::state::{lock, DespawnCallback, DespawnEvent, HitCallback, Phase, ProjectileState};
use crate::system::Environment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

impl TickOutcome {
    pub fn is_continue(self) -> bool {
        self == TickOutcome::Continue
    }
}

pub(crate) fn update(
    state: &Arc<ProjectileState>,
    env: &Arc<Environment>,
    dt: f32,
) -> Result<TickOutcome, ProjectileError> {
    // Explicit destroy / owner removal обогнали tick
    if state.phase() == Phase::Destroyed {
        return Ok(finish(state));
    }

    let visual = state.visual;
    let Some(pose) = env.visuals.transform(visual) else {
        logger::log_warning(&format!(
            "⚠️ Projectile visual {:?} vanished mid-flight, tearing down",
            visual
        ));
        destroy(state, env);
        return Ok(finish(state));
    };

    // 1. Expiry
    let removing = state.is_removing();
    let time_passed = lock(&state.motion).time_passed;
    let expired = time_passed >= state.settings.last_time
        || env.visuals.has_flag(visual, VisualFlag::ForceStop);
    if expired && !removing {
        expire(state, env);
        return Ok(finish(state));
    }

    // 2. Velocity refresh
    let refreshed = lock(&state.velocity_fn)
        .as_mut()
        .map(|velocity_fn| motion::sample_velocity(velocity_fn, false));
    match refreshed {
        Some(Ok(velocity)) => lock(&state.motion).velocity = velocity,
        Some(Err(error)) => {
            logger::log_error(&format!(
                "💥 Velocity function of projectile {:?} failed: {}",
                visual, error
            ));
            destroy(state, env);
            return Err(ProjectileError::VelocityCallback { visual, source: error });
        }
        None => {}
    }

    // 3. Hitbox sync (frozen visual → frozen hitbox)
    let hitbox = motion::hitbox_transform(pose, state.settings.hitbox_offset);
    let volume = lock(&state.probe).as_mut().map(|probe| {
        probe.sync(hitbox);
        probe.volume()
    });

    // 4. Уже removing: ничего не трогаем (шаг 1 обычно завершает tick раньше)
    if removing {
        return Ok(TickOutcome::Continue);
    }

    // Probe нет, хотя не removing: teardown начался параллельно
    let Some(volume) = volume else {
        return Ok(finish(state));
    };

    // 5. Character probe
    let targets = collision::probe_characters(
        env.spatial.as_ref(),
        &volume,
        state.owner,
        &state.settings.ignore,
    );

    // 6. Hit resolution
    let resolution = {
        let mut on_hit = lock(&state.on_hit);
        let callback: &mut HitCallback = &mut on_hit;
        hits::resolve(state.settings.targeting, &state.already_hit, &targets, |actor| {
            callback(actor)
        })
    };
    let outcome = match resolution {
        Ok(outcome) => outcome,
        Err(failure) => {
            logger::log_error(&format!(
                "💥 Hit callback of projectile {:?} failed on {:?}: {}",
                visual, failure.target, failure.error
            ));
            destroy(state, env);
            return Err(ProjectileError::HitCallback {
                visual,
                target: failure.target,
                source: failure.error,
            });
        }
    };

    if !outcome.credited.is_empty() {
        logger::log_info(&format!(
            "🎯 Projectile {:?} credited hits on {:?}",
            visual, outcome.credited
        ));
    }

    // Hit callback мог сам снести projectile (destroy из callback)
    if state.phase() == Phase::Destroyed {
        return Ok(finish(state));
    }

    // 7. Wall probe
    let hit_wall = !outcome.hit
        && collision::probe_walls(env.spatial.as_ref(), &volume, state.owner, &state.settings.ignore);

    // 8. Contact stop
    if outcome.hit || (hit_wall && !state.settings.ignore_walls) {
        stop_on_contact(state, env, outcome.hit, hit_wall);
        return Ok(finish(state));
    }

    // 9. Motion
    let velocity = lock(&state.motion).velocity;
    if !env.visuals.has_flag(visual, VisualFlag::Freeze) {
        env.visuals.set_transform(visual, motion::integrate(pose, velocity, dt));
    }
    lock(&state.motion).time_passed += dt;

    Ok(TickOutcome::Continue)
}

/// Tick завершается изнутри: останавливаем и регистрацию (для driver'ов,
/// которые не смотрят на return value)
fn finish(state: &ProjectileState) -> TickOutcome {
    state.stop_ticking();
    TickOutcome::Stop
}

fn expire(state: &Arc<ProjectileState>, env: &Arc<Environment>) {
    state.release_probe();
    state.begin_removing();

    let event = DespawnEvent { visual: state.visual, hit: false, hit_wall: false };
    logger::log(&format!("⏱️ Projectile {:?} expired", state.visual));

    match state.take_despawn_callback() {
        Some(callback) => schedule_despawn(state, env, callback, event, true),
        None => complete_teardown(state, env, true),
    }
}

fn stop_on_contact(state: &Arc<ProjectileState>, env: &Arc<Environment>, hit: bool, hit_wall: bool) {
    lock(&state.motion).velocity = Vec3::ZERO;
    state.release_probe();
    state.begin_removing();

    let event = DespawnEvent { visual: state.visual, hit, hit_wall };
    logger::log_info(&format!(
        "💥 Projectile {:?} stopped (hit: {}, wall: {})",
        state.visual, hit, hit_wall
    ));

    let destroy_visual = state.settings.destroy_on_hit;
    match state.take_despawn_callback() {
        Some(callback) => schedule_despawn(state, env, callback, event, destroy_visual),
        None => complete_teardown(state, env, destroy_visual),
    }
}

/// Fire-and-forget: callback, затем (guard) visual + registry.
/// Guard гарантирует завершение teardown даже при ошибке/panic callback.
fn schedule_despawn(
    state: &Arc<ProjectileState>,
    env: &Arc<Environment>,
    callback: DespawnCallback,
    event: DespawnEvent,
    destroy_visual: bool,
) {
    let guard = TeardownGuard {
        state: state.clone(),
        env: env.clone(),
        destroy_visual,
    };

    env.despawns.spawn(async move {
        let guard = guard;
        let result = catch_unwind(AssertUnwindSafe(|| callback(event)))
            .unwrap_or_else(|payload| Err(CallbackError::from_panic(payload)));
        drop(guard);

        result.map(|()| event).map_err(|source| {
            logger::log_error(&format!(
                "💥 Despawn callback of projectile {:?} failed: {}",
                event.visual, source
            ));
            ProjectileError::DespawnCallback { visual: event.visual, source }
        })
    });
}

struct TeardownGuard {
    state: Arc<ProjectileState>,
    env: Arc<Environment>,
    destroy_visual: bool,
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        complete_teardown(&self.state, &self.env, self.destroy_visual);
    }
}

/// Каждый шаг идемпотентен; порядок вызовов из разных путей не важен
pub(crate) fn complete_teardown(state: &Arc<ProjectileState>, env: &Environment, destroy_visual: bool) {
    state.stop_ticking();
    state.release_probe();
    if let Some(watch) = state.take_watch() {
        env.owners.unsubscribe(watch);
    }
    if destroy_visual {
        state.release_visual(env.visuals.as_ref());
    }
    env.registry.deregister(state.visual, state);

    if state.mark_destroyed() {
        logger::log(&format!("🗑️ Projectile {:?} destroyed", state.visual));
    }
}

/// Explicit destroy / owner removal / fault abort.
/// Неотправленный despawn callback выбрасывается (уже запущенный - доработает сам).
pub(crate) fn destroy(state: &Arc<ProjectileState>, env: &Environment) {
    state.begin_removing();
    drop(state.take_despawn_callback());
    complete_teardown(state, env, true);
}
