//! ProjectileState - per-instance данные projectile
//!
//! Один instance = один `Arc<ProjectileState>`, который держат Registry,
//! controller, tick closure (Weak) и owner watch (Weak).
//! Данные разложены по отдельным lock'ам: пользовательские callbacks никогда
//! не вызываются под lock'ом данных (`motion`, `already_hit`), поэтому из
//! callback можно звать lookup/destroy/spawn.

use bevy::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::config::{ProjectileConfig, TargetingMode, VelocityFn};
use crate::error::CallbackError;
use crate::ports::{HitVolume, TickHandle, VisualHost, WatchHandle};

/// `hit_callback(actor) -> counts as hit`
pub type HitCallback = Box<dyn FnMut(Entity) -> Result<bool, CallbackError> + Send>;

/// Async cleanup hook, вызывается ровно один раз (если projectile закончился сам)
pub type DespawnCallback = Box<dyn FnOnce(DespawnEvent) -> Result<(), CallbackError> + Send>;

/// Чем закончился projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DespawnEvent {
    pub visual: Entity,
    pub hit: bool,
    pub hit_wall: bool,
}

impl DespawnEvent {
    pub fn timed_out(&self) -> bool {
        !self.hit && !self.hit_wall
    }
}

/// Lifecycle: Traveling → Removing → Destroyed (только вперёд)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Phase {
    Traveling = 0,
    Removing = 1,
    Destroyed = 2,
}

impl Phase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Phase::Traveling,
            1 => Phase::Removing,
            _ => Phase::Destroyed,
        }
    }
}

/// Невидимый collision volume, следует за visual
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitboxProbe {
    volume: HitVolume,
}

impl HitboxProbe {
    pub fn new(transform: Transform, size: Vec3) -> Self {
        Self { volume: HitVolume { transform, size } }
    }

    pub fn sync(&mut self, transform: Transform) {
        self.volume.transform = transform;
    }

    pub fn volume(&self) -> HitVolume {
        self.volume
    }
}

/// Неизменяемые после spawn параметры
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Settings {
    pub last_time: f32,
    pub hitbox_size: Vec3,
    pub hitbox_offset: Transform,
    pub multi_hit: bool,
    pub ignore_walls: bool,
    pub destroy_on_hit: bool,
    pub targeting: TargetingMode,
    pub tick_frequency: f32,
    pub ignore: Vec<Entity>,
}

impl Settings {
    pub fn from_config(config: &ProjectileConfig) -> Self {
        Self {
            last_time: config.last_time,
            hitbox_size: config.hitbox_size,
            hitbox_offset: config.hitbox_offset,
            multi_hit: config.multi_hit,
            ignore_walls: config.ignore_walls,
            destroy_on_hit: config.destroy_on_hit,
            targeting: config.targeting,
            tick_frequency: config.tick_frequency,
            ignore: config.ignore.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Motion {
    pub velocity: Vec3,
    /// Монотонный, не сбрасывается
    pub time_passed: f32,
}

pub struct ProjectileState {
    pub(crate) visual: Entity,
    pub(crate) owner: Entity,
    pub(crate) settings: Settings,
    pub(crate) motion: Mutex<Motion>,
    pub(crate) velocity_fn: Mutex<Option<VelocityFn>>,
    pub(crate) already_hit: Mutex<HashSet<Entity>>,
    pub(crate) on_hit: Mutex<HitCallback>,
    pub(crate) on_despawn: Mutex<Option<DespawnCallback>>,
    pub(crate) probe: Mutex<Option<HitboxProbe>>,
    pub(crate) tick: Mutex<Option<TickHandle>>,
    pub(crate) watch: Mutex<Option<WatchHandle>>,
    phase: AtomicU8,
    visual_released: AtomicBool,
}

/// Lock с восстановлением после poison (panic в чужом callback не должен
/// блокировать teardown)
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) struct StateParts {
    pub visual: Entity,
    pub owner: Entity,
    pub settings: Settings,
    pub velocity: Vec3,
    pub velocity_fn: Option<VelocityFn>,
    pub probe: HitboxProbe,
    pub on_hit: HitCallback,
    pub on_despawn: Option<DespawnCallback>,
}

impl ProjectileState {
    pub(crate) fn new(parts: StateParts) -> Self {
        Self {
            visual: parts.visual,
            owner: parts.owner,
            settings: parts.settings,
            motion: Mutex::new(Motion { velocity: parts.velocity, time_passed: 0.0 }),
            velocity_fn: Mutex::new(parts.velocity_fn),
            already_hit: Mutex::new(HashSet::new()),
            on_hit: Mutex::new(parts.on_hit),
            on_despawn: Mutex::new(parts.on_despawn),
            probe: Mutex::new(Some(parts.probe)),
            tick: Mutex::new(None),
            watch: Mutex::new(None),
            phase: AtomicU8::new(Phase::Traveling as u8),
            visual_released: AtomicBool::new(false),
        }
    }

    pub fn visual(&self) -> Entity {
        self.visual
    }

    pub fn owner(&self) -> Entity {
        self.owner
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_removing(&self) -> bool {
        self.phase() != Phase::Traveling
    }

    /// Traveling → Removing. true - если переход сделал именно этот вызов
    pub(crate) fn begin_removing(&self) -> bool {
        self.phase
            .compare_exchange(
                Phase::Traveling as u8,
                Phase::Removing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// → Destroyed. true - если переход сделал именно этот вызов
    pub(crate) fn mark_destroyed(&self) -> bool {
        self.phase.swap(Phase::Destroyed as u8, Ordering::AcqRel) != Phase::Destroyed as u8
    }

    pub fn has_probe(&self) -> bool {
        lock(&self.probe).is_some()
    }

    /// Освобождает hitbox probe; повторный вызов - no-op
    pub(crate) fn release_probe(&self) -> bool {
        lock(&self.probe).take().is_some()
    }

    pub(crate) fn attach_hooks(&self, tick: TickHandle, watch: WatchHandle) {
        *lock(&self.tick) = Some(tick);
        *lock(&self.watch) = Some(watch);
    }

    pub(crate) fn stop_ticking(&self) {
        if let Some(tick) = lock(&self.tick).as_ref() {
            tick.stop();
        }
    }

    pub(crate) fn take_watch(&self) -> Option<WatchHandle> {
        lock(&self.watch).take()
    }

    pub(crate) fn take_despawn_callback(&self) -> Option<DespawnCallback> {
        lock(&self.on_despawn).take()
    }

    /// Уничтожает visual ровно один раз за жизнь instance
    pub(crate) fn release_visual(&self, visuals: &dyn VisualHost) -> bool {
        if self.visual_released.swap(true, Ordering::AcqRel) {
            return false;
        }
        visuals.destroy(self.visual);
        true
    }

    pub fn visual_released(&self) -> bool {
        self.visual_released.load(Ordering::Acquire)
    }

    pub fn view(&self) -> ProjectileView {
        let motion = *lock(&self.motion);
        let already_hit = lock(&self.already_hit).iter().copied().collect();
        let hitbox = lock(&self.probe).as_ref().map(HitboxProbe::volume);

        ProjectileView {
            visual: self.visual,
            owner: self.owner,
            phase: self.phase(),
            velocity: motion.velocity,
            time_passed: motion.time_passed,
            last_time: self.settings.last_time,
            already_hit,
            targeting: self.settings.targeting,
            multi_hit: self.settings.multi_hit,
            ignore_walls: self.settings.ignore_walls,
            destroy_on_hit: self.settings.destroy_on_hit,
            tick_frequency: self.settings.tick_frequency,
            hitbox,
        }
    }
}

/// Read-only снимок состояния (для внешних систем)
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileView {
    pub visual: Entity,
    pub owner: Entity,
    pub phase: Phase,
    pub velocity: Vec3,
    pub time_passed: f32,
    pub last_time: f32,
    pub already_hit: HashSet<Entity>,
    pub targeting: TargetingMode,
    pub multi_hit: bool,
    pub ignore_walls: bool,
    pub destroy_on_hit: bool,
    pub tick_frequency: f32,
    /// None после release probe
    pub hitbox: Option<HitVolume>,
}

impl ProjectileView {
    pub fn removing(&self) -> bool {
        self.phase != Phase::Traveling
    }
}
