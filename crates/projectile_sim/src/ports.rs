//! Внешние collaborators подсистемы
//!
//! - `VisualHost` - визуальное представление projectile (transform, флаги, destroy)
//! - `SpatialQuery` - bounding-volume запросы к миру + данные персонажей
//! - `OwnerWatch` - уведомление об окончательном удалении owner
//! - `TickDriver` - периодический вызов `on_tick(dt)`
//!
//! Референсные реализации: `SandboxScene`, `OwnerRemovalHub`, `FixedTickScheduler`.

use bevy::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Внешние флаги на visual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualFlag {
    /// Принудительно завершить projectile на следующем tick (как timeout)
    ForceStop,
    /// Не двигать visual (hitbox тоже стоит)
    Freeze,
}

pub trait VisualHost: Send + Sync {
    /// None = visual больше не существует
    fn transform(&self, visual: Entity) -> Option<Transform>;
    fn set_transform(&self, visual: Entity, transform: Transform);
    fn has_flag(&self, visual: Entity, flag: VisualFlag) -> bool;
    /// Должен быть идемпотентным
    fn destroy(&self, visual: Entity);
}

/// Объём запроса (hitbox probe)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitVolume {
    /// Центр + ориентация
    pub transform: Transform,
    /// Полный размер box
    pub size: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryLayer {
    /// Только статическая геометрия мира
    WorldGeometry,
    /// Только тела активных персонажей
    Characters,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    pub layer: QueryLayer,
    /// Исключаются эти entity и все их потомки
    pub exclude: Vec<Entity>,
}

impl QueryFilter {
    pub fn characters(exclude: Vec<Entity>) -> Self {
        Self { layer: QueryLayer::Characters, exclude }
    }

    pub fn world_geometry(exclude: Vec<Entity>) -> Self {
        Self { layer: QueryLayer::WorldGeometry, exclude }
    }
}

/// Тело из результата запроса
#[derive(Debug, Clone, PartialEq)]
pub struct BodyContact {
    /// Само тело (часть персонажа, стена)
    pub body: Entity,
    /// Актор-владелец тела, если тело - часть персонажа
    pub actor: Option<Entity>,
    /// Цепочка родителей, от ближайшего к корню
    pub ancestors: Vec<Entity>,
    /// Проходимое тело (не блокирует projectile)
    pub passable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterInfo {
    /// None = у актора нет health атрибута
    pub health: Option<f32>,
    /// Помечен как активный персонаж
    pub active: bool,
}

impl CharacterInfo {
    pub fn is_valid_target(&self) -> bool {
        self.active && self.health.is_some_and(|health| health > 0.0)
    }
}

pub trait SpatialQuery: Send + Sync {
    /// Пустой результат - нормальный случай, не ошибка
    fn query_volume(&self, volume: &HitVolume, filter: &QueryFilter) -> Vec<BodyContact>;
    fn character(&self, actor: Entity) -> Option<CharacterInfo>;
}

/// Подписка на удаление owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(pub u64);

pub type OwnerRemovedFn = Box<dyn FnOnce() + Send>;

pub trait OwnerWatch: Send + Sync {
    /// Callback срабатывает ровно один раз при окончательном удалении owner
    fn on_removed(&self, owner: Entity, callback: OwnerRemovedFn) -> WatchHandle;
    /// Повторный unsubscribe - no-op
    fn unsubscribe(&self, handle: WatchHandle);
}

/// `on_tick(dt) -> continue`
pub type TickFn = Box<dyn FnMut(f32) -> bool + Send>;

/// Handle регистрации tick; `stop()` идемпотентен
#[derive(Clone, Default)]
pub struct TickHandle {
    stopped: Arc<AtomicBool>,
}

impl TickHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl fmt::Debug for TickHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickHandle").field("stopped", &self.is_stopped()).finish()
    }
}

pub trait TickDriver: Send + Sync {
    fn register(&self, on_tick: TickFn, frequency_hz: f32) -> TickHandle;
}
