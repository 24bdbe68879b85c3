//! Projectile Simulation Core
//!
//! Lifecycle, движение и попадания projectile'ов, не привязанные к движку.
//! Движок подключается через ports (VisualHost, SpatialQuery, OwnerWatch, TickDriver).
//!
//! Поток одного projectile:
//! - `ProjectileSystem::spawn` → регистрация в Registry, owner watch, tick
//! - tick → expiry / hitbox sync / probe / hit resolution / движение
//! - hit, стена или timeout → despawn callback (async) → teardown
//!
//! Референсные collaborators (`SandboxScene`, `OwnerRemovalHub`,
//! `FixedTickScheduler`) используются в тестах и headless demo.

pub mod collision;
pub mod config;
pub mod despawn;
pub mod error;
pub mod hits;
pub mod lifecycle;
pub mod logger;
pub mod motion;
pub mod owner_watch;
pub mod ports;
pub mod registry;
pub mod sandbox;
pub mod scheduler;
pub mod state;
pub mod system;

pub use config::{
    ProjectileConfig, ProjectileTuning, TargetingMode, VelocitySample, VelocitySource,
    DEFAULT_LAST_TIME, DEFAULT_TICK_FREQUENCY, NOMINAL_FRAME_DT,
};
pub use despawn::DespawnResult;
pub use error::{CallbackError, ConfigError, ProjectileError};
pub use lifecycle::TickOutcome;
pub use logger::{init_logger, LogLevel, LogPrinter};
pub use owner_watch::OwnerRemovalHub;
pub use ports::{
    BodyContact, CharacterInfo, HitVolume, OwnerWatch, QueryFilter, QueryLayer, SpatialQuery,
    TickDriver, TickHandle, VisualFlag, VisualHost, WatchHandle,
};
pub use registry::Registry;
pub use sandbox::{SandboxBody, SandboxScene};
pub use scheduler::FixedTickScheduler;
pub use state::{DespawnEvent, Phase, ProjectileView};
pub use system::{Collaborators, ProjectileController, ProjectileSystem, SpawnRequest};
