//! Ошибки projectile подсистемы
//!
//! Ошибки callbacks (hit / velocity / despawn) не глотаются: hit и velocity
//! ошибки возвращаются из tick, despawn ошибка - из despawn task.

use bevy::prelude::Entity;
use std::fmt;

/// Ошибка пользовательского callback (hit или despawn)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// Callback вернул ошибку
    Failed(String),
    /// Callback запаниковал (panic перехвачен, payload как строка)
    Panicked(String),
}

impl CallbackError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked(message)
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackError::Failed(message) => write!(f, "callback failed: {}", message),
            CallbackError::Panicked(message) => write!(f, "callback panicked: {}", message),
        }
    }
}

impl std::error::Error for CallbackError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectileError {
    /// Конфиг не проходит валидацию (spawn отклонён)
    InvalidConfig(String),
    /// Visual уже зарегистрирован как активный projectile
    AlreadyActive(Entity),
    /// Hit callback упал во время tick (projectile снесён)
    HitCallback {
        visual: Entity,
        target: Entity,
        source: CallbackError,
    },
    /// Dynamic velocity функция запаниковала (на spawn или во время tick)
    VelocityCallback {
        visual: Entity,
        source: CallbackError,
    },
    /// Despawn callback упал в async task (teardown всё равно завершён)
    DespawnCallback {
        visual: Entity,
        source: CallbackError,
    },
}

impl fmt::Display for ProjectileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectileError::InvalidConfig(reason) => {
                write!(f, "invalid projectile config: {}", reason)
            }
            ProjectileError::AlreadyActive(visual) => {
                write!(f, "visual {:?} is already an active projectile", visual)
            }
            ProjectileError::HitCallback { visual, target, source } => write!(
                f,
                "hit callback of projectile {:?} failed on target {:?}: {}",
                visual, target, source
            ),
            ProjectileError::VelocityCallback { visual, source } => write!(
                f,
                "velocity function of projectile {:?} failed: {}",
                visual, source
            ),
            ProjectileError::DespawnCallback { visual, source } => write!(
                f,
                "despawn callback of projectile {:?} failed: {}",
                visual, source
            ),
        }
    }
}

impl std::error::Error for ProjectileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProjectileError::HitCallback { source, .. }
            | ProjectileError::VelocityCallback { source, .. }
            | ProjectileError::DespawnCallback { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Ошибка загрузки tuning файла
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(reason) => write!(f, "failed to parse projectile tuning: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_to_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(CallbackError::from_panic(payload), CallbackError::Panicked("boom".into()));

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(
            CallbackError::from_panic(payload),
            CallbackError::Panicked("owned boom".into())
        );

        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u32);
        assert!(matches!(CallbackError::from_panic(payload), CallbackError::Panicked(_)));
    }

    #[test]
    fn test_hit_callback_error_exposes_source() {
        use std::error::Error;

        let err = ProjectileError::HitCallback {
            visual: Entity::from_raw(1),
            target: Entity::from_raw(2),
            source: CallbackError::failed("no such target"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("no such target"));
    }
}
