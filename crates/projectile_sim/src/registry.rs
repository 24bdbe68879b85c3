//! Registry - visual handle → ProjectileState
//!
//! Единственный источник правды "этот visual - активный projectile".
//! Принадлежит `ProjectileSystem` (не global), клонируется как shared handle.

use bevy::prelude::Entity;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::logger;
use crate::state::ProjectileState;

#[derive(Clone, Default)]
pub struct Registry {
    projectiles: Arc<RwLock<HashMap<Entity, Arc<ProjectileState>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// false - visual уже зарегистрирован (запись не трогаем)
    pub fn register(&self, visual: Entity, state: Arc<ProjectileState>) -> bool {
        let mut projectiles = self.write();
        if projectiles.contains_key(&visual) {
            return false;
        }
        projectiles.insert(visual, state);
        logger::log(&format!("📋 Registered projectile: {:?}", visual));
        true
    }

    pub fn lookup(&self, visual: Entity) -> Option<Arc<ProjectileState>> {
        self.read().get(&visual).cloned()
    }

    pub fn contains(&self, visual: Entity) -> bool {
        self.read().contains_key(&visual)
    }

    /// Удаляет запись, только если она принадлежит этому instance.
    /// Повторный вызов - no-op (false).
    pub fn deregister(&self, visual: Entity, state: &Arc<ProjectileState>) -> bool {
        let mut projectiles = self.write();
        let owned_by_state = projectiles
            .get(&visual)
            .is_some_and(|current| Arc::ptr_eq(current, state));
        if !owned_by_state {
            return false;
        }
        projectiles.remove(&visual);
        logger::log(&format!("🗑️ Unregistered projectile: {:?}", visual));
        true
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn handles(&self) -> Vec<Entity> {
        self.read().keys().copied().collect()
    }

    /// Снимок всех instance (для shutdown)
    pub(crate) fn states(&self) -> Vec<Arc<ProjectileState>> {
        self.read().values().cloned().collect()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Entity, Arc<ProjectileState>>> {
        self.projectiles.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Entity, Arc<ProjectileState>>> {
        self.projectiles.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectileConfig;
    use crate::state::{HitboxProbe, Settings, StateParts};
    use bevy::prelude::*;

    fn state_for(visual: Entity) -> Arc<ProjectileState> {
        Arc::new(ProjectileState::new(StateParts {
            visual,
            owner: Entity::from_raw(1),
            settings: Settings::from_config(&ProjectileConfig::default()),
            velocity: Vec3::ZERO,
            velocity_fn: None,
            probe: HitboxProbe::new(Transform::IDENTITY, Vec3::ONE),
            on_hit: Box::new(|_| Ok(false)),
            on_despawn: None,
        }))
    }

    #[test]
    fn test_register_lookup_deregister() {
        let registry = Registry::new();
        let visual = Entity::from_raw(5);
        let state = state_for(visual);

        assert!(registry.register(visual, state.clone()));
        assert!(registry.contains(visual));
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(visual).is_some());

        assert!(registry.deregister(visual, &state));
        assert!(!registry.deregister(visual, &state));
        assert!(registry.lookup(visual).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_register_keeps_first() {
        let registry = Registry::new();
        let visual = Entity::from_raw(5);
        let first = state_for(visual);
        let second = state_for(visual);

        assert!(registry.register(visual, first.clone()));
        assert!(!registry.register(visual, second));

        let current = registry.lookup(visual).unwrap();
        assert!(Arc::ptr_eq(&current, &first));
    }

    #[test]
    fn test_stale_instance_cannot_remove_new_entry() {
        let registry = Registry::new();
        let visual = Entity::from_raw(5);
        let old = state_for(visual);
        let new = state_for(visual);

        registry.register(visual, new.clone());

        // Старый instance с тем же visual не должен снести новую запись
        assert!(!registry.deregister(visual, &old));
        assert!(registry.contains(visual));
    }
}
