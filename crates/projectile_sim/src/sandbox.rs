//! SandboxScene - in-memory VisualHost + SpatialQuery
//!
//! Используется в тестах, headless demo и Bevy bridge (как зеркало ECS мира).
//! Тела - box'ы произвольной ориентации, пересечение считается по
//! world-space AABB (`bevy::math::bounding::Aabb3d`).

use bevy::math::bounding::{Aabb3d, IntersectsVolume};
use bevy::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use crate::ports::{
    BodyContact, CharacterInfo, HitVolume, QueryFilter, QueryLayer, SpatialQuery, VisualFlag,
    VisualHost,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SandboxBody {
    pub transform: Transform,
    pub half_extents: Vec3,
    pub layer: QueryLayer,
    /// Актор, которому принадлежит тело (для Characters layer)
    pub actor: Option<Entity>,
    pub passable: bool,
}

impl SandboxBody {
    pub fn wall(transform: Transform, half_extents: Vec3) -> Self {
        Self {
            transform,
            half_extents,
            layer: QueryLayer::WorldGeometry,
            actor: None,
            passable: false,
        }
    }

    pub fn character_part(actor: Entity, transform: Transform, half_extents: Vec3) -> Self {
        Self {
            transform,
            half_extents,
            layer: QueryLayer::Characters,
            actor: Some(actor),
            passable: false,
        }
    }

    pub fn passable(mut self) -> Self {
        self.passable = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
struct SandboxVisual {
    transform: Transform,
    flags: HashSet<VisualFlag>,
}

#[derive(Default)]
struct VisualStore {
    visuals: HashMap<Entity, SandboxVisual>,
    destroy_calls: HashMap<Entity, usize>,
    /// Уничтоженные с последнего `drain_destroyed`
    pending_destroyed: Vec<Entity>,
}

#[derive(Default)]
struct WorldStore {
    bodies: HashMap<Entity, SandboxBody>,
    parents: HashMap<Entity, Entity>,
    characters: HashMap<Entity, CharacterInfo>,
}

impl WorldStore {
    fn ancestors(&self, entity: Entity) -> Vec<Entity> {
        let mut chain = Vec::new();
        let mut current = entity;
        while let Some(parent) = self.parents.get(&current).copied() {
            // Цикл в иерархии - обрываем
            if parent == entity || chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }
}

pub struct SandboxScene {
    next_index: AtomicU32,
    visuals: RwLock<VisualStore>,
    world: RwLock<WorldStore>,
}

impl Default for SandboxScene {
    fn default() -> Self {
        Self {
            next_index: AtomicU32::new(1),
            visuals: RwLock::new(VisualStore::default()),
            world: RwLock::new(WorldStore::default()),
        }
    }
}

/// World AABB повёрнутого box'а
pub fn world_aabb(transform: &Transform, half_extents: Vec3) -> Aabb3d {
    let rotation = Mat3::from_quat(transform.rotation);
    let scaled = half_extents * transform.scale.abs();
    let extent = rotation.x_axis.abs() * scaled.x
        + rotation.y_axis.abs() * scaled.y
        + rotation.z_axis.abs() * scaled.z;
    Aabb3d::new(transform.translation, extent)
}

impl SandboxScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Новый entity id (только для entity, созданных самим sandbox)
    pub fn allocate(&self) -> Entity {
        Entity::from_raw(self.next_index.fetch_add(1, Ordering::Relaxed))
    }

    // ---------- Visuals ----------

    pub fn spawn_visual(&self, transform: Transform) -> Entity {
        let visual = self.allocate();
        self.insert_visual(visual, transform);
        visual
    }

    pub fn insert_visual(&self, visual: Entity, transform: Transform) {
        let mut store = write(&self.visuals);
        store.visuals.insert(visual, SandboxVisual { transform, flags: HashSet::new() });
    }

    pub fn set_visual_flag(&self, visual: Entity, flag: VisualFlag, enabled: bool) {
        let mut store = write(&self.visuals);
        if let Some(entry) = store.visuals.get_mut(&visual) {
            if enabled {
                entry.flags.insert(flag);
            } else {
                entry.flags.remove(&flag);
            }
        }
    }

    pub fn visual_exists(&self, visual: Entity) -> bool {
        read(&self.visuals).visuals.contains_key(&visual)
    }

    /// Сколько раз host получил destroy для visual
    pub fn destroy_calls(&self, visual: Entity) -> usize {
        read(&self.visuals).destroy_calls.get(&visual).copied().unwrap_or(0)
    }

    pub fn drain_destroyed(&self) -> Vec<Entity> {
        std::mem::take(&mut write(&self.visuals).pending_destroyed)
    }

    /// Visual удалён извне (не через VisualHost::destroy)
    pub fn remove_visual(&self, visual: Entity) -> bool {
        write(&self.visuals).visuals.remove(&visual).is_some()
    }

    pub fn visual_transforms(&self) -> Vec<(Entity, Transform)> {
        let mut transforms: Vec<_> = read(&self.visuals)
            .visuals
            .iter()
            .map(|(visual, entry)| (*visual, entry.transform))
            .collect();
        transforms.sort_by_key(|(visual, _)| visual.index());
        transforms
    }

    // ---------- World ----------

    /// Персонаж с одним телом (сам актор)
    pub fn spawn_character(&self, position: Vec3, half_extents: Vec3, health: f32) -> Entity {
        let actor = self.allocate();
        self.upsert_body(
            actor,
            SandboxBody::character_part(actor, Transform::from_translation(position), half_extents),
        );
        self.set_character(actor, CharacterInfo { health: Some(health), active: true });
        actor
    }

    /// Дополнительная часть тела (child актора)
    pub fn add_character_part(&self, actor: Entity, position: Vec3, half_extents: Vec3) -> Entity {
        let part = self.allocate();
        self.upsert_body(
            part,
            SandboxBody::character_part(actor, Transform::from_translation(position), half_extents),
        );
        self.set_parent(part, actor);
        part
    }

    pub fn spawn_wall(&self, position: Vec3, half_extents: Vec3) -> Entity {
        let wall = self.allocate();
        self.upsert_body(wall, SandboxBody::wall(Transform::from_translation(position), half_extents));
        wall
    }

    pub fn upsert_body(&self, entity: Entity, body: SandboxBody) {
        write(&self.world).bodies.insert(entity, body);
    }

    pub fn remove_body(&self, entity: Entity) -> bool {
        let mut world = write(&self.world);
        world.parents.remove(&entity);
        world.bodies.remove(&entity).is_some()
    }

    pub fn set_parent(&self, child: Entity, parent: Entity) {
        write(&self.world).parents.insert(child, parent);
    }

    pub fn set_character(&self, actor: Entity, info: CharacterInfo) {
        write(&self.world).characters.insert(actor, info);
    }

    pub fn set_health(&self, actor: Entity, health: Option<f32>) {
        if let Some(info) = write(&self.world).characters.get_mut(&actor) {
            info.health = health;
        }
    }

    pub fn remove_character(&self, actor: Entity) {
        let mut world = write(&self.world);
        world.characters.remove(&actor);
        world.bodies.retain(|_, body| body.actor != Some(actor));
        world.parents.retain(|child, parent| *child != actor && *parent != actor);
    }

    /// Полная очистка мира (Bevy bridge пересобирает зеркало каждый кадр)
    pub fn clear_world(&self) {
        let mut world = write(&self.world);
        world.bodies.clear();
        world.parents.clear();
        world.characters.clear();
    }
}

impl VisualHost for SandboxScene {
    fn transform(&self, visual: Entity) -> Option<Transform> {
        read(&self.visuals).visuals.get(&visual).map(|entry| entry.transform)
    }

    fn set_transform(&self, visual: Entity, transform: Transform) {
        if let Some(entry) = write(&self.visuals).visuals.get_mut(&visual) {
            entry.transform = transform;
        }
    }

    fn has_flag(&self, visual: Entity, flag: VisualFlag) -> bool {
        read(&self.visuals)
            .visuals
            .get(&visual)
            .is_some_and(|entry| entry.flags.contains(&flag))
    }

    fn destroy(&self, visual: Entity) {
        let mut store = write(&self.visuals);
        *store.destroy_calls.entry(visual).or_default() += 1;
        if store.visuals.remove(&visual).is_some() {
            store.pending_destroyed.push(visual);
        }
    }
}

impl SpatialQuery for SandboxScene {
    fn query_volume(&self, volume: &HitVolume, filter: &QueryFilter) -> Vec<BodyContact> {
        let probe = world_aabb(&volume.transform, volume.size * 0.5);
        let world = read(&self.world);

        let mut contacts: Vec<BodyContact> = world
            .bodies
            .iter()
            .filter(|(_, body)| body.layer == filter.layer)
            .filter(|(_, body)| probe.intersects(&world_aabb(&body.transform, body.half_extents)))
            .map(|(entity, body)| BodyContact {
                body: *entity,
                actor: body.actor,
                ancestors: world.ancestors(*entity),
                passable: body.passable,
            })
            .filter(|contact| {
                !filter.exclude.contains(&contact.body)
                    && !contact.ancestors.iter().any(|ancestor| filter.exclude.contains(ancestor))
            })
            .collect();

        // HashMap порядок нестабилен - сортируем для детерминизма
        contacts.sort_by_key(|contact| contact.body.index());
        contacts
    }

    fn character(&self, actor: Entity) -> Option<CharacterInfo> {
        read(&self.world).characters.get(&actor).copied()
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
