//! CollisionProbe - spatial запросы по hitbox volume
//!
//! Два независимых запроса:
//! 1. Characters - живые активные персонажи (dedup по актору, порядок запроса)
//! 2. WorldGeometry - есть ли непроходимая статика (стена)
//!
//! Exclude list отдаётся в SpatialQuery И перепроверяется на результатах:
//! owner не попадает в цели даже при неаккуратной реализации запроса.

use bevy::prelude::*;
use std::collections::HashSet;

use crate::ports::{BodyContact, HitVolume, QueryFilter, SpatialQuery};

/// owner + ignore list
pub fn exclusion_list(owner: Entity, ignore: &[Entity]) -> Vec<Entity> {
    let mut exclude = Vec::with_capacity(ignore.len() + 1);
    exclude.push(owner);
    exclude.extend(ignore.iter().copied().filter(|entity| *entity != owner));
    exclude
}

fn is_excluded(contact: &BodyContact, exclude: &[Entity]) -> bool {
    if exclude.contains(&contact.body) {
        return true;
    }
    if contact.actor.is_some_and(|actor| exclude.contains(&actor)) {
        return true;
    }
    contact.ancestors.iter().any(|ancestor| exclude.contains(ancestor))
}

/// Контакты → уникальные валидные акторы (first-seen порядок)
pub fn classify_characters(
    spatial: &dyn SpatialQuery,
    contacts: &[BodyContact],
    exclude: &[Entity],
) -> Vec<Entity> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for contact in contacts {
        let Some(actor) = contact.actor else {
            continue; // Не часть персонажа
        };
        if is_excluded(contact, exclude) {
            continue;
        }
        // Один актор - одна проверка за tick, сколько бы частей ни совпало
        if !seen.insert(actor) {
            continue;
        }
        let valid = spatial
            .character(actor)
            .is_some_and(|info| info.is_valid_target());
        if valid {
            targets.push(actor);
        }
    }

    targets
}

pub fn probe_characters(
    spatial: &dyn SpatialQuery,
    volume: &HitVolume,
    owner: Entity,
    ignore: &[Entity],
) -> Vec<Entity> {
    let exclude = exclusion_list(owner, ignore);
    let contacts = spatial.query_volume(volume, &QueryFilter::characters(exclude.clone()));
    classify_characters(spatial, &contacts, &exclude)
}

/// true - hitbox касается непроходимой статики
pub fn probe_walls(
    spatial: &dyn SpatialQuery,
    volume: &HitVolume,
    owner: Entity,
    ignore: &[Entity],
) -> bool {
    let exclude = exclusion_list(owner, ignore);
    spatial
        .query_volume(volume, &QueryFilter::world_geometry(exclude.clone()))
        .iter()
        .filter(|contact| !is_excluded(contact, &exclude))
        .any(|contact| !contact.passable)
}
