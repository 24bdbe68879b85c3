//! Bridge systems (Update, `.chain()`)
//!
//! Порядок кадра:
//! 1. spawn_projectiles - SpawnProjectile → visual entity + ProjectileSystem::spawn
//! 2. mirror_scene - ECS тела / здоровье / флаги → SandboxScene
//! 3. notify_owner_removals - despawned Character → OwnerRemovalHub
//! 4. advance_projectile_ticks - FixedTickScheduler::advance(Time::delta_secs)
//! 5. collect_outcomes - outbox / despawn results / faults → events + логи
//! 6. sync_projectile_visuals - позиции обратно в ECS, despawn уничтоженных
//! 7. apply_projectile_damage - ProjectileHit → Health

use bevy::ecs::entity::Entities;
use bevy::prelude::*;
use std::collections::HashSet;

use projectile_sim::{logger, CharacterInfo, SandboxBody, VisualFlag, VisualHost};

use crate::components::{Character, ForceStop, Frozen, Health, Hurtbox, Obstacle, ProjectileVisual};
use crate::events::{ProjectileDespawned, ProjectileHit, SpawnProjectile};
use crate::runtime::ProjectileRuntime;

pub fn spawn_projectiles(
    mut commands: Commands,
    mut requests: EventReader<SpawnProjectile>,
    runtime: Res<ProjectileRuntime>,
) {
    for request in requests.read() {
        let visual = commands
            .spawn((
                ProjectileVisual { owner: request.owner, damage: request.damage },
                request.origin,
            ))
            .id();

        match runtime.launch(visual, request) {
            Ok(_controller) => {
                // Rotation offset применён к позе в scene - забираем её в ECS
                if let Some(pose) = runtime.scene.transform(visual) {
                    commands.entity(visual).insert(pose);
                }
            }
            Err(error) => {
                logger::log_error(&format!(
                    "❌ SpawnProjectile from {:?} rejected: {}",
                    request.owner, error
                ));
                commands.entity(visual).despawn();
            }
        }
    }
}

pub fn mirror_scene(
    runtime: Res<ProjectileRuntime>,
    characters: Query<(Entity, Option<&Health>), With<Character>>,
    hurtboxes: Query<(Entity, &Transform, &Hurtbox, Option<&ChildOf>)>,
    obstacles: Query<(Entity, &Transform, &Obstacle, Option<&ChildOf>)>,
    visuals: Query<(Entity, &Transform, Has<ForceStop>, Has<Frozen>), With<ProjectileVisual>>,
) {
    let scene = &runtime.scene;
    scene.clear_world();

    for (actor, health) in characters.iter() {
        scene.set_character(
            actor,
            CharacterInfo {
                health: health.map(|health| health.current as f32),
                active: true,
            },
        );
    }

    for (entity, transform, hurtbox, child_of) in hurtboxes.iter() {
        let parent = child_of.map(|child_of| child_of.parent());
        // Hurtbox принадлежит ближайшему Character (сам entity или родитель)
        let actor = if characters.contains(entity) {
            entity
        } else if let Some(parent) = parent.filter(|parent| characters.contains(*parent)) {
            parent
        } else {
            continue;
        };

        scene.upsert_body(entity, SandboxBody::character_part(actor, *transform, hurtbox.half_extents));
        if let Some(parent) = parent {
            scene.set_parent(entity, parent);
        }
    }

    for (entity, transform, obstacle, child_of) in obstacles.iter() {
        let mut body = SandboxBody::wall(*transform, obstacle.half_extents);
        if obstacle.passable {
            body = body.passable();
        }
        scene.upsert_body(entity, body);
        if let Some(child_of) = child_of {
            scene.set_parent(entity, child_of.parent());
        }
    }

    for (visual, transform, force_stop, frozen) in visuals.iter() {
        if !scene.visual_exists(visual) {
            continue;
        }
        scene.set_transform(visual, *transform);
        scene.set_visual_flag(visual, VisualFlag::ForceStop, force_stop);
        scene.set_visual_flag(visual, VisualFlag::Freeze, frozen);
    }
}

/// Только despawn owner'а считается удалением: снятый `Character` на живом
/// entity игнорируется
pub fn notify_owner_removals(
    mut removed: RemovedComponents<Character>,
    entities: &Entities,
    runtime: Res<ProjectileRuntime>,
) {
    for owner in removed.read() {
        if entities.contains(owner) {
            continue;
        }
        runtime.owners.notify_removed(owner);
    }
}

pub fn advance_projectile_ticks(time: Res<Time>, runtime: Res<ProjectileRuntime>) {
    runtime.ticks.advance(time.delta_secs());
}

pub fn collect_outcomes(
    runtime: Res<ProjectileRuntime>,
    mut hits: EventWriter<ProjectileHit>,
    mut despawned: EventWriter<ProjectileDespawned>,
) {
    for result in runtime.system.poll_despawns() {
        if let Err(error) = result {
            logger::log_error(&format!("❌ {}", error));
        }
    }

    for fault in runtime.system.drain_faults() {
        logger::log_warning(&format!("⚠️ Projectile fault: {}", fault));
    }

    let outbox = runtime.take_outbox();
    for hit in outbox.hits {
        hits.write(hit);
    }
    for event in outbox.despawns {
        despawned.write(event);
    }
}

pub fn sync_projectile_visuals(
    mut commands: Commands,
    runtime: Res<ProjectileRuntime>,
    mut visuals: Query<(Entity, &mut Transform), With<ProjectileVisual>>,
) {
    let scene = &runtime.scene;
    let mut alive = HashSet::new();

    for (visual, mut transform) in visuals.iter_mut() {
        alive.insert(visual);
        if let Some(pose) = scene.transform(visual) {
            if *transform != pose {
                *transform = pose;
            }
        }
    }

    for visual in scene.drain_destroyed() {
        if alive.contains(&visual) {
            commands.entity(visual).despawn();
        }
    }

    // Visual удалён gameplay-кодом → instance снесётся на следующем tick
    for (visual, _) in scene.visual_transforms() {
        if !alive.contains(&visual) {
            scene.remove_visual(visual);
        }
    }
}

pub fn apply_projectile_damage(
    mut hits: EventReader<ProjectileHit>,
    mut targets: Query<&mut Health>,
) {
    for hit in hits.read() {
        if hit.shooter == hit.target {
            logger::log_warning(&format!("⚠️ SELF-HIT DETECTED! Entity {:?} hit itself!", hit.shooter));
            continue;
        }

        if let Ok(mut health) = targets.get_mut(hit.target) {
            let before = health.current;
            health.take_damage(hit.damage);
            logger::log_info(&format!(
                "💥 Projectile hit {:?} for {} damage (HP: {} → {})",
                hit.target, hit.damage, before, health.current
            ));
        }
    }
}
