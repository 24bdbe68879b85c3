//! ProjectilePlugin integration tests
//!
//! Headless App (MinimalPlugins, ManualDuration 1/60): выстрел → hit → урон,
//! стена, удаление owner'а, ForceStop.

use bevy::prelude::*;

use projectile_bevy::*;

const FRAME_DT: f32 = 1.0 / 60.0;

#[derive(Resource, Default)]
struct Seen {
    hits: Vec<ProjectileHit>,
    despawns: Vec<ProjectileDespawned>,
}

fn record_events(
    mut seen: ResMut<Seen>,
    mut hits: EventReader<ProjectileHit>,
    mut despawns: EventReader<ProjectileDespawned>,
) {
    seen.hits.extend(hits.read().copied());
    seen.despawns.extend(despawns.read().copied());
}

fn create_test_app() -> App {
    let mut app = create_headless_app(FRAME_DT);
    app.init_resource::<Seen>()
        .add_systems(Update, record_events.after(ProjectileSystems));
    app
}

fn spawn_character(app: &mut App, position: Vec3, hp: u32) -> Entity {
    app.world_mut()
        .spawn((
            Character,
            Health::new(hp),
            Hurtbox { half_extents: Vec3::splat(0.5) },
            Transform::from_translation(position),
        ))
        .id()
}

fn fire(app: &mut App, request: SpawnProjectile) {
    app.world_mut().send_event(request);
}

/// Прогон кадров + ожидание async despawn + ещё пара кадров на доставку events
fn run_frames(app: &mut App, frames: usize) {
    for _ in 0..frames {
        app.update();
    }
    let runtime = app.world().resource::<ProjectileRuntime>().clone();
    for result in runtime.system.wait_for_despawns() {
        assert!(result.is_ok(), "despawn failed: {:?}", result);
    }
    app.update();
    app.update();
}

fn visual_count(app: &mut App) -> usize {
    let mut query = app.world_mut().query::<&ProjectileVisual>();
    query.iter(app.world()).count()
}

/// Test: выстрел попадает во врага, урон применяется, visual удалён
#[test]
fn test_shot_damages_target() {
    let mut app = create_test_app();
    let shooter = spawn_character(&mut app, Vec3::ZERO, 100);
    let target = spawn_character(&mut app, Vec3::new(0.0, 0.0, -6.0), 100);
    app.update();

    fire(
        &mut app,
        SpawnProjectile::new(shooter, Transform::IDENTITY, 25).with_velocity(Vec3::new(0.0, 0.0, -20.0)),
    );
    run_frames(&mut app, 60);

    let health = app.world().get::<Health>(target).copied();
    assert_eq!(health.map(|health| health.current), Some(75));
    assert_eq!(app.world().get::<Health>(shooter).map(|health| health.current), Some(100));

    let seen = app.world().resource::<Seen>();
    assert_eq!(seen.hits.len(), 1);
    assert_eq!(seen.hits[0].shooter, shooter);
    assert_eq!(seen.hits[0].target, target);
    assert_eq!(seen.despawns.len(), 1);
    assert!(seen.despawns[0].hit);

    assert_eq!(visual_count(&mut app), 0);
    assert_eq!(app.world().resource::<ProjectileRuntime>().system.active_count(), 0);
}

/// Test: стена останавливает projectile, урона нет
#[test]
fn test_obstacle_blocks_shot() {
    let mut app = create_test_app();
    let shooter = spawn_character(&mut app, Vec3::ZERO, 100);
    let target = spawn_character(&mut app, Vec3::new(0.0, 0.0, -10.0), 100);
    app.world_mut().spawn((
        Obstacle::solid(Vec3::new(3.0, 3.0, 0.2)),
        Transform::from_xyz(0.0, 0.0, -5.0),
    ));
    app.update();

    fire(
        &mut app,
        SpawnProjectile::new(shooter, Transform::IDENTITY, 25).with_velocity(Vec3::new(0.0, 0.0, -20.0)),
    );
    run_frames(&mut app, 60);

    assert_eq!(app.world().get::<Health>(target).map(|health| health.current), Some(100));
    let seen = app.world().resource::<Seen>();
    assert!(seen.hits.is_empty());
    assert_eq!(seen.despawns.len(), 1);
    assert!(seen.despawns[0].hit_wall);
    assert_eq!(visual_count(&mut app), 0);
}

/// Test: owner despawn → projectile снесён без despawn event
#[test]
fn test_owner_despawn_destroys_projectile() {
    let mut app = create_test_app();
    let shooter = spawn_character(&mut app, Vec3::ZERO, 100);
    app.update();

    fire(
        &mut app,
        SpawnProjectile::new(shooter, Transform::IDENTITY, 25).with_velocity(Vec3::new(0.0, 0.0, -5.0)),
    );
    app.update();
    app.update();
    assert_eq!(visual_count(&mut app), 1);
    assert_eq!(app.world().resource::<ProjectileRuntime>().system.active_count(), 1);

    app.world_mut().despawn(shooter);
    run_frames(&mut app, 3);

    assert_eq!(app.world().resource::<ProjectileRuntime>().system.active_count(), 0);
    assert_eq!(visual_count(&mut app), 0);
    assert!(app.world().resource::<Seen>().despawns.is_empty());
}

/// Test: снятый и возвращённый Character не считается удалением owner'а
#[test]
fn test_character_component_removal_keeps_owner() {
    let mut app = create_test_app();
    let shooter = spawn_character(&mut app, Vec3::ZERO, 100);
    app.update();

    fire(
        &mut app,
        SpawnProjectile::new(shooter, Transform::IDENTITY, 25).with_velocity(Vec3::new(0.0, 0.0, -5.0)),
    );
    app.update();

    app.world_mut().entity_mut(shooter).remove::<Character>();
    app.update();
    app.world_mut().entity_mut(shooter).insert(Character);
    app.update();
    assert_eq!(app.world().resource::<ProjectileRuntime>().system.active_count(), 1);

    fire(
        &mut app,
        SpawnProjectile::new(shooter, Transform::IDENTITY, 25).with_velocity(Vec3::new(0.0, 0.0, -5.0)),
    );
    app.update();
    app.update();

    assert_eq!(visual_count(&mut app), 2);
    let runtime = app.world().resource::<ProjectileRuntime>();
    assert_eq!(runtime.system.active_count(), 2);
    assert_eq!(runtime.owners.tombstone_count(), 0);
}

/// Test: ForceStop на visual → timeout despawn (false, false)
#[test]
fn test_force_stop_component() {
    let mut app = create_test_app();
    let shooter = spawn_character(&mut app, Vec3::ZERO, 100);
    app.update();

    fire(
        &mut app,
        SpawnProjectile::new(shooter, Transform::IDENTITY, 25).with_velocity(Vec3::new(0.0, 0.0, -5.0)),
    );
    app.update();

    let visual = {
        let mut query = app.world_mut().query_filtered::<Entity, With<ProjectileVisual>>();
        query.iter(app.world()).next()
    };
    let Some(visual) = visual else {
        panic!("projectile visual не создан");
    };
    app.world_mut().entity_mut(visual).insert(ForceStop);
    run_frames(&mut app, 3);

    let seen = app.world().resource::<Seen>();
    assert_eq!(seen.despawns.len(), 1);
    assert!(!seen.despawns[0].hit && !seen.despawns[0].hit_wall);
    assert!(app.world().get_entity(visual).is_err());
}

/// Test: visual двигается в ECS вместе с projectile
#[test]
fn test_visual_transform_follows_projectile() {
    let mut app = create_test_app();
    let shooter = spawn_character(&mut app, Vec3::ZERO, 100);
    app.update();

    fire(
        &mut app,
        SpawnProjectile::new(shooter, Transform::IDENTITY, 25).with_velocity(Vec3::new(0.0, 0.0, -6.0)),
    );
    for _ in 0..30 {
        app.update();
    }

    let mut query = app.world_mut().query_filtered::<&Transform, With<ProjectileVisual>>();
    let z = query.iter(app.world()).next().map(|transform| transform.translation.z);
    assert!(z.is_some_and(|z| z < -1.0 && z > -4.0), "z = {:?}", z);
}

/// Test: конфиг с нулевой частотой отклоняется, visual не остаётся
#[test]
fn test_invalid_tuning_rejected() {
    let mut app = create_test_app();
    let shooter = spawn_character(&mut app, Vec3::ZERO, 100);
    app.update();

    let tuning = projectile_sim::ProjectileTuning { tick_frequency: 0.0, ..Default::default() };
    fire(&mut app, SpawnProjectile::new(shooter, Transform::IDENTITY, 25).with_tuning(tuning));
    app.update();
    app.update();

    assert_eq!(visual_count(&mut app), 0);
    assert_eq!(app.world().resource::<ProjectileRuntime>().system.active_count(), 0);
}
