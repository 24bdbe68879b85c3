//! Headless projectile demo
//!
//! Две команды стрелков и стена посередине; каждые полсекунды случайный
//! стрелок стреляет в случайного врага. Seeded (ChaCha8Rng): одинаковый seed
//! даёт одинаковую статистику.
//!
//! Использование: `projectile_demo [seed] [tuning.toml]`

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use projectile_bevy::*;
use projectile_sim::ProjectileTuning;

const FRAME_DT: f32 = 1.0 / 60.0;
const FRAMES: usize = 1200;
const VOLLEY_EVERY: usize = 30;

#[derive(Resource)]
struct DemoRng(ChaCha8Rng);

#[derive(Resource)]
struct DemoTuning(ProjectileTuning);

#[derive(Resource, Default, Debug)]
struct DemoStats {
    fired: usize,
    hits: usize,
    walls: usize,
    timeouts: usize,
}

#[derive(Component)]
struct Team(u8);

fn main() {
    let mut args = std::env::args().skip(1);
    let seed = args.next().and_then(|raw| raw.parse().ok()).unwrap_or(42u64);
    let tuning = match args.next() {
        Some(path) => match load_tuning(&path) {
            Ok(tuning) => tuning,
            Err(message) => {
                eprintln!("❌ {}", message);
                std::process::exit(1);
            }
        },
        None => ProjectileTuning::default(),
    };

    println!("Starting projectile demo (seed: {}, tuning: {:?})", seed, tuning);

    let mut app = create_headless_app(FRAME_DT);
    app.insert_resource(DemoRng(ChaCha8Rng::seed_from_u64(seed)))
        .insert_resource(DemoTuning(tuning))
        .init_resource::<DemoStats>()
        .add_systems(Startup, setup_arena)
        .add_systems(Update, fire_volley.before(ProjectileSystems))
        .add_systems(Update, count_outcomes.after(ProjectileSystems));

    for frame in 0..FRAMES {
        app.update();

        if frame % 300 == 0 {
            let alive = app.world().resource::<ProjectileRuntime>().system.active_count();
            println!("Frame {}: {} projectiles in flight", frame, alive);
        }
    }

    let runtime = app.world().resource::<ProjectileRuntime>().clone();
    runtime.shutdown();

    let stats = app.world().resource::<DemoStats>();
    println!(
        "Demo complete: fired={} hits={} walls={} timeouts={}",
        stats.fired, stats.hits, stats.walls, stats.timeouts
    );

    let mut survivors = app.world_mut().query::<(&Team, &Health)>();
    for (team, health) in survivors.iter(app.world()) {
        println!("  team {} → HP {}/{}", team.0, health.current, health.max);
    }
}

fn load_tuning(path: &str) -> Result<ProjectileTuning, String> {
    let text = std::fs::read_to_string(path).map_err(|err| format!("Failed to read {}: {}", path, err))?;
    ProjectileTuning::from_toml_str(&text).map_err(|err| format!("Invalid tuning {}: {}", path, err))
}

fn setup_arena(mut commands: Commands, mut rng: ResMut<DemoRng>) {
    for team in 0..2u8 {
        let z = if team == 0 { 12.0 } else { -12.0 };
        for _ in 0..4 {
            let x = rng.0.gen_range(-8.0..8.0);
            commands.spawn((
                Character,
                Team(team),
                Health::new(100),
                Hurtbox { half_extents: Vec3::new(0.4, 0.9, 0.4) },
                Transform::from_xyz(x, 0.0, z),
            ));
        }
    }

    // Стена с проходом посередине
    commands.spawn((Obstacle::solid(Vec3::new(4.0, 2.0, 0.2)), Transform::from_xyz(-6.0, 0.0, 0.0)));
    commands.spawn((Obstacle::solid(Vec3::new(4.0, 2.0, 0.2)), Transform::from_xyz(6.0, 0.0, 0.0)));
}

fn fire_volley(
    mut frame: Local<usize>,
    mut rng: ResMut<DemoRng>,
    tuning: Res<DemoTuning>,
    mut stats: ResMut<DemoStats>,
    shooters: Query<(Entity, &Transform, &Team, &Health)>,
    mut requests: EventWriter<SpawnProjectile>,
) {
    *frame += 1;
    if *frame % VOLLEY_EVERY != 0 {
        return;
    }

    let alive: Vec<_> = shooters.iter().filter(|(_, _, _, health)| health.is_alive()).collect();
    if alive.is_empty() {
        return;
    }

    let (shooter, from, team, _) = alive[rng.0.gen_range(0..alive.len())];
    let enemies: Vec<_> = alive.iter().filter(|(_, _, other, _)| other.0 != team.0).collect();
    if enemies.is_empty() {
        return;
    }
    let (_, to, _, _) = enemies[rng.0.gen_range(0..enemies.len())];

    let origin = Transform::from_translation(from.translation).looking_at(to.translation, Vec3::Y);
    let damage = rng.0.gen_range(10..30);

    requests.write(SpawnProjectile::new(shooter, origin, damage).with_tuning(tuning.0.clone()));
    stats.fired += 1;
}

fn count_outcomes(mut despawned: EventReader<ProjectileDespawned>, mut stats: ResMut<DemoStats>) {
    for event in despawned.read() {
        match (event.hit, event.hit_wall) {
            (true, _) => stats.hits += 1,
            (false, true) => stats.walls += 1,
            (false, false) => stats.timeouts += 1,
        }
    }
}
