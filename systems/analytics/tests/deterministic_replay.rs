use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    time::Duration,
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skirmish_core::{BattleReport, Command, Event, Vec3, GROUND_HEIGHT};
use skirmish_system_analytics::Analytics;
use skirmish_system_movement::{Config, Movement};
use skirmish_world::{self as world, query, World};

#[test]
fn battle_reports_are_deterministic_for_seed() {
    let first = replay(0x00c0_ffee);
    let second = replay(0x00c0_ffee);

    assert_eq!(first, second, "battle replay diverged");
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(first.report.ticks, 150);
    assert_eq!(first.report.enemies_spawned, 12);
    assert_eq!(first.report.friendlies_spawned, 6);
    assert!(first.report.cell_crossings > 0);
}

fn replay(seed: u64) -> ReplayOutcome {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut world = World::new();
    let mut analytics = Analytics::new();
    let mut pending = Vec::new();

    let mut setup = vec![Command::ConfigureBattlefield {
        map_width: 60,
        cell_size: 15,
    }];
    for _ in 0..12 {
        setup.push(Command::SpawnEnemy {
            position: random_position(&mut rng, 60.0),
        });
    }
    for _ in 0..6 {
        setup.push(Command::SpawnFriendly {
            position: random_position(&mut rng, 60.0),
        });
    }
    for command in setup {
        submit(&mut world, &mut analytics, &mut pending, command);
    }

    let mut movement = Movement::new(Config::new(query::battlefield(&world), seed));
    let mut final_positions = Vec::new();
    for _ in 0..150 {
        submit(
            &mut world,
            &mut analytics,
            &mut pending,
            Command::Tick {
                dt: Duration::from_millis(100),
            },
        );

        let events = std::mem::take(&mut pending);
        let enemies = query::enemy_view(&world);
        let friendlies = query::friendly_view(&world);
        let mut commands = Vec::new();
        movement.handle(
            &events,
            &enemies,
            &friendlies,
            |position| query::closest_enemy(&world, position),
            &mut commands,
        );
        for command in commands {
            submit(&mut world, &mut analytics, &mut pending, command);
        }
    }

    for enemy in query::enemy_view(&world).iter() {
        final_positions.push(enemy.position.to_array().map(f32::to_bits));
    }

    ReplayOutcome {
        report: *analytics.report(),
        final_positions,
    }
}

fn submit(
    world: &mut World,
    analytics: &mut Analytics,
    pending: &mut Vec<Event>,
    command: Command,
) {
    let mut events = Vec::new();
    world::apply(world, command, &mut events);
    analytics.handle(&events, || query::occupancy_view(world));
    pending.extend(events);
}

fn random_position(rng: &mut ChaCha8Rng, extent: f32) -> Vec3 {
    Vec3::new(
        rng.gen_range(0.0..extent),
        GROUND_HEIGHT,
        rng.gen_range(0.0..extent),
    )
}

#[derive(Debug, PartialEq, Eq)]
struct ReplayOutcome {
    report: BattleReport,
    final_positions: Vec<[u32; 3]>,
}

impl ReplayOutcome {
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.report.hash(&mut hasher);
        self.final_positions.hash(&mut hasher);
        hasher.finish()
    }
}
