#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a headless skirmish and summarises it.

mod config;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skirmish_core::{BattleReport, Command, Event, Vec3, GROUND_HEIGHT};
use skirmish_system_analytics::{metrics, Analytics};
use skirmish_system_movement::{Config as MovementConfig, Movement};
use skirmish_world::{self as world, query, World};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::SimulationConfig;

/// Ticks between progress lines at debug level.
const PROGRESS_INTERVAL: u32 = 50;

/// Runs enemies and friendlies across a partitioned battlefield.
#[derive(Debug, Parser)]
#[command(name = "skirmish", version, about)]
pub(crate) struct Args {
    /// TOML file providing simulation parameters.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    /// Side length of the square battlefield.
    #[arg(long)]
    pub(crate) map_width: Option<u32>,
    /// Side length of a partition cell.
    #[arg(long)]
    pub(crate) cell_size: Option<u32>,
    /// Number of enemies to spawn.
    #[arg(long)]
    pub(crate) enemies: Option<u32>,
    /// Number of friendlies to spawn.
    #[arg(long)]
    pub(crate) friendlies: Option<u32>,
    /// Number of ticks to simulate.
    #[arg(long)]
    pub(crate) ticks: Option<u32>,
    /// Simulated milliseconds per tick.
    #[arg(long)]
    pub(crate) tick_ms: Option<u64>,
    /// Seed for placement and movement.
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long)]
    pub(crate) log_level: Option<String>,
}

/// Entry point for the skirmish command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    }
    .with_overrides(&args);
    config.validate()?;
    init_tracing(&config.log_level);

    let report = run(&config)?;
    info!(
        ticks = report.ticks,
        enemies = report.enemies_spawned,
        friendlies = report.friendlies_spawned,
        rejected = report.spawns_rejected,
        same_cell_moves = report.same_cell_moves,
        cell_crossings = report.cell_crossings,
        targets_acquired = report.targets_acquired,
        targets_lost = report.targets_lost,
        peak_cell_population = report.peak_cell_population,
        occupied_cells = report.occupied_cells,
        "battle finished"
    );
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

struct Battle {
    world: World,
    analytics: Analytics,
    pending: Vec<Event>,
}

impl Battle {
    fn submit(&mut self, command: Command) {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        let world = &self.world;
        self.analytics
            .handle(&events, || query::occupancy_view(world));
        self.pending.extend(events);
    }
}

fn run(config: &SimulationConfig) -> Result<BattleReport> {
    let mut battle = Battle {
        world: World::new(),
        analytics: Analytics::new(),
        pending: Vec::new(),
    };
    battle.submit(Command::ConfigureBattlefield {
        map_width: config.map_width,
        cell_size: config.cell_size,
    });
    let battlefield = query::battlefield(&battle.world);
    if battlefield.map_width() != config.map_width || battlefield.cell_size() != config.cell_size {
        bail!(
            "world refused battlefield of width {} with cell size {}",
            config.map_width,
            config.cell_size
        );
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let extent = config.map_width as f32;
    for _ in 0..config.enemies {
        battle.submit(Command::SpawnEnemy {
            position: random_position(&mut rng, extent),
        });
    }
    for _ in 0..config.friendlies {
        battle.submit(Command::SpawnFriendly {
            position: random_position(&mut rng, extent),
        });
    }
    info!(
        map_width = config.map_width,
        cell_size = config.cell_size,
        cells_per_axis = battlefield.cells_per_axis(),
        enemies = config.enemies,
        friendlies = config.friendlies,
        "battlefield populated"
    );

    let mut movement = Movement::new(MovementConfig::new(battlefield, rng.gen()));
    for tick in 1..=config.ticks {
        battle.submit(Command::Tick { dt: config.tick() });

        let events = std::mem::take(&mut battle.pending);
        let enemies = query::enemy_view(&battle.world);
        let friendlies = query::friendly_view(&battle.world);
        let mut commands = Vec::new();
        let world = &battle.world;
        movement.handle(
            &events,
            &enemies,
            &friendlies,
            |position| query::closest_enemy(world, position),
            &mut commands,
        );
        for command in commands {
            battle.submit(command);
        }

        if tick % PROGRESS_INTERVAL == 0 {
            let occupancy = query::occupancy_view(&battle.world);
            debug!(
                tick,
                crossings = battle.analytics.report().cell_crossings,
                busiest = ?metrics::busiest_cell(&occupancy),
                "battle progress"
            );
        }
    }

    Ok(*battle.analytics.report())
}

fn random_position(rng: &mut ChaCha8Rng, extent: f32) -> Vec3 {
    Vec3::new(
        rng.gen_range(0.0..extent),
        GROUND_HEIGHT,
        rng.gen_range(0.0..extent),
    )
}
