use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::Args;

/// Parameters describing a single headless battle.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SimulationConfig {
    /// Side length of the square battlefield in world units.
    pub(crate) map_width: u32,
    /// Side length of a single partition cell.
    pub(crate) cell_size: u32,
    /// Enemies scattered across the battlefield before the first tick.
    pub(crate) enemies: u32,
    /// Friendlies scattered across the battlefield before the first tick.
    pub(crate) friendlies: u32,
    /// Number of ticks simulated.
    pub(crate) ticks: u32,
    /// Simulated milliseconds per tick.
    pub(crate) tick_ms: u64,
    /// Seed shared by placement and movement.
    pub(crate) seed: u64,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub(crate) log_level: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            map_width: 50,
            cell_size: 10,
            enemies: 40,
            friendlies: 10,
            ticks: 600,
            tick_ms: 100,
            seed: 0x5eed,
            log_level: "info".to_owned(),
        }
    }
}

impl SimulationConfig {
    /// Loads a configuration file, falling back to defaults for missing keys.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read simulation config at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("invalid simulation config at {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse simulation config toml contents")
    }

    /// Applies command-line overrides on top of the loaded values.
    #[must_use]
    pub(crate) fn with_overrides(mut self, args: &Args) -> Self {
        if let Some(map_width) = args.map_width {
            self.map_width = map_width;
        }
        if let Some(cell_size) = args.cell_size {
            self.cell_size = cell_size;
        }
        if let Some(enemies) = args.enemies {
            self.enemies = enemies;
        }
        if let Some(friendlies) = args.friendlies {
            self.friendlies = friendlies;
        }
        if let Some(ticks) = args.ticks {
            self.ticks = ticks;
        }
        if let Some(tick_ms) = args.tick_ms {
            self.tick_ms = tick_ms;
        }
        if let Some(seed) = args.seed {
            self.seed = seed;
        }
        if let Some(log_level) = &args.log_level {
            self.log_level = log_level.clone();
        }
        self
    }

    /// Rejects layouts the world would refuse to configure.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.cell_size == 0 {
            bail!("cell size must be positive");
        }
        if self.map_width < self.cell_size {
            bail!(
                "map width {} is smaller than cell size {}",
                self.map_width,
                self.cell_size
            );
        }
        if self.tick_ms == 0 {
            bail!("tick duration must be positive");
        }
        Ok(())
    }

    /// Simulated time advanced by each tick.
    #[must_use]
    pub(crate) fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
