#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic analytics system that tallies battle statistics from events.

pub mod metrics;

use skirmish_core::{BattleReport, Event, OccupancyView};

/// Pure analytics system that folds world events into a running report.
#[derive(Debug, Default)]
pub struct Analytics {
    report: BattleReport,
}

impl Analytics {
    /// Creates a new analytics system with an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the statistics gathered so far.
    #[must_use]
    pub fn report(&self) -> &BattleReport {
        &self.report
    }

    /// Consumes world events and samples cell occupancy once time has advanced.
    ///
    /// A reconfigured battlefield starts a fresh report. The `occupancy`
    /// closure is invoked at most once per call and only when the events
    /// contain a tick, so spawn bursts between ticks neither inflate the peak
    /// population nor pay for a walk over every cell.
    pub fn handle<F>(&mut self, events: &[Event], occupancy: F)
    where
        F: FnOnce() -> OccupancyView,
    {
        let mut tick_observed = false;

        for event in events {
            match event {
                Event::BattlefieldConfigured { .. } => self.report = BattleReport::default(),
                Event::TimeAdvanced { .. } => {
                    self.report.ticks += 1;
                    tick_observed = true;
                }
                Event::EnemySpawned { .. } => self.report.enemies_spawned += 1,
                Event::FriendlySpawned { .. } => self.report.friendlies_spawned += 1,
                Event::SpawnRejected { .. } => self.report.spawns_rejected += 1,
                Event::EnemyMoved { .. } => self.report.same_cell_moves += 1,
                Event::EnemyChangedCell { .. } => {
                    // Every crossing is preceded by its `EnemyMoved`.
                    self.report.same_cell_moves = self.report.same_cell_moves.saturating_sub(1);
                    self.report.cell_crossings += 1;
                }
                Event::TargetAcquired { .. } => self.report.targets_acquired += 1,
                Event::TargetLost { .. } => self.report.targets_lost += 1,
                _ => {}
            }
        }

        if !tick_observed {
            return;
        }

        let occupancy = occupancy();
        self.report.peak_cell_population = self
            .report
            .peak_cell_population
            .max(metrics::peak_population(&occupancy));
        self.report.occupied_cells = metrics::occupied_cells(&occupancy);
    }
}
