//! Metrics derived from the per-cell enemy population.

use skirmish_core::{CellCoord, OccupancyView};

/// Largest number of enemies sharing a single cell.
#[must_use]
pub fn peak_population(occupancy: &OccupancyView) -> u32 {
    occupancy
        .iter()
        .map(|(_, population)| population)
        .max()
        .unwrap_or(0)
}

/// Number of cells holding at least one enemy.
#[must_use]
pub fn occupied_cells(occupancy: &OccupancyView) -> u32 {
    let occupied = occupancy
        .iter()
        .filter(|(_, population)| *population > 0)
        .count();
    u32::try_from(occupied).unwrap_or(u32::MAX)
}

/// Cell holding the most enemies, preferring the first in row-major order on ties.
///
/// Returns `None` when every cell is empty.
#[must_use]
pub fn busiest_cell(occupancy: &OccupancyView) -> Option<(CellCoord, u32)> {
    let mut best: Option<(CellCoord, u32)> = None;
    for (cell, population) in occupancy.iter() {
        if population == 0 {
            continue;
        }
        let replace = match best {
            None => true,
            Some((_, best_population)) => population > best_population,
        };
        if replace {
            best = Some((cell, population));
        }
    }
    best
}
