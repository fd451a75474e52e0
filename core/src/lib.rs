#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Skirmish simulation.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Drivers submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, query immutable
//! snapshots, and respond exclusively with new command batches.

use std::time::Duration;

pub use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Height at which soldiers walk above the ground plane.
pub const GROUND_HEIGHT: f32 = 0.5;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Rebuilds the battlefield with a square extent and a fixed cell resolution.
    ConfigureBattlefield {
        /// Side length of the square map measured in world units.
        map_width: u32,
        /// Side length of a single partition cell measured in world units.
        cell_size: u32,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Requests that a wandering enemy be placed on the battlefield.
    SpawnEnemy {
        /// World-space position of the new enemy.
        position: Vec3,
    },
    /// Requests that a pursuing friendly be placed on the battlefield.
    SpawnFriendly {
        /// World-space position of the new friendly.
        position: Vec3,
    },
    /// Relocates an enemy and reconciles its partition cell.
    MoveEnemy {
        /// Identifier of the enemy being moved.
        enemy: EnemyId,
        /// Position the enemy occupies after the move.
        position: Vec3,
    },
    /// Relocates a friendly soldier.
    MoveFriendly {
        /// Identifier of the friendly being moved.
        friendly: FriendlyId,
        /// Position the friendly occupies after the move.
        position: Vec3,
    },
    /// Removes an enemy from the battlefield and its partition cell.
    DespawnEnemy {
        /// Identifier of the enemy to remove.
        enemy: EnemyId,
    },
    /// Records which enemy a friendly is currently chasing.
    LockTarget {
        /// Friendly performing the pursuit.
        friendly: FriendlyId,
        /// Enemy being chased, or `None` when the friendly lost sight of every enemy.
        enemy: Option<EnemyId>,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that the battlefield was rebuilt.
    BattlefieldConfigured {
        /// Layout that became active.
        battlefield: Battlefield,
    },
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that an enemy was created and linked into its cell.
    EnemySpawned {
        /// Identifier assigned to the enemy.
        enemy: EnemyId,
        /// Position the enemy spawned at.
        position: Vec3,
        /// Partition cell the enemy was linked into.
        cell: CellCoord,
    },
    /// Confirms that a friendly was created.
    FriendlySpawned {
        /// Identifier assigned to the friendly.
        friendly: FriendlyId,
        /// Position the friendly spawned at.
        position: Vec3,
    },
    /// Reports that a spawn request was rejected.
    SpawnRejected {
        /// Side the rejected soldier would have joined.
        faction: Faction,
        /// Requested spawn position.
        position: Vec3,
        /// Specific reason the spawn failed.
        reason: SpawnError,
    },
    /// Confirms that an enemy moved.
    EnemyMoved {
        /// Identifier of the enemy that moved.
        enemy: EnemyId,
        /// Position held before the move.
        from: Vec3,
        /// Position held after the move.
        to: Vec3,
    },
    /// Announces that a move carried an enemy across a cell boundary.
    EnemyChangedCell {
        /// Identifier of the enemy that was reassigned.
        enemy: EnemyId,
        /// Cell whose list the enemy was unlinked from.
        from: CellCoord,
        /// Cell whose list the enemy now heads.
        to: CellCoord,
    },
    /// Confirms that a friendly moved.
    FriendlyMoved {
        /// Identifier of the friendly that moved.
        friendly: FriendlyId,
        /// Position held before the move.
        from: Vec3,
        /// Position held after the move.
        to: Vec3,
    },
    /// Reports that a move or despawn request referenced an unknown soldier.
    MoveRejected {
        /// Side of the referenced soldier.
        faction: Faction,
        /// Specific reason the request failed.
        reason: MoveError,
    },
    /// Confirms that an enemy was removed from the battlefield.
    EnemyDespawned {
        /// Identifier of the removed enemy.
        enemy: EnemyId,
        /// Cell the enemy was unlinked from.
        cell: CellCoord,
    },
    /// Announces that a friendly started chasing a new enemy.
    TargetAcquired {
        /// Friendly performing the pursuit.
        friendly: FriendlyId,
        /// Enemy now being chased.
        enemy: EnemyId,
    },
    /// Announces that a friendly stopped chasing its enemy.
    TargetLost {
        /// Friendly that lost its target.
        friendly: FriendlyId,
        /// Enemy that was previously chased.
        enemy: EnemyId,
    },
}

/// Side a soldier fights for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    /// Wandering soldiers tracked by the spatial partition.
    Enemy,
    /// Pursuing soldiers that query the partition for the closest enemy.
    Friendly,
}

/// Unique identifier assigned to an enemy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnemyId(u32);

impl EnemyId {
    /// Creates a new enemy identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a friendly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FriendlyId(u32);

impl FriendlyId {
    /// Creates a new friendly identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Location of a single partition cell on the ground plane.
///
/// The column follows the world x axis and the row follows the world z axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }
}

/// Square battlefield partitioned into uniform cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Battlefield {
    map_width: u32,
    cell_size: u32,
}

impl Battlefield {
    /// Creates a new battlefield description.
    #[must_use]
    pub const fn new(map_width: u32, cell_size: u32) -> Self {
        Self {
            map_width,
            cell_size,
        }
    }

    /// Side length of the square map in world units.
    #[must_use]
    pub const fn map_width(&self) -> u32 {
        self.map_width
    }

    /// Side length of a single cell in world units.
    #[must_use]
    pub const fn cell_size(&self) -> u32 {
        self.cell_size
    }

    /// Number of cells along each axis.
    ///
    /// Integer division drops any fractional strip along the far edges; the
    /// partition folds positions inside that strip into the last cell.
    #[must_use]
    pub const fn cells_per_axis(&self) -> u32 {
        if self.cell_size == 0 {
            0
        } else {
            self.map_width / self.cell_size
        }
    }

    /// Reports whether the position lies on the map's ground plane.
    #[must_use]
    pub fn contains(&self, position: Vec3) -> bool {
        let extent = self.map_width as f32;
        (0.0..extent).contains(&position.x) && (0.0..extent).contains(&position.z)
    }

    /// Clamps the ground-plane components of a position into the map.
    ///
    /// The upper bound stays strictly below the map width so the clamped
    /// position still satisfies [`Battlefield::contains`].
    #[must_use]
    pub fn clamp(&self, position: Vec3) -> Vec3 {
        let upper = largest_below(self.map_width as f32);
        Vec3::new(
            position.x.clamp(0.0, upper),
            position.y,
            position.z.clamp(0.0, upper),
        )
    }
}

fn largest_below(value: f32) -> f32 {
    if value <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    f32::from_bits(value.to_bits() - 1)
}

/// Reasons a spawn request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnError {
    /// The requested position lies outside the battlefield.
    OutOfBounds,
    /// The battlefield cannot track any more soldiers.
    CapacityExhausted,
}

/// Reasons a request addressing an existing soldier may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveError {
    /// No soldier with the provided identifier exists.
    UnknownSoldier,
    /// The requested position has a NaN or infinite coordinate.
    NonFinitePosition,
}

/// Immutable representation of a single enemy used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnemySnapshot {
    /// Identifier of the enemy.
    pub id: EnemyId,
    /// Current world-space position.
    pub position: Vec3,
    /// Partition cell the enemy is linked into.
    pub cell: CellCoord,
}

/// Read-only snapshot describing all enemies on the battlefield.
#[derive(Clone, Debug, Default)]
pub struct EnemyView {
    snapshots: Vec<EnemySnapshot>,
}

impl EnemyView {
    /// Creates a new enemy view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<EnemySnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured enemy snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &EnemySnapshot> {
        self.snapshots.iter()
    }

    /// Number of captured snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view holds no snapshots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<EnemySnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a single friendly used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FriendlySnapshot {
    /// Identifier of the friendly.
    pub id: FriendlyId,
    /// Current world-space position.
    pub position: Vec3,
    /// Enemy the friendly is currently chasing, if any.
    pub target: Option<EnemyId>,
}

/// Read-only snapshot describing all friendlies on the battlefield.
#[derive(Clone, Debug, Default)]
pub struct FriendlyView {
    snapshots: Vec<FriendlySnapshot>,
}

impl FriendlyView {
    /// Creates a new friendly view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<FriendlySnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured friendly snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &FriendlySnapshot> {
        self.snapshots.iter()
    }

    /// Number of captured snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view holds no snapshots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<FriendlySnapshot> {
        self.snapshots
    }
}

/// Read-only view of how many enemies each partition cell holds.
#[derive(Clone, Debug)]
pub struct OccupancyView {
    populations: Vec<u32>,
    cells_per_axis: u32,
}

impl OccupancyView {
    /// Captures a new occupancy view from row-major per-cell populations.
    #[must_use]
    pub fn new(populations: Vec<u32>, cells_per_axis: u32) -> Self {
        Self {
            populations,
            cells_per_axis,
        }
    }

    /// Returns the number of enemies linked into the provided cell.
    #[must_use]
    pub fn population(&self, cell: CellCoord) -> u32 {
        self.index(cell)
            .and_then(|index| self.populations.get(index).copied())
            .unwrap_or(0)
    }

    /// Iterates over every cell paired with its population in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, u32)> + '_ {
        let width = self.cells_per_axis.max(1);
        self.populations.iter().enumerate().map(move |(index, &count)| {
            let index = index as u32;
            (CellCoord::new(index % width, index / width), count)
        })
    }

    /// Number of cells along each axis.
    #[must_use]
    pub const fn cells_per_axis(&self) -> u32 {
        self.cells_per_axis
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() < self.cells_per_axis && cell.row() < self.cells_per_axis {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.cells_per_axis).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

/// Aggregated battle statistics published by the analytics system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BattleReport {
    /// Number of ticks observed.
    pub ticks: u64,
    /// Enemies successfully spawned.
    pub enemies_spawned: u32,
    /// Friendlies successfully spawned.
    pub friendlies_spawned: u32,
    /// Spawn requests rejected by the world.
    pub spawns_rejected: u32,
    /// Enemy moves that stayed inside their cell.
    pub same_cell_moves: u64,
    /// Enemy moves that crossed a cell boundary.
    pub cell_crossings: u64,
    /// Times a friendly acquired a new target.
    pub targets_acquired: u32,
    /// Times a friendly lost its target.
    pub targets_lost: u32,
    /// Largest number of enemies observed in a single cell.
    pub peak_cell_population: u32,
    /// Number of cells holding at least one enemy at the last sample.
    pub occupied_cells: u32,
}

#[cfg(test)]
mod tests {
    use super::{
        BattleReport, Battlefield, CellCoord, EnemyId, Faction, MoveError, OccupancyView,
        SpawnError, Vec3,
    };
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn identifiers_and_reasons_round_trip_through_bincode() {
        assert_round_trip(&EnemyId::new(42));
        assert_round_trip(&Faction::Friendly);
        assert_round_trip(&SpawnError::OutOfBounds);
        assert_round_trip(&MoveError::UnknownSoldier);
        assert_round_trip(&MoveError::NonFinitePosition);
        assert_round_trip(&CellCoord::new(3, 9));
    }

    #[test]
    fn battle_report_round_trips_through_bincode() {
        let report = BattleReport {
            ticks: 120,
            enemies_spawned: 30,
            cell_crossings: 17,
            peak_cell_population: 6,
            ..BattleReport::default()
        };
        assert_round_trip(&report);
    }

    #[test]
    fn cells_per_axis_truncates_remainder() {
        assert_eq!(Battlefield::new(20, 10).cells_per_axis(), 2);
        assert_eq!(Battlefield::new(25, 10).cells_per_axis(), 2);
        assert_eq!(Battlefield::new(25, 0).cells_per_axis(), 0);
    }

    #[test]
    fn contains_uses_half_open_extent() {
        let battlefield = Battlefield::new(20, 10);
        assert!(battlefield.contains(Vec3::new(0.0, 0.5, 19.9)));
        assert!(!battlefield.contains(Vec3::new(20.0, 0.5, 1.0)));
        assert!(!battlefield.contains(Vec3::new(-0.1, 0.5, 1.0)));
    }

    #[test]
    fn clamp_keeps_positions_inside_the_map() {
        let battlefield = Battlefield::new(20, 10);
        let clamped = battlefield.clamp(Vec3::new(25.0, 3.0, -4.0));
        assert!(battlefield.contains(clamped));
        assert_eq!(clamped.y, 3.0);
        assert_eq!(clamped.z, 0.0);
    }

    #[test]
    fn occupancy_view_reports_row_major_populations() {
        let view = OccupancyView::new(vec![1, 0, 4, 2], 2);
        assert_eq!(view.population(CellCoord::new(0, 1)), 4);
        assert_eq!(view.population(CellCoord::new(1, 1)), 2);
        assert_eq!(view.population(CellCoord::new(5, 5)), 0);

        let cells: Vec<_> = view.iter().collect();
        assert_eq!(cells[1], (CellCoord::new(1, 0), 0));
        assert_eq!(cells[2], (CellCoord::new(0, 1), 4));
    }
}
