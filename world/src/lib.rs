#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Skirmish.
//!
//! Enemies live inside a [`grid::SpatialGrid`] so that friendlies can ask for
//! the closest enemy sharing their cell. Friendlies are not partitioned.

pub mod grid;

use std::time::Duration;

use skirmish_core::{
    Battlefield, Command, EnemyId, Event, Faction, FriendlyId, MoveError, SpawnError, Vec3,
};
use tracing::{debug, trace, warn};

use crate::grid::{CellChange, SoldierId, SpatialGrid};

/// Side length of the default map in world units.
pub const DEFAULT_MAP_WIDTH: u32 = 50;
/// Side length of a default partition cell in world units.
pub const DEFAULT_CELL_SIZE: u32 = 10;

/// Represents the authoritative Skirmish world state.
#[derive(Debug)]
pub struct World {
    battlefield: Battlefield,
    grid: SpatialGrid,
    friendlies: Vec<Friendly>,
    tick_index: u64,
    elapsed: Duration,
}

impl World {
    /// Creates a world with the default battlefield and no soldiers.
    #[must_use]
    pub fn new() -> Self {
        let battlefield = Battlefield::new(DEFAULT_MAP_WIDTH, DEFAULT_CELL_SIZE);
        Self {
            battlefield,
            grid: SpatialGrid::new(DEFAULT_MAP_WIDTH, DEFAULT_CELL_SIZE)
                .expect("default battlefield holds at least one cell"),
            friendlies: Vec::new(),
            tick_index: 0,
            elapsed: Duration::ZERO,
        }
    }

    fn configure(&mut self, map_width: u32, cell_size: u32, out_events: &mut Vec<Event>) {
        let grid = match SpatialGrid::new(map_width, cell_size) {
            Ok(grid) => grid,
            Err(error) => {
                warn!(%error, "ignoring battlefield configuration");
                return;
            }
        };

        self.battlefield = Battlefield::new(map_width, cell_size);
        self.grid = grid;
        self.friendlies.clear();
        debug!(
            map_width,
            cell_size,
            cells_per_axis = self.grid.cells_per_axis(),
            "battlefield configured"
        );
        out_events.push(Event::BattlefieldConfigured {
            battlefield: self.battlefield,
        });
    }

    fn spawn_enemy(&mut self, position: Vec3, out_events: &mut Vec<Event>) {
        if !self.battlefield.contains(position) {
            reject_spawn(Faction::Enemy, position, SpawnError::OutOfBounds, out_events);
            return;
        }

        match self.grid.insert(position) {
            Ok(soldier) => {
                let enemy = enemy_for(soldier);
                let cell = self.grid.cell_of(position);
                out_events.push(Event::EnemySpawned {
                    enemy,
                    position,
                    cell,
                });
            }
            Err(_) => {
                reject_spawn(
                    Faction::Enemy,
                    position,
                    SpawnError::CapacityExhausted,
                    out_events,
                );
            }
        }
    }

    fn spawn_friendly(&mut self, position: Vec3, out_events: &mut Vec<Event>) {
        if !self.battlefield.contains(position) {
            reject_spawn(
                Faction::Friendly,
                position,
                SpawnError::OutOfBounds,
                out_events,
            );
            return;
        }

        let Ok(slot) = u32::try_from(self.friendlies.len()) else {
            reject_spawn(
                Faction::Friendly,
                position,
                SpawnError::CapacityExhausted,
                out_events,
            );
            return;
        };

        let friendly = FriendlyId::new(slot);
        self.friendlies.push(Friendly {
            id: friendly,
            position,
            target: None,
        });
        out_events.push(Event::FriendlySpawned { friendly, position });
    }

    fn move_enemy(&mut self, enemy: EnemyId, position: Vec3, out_events: &mut Vec<Event>) {
        let soldier = soldier_for(enemy);
        if !self.grid.is_linked(soldier) {
            reject_request(Faction::Enemy, MoveError::UnknownSoldier, "move", out_events);
            return;
        }
        if !position.is_finite() {
            reject_request(Faction::Enemy, MoveError::NonFinitePosition, "move", out_events);
            return;
        }

        let from = match self.grid.set_position(soldier, position) {
            Ok(from) => from,
            Err(error) => {
                warn!(%error, enemy = enemy.get(), "enemy move failed");
                reject_request(Faction::Enemy, MoveError::UnknownSoldier, "move", out_events);
                return;
            }
        };
        let change = match self.grid.move_soldier(soldier, from) {
            Ok(change) => change,
            Err(error) => {
                warn!(%error, enemy = enemy.get(), "enemy cell reconciliation failed");
                let _ = self.grid.set_position(soldier, from);
                reject_request(Faction::Enemy, MoveError::UnknownSoldier, "move", out_events);
                return;
            }
        };

        out_events.push(Event::EnemyMoved {
            enemy,
            from,
            to: position,
        });
        if let CellChange::Reassigned { from, to } = change {
            trace!(
                enemy = enemy.get(),
                from = ?from,
                to = ?to,
                "enemy changed cell"
            );
            out_events.push(Event::EnemyChangedCell { enemy, from, to });
        }
    }

    fn move_friendly(&mut self, friendly: FriendlyId, position: Vec3, out_events: &mut Vec<Event>) {
        if !position.is_finite() {
            reject_request(
                Faction::Friendly,
                MoveError::NonFinitePosition,
                "move",
                out_events,
            );
            return;
        }
        let Some(state) = self.friendly_mut(friendly) else {
            reject_request(Faction::Friendly, MoveError::UnknownSoldier, "move", out_events);
            return;
        };

        let from = std::mem::replace(&mut state.position, position);
        out_events.push(Event::FriendlyMoved {
            friendly,
            from,
            to: position,
        });
    }

    fn despawn_enemy(&mut self, enemy: EnemyId, out_events: &mut Vec<Event>) {
        let cell = match self.grid.remove(soldier_for(enemy)) {
            Ok(cell) => cell,
            Err(error) => {
                warn!(%error, enemy = enemy.get(), "enemy despawn failed");
                reject_request(
                    Faction::Enemy,
                    MoveError::UnknownSoldier,
                    "despawn",
                    out_events,
                );
                return;
            }
        };

        out_events.push(Event::EnemyDespawned { enemy, cell });
        for friendly in &mut self.friendlies {
            if friendly.target == Some(enemy) {
                friendly.target = None;
                out_events.push(Event::TargetLost {
                    friendly: friendly.id,
                    enemy,
                });
            }
        }
    }

    fn lock_target(
        &mut self,
        friendly: FriendlyId,
        enemy: Option<EnemyId>,
        out_events: &mut Vec<Event>,
    ) {
        let enemy = enemy.filter(|enemy| self.grid.is_linked(soldier_for(*enemy)));
        let Some(state) = self.friendly_mut(friendly) else {
            reject_request(
                Faction::Friendly,
                MoveError::UnknownSoldier,
                "lock target",
                out_events,
            );
            return;
        };

        if state.target == enemy {
            return;
        }

        let previous = std::mem::replace(&mut state.target, enemy);
        if let Some(lost) = previous {
            out_events.push(Event::TargetLost {
                friendly,
                enemy: lost,
            });
        }
        if let Some(acquired) = enemy {
            out_events.push(Event::TargetAcquired {
                friendly,
                enemy: acquired,
            });
        }
    }

    fn friendly_mut(&mut self, friendly: FriendlyId) -> Option<&mut Friendly> {
        let index = usize::try_from(friendly.get()).ok()?;
        self.friendlies.get_mut(index)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureBattlefield {
            map_width,
            cell_size,
        } => world.configure(map_width, cell_size, out_events),
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            world.elapsed = world.elapsed.saturating_add(dt);
            out_events.push(Event::TimeAdvanced { dt });
        }
        Command::SpawnEnemy { position } => world.spawn_enemy(position, out_events),
        Command::SpawnFriendly { position } => world.spawn_friendly(position, out_events),
        Command::MoveEnemy { enemy, position } => world.move_enemy(enemy, position, out_events),
        Command::MoveFriendly { friendly, position } => {
            world.move_friendly(friendly, position, out_events);
        }
        Command::DespawnEnemy { enemy } => world.despawn_enemy(enemy, out_events),
        Command::LockTarget { friendly, enemy } => world.lock_target(friendly, enemy, out_events),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use skirmish_core::{
        Battlefield, CellCoord, EnemyId, EnemySnapshot, EnemyView, FriendlySnapshot,
        FriendlyView, OccupancyView, Vec3,
    };

    use super::{enemy_for, soldier_for, World};
    use crate::grid::SpatialGrid;

    /// Provides the active battlefield layout.
    #[must_use]
    pub fn battlefield(world: &World) -> Battlefield {
        world.battlefield
    }

    /// Provides read-only access to the spatial partition holding the enemies.
    #[must_use]
    pub fn grid(world: &World) -> &SpatialGrid {
        &world.grid
    }

    /// Number of ticks processed since the world was created.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Simulated time accumulated across all ticks.
    #[must_use]
    pub fn elapsed(world: &World) -> Duration {
        world.elapsed
    }

    /// Captures a read-only view of the enemies on the battlefield.
    #[must_use]
    pub fn enemy_view(world: &World) -> EnemyView {
        let snapshots = (0..world.grid.soldier_count())
            .filter_map(|slot| u32::try_from(slot).ok())
            .map(EnemyId::new)
            .filter_map(|enemy| enemy_snapshot(world, enemy))
            .collect();
        EnemyView::from_snapshots(snapshots)
    }

    /// Captures a read-only view of the friendlies on the battlefield.
    #[must_use]
    pub fn friendly_view(world: &World) -> FriendlyView {
        let snapshots = world
            .friendlies
            .iter()
            .map(|friendly| FriendlySnapshot {
                id: friendly.id,
                position: friendly.position,
                target: friendly.target,
            })
            .collect();
        FriendlyView::from_snapshots(snapshots)
    }

    /// Captures a single enemy, if it is still on the battlefield.
    #[must_use]
    pub fn enemy_snapshot(world: &World, enemy: EnemyId) -> Option<EnemySnapshot> {
        let soldier = soldier_for(enemy);
        if !world.grid.is_linked(soldier) {
            return None;
        }
        let position = world.grid.position(soldier)?;
        Some(EnemySnapshot {
            id: enemy,
            position,
            cell: world.grid.cell_of(position),
        })
    }

    /// Finds the closest enemy sharing the cell that contains `position`.
    #[must_use]
    pub fn closest_enemy(world: &World, position: Vec3) -> Option<EnemySnapshot> {
        let soldier = world.grid.find_closest(position)?;
        enemy_snapshot(world, enemy_for(soldier))
    }

    /// Enemies linked into the provided cell, head first.
    #[must_use]
    pub fn cell_members(world: &World, cell: CellCoord) -> Vec<EnemyId> {
        world.grid.cell_members(cell).map(enemy_for).collect()
    }

    /// Captures how many enemies each cell currently holds.
    #[must_use]
    pub fn occupancy_view(world: &World) -> OccupancyView {
        OccupancyView::new(world.grid.populations(), world.grid.cells_per_axis())
    }
}

#[derive(Clone, Debug)]
struct Friendly {
    id: FriendlyId,
    position: Vec3,
    target: Option<EnemyId>,
}

fn soldier_for(enemy: EnemyId) -> SoldierId {
    SoldierId::new(enemy.get())
}

fn enemy_for(soldier: SoldierId) -> EnemyId {
    EnemyId::new(soldier.get())
}

fn reject_spawn(faction: Faction, position: Vec3, reason: SpawnError, out_events: &mut Vec<Event>) {
    warn!(?faction, ?position, ?reason, "spawn rejected");
    out_events.push(Event::SpawnRejected {
        faction,
        position,
        reason,
    });
}

fn reject_request(
    faction: Faction,
    reason: MoveError,
    request: &'static str,
    out_events: &mut Vec<Event>,
) {
    warn!(?faction, ?reason, request, "request rejected");
    out_events.push(Event::MoveRejected { faction, reason });
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::CellCoord;

    fn at(x: f32, z: f32) -> Vec3 {
        Vec3::new(x, 0.5, z)
    }

    fn configured(map_width: u32, cell_size: u32) -> World {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::ConfigureBattlefield {
                map_width,
                cell_size,
            },
            &mut events,
        );
        world
    }

    fn spawn_enemy(world: &mut World, position: Vec3) -> EnemyId {
        let mut events = Vec::new();
        apply(world, Command::SpawnEnemy { position }, &mut events);
        match events.as_slice() {
            [Event::EnemySpawned { enemy, .. }] => *enemy,
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn default_world_uses_default_battlefield() {
        let world = World::new();
        let battlefield = query::battlefield(&world);
        assert_eq!(battlefield.map_width(), DEFAULT_MAP_WIDTH);
        assert_eq!(battlefield.cell_size(), DEFAULT_CELL_SIZE);
        assert_eq!(query::grid(&world).cells_per_axis(), 5);
    }

    #[test]
    fn invalid_configuration_keeps_previous_battlefield() {
        let mut world = configured(20, 10);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::ConfigureBattlefield {
                map_width: 20,
                cell_size: 0,
            },
            &mut events,
        );

        assert!(events.is_empty());
        assert_eq!(query::battlefield(&world), Battlefield::new(20, 10));
    }

    #[test]
    fn configuration_clears_soldiers() {
        let mut world = configured(20, 10);
        let _ = spawn_enemy(&mut world, at(1.0, 1.0));
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::ConfigureBattlefield {
                map_width: 40,
                cell_size: 10,
            },
            &mut events,
        );

        assert_eq!(
            events,
            vec![Event::BattlefieldConfigured {
                battlefield: Battlefield::new(40, 10)
            }]
        );
        assert!(query::enemy_view(&world).is_empty());
    }

    #[test]
    fn spawn_outside_map_is_rejected() {
        let mut world = configured(20, 10);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SpawnEnemy {
                position: at(21.0, 1.0),
            },
            &mut events,
        );

        assert_eq!(
            events,
            vec![Event::SpawnRejected {
                faction: Faction::Enemy,
                position: at(21.0, 1.0),
                reason: SpawnError::OutOfBounds,
            }]
        );
    }

    #[test]
    fn crossing_a_boundary_reports_cell_change() {
        let mut world = configured(20, 10);
        let enemy = spawn_enemy(&mut world, at(9.0, 1.0));
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::MoveEnemy {
                enemy,
                position: at(11.0, 1.0),
            },
            &mut events,
        );

        assert_eq!(
            events,
            vec![
                Event::EnemyMoved {
                    enemy,
                    from: at(9.0, 1.0),
                    to: at(11.0, 1.0),
                },
                Event::EnemyChangedCell {
                    enemy,
                    from: CellCoord::new(0, 0),
                    to: CellCoord::new(1, 0),
                },
            ]
        );
        assert_eq!(query::cell_members(&world, CellCoord::new(1, 0)), vec![enemy]);
    }

    #[test]
    fn despawn_unlinks_enemy_and_clears_pursuit() {
        let mut world = configured(20, 10);
        let enemy = spawn_enemy(&mut world, at(2.0, 2.0));
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SpawnFriendly {
                position: at(3.0, 3.0),
            },
            &mut events,
        );
        let friendly = FriendlyId::new(0);
        apply(
            &mut world,
            Command::LockTarget {
                friendly,
                enemy: Some(enemy),
            },
            &mut events,
        );
        events.clear();

        apply(&mut world, Command::DespawnEnemy { enemy }, &mut events);

        assert_eq!(
            events,
            vec![
                Event::EnemyDespawned {
                    enemy,
                    cell: CellCoord::new(0, 0)
                },
                Event::TargetLost { friendly, enemy },
            ]
        );
        assert!(query::closest_enemy(&world, at(3.0, 3.0)).is_none());

        events.clear();
        apply(
            &mut world,
            Command::MoveEnemy {
                enemy,
                position: at(4.0, 4.0),
            },
            &mut events,
        );
        assert_eq!(
            events,
            vec![Event::MoveRejected {
                faction: Faction::Enemy,
                reason: MoveError::UnknownSoldier,
            }]
        );
    }

    #[test]
    fn non_finite_moves_are_rejected_and_leave_positions_untouched() {
        let mut world = configured(20, 10);
        let near = spawn_enemy(&mut world, at(3.0, 3.0));
        let far = spawn_enemy(&mut world, at(5.0, 5.0));
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SpawnFriendly {
                position: at(2.0, 2.0),
            },
            &mut events,
        );
        events.clear();

        apply(
            &mut world,
            Command::MoveEnemy {
                enemy: far,
                position: at(f32::NAN, 1.0),
            },
            &mut events,
        );
        apply(
            &mut world,
            Command::MoveFriendly {
                friendly: FriendlyId::new(0),
                position: at(f32::INFINITY, 1.0),
            },
            &mut events,
        );

        assert_eq!(
            events,
            vec![
                Event::MoveRejected {
                    faction: Faction::Enemy,
                    reason: MoveError::NonFinitePosition,
                },
                Event::MoveRejected {
                    faction: Faction::Friendly,
                    reason: MoveError::NonFinitePosition,
                },
            ]
        );
        let far_snapshot = query::enemy_snapshot(&world, far).expect("far enemy");
        assert_eq!(far_snapshot.position, at(5.0, 5.0));
        assert_eq!(query::friendly_view(&world).into_vec()[0].position, at(2.0, 2.0));
        assert_eq!(
            query::closest_enemy(&world, at(2.0, 2.0)).map(|enemy| enemy.id),
            Some(near)
        );
    }

    #[test]
    fn lock_target_for_unknown_friendly_is_rejected() {
        let mut world = configured(20, 10);
        let enemy = spawn_enemy(&mut world, at(2.0, 2.0));
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::LockTarget {
                friendly: FriendlyId::new(5),
                enemy: Some(enemy),
            },
            &mut events,
        );

        assert_eq!(
            events,
            vec![Event::MoveRejected {
                faction: Faction::Friendly,
                reason: MoveError::UnknownSoldier,
            }]
        );
    }

    #[test]
    fn lock_target_reports_changes_only() {
        let mut world = configured(20, 10);
        let first = spawn_enemy(&mut world, at(2.0, 2.0));
        let second = spawn_enemy(&mut world, at(4.0, 4.0));
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SpawnFriendly {
                position: at(3.0, 3.0),
            },
            &mut events,
        );
        let friendly = FriendlyId::new(0);
        events.clear();

        for enemy in [Some(first), Some(first), Some(second), None] {
            apply(
                &mut world,
                Command::LockTarget { friendly, enemy },
                &mut events,
            );
        }

        assert_eq!(
            events,
            vec![
                Event::TargetAcquired {
                    friendly,
                    enemy: first
                },
                Event::TargetLost {
                    friendly,
                    enemy: first
                },
                Event::TargetAcquired {
                    friendly,
                    enemy: second
                },
                Event::TargetLost {
                    friendly,
                    enemy: second
                },
            ]
        );
    }

    #[test]
    fn tick_accumulates_elapsed_time() {
        let mut world = World::new();
        let mut events = Vec::new();
        for _ in 0..3 {
            apply(
                &mut world,
                Command::Tick {
                    dt: Duration::from_millis(250),
                },
                &mut events,
            );
        }

        assert_eq!(query::tick_index(&world), 3);
        assert_eq!(query::elapsed(&world), Duration::from_millis(750));
        assert_eq!(events.len(), 3);
    }
}
