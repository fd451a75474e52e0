//! Uniform-grid spatial partition over moving soldiers.
//!
//! Every cell owns the head of an intrusive doubly linked list threaded through
//! the soldiers located inside it. Links are arena indices into a dense vector
//! owned by the grid, so repairing a list after a soldier leaves its cell is a
//! constant amount of index surgery. A soldier's cell is never stored; it is
//! always derived from its position on the ground plane (x and z), which means
//! the cell of record may be stale only between a position update and the
//! matching [`SpatialGrid::move_soldier`] call.

use skirmish_core::{CellCoord, Vec3};
use thiserror::Error;

/// Handle of a soldier stored inside the grid's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoldierId(u32);

impl SoldierId {
    /// Creates a soldier handle from its numeric arena slot.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric arena slot.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Neighbours of a soldier inside its cell's list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Links {
    /// Soldier closer to the head of the list, `None` for the head itself.
    pub previous: Option<SoldierId>,
    /// Soldier closer to the tail of the list, `None` for the tail itself.
    pub next: Option<SoldierId>,
}

/// Outcome of reconciling a soldier's cell after it moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellChange {
    /// The soldier stayed inside the same cell and no link was touched.
    Unchanged(CellCoord),
    /// The soldier was unlinked from `from` and now heads the list of `to`.
    Reassigned {
        /// Cell the soldier left.
        from: CellCoord,
        /// Cell the soldier entered.
        to: CellCoord,
    },
}

/// Errors reported by [`SpatialGrid`] operations.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum GridError {
    /// The grid would contain no cells.
    #[error("map width {map_width} cannot hold a single cell of size {cell_size}")]
    InvalidDimensions {
        /// Requested map width.
        map_width: u32,
        /// Requested cell size.
        cell_size: u32,
    },
    /// The handle does not refer to a soldier in the arena.
    #[error("soldier {0:?} is not tracked by the grid")]
    UnknownSoldier(SoldierId),
    /// The soldier is already linked into a cell.
    #[error("soldier {0:?} is already linked into a cell")]
    AlreadyLinked(SoldierId),
    /// The soldier is not linked into any cell.
    #[error("soldier {0:?} is not linked into a cell")]
    NotLinked(SoldierId),
    /// The soldier has no predecessor yet does not head the named cell,
    /// which means the cell was derived from a stale position.
    #[error("soldier {soldier:?} does not head the list of {cell:?}")]
    StaleCell {
        /// Soldier being unlinked.
        soldier: SoldierId,
        /// Cell the caller claimed the soldier belongs to.
        cell: CellCoord,
    },
    /// The arena ran out of addressable slots.
    #[error("the grid cannot address more soldiers")]
    CapacityExhausted,
}

#[derive(Clone, Debug)]
struct Soldier {
    position: Vec3,
    links: Links,
    linked: bool,
}

/// Fixed-resolution grid of intrusive soldier lists.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    cell_size: u32,
    cells_per_axis: u32,
    heads: Vec<Option<SoldierId>>,
    soldiers: Vec<Soldier>,
}

impl SpatialGrid {
    /// Creates an empty grid covering a square map of `map_width` units.
    ///
    /// The number of cells per axis is `map_width / cell_size`; any remainder
    /// strip along the far edges folds into the last row and column.
    pub fn new(map_width: u32, cell_size: u32) -> Result<Self, GridError> {
        if cell_size == 0 || map_width < cell_size {
            return Err(GridError::InvalidDimensions {
                map_width,
                cell_size,
            });
        }

        let cells_per_axis = map_width / cell_size;
        let cell_count = usize::try_from(u64::from(cells_per_axis) * u64::from(cells_per_axis))
            .map_err(|_| GridError::InvalidDimensions {
                map_width,
                cell_size,
            })?;

        Ok(Self {
            cell_size,
            cells_per_axis,
            heads: vec![None; cell_count],
            soldiers: Vec::new(),
        })
    }

    /// Side length of a cell in world units.
    #[must_use]
    pub const fn cell_size(&self) -> u32 {
        self.cell_size
    }

    /// Number of cells along each axis.
    #[must_use]
    pub const fn cells_per_axis(&self) -> u32 {
        self.cells_per_axis
    }

    /// Number of soldiers ever allocated in the arena, linked or not.
    #[must_use]
    pub fn soldier_count(&self) -> usize {
        self.soldiers.len()
    }

    /// Maps a world position onto its cell.
    ///
    /// Positions beyond the map edges, including negative and NaN coordinates,
    /// clamp to the nearest edge cell.
    #[must_use]
    pub fn cell_of(&self, position: Vec3) -> CellCoord {
        CellCoord::new(self.axis_index(position.x), self.axis_index(position.z))
    }

    /// Allocates a soldier at `position` and links it into its cell.
    pub fn insert(&mut self, position: Vec3) -> Result<SoldierId, GridError> {
        let slot = u32::try_from(self.soldiers.len()).map_err(|_| GridError::CapacityExhausted)?;
        let id = SoldierId::new(slot);
        self.soldiers.push(Soldier {
            position,
            links: Links::default(),
            linked: false,
        });
        let _ = self.add(id)?;
        Ok(id)
    }

    /// Links an unlinked soldier at the head of the list for its current cell.
    pub fn add(&mut self, id: SoldierId) -> Result<CellCoord, GridError> {
        let soldier = self.soldier(id)?;
        if soldier.linked {
            return Err(GridError::AlreadyLinked(id));
        }

        let cell = self.cell_of(soldier.position);
        self.link_at_head(id, cell);
        Ok(cell)
    }

    /// Overwrites a soldier's position without touching its cell membership.
    ///
    /// Returns the previous position, which must be handed to
    /// [`SpatialGrid::move_soldier`] before any other grid call touches the
    /// soldier.
    pub fn set_position(&mut self, id: SoldierId, position: Vec3) -> Result<Vec3, GridError> {
        let soldier = self
            .soldiers
            .get_mut(id.index())
            .ok_or(GridError::UnknownSoldier(id))?;
        Ok(std::mem::replace(&mut soldier.position, position))
    }

    /// Reconciles a soldier's cell after its position changed from `old_position`.
    ///
    /// Moves within a cell return without touching any link.
    pub fn move_soldier(
        &mut self,
        id: SoldierId,
        old_position: Vec3,
    ) -> Result<CellChange, GridError> {
        let soldier = self.soldier(id)?;
        if !soldier.linked {
            return Err(GridError::NotLinked(id));
        }

        let from = self.cell_of(old_position);
        let to = self.cell_of(soldier.position);
        if from == to {
            return Ok(CellChange::Unchanged(to));
        }

        self.unlink(id, from)?;
        self.link_at_head(id, to);
        Ok(CellChange::Reassigned { from, to })
    }

    /// Updates a soldier's position and reconciles its cell in one step.
    pub fn relocate(&mut self, id: SoldierId, position: Vec3) -> Result<CellChange, GridError> {
        let old_position = self.set_position(id, position)?;
        self.move_soldier(id, old_position)
    }

    /// Unlinks a soldier from its cell, leaving its arena slot unlinked.
    ///
    /// The soldier's position must already be reconciled. An unlinked soldier
    /// may be linked again with [`SpatialGrid::add`].
    pub fn remove(&mut self, id: SoldierId) -> Result<CellCoord, GridError> {
        let soldier = self.soldier(id)?;
        if !soldier.linked {
            return Err(GridError::NotLinked(id));
        }

        let cell = self.cell_of(soldier.position);
        self.unlink(id, cell)?;
        Ok(cell)
    }

    /// Finds the soldier closest to `origin` among those sharing its cell.
    ///
    /// Only the origin's own cell is searched, so a nearer soldier across a
    /// cell boundary is never reported. Ties go to the soldier nearest the head
    /// of the list, and soldiers at a NaN or infinite distance never win.
    #[must_use]
    pub fn find_closest(&self, origin: Vec3) -> Option<SoldierId> {
        let mut best = None;
        let mut best_sq = f32::INFINITY;
        for id in self.cell_members(self.cell_of(origin)) {
            let distance_sq = self.soldiers[id.index()].position.distance_squared(origin);
            if distance_sq < best_sq {
                best = Some(id);
                best_sq = distance_sq;
            }
        }
        best
    }

    /// Walks the list of the provided cell from head to tail.
    ///
    /// Cells outside the grid yield nothing.
    #[must_use]
    pub fn cell_members(&self, cell: CellCoord) -> CellMembers<'_> {
        CellMembers {
            grid: self,
            cursor: self.index(cell).and_then(|index| self.heads[index]),
        }
    }

    /// Head of the provided cell's list.
    #[must_use]
    pub fn head(&self, cell: CellCoord) -> Option<SoldierId> {
        self.index(cell).and_then(|index| self.heads[index])
    }

    /// Current position of a soldier.
    #[must_use]
    pub fn position(&self, id: SoldierId) -> Option<Vec3> {
        self.soldiers.get(id.index()).map(|soldier| soldier.position)
    }

    /// Current list neighbours of a soldier.
    #[must_use]
    pub fn links(&self, id: SoldierId) -> Option<Links> {
        self.soldiers.get(id.index()).map(|soldier| soldier.links)
    }

    /// Reports whether the soldier is currently linked into a cell.
    #[must_use]
    pub fn is_linked(&self, id: SoldierId) -> bool {
        self.soldiers
            .get(id.index())
            .map_or(false, |soldier| soldier.linked)
    }

    /// Counts the soldiers linked into every cell, in row-major order.
    #[must_use]
    pub fn populations(&self) -> Vec<u32> {
        let mut populations = vec![0; self.heads.len()];
        for (slot, head) in populations.iter_mut().zip(&self.heads) {
            let mut cursor = *head;
            while let Some(id) = cursor {
                *slot += 1;
                cursor = self.soldiers[id.index()].links.next;
            }
        }
        populations
    }

    fn soldier(&self, id: SoldierId) -> Result<&Soldier, GridError> {
        self.soldiers
            .get(id.index())
            .ok_or(GridError::UnknownSoldier(id))
    }

    fn link_at_head(&mut self, id: SoldierId, cell: CellCoord) {
        let Some(index) = self.index(cell) else {
            return;
        };

        let old_head = self.heads[index];
        {
            let soldier = &mut self.soldiers[id.index()];
            soldier.links = Links {
                previous: None,
                next: old_head,
            };
            soldier.linked = true;
        }
        if let Some(next) = old_head {
            self.soldiers[next.index()].links.previous = Some(id);
        }
        self.heads[index] = Some(id);
    }

    fn unlink(&mut self, id: SoldierId, cell: CellCoord) -> Result<(), GridError> {
        let Links { previous, next } = self.soldiers[id.index()].links;

        match previous {
            Some(previous) => self.soldiers[previous.index()].links.next = next,
            None => match self.index(cell) {
                Some(index) if self.heads[index] == Some(id) => self.heads[index] = next,
                _ => return Err(GridError::StaleCell { soldier: id, cell }),
            },
        }
        if let Some(next_id) = next {
            self.soldiers[next_id.index()].links.previous = previous;
        }

        let soldier = &mut self.soldiers[id.index()];
        soldier.links = Links::default();
        soldier.linked = false;
        Ok(())
    }

    // `as u32` saturates: negatives and NaN become 0, huge values clamp below.
    fn axis_index(&self, coordinate: f32) -> u32 {
        let scaled = (coordinate / self.cell_size as f32).floor();
        (scaled as u32).min(self.cells_per_axis - 1)
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

/// Iterator over the soldiers of one cell, head first.
#[derive(Clone, Debug)]
pub struct CellMembers<'a> {
    grid: &'a SpatialGrid,
    cursor: Option<SoldierId>,
}

impl Iterator for CellMembers<'_> {
    type Item = SoldierId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        self.cursor = self.grid.soldiers[current.index()].links.next;
        Some(current)
    }
}
