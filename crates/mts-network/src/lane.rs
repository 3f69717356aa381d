//! A single-direction cellular track.
//!
//! Cells are numbered from the entry (cell 0) to the exit
//! (`length - 1`).  A lane only stores which vehicle occupies which cell; the
//! vehicle itself remembers its own cell, and every mutating call passes that
//! cell in so the lane can check it.
//!
//! All mutation happens behind one `parking_lot::Mutex`, so worker threads
//! operating on different lanes never contend, while two vehicles on the same
//! lane are serialized.  The "last vehicle" marker (the occupant nearest the
//! entry, which bounds where an upstream vehicle may be inserted) lives in
//! the same guarded struct as the occupancy map and is rewritten in every
//! critical section that touches the map.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use mts_core::{EdgeId, VehicleId};

use crate::{NetworkError, NetworkResult};

#[derive(Default)]
struct Cells {
    occupied: BTreeMap<u32, VehicleId>,
    /// Occupant with the smallest cell index.
    last:     Option<(u32, VehicleId)>,
}

impl Cells {
    #[inline]
    fn refresh_last(&mut self) {
        self.last = self.occupied.first_key_value().map(|(&c, &v)| (c, v));
    }
}

/// One lane of a [`DirectedEdge`][crate::DirectedEdge].
///
/// Lane 0 is the outermost lane (rightmost in right-hand traffic).
pub struct Lane {
    edge:   EdgeId,
    index:  u8,
    length: u32,
    cells:  Mutex<Cells>,
}

impl Lane {
    pub fn new(edge: EdgeId, index: u8, length: u32) -> Self {
        Self {
            edge,
            index,
            length,
            cells: Mutex::new(Cells::default()),
        }
    }

    #[inline]
    pub fn edge(&self) -> EdgeId {
        self.edge
    }

    #[inline]
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Number of cells.
    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// Highest cell an entering vehicle may be placed in: one behind the
    /// occupant nearest the entry, or the exit cell if the lane is empty.
    ///
    /// `-1` means the entry cell itself is taken.
    pub fn max_insertion_index(&self) -> i64 {
        let cells = self.cells.lock();
        match cells.last {
            None         => self.length as i64 - 1,
            Some((c, _)) => c as i64 - 1,
        }
    }

    /// The occupant nearest the entry.
    pub fn last_vehicle(&self) -> Option<(u32, VehicleId)> {
        self.cells.lock().last
    }

    pub fn vehicle_at(&self, cell: u32) -> Option<VehicleId> {
        self.cells.lock().occupied.get(&cell).copied()
    }

    /// Nearest occupant strictly ahead of `cell`.
    pub fn vehicle_in_front(&self, cell: u32) -> Option<(u32, VehicleId)> {
        self.cells
            .lock()
            .occupied
            .range(cell.saturating_add(1)..)
            .next()
            .map(|(&c, &v)| (c, v))
    }

    /// Nearest occupant at or behind `cell`.
    pub fn vehicle_behind_or_at(&self, cell: u32) -> Option<(u32, VehicleId)> {
        self.cells
            .lock()
            .occupied
            .range(..=cell)
            .next_back()
            .map(|(&c, &v)| (c, v))
    }

    pub fn vehicle_count(&self) -> usize {
        self.cells.lock().occupied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.lock().occupied.is_empty()
    }

    /// Snapshot of `(cell, vehicle)` pairs, entry first.
    pub fn occupants(&self) -> Vec<(u32, VehicleId)> {
        self.cells
            .lock()
            .occupied
            .iter()
            .map(|(&c, &v)| (c, v))
            .collect()
    }

    // ── Mutation ──────────────────────────────────────────────────────────

    /// Place `vehicle` in `cell`.  Fails if the cell is taken.
    pub fn insert_vehicle(&self, vehicle: VehicleId, cell: u32) -> NetworkResult<()> {
        self.check_range(cell as u64)?;
        let mut cells = self.cells.lock();
        if let Some(&found) = cells.occupied.get(&cell) {
            return Err(self.occupancy_violation(cell, None, Some(found)));
        }
        cells.occupied.insert(cell, vehicle);
        if cells.last.is_none_or(|(c, _)| cell < c) {
            cells.last = Some((cell, vehicle));
        }
        Ok(())
    }

    /// Move `vehicle` from `from` forward by `delta` cells and return its new
    /// cell.  `delta == 0` leaves the lane untouched.
    pub fn move_vehicle(&self, vehicle: VehicleId, from: u32, delta: u32) -> NetworkResult<u32> {
        if delta == 0 {
            return Ok(from);
        }
        let to = from as u64 + delta as u64;
        self.check_range(to)?;
        let to = to as u32;

        let mut cells = self.cells.lock();
        match cells.occupied.get(&from) {
            Some(&v) if v == vehicle => {}
            found => return Err(self.occupancy_violation(from, Some(vehicle), found.copied())),
        }
        if let Some(&found) = cells.occupied.get(&to) {
            return Err(self.occupancy_violation(to, None, Some(found)));
        }
        cells.occupied.remove(&from);
        cells.occupied.insert(to, vehicle);
        if cells.last.is_some_and(|(c, _)| c == from) {
            cells.refresh_last();
        }
        Ok(to)
    }

    /// Clear `vehicle`'s occupancy of `cell`.
    pub fn remove_vehicle(&self, vehicle: VehicleId, cell: u32) -> NetworkResult<()> {
        let mut cells = self.cells.lock();
        match cells.occupied.get(&cell) {
            Some(&v) if v == vehicle => {}
            found => return Err(self.occupancy_violation(cell, Some(vehicle), found.copied())),
        }
        cells.occupied.remove(&cell);
        if cells.occupied.is_empty() {
            cells.last = None;
        } else if cells.last.is_some_and(|(c, _)| c == cell) {
            cells.refresh_last();
        }
        Ok(())
    }

    /// Drop all occupants.
    pub fn reset(&self) {
        let mut cells = self.cells.lock();
        cells.occupied.clear();
        cells.last = None;
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    fn check_range(&self, cell: u64) -> NetworkResult<()> {
        if cell >= self.length as u64 {
            return Err(NetworkError::CellOutOfRange {
                edge:   self.edge,
                lane:   self.index,
                cell,
                length: self.length,
            });
        }
        Ok(())
    }

    fn occupancy_violation(
        &self,
        cell:     u32,
        expected: Option<VehicleId>,
        found:    Option<VehicleId>,
    ) -> NetworkError {
        NetworkError::CellOccupancyViolation {
            edge: self.edge,
            lane: self.index,
            cell,
            expected,
            found,
        }
    }
}

impl std::fmt::Debug for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lane")
            .field("edge", &self.edge)
            .field("index", &self.index)
            .field("length", &self.length)
            .field("occupants", &self.occupants())
            .finish()
    }
}
