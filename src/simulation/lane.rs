//! Circular lanes and their position bookkeeping
//!
//! Every lane keeps two vehicle → cell maps. `committed` is what every query
//! sees during a step, `pending` receives all writes. `reflesh` copies the
//! pending map over the committed one, which is what makes a step atomic.

use log::trace;
use sorted_vec::SortedVec;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::descriptor::render_cells;
use super::error::{TrafficError, TrafficResult};
use super::rule::Rule;
use super::types::{LaneId, VehicleId};

/// A ring of cells holding at most one vehicle each
#[derive(Clone)]
pub struct Lane {
    pub id: LaneId,
    length: usize,
    /// Positions visible to reads during the current step
    committed: HashMap<VehicleId, usize>,
    /// Write buffer for the step in progress
    pending: HashMap<VehicleId, usize>,
    rule: Option<Arc<dyn Rule>>,
}

impl Lane {
    /// Create an empty lane with `length` cells
    pub fn new(id: LaneId, length: isize) -> TrafficResult<Self> {
        let length =
            usize::try_from(length).map_err(|_| TrafficError::InvalidLaneLength(length))?;
        Ok(Self::with_length(id, length))
    }

    pub(crate) fn with_length(id: LaneId, length: usize) -> Self {
        Self {
            id,
            length,
            committed: HashMap::with_capacity(length),
            pending: HashMap::with_capacity(length),
            rule: None,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn rule(&self) -> Option<&Arc<dyn Rule>> {
        self.rule.as_ref()
    }

    /// Set the rule applied to vehicles on this lane that have none of their own
    pub fn set_rule(&mut self, rule: Option<Arc<dyn Rule>>) {
        self.rule = rule;
    }

    pub fn remove_rule(&mut self) {
        self.rule = None;
    }

    /// Wrap any position onto the ring
    pub fn normalize(&self, position: isize) -> usize {
        if self.length == 0 {
            return 0;
        }
        position.rem_euclid(self.length as isize) as usize
    }

    /// Place `vehicle` at `position` in the pending buffer.
    /// Returns the normalized cell.
    pub fn add_vehicle(&mut self, vehicle: VehicleId, position: isize) -> TrafficResult<usize> {
        if self.length == 0 {
            return Err(TrafficError::NoCells(self.id));
        }

        if self.contains(vehicle) {
            return Err(TrafficError::DuplicateVehicle(vehicle));
        }

        let cell = self.normalize(position);
        if self.pending.values().any(|&taken| taken == cell) {
            return Err(TrafficError::OccupiedCell(cell));
        }

        self.pending.insert(vehicle, cell);
        Ok(cell)
    }

    /// Drop `vehicle` from the pending buffer; absent vehicles are ignored
    pub fn remove_vehicle(&mut self, vehicle: VehicleId) {
        self.pending.remove(&vehicle);
    }

    /// Whether `vehicle` is in the pending buffer
    pub fn contains(&self, vehicle: VehicleId) -> bool {
        self.pending.contains_key(&vehicle)
    }

    /// Cell of `vehicle` in the pending buffer
    pub fn position_of(&self, vehicle: VehicleId) -> Option<usize> {
        self.pending.get(&vehicle).copied()
    }

    /// Whether a vehicle other than `except` holds the cell in the pending buffer
    pub(crate) fn is_pending_taken(&self, position: isize, except: VehicleId) -> bool {
        let cell = self.normalize(position);
        self.pending
            .iter()
            .any(|(vehicle, &taken)| taken == cell && *vehicle != except)
    }

    /// Every vehicle in either buffer
    pub(crate) fn known_vehicles(&self) -> Vec<VehicleId> {
        let mut vehicles: Vec<VehicleId> = self
            .committed
            .keys()
            .chain(self.pending.keys())
            .copied()
            .collect();
        vehicles.sort();
        vehicles.dedup();
        vehicles
    }

    /// Whether `vehicle` was on this lane at the last commit
    pub fn is_committed(&self, vehicle: VehicleId) -> bool {
        self.committed.contains_key(&vehicle)
    }

    /// Cell of `vehicle` at the last commit
    pub fn committed_position_of(&self, vehicle: VehicleId) -> Option<usize> {
        self.committed.get(&vehicle).copied()
    }

    /// Whether the normalized `position` is occupied in the committed state
    pub fn is_occupied(&self, position: isize) -> bool {
        if self.length == 0 {
            return false;
        }
        let cell = self.normalize(position);
        self.committed.values().any(|&taken| taken == cell)
    }

    /// Committed vehicles in ascending id order
    pub fn vehicles(&self) -> Vec<VehicleId> {
        let mut vehicles: Vec<VehicleId> = self.committed.keys().copied().collect();
        vehicles.sort();
        vehicles
    }

    /// Number of committed vehicles
    pub fn vehicle_count(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// Occupied cells per committed state, one flag per cell
    pub fn cells(&self) -> Vec<bool> {
        let mut cells = vec![false; self.length];
        for &cell in self.committed.values() {
            cells[cell] = true;
        }
        cells
    }

    /// Occupied cells in ascending order
    fn sorted_positions(&self) -> SortedVec<usize> {
        SortedVec::from_unsorted(self.committed.values().copied().collect())
    }

    fn committed_cell(&self, vehicle: VehicleId) -> TrafficResult<usize> {
        self.committed_position_of(vehicle)
            .ok_or(TrafficError::VehicleNotOnLane {
                vehicle,
                lane: self.id,
            })
    }

    /// Free cells between `vehicle` and the next vehicle ahead.
    /// A lone vehicle sees the whole ring except its own cell.
    pub fn forward_free_length(&self, vehicle: VehicleId) -> TrafficResult<usize> {
        let position = self.committed_cell(vehicle)?;
        let sorted = self.sorted_positions();
        if sorted.len() == 1 {
            return Ok(self.length - 1);
        }

        let index = sorted
            .binary_search(&position)
            .map_err(|_| TrafficError::VehicleNotOnLane {
                vehicle,
                lane: self.id,
            })?;
        let next = sorted[(index + 1) % sorted.len()];

        if next > position {
            Ok(next - position - 1)
        } else {
            Ok(self.length - (position - next) - 1)
        }
    }

    /// Free cells between `vehicle` and the next vehicle behind
    pub fn back_free_length(&self, vehicle: VehicleId) -> TrafficResult<usize> {
        let position = self.committed_cell(vehicle)?;
        let sorted = self.sorted_positions();
        if sorted.len() == 1 {
            return Ok(self.length - 1);
        }

        let index = sorted
            .binary_search(&position)
            .map_err(|_| TrafficError::VehicleNotOnLane {
                vehicle,
                lane: self.id,
            })?;
        let previous = sorted[(index + sorted.len() - 1) % sorted.len()];

        if previous < position {
            Ok(position - previous - 1)
        } else {
            Ok(self.length - (previous - position) - 1)
        }
    }

    /// Cells between `vehicle` and the start of the next jam ahead.
    ///
    /// A jam is a run of at least two contiguous occupied cells. `Some(0)`
    /// means the cell directly ahead is occupied. `None` means no jam exists
    /// anywhere on the ring, including on an empty lane.
    pub fn next_jam_length(&self, vehicle: VehicleId) -> TrafficResult<Option<usize>> {
        if self.committed.is_empty() {
            return Ok(None);
        }

        let position = self.committed_cell(vehicle)?;
        let cells = self.cells();

        for offset in 1..self.length {
            let cell = (position + offset) % self.length;
            if !cells[cell] {
                continue;
            }
            if offset == 1 {
                return Ok(Some(0));
            }
            if cells[(cell + 1) % self.length] {
                return Ok(Some(offset - 1));
            }
        }

        Ok(None)
    }

    /// Number of maximal runs of two or more contiguous occupied cells
    pub fn jam_count(&self) -> usize {
        let cells = self.cells();
        let occupied = cells.iter().filter(|&&c| c).count();
        if self.length > 1 && occupied == self.length {
            return 1;
        }

        (0..self.length)
            .filter(|&cell| {
                let before = (cell + self.length - 1) % self.length;
                let after = (cell + 1) % self.length;
                cells[cell] && !cells[before] && after != cell && cells[after]
            })
            .count()
    }

    /// Fraction of occupied cells
    pub fn density(&self) -> f64 {
        if self.length == 0 {
            return 0.0;
        }
        self.committed.len() as f64 / self.length as f64
    }

    /// Make the pending buffer the committed state
    pub fn reflesh(&mut self) {
        self.committed.clone_from(&self.pending);
        trace!("{} committed {} vehicles", self.id, self.committed.len());
    }

    /// Pending moves of this step: (vehicle, committed cell, pending cell)
    pub(crate) fn pending_moves(&self) -> impl Iterator<Item = (VehicleId, Option<usize>, usize)> + '_ {
        self.pending
            .iter()
            .map(|(vehicle, &to)| (*vehicle, self.committed.get(vehicle).copied(), to))
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_cells(self.cells()))
    }
}

impl fmt::Debug for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lane")
            .field("id", &self.id)
            .field("length", &self.length)
            .field("cells", &self.to_string())
            .field("has_rule", &self.rule.is_some())
            .finish()
    }
}
