//! Error type for the ring traffic simulation.
//!
//! Only structural violations are errors. Capacity problems (an occupied
//! target cell on a lane change, a move longer than the free gap) degrade to
//! a `false` result or a clamped distance instead.

use thiserror::Error;

use super::types::{LaneId, VehicleId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrafficError {
    #[error("{0} is already on this lane")]
    DuplicateVehicle(VehicleId),

    #[error("cell {0} is already occupied")]
    OccupiedCell(usize),

    #[error("{vehicle} is not on {lane}")]
    VehicleNotOnLane { vehicle: VehicleId, lane: LaneId },

    #[error("{0} is not managed by this simulation")]
    VehicleNotManaged(VehicleId),

    #[error("{0} is not managed by this simulation")]
    LaneNotManaged(LaneId),

    #[error("distance must be bigger than or equal to 0, got {0}")]
    NegativeDistance(isize),

    #[error("lane length must be bigger than or equal to 0, got {0}")]
    InvalidLaneLength(isize),

    #[error("{0} has no cells to place a vehicle on")]
    NoCells(LaneId),
}

/// Shorthand result type for the simulation.
pub type TrafficResult<T> = Result<T, TrafficError>;
