//! Core types for the ring traffic simulation

use std::fmt;

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimId(pub usize);

/// A wrapper type for vehicle IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub SimId);

/// A wrapper type for lane IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaneId(pub SimId);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vehicle#{}", self.0 .0)
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lane#{}", self.0 .0)
    }
}

/// Pictographic marker for an occupied cell
pub const OCCUPIED_CELL: char = '■';

/// Pictographic marker for a free cell
pub const FREE_CELL: char = '□';

/// Binary marker for an occupied cell
pub const OCCUPIED_DIGIT: char = '1';

/// Binary marker for a free cell
pub const FREE_DIGIT: char = '0';

/// Speed cap given to every freshly created vehicle
pub const DEFAULT_SPEED_CAP: usize = 1;

/// Iteration count used by the driving loop when the user input is not a number
pub const DEFAULT_ITERATIONS: usize = 10;
