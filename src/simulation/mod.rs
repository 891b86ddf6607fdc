//! Ring traffic simulation module
//!
//! This module contains the whole simulation engine: lanes with their
//! double-buffered positions, vehicles, movement rules and the manager
//! driving them. It has no I/O of its own; the binary owns the console.

mod descriptor;
mod error;
mod lane;
mod rule;
mod types;
mod vehicle;
mod world;

pub use descriptor::{parse_descriptor, render_cells};
pub use error::{TrafficError, TrafficResult};
pub use lane::Lane;
pub use rule::{CruiseRule, MoveContext, MoveView, RandomSlowdownRule, Rule, SlowToStartRule};
pub use types::{
    LaneId, SimId, VehicleId, DEFAULT_ITERATIONS, DEFAULT_SPEED_CAP, FREE_CELL, FREE_DIGIT,
    OCCUPIED_CELL, OCCUPIED_DIGIT,
};
pub use vehicle::Vehicle;
pub use world::{LaneSummary, Simulation, StepReport};
