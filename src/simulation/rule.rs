//! Movement rules
//!
//! A rule decides how one vehicle moves during one step. Rules can sit on a
//! vehicle, on a lane, or on the whole simulation; the most specific one
//! wins. When no rule exists at any level the vehicle advances by its speed
//! cap, clamped to the free gap ahead.

use log::trace;

use super::error::TrafficResult;
use super::types::{LaneId, VehicleId};
use super::world::Simulation;

/// Pluggable movement policy
///
/// Implementations read the pre-step geometry from the [`MoveContext`] and
/// request movement through it. Any closure taking `&mut MoveContext` is a
/// rule as well.
pub trait Rule: Send + Sync {
    fn on_move(&self, ctx: &mut MoveContext<'_>) -> TrafficResult<()>;
}

impl<F> Rule for F
where
    F: Fn(&mut MoveContext<'_>) -> TrafficResult<()> + Send + Sync,
{
    fn on_move(&self, ctx: &mut MoveContext<'_>) -> TrafficResult<()> {
        self(ctx)
    }
}

/// Geometry of one vehicle computed from the committed lane state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveView {
    pub lane: LaneId,
    pub left: Option<LaneId>,
    pub right: Option<LaneId>,
    pub forward_free_length: usize,
    pub back_free_length: usize,
    /// `None` when there is no jam on the lane
    pub next_jam_length: Option<usize>,
    /// The cell ahead was occupied last step and is free now
    pub was_second_of_jam: bool,
}

/// Handle given to a rule for one vehicle during one step
pub struct MoveContext<'a> {
    simulation: &'a mut Simulation,
    vehicle: VehicleId,
    view: MoveView,
}

impl<'a> MoveContext<'a> {
    pub(crate) fn new(simulation: &'a mut Simulation, vehicle: VehicleId, view: MoveView) -> Self {
        Self {
            simulation,
            vehicle,
            view,
        }
    }

    pub fn vehicle(&self) -> VehicleId {
        self.vehicle
    }

    pub fn view(&self) -> &MoveView {
        &self.view
    }

    pub fn lane(&self) -> LaneId {
        self.view.lane
    }

    pub fn left(&self) -> Option<LaneId> {
        self.view.left
    }

    pub fn right(&self) -> Option<LaneId> {
        self.view.right
    }

    pub fn forward_free_length(&self) -> usize {
        self.view.forward_free_length
    }

    pub fn back_free_length(&self) -> usize {
        self.view.back_free_length
    }

    pub fn next_jam_length(&self) -> Option<usize> {
        self.view.next_jam_length
    }

    pub fn was_second_of_jam(&self) -> bool {
        self.view.was_second_of_jam
    }

    pub fn speed_cap(&self) -> usize {
        self.simulation
            .vehicle(self.vehicle)
            .map(|v| v.speed_cap())
            .unwrap_or_default()
    }

    /// Advance the vehicle; returns the distance actually travelled
    pub fn advance(&mut self, distance: isize) -> TrafficResult<usize> {
        self.simulation.move_vehicle(self.vehicle, distance)
    }

    /// Advance the vehicle by its speed cap
    pub fn cruise(&mut self) -> TrafficResult<usize> {
        let speed_cap = self.speed_cap() as isize;
        self.advance(speed_cap)
    }

    /// Move the vehicle sideways onto `target`; `false` when the cell there is taken
    pub fn change_lane(&mut self, target: LaneId) -> TrafficResult<bool> {
        self.simulation.change_lane(self.vehicle, target)
    }

    /// Draw from the simulation RNG
    pub fn random_bool(&mut self, probability: f64) -> bool {
        self.simulation.random_bool(probability)
    }

    /// Read-only access to the rest of the simulation
    pub fn simulation(&self) -> &Simulation {
        &*self.simulation
    }
}

/// Advance by the speed cap every step
#[derive(Debug, Clone, Copy, Default)]
pub struct CruiseRule;

impl Rule for CruiseRule {
    fn on_move(&self, ctx: &mut MoveContext<'_>) -> TrafficResult<()> {
        ctx.cruise()?;
        Ok(())
    }
}

/// Slow-to-start: a vehicle close to the next jam waits while there is room
/// behind it, otherwise it creeps forward one cell
#[derive(Debug, Clone, Copy, Default)]
pub struct SlowToStartRule;

impl Rule for SlowToStartRule {
    fn on_move(&self, ctx: &mut MoveContext<'_>) -> TrafficResult<()> {
        let near_jam = ctx.next_jam_length().is_some_and(|jam| jam < 2);
        if near_jam && ctx.back_free_length() > 1 {
            trace!("{} waits behind a jam", ctx.vehicle());
            return Ok(());
        }
        ctx.advance(1)?;
        Ok(())
    }
}

/// Nagel–Schreckenberg dawdling: advance by the speed cap, one cell less
/// with the given probability
#[derive(Debug, Clone, Copy)]
pub struct RandomSlowdownRule {
    pub probability: f64,
}

impl RandomSlowdownRule {
    pub fn new(probability: f64) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }
}

impl Rule for RandomSlowdownRule {
    fn on_move(&self, ctx: &mut MoveContext<'_>) -> TrafficResult<()> {
        let mut distance = ctx.speed_cap().min(ctx.forward_free_length());
        if distance > 0 && ctx.random_bool(self.probability) {
            trace!("{} dawdles", ctx.vehicle());
            distance -= 1;
        }
        ctx.advance(distance as isize)?;
        Ok(())
    }
}
