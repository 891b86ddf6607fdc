//! Vehicles in the ring traffic simulation
//!
//! A vehicle never touches lane state itself. Movement goes through the
//! simulation (`Simulation::move_vehicle`), which owns every lane.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::rule::Rule;
use super::types::{VehicleId, DEFAULT_SPEED_CAP};

/// A vehicle occupying one cell of a lane
#[derive(Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    speed_cap: usize,
    rule: Option<Arc<dyn Rule>>,
    /// Keep the own rule after a step instead of adopting the lane's rule
    rule_sticky: bool,
    /// Whether the cell ahead was occupied at the last observation
    saw_jam_ahead: bool,
    /// Whether the cell ahead was occupied at the observation before that
    saw_jam_ahead_prev: bool,
}

impl Vehicle {
    pub fn new(id: VehicleId) -> Self {
        Self {
            id,
            speed_cap: DEFAULT_SPEED_CAP,
            rule: None,
            rule_sticky: false,
            saw_jam_ahead: false,
            saw_jam_ahead_prev: false,
        }
    }

    pub fn speed_cap(&self) -> usize {
        self.speed_cap
    }

    /// Set the maximum number of cells advanced per step.
    /// A negative value leaves the current cap untouched.
    pub fn set_speed_cap(&mut self, speed_cap: isize) {
        if let Ok(cap) = usize::try_from(speed_cap) {
            self.speed_cap = cap;
        }
    }

    pub fn rule(&self) -> Option<&Arc<dyn Rule>> {
        self.rule.as_ref()
    }

    pub fn has_rule(&self) -> bool {
        self.rule.is_some()
    }

    /// Give this vehicle its own rule. It takes precedence over lane and global rules.
    pub fn set_rule(&mut self, rule: Option<Arc<dyn Rule>>) {
        self.rule = rule;
    }

    pub fn remove_rule(&mut self) {
        self.rule = None;
    }

    pub fn is_rule_sticky(&self) -> bool {
        self.rule_sticky
    }

    pub fn set_rule_sticky(&mut self, sticky: bool) {
        self.rule_sticky = sticky;
    }

    /// After a step, a non-sticky vehicle takes over the rule of the lane it ended on
    pub(crate) fn adopt_lane_rule(&mut self, lane_rule: Option<Arc<dyn Rule>>) {
        if !self.rule_sticky {
            self.rule = lane_rule;
        }
    }

    /// Record whether the cell ahead is occupied now and report whether it
    /// was occupied on the previous observation and has just cleared.
    ///
    /// Called exactly once per step per vehicle by the lane update.
    pub(crate) fn observe_ahead(&mut self, ahead_occupied: bool) -> bool {
        self.saw_jam_ahead_prev = self.saw_jam_ahead;
        self.saw_jam_ahead = ahead_occupied;
        self.saw_jam_ahead_prev && !self.saw_jam_ahead
    }
}

impl PartialEq for Vehicle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Vehicle {}

impl Hash for Vehicle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Vehicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vehicle")
            .field("id", &self.id)
            .field("speed_cap", &self.speed_cap)
            .field("has_rule", &self.rule.is_some())
            .field("rule_sticky", &self.rule_sticky)
            .field("saw_jam_ahead", &self.saw_jam_ahead)
            .finish()
    }
}
