//! Main simulation world that ties lanes and vehicles together
//!
//! The simulation owns every lane and every vehicle. Lanes only store
//! vehicle ids; vehicle state (speed cap, rule, jam memory) lives here.

use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;

use super::descriptor::parse_descriptor;
use super::error::{TrafficError, TrafficResult};
use super::lane::Lane;
use super::rule::{MoveContext, MoveView, Rule};
use super::types::{LaneId, SimId, VehicleId};
use super::vehicle::Vehicle;

/// What happened during one step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Vehicles that ended the step on a different cell of the same lane
    pub moved: usize,
    /// Cells travelled forward by all vehicles
    pub distance: usize,
    /// Vehicles that ended the step on another lane
    pub lane_changes: usize,
}

impl StepReport {
    fn merge(&mut self, other: StepReport) {
        self.moved += other.moved;
        self.distance += other.distance;
        self.lane_changes += other.lane_changes;
    }
}

/// Per-lane statistics of the committed state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneSummary {
    pub lane: LaneId,
    pub length: usize,
    pub vehicles: usize,
    pub density: f64,
    pub jams: usize,
}

/// State restored when a step fails part-way
struct Checkpoint {
    lanes: Vec<Lane>,
    vehicles: HashMap<VehicleId, Vehicle>,
    rng: Option<StdRng>,
}

/// The main simulation world
pub struct Simulation {
    /// Lanes ordered left to right
    lanes: Vec<Lane>,

    /// Every vehicle on any lane
    vehicles: HashMap<VehicleId, Vehicle>,

    /// Rule for vehicles whose lane and self carry none
    global_rule: Option<Arc<dyn Rule>>,

    /// Next ID to assign
    next_id: usize,

    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    fn new_internal(rng: Option<StdRng>) -> Self {
        Self {
            lanes: Vec::new(),
            vehicles: HashMap::new(),
            global_rule: None,
            next_id: 0,
            rng,
        }
    }

    pub fn new() -> Self {
        Self::new_internal(None)
    }

    /// Create a new Simulation with a seeded RNG for reproducible runs
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new_internal(Some(StdRng::seed_from_u64(seed)))
    }

    /// Draw a boolean, using the seeded RNG if available
    pub(crate) fn random_bool(&mut self, probability: f64) -> bool {
        let probability = probability.clamp(0.0, 1.0);
        match &mut self.rng {
            Some(rng) => rng.random_bool(probability),
            None => rand::rng().random_bool(probability),
        }
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    fn spawn_vehicle(&mut self) -> VehicleId {
        let id = VehicleId(self.next_sim_id());
        self.vehicles.insert(id, Vehicle::new(id));
        id
    }

    fn lane_index(&self, lane: LaneId) -> TrafficResult<usize> {
        self.lanes
            .iter()
            .position(|l| l.id == lane)
            .ok_or(TrafficError::LaneNotManaged(lane))
    }

    /// Length every lane after the first is forced to
    fn matched_length(&self, requested: usize) -> usize {
        self.lanes.first().map_or(requested, Lane::length)
    }

    /// Add a lane from an occupancy descriptor.
    ///
    /// The first lane takes its length from the descriptor. Later lanes are
    /// forced to the first lane's length: extra cells are dropped, missing
    /// cells are free.
    pub fn add_lane(&mut self, descriptor: &str) -> TrafficResult<LaneId> {
        let cells = parse_descriptor(descriptor);
        let length = self.matched_length(cells.len());
        if cells.len() > length {
            warn!(
                "descriptor has {} cells, truncating to lane length {}",
                cells.len(),
                length
            );
        }

        let id = LaneId(self.next_sim_id());
        let mut lane = Lane::with_length(id, length);

        for (cell, &occupied) in cells.iter().take(length).enumerate() {
            if occupied {
                let vehicle = self.spawn_vehicle();
                lane.add_vehicle(vehicle, cell as isize)?;
            }
        }
        lane.reflesh();

        debug!("added {} with {} vehicles: {}", id, lane.vehicle_count(), lane);
        self.lanes.push(lane);
        Ok(id)
    }

    /// Add a lane without vehicles.
    /// Past the first lane the length is forced to the first lane's length.
    pub fn add_empty_lane(&mut self, length: isize) -> TrafficResult<LaneId> {
        let id = LaneId(self.next_sim_id());
        let lane = Lane::new(id, length)?;
        let lane = match self.lanes.first() {
            Some(first) if first.length() != lane.length() => {
                Lane::with_length(id, first.length())
            }
            _ => lane,
        };

        debug!("added empty {} of length {}", id, lane.length());
        self.lanes.push(lane);
        Ok(id)
    }

    /// Create a vehicle at `position` on `lane`.
    /// It becomes visible to queries at the next commit.
    pub fn add_vehicle(&mut self, lane: LaneId, position: isize) -> TrafficResult<VehicleId> {
        let index = self.lane_index(lane)?;
        let id = VehicleId(SimId(self.next_id));
        self.lanes[index].add_vehicle(id, position)?;
        self.next_id += 1;
        self.vehicles.insert(id, Vehicle::new(id));
        Ok(id)
    }

    /// Stop managing `lane` and every vehicle on it
    pub fn remove_lane(&mut self, lane: LaneId) -> TrafficResult<()> {
        let index = self.lane_index(lane)?;
        let removed = self.lanes.remove(index);

        for vehicle in removed.known_vehicles() {
            if !self
                .lanes
                .iter()
                .any(|l| l.contains(vehicle) || l.is_committed(vehicle))
            {
                self.vehicles.remove(&vehicle);
            }
        }

        debug!("removed {}", lane);
        Ok(())
    }

    /// Drop every lane and vehicle. The global rule is kept.
    pub fn clear(&mut self) {
        self.lanes.clear();
        self.vehicles.clear();
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn lane(&self, lane: LaneId) -> Option<&Lane> {
        self.lanes.iter().find(|l| l.id == lane)
    }

    pub fn vehicle(&self, vehicle: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&vehicle)
    }

    pub fn vehicle_mut(&mut self, vehicle: VehicleId) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(&vehicle)
    }

    /// Committed vehicles of `lane` in ascending id order
    pub fn vehicles_on(&self, lane: LaneId) -> TrafficResult<Vec<VehicleId>> {
        let index = self.lane_index(lane)?;
        Ok(self.lanes[index].vehicles())
    }

    /// The lane to the left of `lane`, `None` at the edge
    pub fn left_of(&self, lane: LaneId) -> TrafficResult<Option<LaneId>> {
        let index = self.lane_index(lane)?;
        Ok(index
            .checked_sub(1)
            .and_then(|left| self.lanes.get(left))
            .map(|l| l.id))
    }

    /// The lane to the right of `lane`, `None` at the edge
    pub fn right_of(&self, lane: LaneId) -> TrafficResult<Option<LaneId>> {
        let index = self.lane_index(lane)?;
        Ok(self.lanes.get(index + 1).map(|l| l.id))
    }

    /// The lane `vehicle` was on at the last commit
    pub fn lane_of(&self, vehicle: VehicleId) -> Option<LaneId> {
        self.lanes
            .iter()
            .find(|l| l.is_committed(vehicle))
            .map(|l| l.id)
    }

    pub fn global_rule(&self) -> Option<&Arc<dyn Rule>> {
        self.global_rule.as_ref()
    }

    /// Set the rule used when neither a vehicle nor its lane has one
    pub fn set_global_rule(&mut self, rule: Option<Arc<dyn Rule>>) {
        self.global_rule = rule;
    }

    pub fn remove_global_rule(&mut self) {
        self.global_rule = None;
    }

    pub fn set_lane_rule(&mut self, lane: LaneId, rule: Option<Arc<dyn Rule>>) -> TrafficResult<()> {
        let index = self.lane_index(lane)?;
        self.lanes[index].set_rule(rule);
        Ok(())
    }

    /// Give `rule` to every vehicle currently on `lane`
    pub fn assign_rule_on_lane(&mut self, lane: LaneId, rule: Arc<dyn Rule>) -> TrafficResult<()> {
        for vehicle in self.vehicles_on(lane)? {
            if let Some(v) = self.vehicles.get_mut(&vehicle) {
                v.set_rule(Some(Arc::clone(&rule)));
            }
        }
        Ok(())
    }

    /// Set the speed cap of every managed vehicle
    pub fn set_speed_cap(&mut self, speed_cap: isize) {
        for vehicle in self.vehicles.values_mut() {
            vehicle.set_speed_cap(speed_cap);
        }
    }

    /// Set the speed cap of every vehicle on `lane`
    pub fn set_lane_speed_cap(&mut self, lane: LaneId, speed_cap: isize) -> TrafficResult<()> {
        for vehicle in self.vehicles_on(lane)? {
            if let Some(v) = self.vehicles.get_mut(&vehicle) {
                v.set_speed_cap(speed_cap);
            }
        }
        Ok(())
    }

    /// Advance `vehicle` by up to `distance` cells on its lane.
    ///
    /// Requests longer than the free gap ahead are clamped. Returns the
    /// distance actually travelled.
    pub fn move_vehicle(&mut self, vehicle: VehicleId, distance: isize) -> TrafficResult<usize> {
        let lane_id = self
            .lane_of(vehicle)
            .ok_or(TrafficError::VehicleNotManaged(vehicle))?;
        if distance < 0 {
            return Err(TrafficError::NegativeDistance(distance));
        }

        let index = self.lane_index(lane_id)?;
        let lane = &mut self.lanes[index];
        let length = lane.length();

        let free = lane.forward_free_length(vehicle)?;
        let committed = lane
            .committed_position_of(vehicle)
            .ok_or(TrafficError::VehicleNotOnLane {
                vehicle,
                lane: lane_id,
            })?;

        // Already left this lane earlier in the step
        let Some(current) = lane.position_of(vehicle) else {
            trace!("{} left {} this step, not moving", vehicle, lane_id);
            return Ok(0);
        };

        // Repeated moves within one step share the committed gap
        let travelled = (current + length - committed) % length;
        let mut granted = (distance as usize).min(free.saturating_sub(travelled));

        // A vehicle that entered this lane during the step blocks the path
        if let Some(blocked) = (1..=granted)
            .find(|&cell| lane.is_pending_taken((current + cell) as isize, vehicle))
        {
            granted = blocked - 1;
        }

        if granted > 0 {
            lane.remove_vehicle(vehicle);
            lane.add_vehicle(vehicle, (current + granted) as isize)?;
        }

        trace!(
            "{} asked for {} cells, moved {} on {}",
            vehicle,
            distance,
            granted,
            lane_id
        );
        Ok(granted)
    }

    /// Move `vehicle` sideways onto `target` at the same cell.
    ///
    /// Returns `false` when the vehicle is not managed, is already on
    /// `target`, or the cell on `target` is taken.
    pub fn change_lane(&mut self, vehicle: VehicleId, target: LaneId) -> TrafficResult<bool> {
        let target_index = self.lane_index(target)?;

        let Some(source) = self.lane_of(vehicle) else {
            return Ok(false);
        };
        let source_index = self.lane_index(source)?;
        if source_index == target_index {
            return Ok(false);
        }

        let Some(position) = self.lanes[source_index].position_of(vehicle) else {
            return Ok(false);
        };

        match self.lanes[target_index].add_vehicle(vehicle, position as isize) {
            Ok(_) => {
                self.lanes[source_index].remove_vehicle(vehicle);
                trace!("{} changed from {} to {}", vehicle, source, target);
                Ok(true)
            }
            Err(TrafficError::OccupiedCell(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Run the rule chain for every committed vehicle of one lane.
    /// Writes land in pending buffers only.
    fn dispatch_lane(
        &mut self,
        lane: LaneId,
        global_rule: Option<&Arc<dyn Rule>>,
    ) -> TrafficResult<()> {
        let index = self.lane_index(lane)?;
        let left = self.left_of(lane)?;
        let right = self.right_of(lane)?;
        let fallback = self.lanes[index].rule().or(global_rule).cloned();

        for vehicle in self.lanes[index].vehicles() {
            let current = &self.lanes[index];
            let forward_free_length = current.forward_free_length(vehicle)?;
            let back_free_length = current.back_free_length(vehicle)?;
            let next_jam_length = current.next_jam_length(vehicle)?;
            let ahead_occupied = forward_free_length == 0 && current.length() > 1;

            let state = self
                .vehicles
                .get_mut(&vehicle)
                .ok_or(TrafficError::VehicleNotManaged(vehicle))?;
            let was_second_of_jam = state.observe_ahead(ahead_occupied);
            let speed_cap = state.speed_cap();
            let rule = state.rule().cloned().or_else(|| fallback.clone());

            let view = MoveView {
                lane,
                left,
                right,
                forward_free_length,
                back_free_length,
                next_jam_length,
                was_second_of_jam,
            };

            match rule {
                Some(rule) => {
                    let mut ctx = MoveContext::new(self, vehicle, view);
                    rule.on_move(&mut ctx)?;
                    self.adopt_lane_rule(vehicle);
                }
                None => {
                    self.move_vehicle(vehicle, speed_cap as isize)?;
                }
            }
        }

        Ok(())
    }

    /// Non-sticky vehicles take over the rule of the lane they now occupy
    fn adopt_lane_rule(&mut self, vehicle: VehicleId) {
        let lane_rule = self
            .lanes
            .iter()
            .find(|l| l.contains(vehicle))
            .and_then(|l| l.rule().cloned());
        if let Some(state) = self.vehicles.get_mut(&vehicle) {
            state.adopt_lane_rule(lane_rule);
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            lanes: self.lanes.clone(),
            vehicles: self.vehicles.clone(),
            rng: self.rng.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.lanes = checkpoint.lanes;
        self.vehicles = checkpoint.vehicles;
        self.rng = checkpoint.rng;
    }

    fn lane_report(lane: &Lane) -> StepReport {
        let length = lane.length();
        let mut report = StepReport::default();
        for (_, from, to) in lane.pending_moves() {
            match from {
                Some(from) if from != to => {
                    report.moved += 1;
                    report.distance += (to + length - from) % length;
                }
                Some(_) => {}
                None => report.lane_changes += 1,
            }
        }
        report
    }

    /// Run one lane with the global rule as fallback and commit it.
    /// On error every lane and vehicle is left as it was before the call.
    pub fn update_lane(&mut self, lane: LaneId) -> TrafficResult<StepReport> {
        let global_rule = self.global_rule.clone();
        let checkpoint = self.checkpoint();
        if let Err(e) = self.dispatch_lane(lane, global_rule.as_ref()) {
            warn!("update of {} failed, rolling back: {}", lane, e);
            self.restore(checkpoint);
            return Err(e);
        }

        let index = self.lane_index(lane)?;
        let report = Self::lane_report(&self.lanes[index]);
        self.lanes[index].reflesh();
        Ok(report)
    }

    /// One discrete tick: every lane in order, then a single commit.
    /// A failing rule aborts the step and nothing of it is kept.
    pub fn step(&mut self) -> TrafficResult<StepReport> {
        let global_rule = self.global_rule.clone();
        let lane_ids: Vec<LaneId> = self.lanes.iter().map(|l| l.id).collect();
        let checkpoint = self.checkpoint();

        for lane in lane_ids {
            if let Err(e) = self.dispatch_lane(lane, global_rule.as_ref()) {
                warn!("step failed on {}, rolling back: {}", lane, e);
                self.restore(checkpoint);
                return Err(e);
            }
        }

        let mut report = StepReport::default();
        for lane in &self.lanes {
            report.merge(Self::lane_report(lane));
        }

        self.reflesh();
        trace!("step finished: {:?}", report);
        Ok(report)
    }

    /// Commit the pending buffer of every lane
    pub fn reflesh(&mut self) {
        for lane in &mut self.lanes {
            lane.reflesh();
        }
    }

    /// Statistics of every lane
    pub fn summary(&self) -> Vec<LaneSummary> {
        self.lanes
            .iter()
            .map(|lane| LaneSummary {
                lane: lane.id,
                length: lane.length(),
                vehicles: lane.vehicle_count(),
                density: lane.density(),
                jams: lane.jam_count(),
            })
            .collect()
    }

    /// Log a summary of the world state
    pub fn log_summary(&self) {
        info!("=== Ring Traffic Summary ===");
        info!("Lanes: {}, Vehicles: {}", self.lanes.len(), self.vehicles.len());
        for summary in self.summary() {
            info!(
                "  {}: length={}, vehicles={}, density={:.2}, jams={}",
                summary.lane, summary.length, summary.vehicles, summary.density, summary.jams
            );
        }
    }
}
