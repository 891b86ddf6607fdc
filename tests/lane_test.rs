//! Lane geometry and buffering tests
//!
//! These exercise a lane on its own, without a simulation around it.

use ring_traffic::simulation::{Lane, LaneId, SimId, Simulation, TrafficError, VehicleId};

fn vid(n: usize) -> VehicleId {
    VehicleId(SimId(n))
}

fn lane_with(length: isize, cells: &[isize]) -> Lane {
    let mut lane = Lane::new(LaneId(SimId(100)), length).expect("valid length");
    for (i, &cell) in cells.iter().enumerate() {
        lane.add_vehicle(vid(i), cell).expect("free cell");
    }
    lane.reflesh();
    lane
}

#[test]
fn test_negative_length_is_rejected() {
    let result = Lane::new(LaneId(SimId(0)), -1);
    assert_eq!(result.err(), Some(TrafficError::InvalidLaneLength(-1)));
}

#[test]
fn test_add_vehicle_wraps_position() {
    let mut lane = Lane::new(LaneId(SimId(0)), 5).unwrap();

    assert_eq!(lane.add_vehicle(vid(1), 7), Ok(2));
    assert_eq!(lane.add_vehicle(vid(2), -1), Ok(4));
    assert_eq!(lane.position_of(vid(1)), Some(2));
    assert_eq!(lane.position_of(vid(2)), Some(4));
}

#[test]
fn test_add_vehicle_rejects_occupied_cell_and_duplicates() {
    let mut lane = Lane::new(LaneId(SimId(0)), 5).unwrap();
    lane.add_vehicle(vid(1), 0).unwrap();

    assert_eq!(
        lane.add_vehicle(vid(1), 3),
        Err(TrafficError::DuplicateVehicle(vid(1)))
    );
    assert_eq!(lane.add_vehicle(vid(2), 5), Err(TrafficError::OccupiedCell(0)));
    assert_eq!(lane.position_of(vid(1)), Some(0));
    assert!(!lane.contains(vid(2)));
}

#[test]
fn test_zero_length_lane_has_no_cells() {
    let mut lane = Lane::new(LaneId(SimId(3)), 0).unwrap();
    assert_eq!(
        lane.add_vehicle(vid(1), 0),
        Err(TrafficError::NoCells(LaneId(SimId(3))))
    );
    assert_eq!(lane.to_string(), "");
    assert!(!lane.is_occupied(0));
}

#[test]
fn test_remove_absent_vehicle_is_noop() {
    let mut lane = lane_with(4, &[1]);
    lane.remove_vehicle(vid(42));
    lane.reflesh();
    assert_eq!(lane.to_string(), "□■□□");
}

#[test]
fn test_writes_are_invisible_until_reflesh() {
    let mut lane = Lane::new(LaneId(SimId(0)), 4).unwrap();
    lane.add_vehicle(vid(1), 2).unwrap();

    // Pending queries see the write, committed ones do not
    assert!(lane.contains(vid(1)));
    assert!(!lane.is_committed(vid(1)));
    assert!(!lane.is_occupied(2));
    assert_eq!(lane.to_string(), "□□□□");

    lane.reflesh();
    assert!(lane.is_occupied(2));
    assert!(lane.is_occupied(-2));
    assert_eq!(lane.to_string(), "□□■□");
}

#[test]
fn test_reflesh_is_idempotent() {
    let mut lane = lane_with(6, &[0, 2, 3]);
    let first = lane.to_string();
    lane.reflesh();
    lane.reflesh();
    assert_eq!(lane.to_string(), first);
    assert_eq!(lane.vehicle_count(), 3);
}

#[test]
fn test_free_lengths_wrap_around_the_ring() {
    // ■□□■■
    let lane = lane_with(5, &[0, 3, 4]);

    assert_eq!(lane.forward_free_length(vid(0)), Ok(2));
    assert_eq!(lane.back_free_length(vid(0)), Ok(0));

    assert_eq!(lane.forward_free_length(vid(1)), Ok(0));
    assert_eq!(lane.back_free_length(vid(1)), Ok(2));

    assert_eq!(lane.forward_free_length(vid(2)), Ok(0));
    assert_eq!(lane.back_free_length(vid(2)), Ok(0));
}

#[test]
fn test_lone_vehicle_sees_whole_ring() {
    let lane = lane_with(4, &[1]);
    assert_eq!(lane.forward_free_length(vid(0)), Ok(3));
    assert_eq!(lane.back_free_length(vid(0)), Ok(3));
}

#[test]
fn test_full_lane_has_no_free_cells() {
    let lane = lane_with(3, &[0, 1, 2]);
    for n in 0..3 {
        assert_eq!(lane.forward_free_length(vid(n)), Ok(0));
        assert_eq!(lane.back_free_length(vid(n)), Ok(0));
        assert_eq!(lane.next_jam_length(vid(n)), Ok(Some(0)));
    }
    assert_eq!(lane.jam_count(), 1);
}

#[test]
fn test_free_length_of_absent_vehicle_fails() {
    let lane = lane_with(4, &[0]);
    let expected = Err(TrafficError::VehicleNotOnLane {
        vehicle: vid(9),
        lane: LaneId(SimId(100)),
    });
    assert_eq!(lane.forward_free_length(vid(9)), expected);
    assert_eq!(lane.back_free_length(vid(9)), expected);
}

#[test]
fn test_next_jam_length() {
    // ■□□■■
    let lane = lane_with(5, &[0, 3, 4]);
    assert_eq!(lane.next_jam_length(vid(0)), Ok(Some(2)));
    assert_eq!(lane.next_jam_length(vid(1)), Ok(Some(0)));
    assert_eq!(lane.next_jam_length(vid(2)), Ok(Some(0)));
}

#[test]
fn test_next_jam_skips_single_vehicles() {
    // ■□■□□■■□
    let lane = lane_with(8, &[0, 2, 5, 6]);
    assert_eq!(lane.next_jam_length(vid(0)), Ok(Some(4)));
    assert_eq!(lane.next_jam_length(vid(1)), Ok(Some(2)));
    assert_eq!(lane.jam_count(), 1);
}

#[test]
fn test_no_jam_sentinel() {
    let spread = lane_with(4, &[0, 2]);
    assert_eq!(spread.next_jam_length(vid(0)), Ok(None));
    assert_eq!(spread.jam_count(), 0);

    let lone = lane_with(1, &[0]);
    assert_eq!(lone.next_jam_length(vid(0)), Ok(None));

    let mut simulation = Simulation::new();
    let empty = simulation.add_lane("□□□□").unwrap();
    let lane = simulation.lane(empty).unwrap();
    assert_eq!(lane.next_jam_length(vid(77)), Ok(None));
}

#[test]
fn test_density() {
    let lane = lane_with(4, &[0, 1]);
    assert!((lane.density() - 0.5).abs() < f64::EPSILON);
    assert_eq!(lane.cells(), vec![true, true, false, false]);
}
