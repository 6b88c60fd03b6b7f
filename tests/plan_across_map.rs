//! Drive whole journeys across a walled world, including a mid-journey
//! occupancy change that invalidates the shared high-level path
//!

use bevy_region_path_plugin::prelude::*;

/// A 60x60 world split by a north-south wall at column 30, passable only
/// through a four-cell gap at rows 28..=31
fn build_walled_engine() -> PathEngine {
	let mut engine = PathEngine::new(60, 60);
	for row in 0..60 {
		if (28..=31).contains(&row) {
			continue;
		}
		engine
			.get_grid_mut()
			.set_passability(CellCoord::new(30, row), Passability::NotPassable);
	}
	engine.rebuild_all();
	engine
}

/// Step a request until it concludes, returning the final position and the
/// last continuation
fn drive(engine: &mut PathEngine, handle: PathRequestHandle, start: CellCoord) -> (CellCoord, Continuation) {
	let mut position = start;
	let mut legs = 0;
	loop {
		let step = engine.step_path(handle).unwrap();
		if let Some(last) = step.waypoints.last() {
			position = *last;
		}
		if step.continuation != Continuation::NextLeg {
			return (position, step.continuation);
		}
		legs += 1;
		assert!(legs < 200, "journey must terminate");
	}
}

#[test]
fn journey_threads_the_wall_gap() {
	let mut engine = build_walled_engine();
	let start = CellCoord::new(1, 1);
	let dest = CellCoord::new(58, 58);
	let handle = engine
		.request_path(start, dest, 0, Passability::Land, false)
		.unwrap();
	let (position, continuation) = drive(&mut engine, handle, start);
	assert_eq!(continuation, Continuation::EndOfPath);
	assert_eq!(position, dest);
	engine.release_path(handle).unwrap();
}

#[test]
fn journey_survives_an_occupancy_change() {
	let mut engine = build_walled_engine();
	let start = CellCoord::new(1, 1);
	let dest = CellCoord::new(58, 58);
	let handle = engine
		.request_path(start, dest, 0, Passability::Land, false)
		.unwrap();
	// walk two legs, then park a block of agents over the middle of the map
	// so the cached high-level path is torn up under the request
	let mut position = start;
	for _ in 0..2 {
		let step = engine.step_path(handle).unwrap();
		assert_eq!(step.continuation, Continuation::NextLeg);
		position = *step.waypoints.last().unwrap();
	}
	for column in 20..=24 {
		for row in 20..=24 {
			engine
				.get_grid_mut()
				.set_occupied(CellCoord::new(column, row), true, false);
		}
	}
	engine.notify_occupancy_changed(CellCoord::new(20, 20), CellCoord::new(24, 24));
	let (position, continuation) = drive(&mut engine, handle, position);
	assert_eq!(continuation, Continuation::EndOfPath);
	assert_eq!(position, dest);
	engine.release_path(handle).unwrap();
}

#[test]
fn sealing_the_gap_fails_the_journey() {
	let mut engine = build_walled_engine();
	let start = CellCoord::new(1, 1);
	let dest = CellCoord::new(58, 58);
	let handle = engine
		.request_path(start, dest, 0, Passability::Land, false)
		.unwrap();
	let step = engine.step_path(handle).unwrap();
	assert_eq!(step.continuation, Continuation::NextLeg);
	let position = *step.waypoints.last().unwrap();
	// parked agents seal the gap, the world is now split in two
	for row in 28..=31 {
		engine
			.get_grid_mut()
			.set_occupied(CellCoord::new(30, row), true, false);
	}
	engine.notify_occupancy_changed(CellCoord::new(30, 28), CellCoord::new(30, 31));
	let (_position, continuation) = drive(&mut engine, handle, position);
	assert_eq!(continuation, Continuation::Failed);
	engine.release_path(handle).unwrap();
}
