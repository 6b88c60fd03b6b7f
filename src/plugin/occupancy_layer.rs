//! Logic for handling changes to cell occupancy which in turn rebuilds the
//! Regions covering the changed cells and cleans cached high-level paths
//! which may of been made invalid by the change
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Used to update the occupancy of one cell
#[derive(Event)]
pub struct EventUpdateOccupancyCell {
	/// Cell to update
	cell: CellCoord,
	/// Whether an agent sits on the cell
	occupied: bool,
	/// Whether that agent is moving rather than parked
	moving: bool,
}

impl EventUpdateOccupancyCell {
	/// Create a new instance of [EventUpdateOccupancyCell]
	#[cfg(not(tarpaulin_include))]
	pub fn new(cell: CellCoord, occupied: bool, moving: bool) -> Self {
		EventUpdateOccupancyCell {
			cell,
			occupied,
			moving,
		}
	}
	#[cfg(not(tarpaulin_include))]
	pub fn get_cell(&self) -> CellCoord {
		self.cell
	}
	#[cfg(not(tarpaulin_include))]
	pub fn is_occupied(&self) -> bool {
		self.occupied
	}
	#[cfg(not(tarpaulin_include))]
	pub fn is_moving(&self) -> bool {
		self.moving
	}
}

/// Announces that occupancy over an inclusive cell rectangle has changed and
/// the Region structures covering it must be rebuilt. Sent by
/// [process_occupancy_updates] and by hosts that edit the grid directly
#[derive(Event)]
pub struct EventOccupancyChanged {
	/// Minimum corner of the changed rectangle
	min: CellCoord,
	/// Maximum corner of the changed rectangle
	max: CellCoord,
}

impl EventOccupancyChanged {
	/// Create a new instance of [EventOccupancyChanged]
	pub fn new(min: CellCoord, max: CellCoord) -> Self {
		EventOccupancyChanged { min, max }
	}
	pub fn get_min(&self) -> CellCoord {
		self.min
	}
	pub fn get_max(&self) -> CellCoord {
		self.max
	}
}

/// Read [EventUpdateOccupancyCell], write the values into the grid and
/// announce the changed area
#[cfg(not(tarpaulin_include))]
pub fn process_occupancy_updates(
	mut events: EventReader<EventUpdateOccupancyCell>,
	mut query: Query<&mut PathEngine>,
	mut event_changed: EventWriter<EventOccupancyChanged>,
) {
	// coalesce the tick's updates into one rectangle per engine so the
	// rebuild below runs once rather than per cell
	let mut bounds: Option<(CellCoord, CellCoord)> = None;
	for event in events.read() {
		let cell = event.get_cell();
		for mut engine in query.iter_mut() {
			if !engine.get_grid().is_valid_cell(cell) {
				warn!("Occupancy update for {:?} is outside the grid", cell);
				continue;
			}
			engine
				.get_grid_mut()
				.set_occupied(cell, event.is_occupied(), event.is_moving());
			bounds = Some(match bounds {
				Some((min, max)) => (
					CellCoord::new(
						min.get_column().min(cell.get_column()),
						min.get_row().min(cell.get_row()),
					),
					CellCoord::new(
						max.get_column().max(cell.get_column()),
						max.get_row().max(cell.get_row()),
					),
				),
				None => (cell, cell),
			});
		}
	}
	if let Some((min, max)) = bounds {
		event_changed.write(EventOccupancyChanged::new(min, max));
	}
}

/// Read [EventOccupancyChanged] and fold the changed rectangles back into the
/// Region structures
#[cfg(not(tarpaulin_include))]
pub fn process_occupancy_changes(
	mut events: EventReader<EventOccupancyChanged>,
	mut query: Query<&mut PathEngine>,
) {
	for event in events.read() {
		for mut engine in query.iter_mut() {
			engine.notify_occupancy_changed(event.get_min(), event.get_max());
		}
	}
}
