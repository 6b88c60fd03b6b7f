//! The terrain grid consumed by every planner: per-cell passability,
//! traversal cost, fog of war, occupancy and the weak back-reference to the
//! Region a cell currently belongs to
//!

use crate::prelude::*;

/// One cell of the map. The Region back-reference is ownership-free, the
/// Region arena remains the owner and rebuilding a Sector clears it
#[derive(Debug, Clone)]
pub struct TerrainCell {
	/// What kind of agent can traverse the cell
	passability: Passability,
	/// Cost of a ground agent traversing the cell
	cost: f32,
	/// Cost of an airborne agent traversing the cell
	air_cost: f32,
	/// Whether the cell is under fog of war
	fogged: bool,
	/// Whether any agent currently occupies the cell
	occupied: bool,
	/// Whether the occupying agent is moving (and so will vacate)
	occupied_moving: bool,
	/// The Region the cell currently belongs to, if any
	region: Option<RegionId>,
}

impl Default for TerrainCell {
	fn default() -> Self {
		TerrainCell {
			passability: Passability::Land,
			cost: 1.0,
			air_cost: 1.0,
			fogged: false,
			occupied: false,
			occupied_moving: false,
			region: None,
		}
	}
}

/// Row-major store of every [TerrainCell] of the map
#[derive(Debug, Clone)]
pub struct TerrainGrid {
	/// Number of cell columns
	columns: i32,
	/// Number of cell rows
	rows: i32,
	/// The cells in row-major order
	cells: Vec<TerrainCell>,
}

impl TerrainGrid {
	/// Create a new instance of [TerrainGrid] where every cell is open land of cost `1.0`
	pub fn new(columns: i32, rows: i32) -> Self {
		if columns <= 0 || rows <= 0 {
			panic!(
				"Grid dimensions `({}, {})` must be positive",
				columns, rows
			);
		}
		TerrainGrid {
			columns,
			rows,
			cells: vec![TerrainCell::default(); (columns * rows) as usize],
		}
	}
	/// Get the number of cell columns
	pub fn get_columns(&self) -> i32 {
		self.columns
	}
	/// Get the number of cell rows
	pub fn get_rows(&self) -> i32 {
		self.rows
	}
	/// Row-major index of a cell, panics on an out-of-bounds coordinate since
	/// wrapping would silently alias another cell
	fn index(&self, cell: CellCoord) -> usize {
		if !self.is_valid_cell(cell) {
			panic!("Cannot index the grid, coordinate out of bounds. Asked for column {}, row {}, grid column length is {}, grid row length is {}", cell.get_column(), cell.get_row(), self.columns, self.rows)
		}
		(cell.get_row() * self.columns + cell.get_column()) as usize
	}
	/// Whether the coordinate lies within the grid
	pub fn is_valid_cell(&self, cell: CellCoord) -> bool {
		cell.get_column() >= 0
			&& cell.get_column() < self.columns
			&& cell.get_row() >= 0
			&& cell.get_row() < self.rows
	}
	/// Passability of a cell, off-grid coordinates report [Passability::NotPassable]
	pub fn get_passability(&self, cell: CellCoord) -> Passability {
		if !self.is_valid_cell(cell) {
			return Passability::NotPassable;
		}
		self.cells[self.index(cell)].passability
	}
	/// Ground traversal cost of a cell
	pub fn get_cost(&self, cell: CellCoord) -> f32 {
		self.cells[self.index(cell)].cost
	}
	/// Airborne traversal cost of a cell
	pub fn get_air_cost(&self, cell: CellCoord) -> f32 {
		self.cells[self.index(cell)].air_cost
	}
	/// Whether a cell is under fog of war
	pub fn is_fogged(&self, cell: CellCoord) -> bool {
		self.cells[self.index(cell)].fogged
	}
	/// Occupancy of a cell as `(has_any_occupant, has_moving_occupant)`
	pub fn get_occupancy(&self, cell: CellCoord) -> (bool, bool) {
		let c = &self.cells[self.index(cell)];
		(c.occupied, c.occupied && c.occupied_moving)
	}
	/// Whether an agent of the given capability could traverse and stop on the
	/// cell right now: on-grid, matching passability and no occupant at all
	pub fn is_free(&self, cell: CellCoord, capability: Passability) -> bool {
		self.is_valid_cell(cell)
			&& self.get_passability(cell) == capability
			&& !self.cells[self.index(cell)].occupied
	}
	/// Like [TerrainGrid::is_free] but tolerates a moving occupant, which will
	/// have vacated the cell by the time the agent arrives
	pub fn is_standable(&self, cell: CellCoord, capability: Passability) -> bool {
		if !self.is_valid_cell(cell) || self.get_passability(cell) != capability {
			return false;
		}
		let c = &self.cells[self.index(cell)];
		!c.occupied || c.occupied_moving
	}
	/// The Region a cell currently belongs to
	pub fn get_region(&self, cell: CellCoord) -> Option<RegionId> {
		self.cells[self.index(cell)].region
	}
	/// Record or clear the Region a cell belongs to, called only by Sector rebuilds
	pub fn set_region(&mut self, cell: CellCoord, region: Option<RegionId>) {
		let i = self.index(cell);
		self.cells[i].region = region;
	}
	/// Overwrite the passability of a cell
	pub fn set_passability(&mut self, cell: CellCoord, passability: Passability) {
		let i = self.index(cell);
		self.cells[i].passability = passability;
	}
	/// Overwrite the ground traversal cost of a cell
	pub fn set_cost(&mut self, cell: CellCoord, cost: f32) {
		let i = self.index(cell);
		self.cells[i].cost = cost;
	}
	/// Overwrite the airborne traversal cost of a cell
	pub fn set_air_cost(&mut self, cell: CellCoord, cost: f32) {
		let i = self.index(cell);
		self.cells[i].air_cost = cost;
	}
	/// Overwrite the fog of war state of a cell
	pub fn set_fogged(&mut self, cell: CellCoord, fogged: bool) {
		let i = self.index(cell);
		self.cells[i].fogged = fogged;
	}
	/// Overwrite the occupancy of a cell. Callers must follow mutations with
	/// [crate::prelude::PathEngine::notify_occupancy_changed] over the touched
	/// rectangle so Regions are rebuilt
	pub fn set_occupied(&mut self, cell: CellCoord, occupied: bool, moving: bool) {
		let i = self.index(cell);
		self.cells[i].occupied = occupied;
		self.cells[i].occupied_moving = occupied && moving;
	}
}
