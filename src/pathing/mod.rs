//! Unit pathfinding over a cell grid split into Sectors of Regions.
//!
//! A map is divided into fixed-size Sectors. Within each Sector the passable,
//! unoccupied cells of one passability type are flood-filled into Regions.
//! Adjacent Regions are linked into a neighbour graph whose edge costs are
//! derived from how much border the two Regions share, and Regions that can
//! reach one another are unioned into RegionGroups for O(1) "could this ever
//! work" checks before any search is run.
//!
//! Three planners operate over this structure:
//!
//! * a flat single-resolution A* for short moves, with a straight-line fast
//!   pass and a ring-scan reachability pre-check
//! * a two-tier hierarchical planner: A* over the Region graph producing a
//!   coarse Region sequence (cached and shared between requests), then A*
//!   over raw cells one Region "leg" at a time
//! * a short-horizon A* for airborne agents that ignores Regions and
//!   occupancy but penalises turning
//!
//! Occupancy changes are folded back in incrementally: only the Sectors
//! covered by a change are re-flood-filled and only their Regions (plus
//! immediate neighbours) have edges, costs and groups recomputed. Cached
//! high-level paths that crossed a rebuilt Region are invalidated.
//!

pub mod engine;
pub mod flat;
pub mod flying;
pub mod grid;
pub mod high_level;
pub mod low_level;
pub mod maintainer;
pub mod regions;
pub mod search;
pub mod sectors;

use bevy::prelude::*;
use thiserror::Error;

/// Determines the number of Sectors by dividing the map length and depth by this value
pub const SECTOR_RESOLUTION: usize = 10;
/// Chebyshev start-to-destination distance at or below which a request is
/// served by the flat planner instead of the hierarchical one
pub const FLAT_PLANNER_RANGE: i32 = 40;
/// Number of steps the flat planner will commit to in one invocation before
/// handing back a partial path for the caller to resume later
pub const FLAT_STEP_HORIZON: u32 = 40;
/// Hard ceiling on node expansions in one flat search, bounding per-tick cost
pub const FLAT_ABORT_CEILING: usize = 2000;
/// A cell stepped onto by the straight-line fast pass must not cost more than this
pub const FAST_PATH_MAX_COST: f32 = 3.0;
/// Divider applied to the straight-line deviation term of the flat heuristic
pub const FLAT_CROSS_DIVIDER: f32 = 10.0;
/// Weight of the distance term of the flat heuristic
pub const FLAT_DIST_MULTIPLIER: f32 = 3.0;
/// Traversal penalty for cells under fog of war
pub const FOG_COST: f32 = 2.5;
/// Traversal penalty for cells occupied by a moving agent
pub const MOVING_OCCUPANT_COST: f32 = 1.5;
/// Traversal penalty for cells occupied by a stationary agent
pub const STATIONARY_OCCUPANT_COST: f32 = 3.0;
/// Base cost of every step taken by the low-level leg planner
pub const LOW_BASE_COST: f32 = 1.5;
/// Divider applied to the deviation term of the low-level heuristic
pub const LOW_CROSS_DIVIDER: f32 = 100.0;
/// Divider applied to the deviation term of the high-level (Region graph) heuristic
pub const HIGH_CROSS_DIVIDER: f32 = 400.0;
/// Weight of the distance term of the low-level heuristic
pub const LOW_DIST_MULTIPLIER: f32 = 1.75;
/// Weight of the distance term of the high-level heuristic
pub const HIGH_DIST_MULTIPLIER: f32 = 0.2;
/// Numerator of a Region graph edge cost, divided by the border cell count of the edge
pub const MAX_BORDER_COST: f32 = 20.0;
/// Weight of accumulated cost when scoring the nearest-node fallback of an
/// exhausted search (favours nodes close to the goal over nodes cheap to reach)
pub const NEAREST_G_FACTOR: f32 = 0.2;
/// Hard ceiling on node expansions in one low-level leg search
pub const LOW_MAX_NODES: usize = 1000;
/// Hard ceiling on Region expansions in one high-level search
pub const HIGH_MAX_NODES: usize = 600;
/// Step depth at which the flying planner hands back a partial path
pub const FLYING_STEPS: u32 = 15;
/// Half-width of the cell window the flying planner searches within
pub const FLYING_WINDOW: i32 = 15;
/// Penalty applied by the flying planner whenever a step changes direction
pub const FLYING_TURNING_COST: f32 = 1.0;
/// Maximum ring radius scanned around a destination when testing whether it
/// is enclosed and searching would be pointless
pub const RANGE_STEPS: i32 = 15;

/// The eight directions of movement as `(column, row)` offsets, clockwise from north
pub const DIRECTIONS: [(i32, i32); 8] = [
	(0, -1),
	(1, -1),
	(1, 0),
	(1, 1),
	(0, 1),
	(-1, 1),
	(-1, 0),
	(-1, -1),
];

/// Identifies a cell of the map by its `(column, row)` position
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash, Reflect)]
pub struct CellCoord((i32, i32));

impl CellCoord {
	/// Create a new instance of [CellCoord]
	pub fn new(column: i32, row: i32) -> Self {
		CellCoord((column, row))
	}
	/// Get the cell `(column, row)` tuple
	pub fn get(&self) -> (i32, i32) {
		self.0
	}
	/// Get the cell column
	pub fn get_column(&self) -> i32 {
		self.0 .0
	}
	/// Get the cell row
	pub fn get_row(&self) -> i32 {
		self.0 .1
	}
	/// The cell at `(column, row)` offset from this one
	pub fn offset(&self, delta: (i32, i32)) -> CellCoord {
		CellCoord((self.0 .0 + delta.0, self.0 .1 + delta.1))
	}
	/// Chebyshev distance to another cell, i.e. the number of 8-connected steps between them
	pub fn chebyshev(&self, other: CellCoord) -> i32 {
		let dx = (self.0 .0 - other.0 .0).abs();
		let dy = (self.0 .1 - other.0 .1).abs();
		dx.max(dy)
	}
}

/// What kind of agent can traverse a cell, derived from terrain
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Reflect)]
pub enum Passability {
	/// No ground agent can traverse the cell
	NotPassable,
	/// Traversable by ground agents
	#[default]
	Land,
	/// Traversable by naval agents
	Water,
}

/// How a search concluded. Every variant other than [PathOutcome::NoPath]
/// comes with a usable (possibly best-effort) waypoint list
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Reflect)]
pub enum PathOutcome {
	/// The destination (or a cell within the acceptance range) was reached
	FullPath,
	/// The literal destination was unreachable, the waypoints lead to the nearest usable cell instead
	AlternatePath,
	/// The step horizon was reached before the destination, re-invoke once the returned leg is consumed
	PartialPath,
	/// The node-expansion ceiling was hit, the waypoints lead to the best node seen so far
	AbortedPath,
	/// The destination is provably unreachable
	NoPath,
}

/// Tells the caller of a step what to do once the returned waypoints are consumed
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Reflect)]
pub enum Continuation {
	/// More travel remains, invoke the step again for the next leg
	NextLeg,
	/// The journey is complete, release the request
	EndOfPath,
	/// The request cannot make further progress, release the request
	Failed,
}

/// Which planner serves a request, chosen once when the request is made
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Reflect)]
pub enum Strategy {
	/// Single-resolution search for short moves
	Flat,
	/// Region graph search followed by per-leg cell searches
	Hierarchical,
	/// Short-horizon airborne search
	Flying,
}

/// Addresses an active journey held by the [engine::PathEngine]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Reflect)]
pub struct PathRequestHandle(usize);

impl PathRequestHandle {
	/// Create a new instance of [PathRequestHandle]
	pub fn new(index: usize) -> Self {
		PathRequestHandle(index)
	}
	/// Get the request slot index
	pub fn get(&self) -> usize {
		self.0
	}
}

/// Programmer errors rejected before any search is started. Ordinary
/// unreachability is reported through [PathOutcome], never through this
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
	/// A start or destination coordinate lies outside the grid
	#[error("coordinate `({0}, {1})` is outside the grid")]
	InvalidCoordinate(i32, i32),
	/// The acceptance range is negative
	#[error("acceptance range `{0}` must be zero or positive")]
	InvalidRange(i32),
	/// A ground request declared itself unable to traverse any terrain
	#[error("a ground request must be capable of traversing Land or Water")]
	InvalidCapability,
	/// The handle does not address an active request
	#[error("no active path request for handle `{0:?}`")]
	UnknownHandle(PathRequestHandle),
}

/// The waypoints produced by one planner invocation together with how the search concluded
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPath {
	/// Cells to travel through in order, excluding the start cell
	pub waypoints: Vec<CellCoord>,
	/// How the search concluded
	pub outcome: PathOutcome,
}

/// Counters accumulated across searches, used to spot maps that have become
/// expensive to plan over
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchStats {
	/// Nodes pushed onto an open set
	pub nodes_opened: u64,
	/// Nodes popped off an open set
	pub nodes_closed: u64,
	/// High-level plans served from the cache without a search
	pub cache_hits: u64,
	/// High-level plans that required a Region graph search
	pub cache_misses: u64,
}

/// Heuristic favouring cells near the straight line from `start` to `dest`:
/// the cross product of (node - dest) and (start - dest) measures deviation
/// from that line, while the distance term approximates 8-connected travel
/// where a diagonal step advances both axes
pub fn line_deviation(
	node: CellCoord,
	start: CellCoord,
	dest: CellCoord,
	cross_divider: f32,
	dist_multiplier: f32,
) -> f32 {
	point_deviation(
		(node.get_column() as f32, node.get_row() as f32),
		start,
		dest,
		cross_divider,
		dist_multiplier,
	)
}

/// [line_deviation] for a fractional position such as a Region centroid
pub fn point_deviation(
	node: (f32, f32),
	start: CellCoord,
	dest: CellCoord,
	cross_divider: f32,
	dist_multiplier: f32,
) -> f32 {
	let dx1 = node.0 - dest.get_column() as f32;
	let dy1 = node.1 - dest.get_row() as f32;
	let dx2 = (start.get_column() - dest.get_column()) as f32;
	let dy2 = (start.get_row() - dest.get_row()) as f32;
	let cross = (dx1 * dy2 - dx2 * dy1).abs();
	let adx = dx1.abs();
	let ady = dy1.abs();
	let (far, near) = if adx > ady { (adx, ady) } else { (ady, adx) };
	cross / cross_divider + (far + near * 0.4) * dist_multiplier
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	#[test]
	fn chebyshev_distance() {
		let a = CellCoord::new(2, 3);
		let b = CellCoord::new(7, -1);
		assert_eq!(a.chebyshev(b), 5);
		assert_eq!(b.chebyshev(a), 5);
		assert_eq!(a.chebyshev(a), 0);
	}
	#[test]
	fn offset_applies_direction() {
		let cell = CellCoord::new(4, 4);
		let north = cell.offset(DIRECTIONS[0]);
		assert_eq!(north, CellCoord::new(4, 3));
		let south_west = cell.offset(DIRECTIONS[5]);
		assert_eq!(south_west, CellCoord::new(3, 5));
	}
	#[test]
	fn deviation_zero_on_the_line() {
		let start = CellCoord::new(0, 0);
		let dest = CellCoord::new(10, 10);
		let on_line = line_deviation(CellCoord::new(5, 5), start, dest, 10.0, 3.0);
		let off_line = line_deviation(CellCoord::new(5, 2), start, dest, 10.0, 3.0);
		// both share a distance term but only the off-line cell pays a cross term
		assert!(on_line < off_line);
	}
	#[test]
	fn deviation_shrinks_toward_destination() {
		let start = CellCoord::new(0, 0);
		let dest = CellCoord::new(10, 0);
		let near = line_deviation(CellCoord::new(9, 0), start, dest, 10.0, 3.0);
		let far = line_deviation(CellCoord::new(2, 0), start, dest, 10.0, 3.0);
		assert!(near < far);
	}
}
