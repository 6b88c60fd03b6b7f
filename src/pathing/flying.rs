//! Short-horizon planner for airborne agents. Regions and occupancy are
//! irrelevant in the air, so the search runs over raw cells inside a fixed
//! window around the agent and penalises changes of direction to keep the
//! flight path smooth. Long journeys are flown as a chain of partial paths
//!

use crate::prelude::*;
use std::collections::{HashMap, HashSet};

/// Plan a flight from `start` towards `dest`, stopping within `range` of it.
/// The search window is clamped to [FLYING_WINDOW] cells around the start
/// and the path is cut at [FLYING_STEPS] steps, the caller re-invokes with
/// the new position until the destination falls inside a window
pub fn plan_flying(
	grid: &TerrainGrid,
	start: CellCoord,
	dest: CellCoord,
	range: i32,
	stats: &mut SearchStats,
) -> PlannedPath {
	if start == dest || start.chebyshev(dest) <= range {
		return PlannedPath {
			waypoints: Vec::new(),
			outcome: PathOutcome::FullPath,
		};
	}
	// mirror of the ground planner's ring scan: an airborne destination
	// enclosed by impassable terrain out to the horizon is hopeless
	let reachable = (0..=RANGE_STEPS.max(range)).any(|radius| {
		ring_has_airborne_cell(grid, dest, radius)
	});
	if !reachable {
		return PlannedPath {
			waypoints: Vec::new(),
			outcome: PathOutcome::NoPath,
		};
	}
	// a range-zero flight to a cell that cannot be entered is redirected to
	// the closest open cell around it
	let dest_open =
		grid.is_valid_cell(dest) && grid.get_passability(dest) != Passability::NotPassable;
	let alternate_radius = if range == 0 && !dest_open {
		match (1..=RANGE_STEPS).find(|&r| ring_has_airborne_cell(grid, dest, r)) {
			Some(radius) => radius,
			None => {
				return PlannedPath {
					waypoints: Vec::new(),
					outcome: PathOutcome::NoPath,
				}
			}
		}
	} else {
		0
	};
	let min = start.offset((-FLYING_WINDOW, -FLYING_WINDOW));
	let max = start.offset((FLYING_WINDOW, FLYING_WINDOW));

	let mut open: OpenSet<CellCoord> = OpenSet::new();
	let mut g: HashMap<CellCoord, f32> = HashMap::new();
	let mut parents: HashMap<CellCoord, u8> = HashMap::new();
	let mut depth: HashMap<CellCoord, u32> = HashMap::new();
	let mut closed: HashSet<CellCoord> = HashSet::new();
	let start_h = line_deviation(start, start, dest, LOW_CROSS_DIVIDER, LOW_DIST_MULTIPLIER);
	g.insert(start, 0.0);
	depth.insert(start, 0);
	open.push(start, start_h);
	let mut best = start;
	let mut best_score = start_h;

	while let Some((node, _f)) = open.pop() {
		if !closed.insert(node) {
			continue;
		}
		stats.nodes_closed += 1;
		let reached = if range > 0 {
			node.chebyshev(dest) <= range
		} else if alternate_radius > 0 {
			node != dest && node.chebyshev(dest) <= alternate_radius
		} else {
			node == dest
		};
		if reached {
			let outcome = if alternate_radius > 0 {
				PathOutcome::AlternatePath
			} else {
				PathOutcome::FullPath
			};
			return PlannedPath {
				waypoints: trace_waypoints(&parents, start, node),
				outcome,
			};
		}
		let node_depth = *depth.get(&node).unwrap_or(&0);
		if node_depth >= FLYING_STEPS {
			return PlannedPath {
				waypoints: trace_waypoints(&parents, start, node),
				outcome: PathOutcome::PartialPath,
			};
		}
		let node_g = *g.get(&node).unwrap_or(&0.0);
		let node_direction = parents.get(&node).copied();
		for (i, delta) in DIRECTIONS.iter().enumerate() {
			let cell = node.offset(*delta);
			if cell.get_column() < min.get_column()
				|| cell.get_column() > max.get_column()
				|| cell.get_row() < min.get_row()
				|| cell.get_row() > max.get_row()
				|| !grid.is_valid_cell(cell)
				|| grid.get_passability(cell) == Passability::NotPassable
				|| closed.contains(&cell)
			{
				continue;
			}
			let mut step = grid.get_air_cost(cell);
			// a straight flight is a cheap flight
			if node_direction.is_some_and(|d| d != i as u8) {
				step += FLYING_TURNING_COST;
			}
			let tentative = node_g + step;
			if g.get(&cell).is_none_or(|&existing| tentative < existing) {
				g.insert(cell, tentative);
				parents.insert(cell, i as u8);
				depth.insert(cell, node_depth + 1);
				let h = line_deviation(cell, start, dest, LOW_CROSS_DIVIDER, LOW_DIST_MULTIPLIER);
				open.push(cell, tentative + h);
				stats.nodes_opened += 1;
				let score = h + tentative * NEAREST_G_FACTOR;
				if score < best_score {
					best_score = score;
					best = cell;
				}
			}
		}
	}
	if range == 0 && best != start {
		return PlannedPath {
			waypoints: trace_waypoints(&parents, start, best),
			outcome: PathOutcome::AlternatePath,
		};
	}
	PlannedPath {
		waypoints: Vec::new(),
		outcome: PathOutcome::NoPath,
	}
}

/// Whether the ring at `radius` around `center` holds a cell an airborne
/// agent may occupy, occupancy by other agents is ignored in the air
fn ring_has_airborne_cell(grid: &TerrainGrid, center: CellCoord, radius: i32) -> bool {
	if radius == 0 {
		return grid.is_valid_cell(center)
			&& grid.get_passability(center) != Passability::NotPassable;
	}
	for dx in -radius..=radius {
		for dy in [-radius, radius] {
			let cell = center.offset((dx, dy));
			if grid.is_valid_cell(cell) && grid.get_passability(cell) != Passability::NotPassable {
				return true;
			}
		}
	}
	for dy in (-radius + 1)..radius {
		for dx in [-radius, radius] {
			let cell = center.offset((dx, dy));
			if grid.is_valid_cell(cell) && grid.get_passability(cell) != Passability::NotPassable {
				return true;
			}
		}
	}
	false
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashSet;
	/// On a clear map the flight path never revisits a cell
	#[test]
	fn no_cycles_in_flight_path() {
		let grid = TerrainGrid::new(40, 40);
		let start = CellCoord::new(20, 20);
		for target in [
			CellCoord::new(30, 20),
			CellCoord::new(10, 12),
			CellCoord::new(28, 29),
			CellCoord::new(20, 7),
		] {
			let mut stats = SearchStats::default();
			let path = plan_flying(&grid, start, target, 0, &mut stats);
			assert_eq!(path.outcome, PathOutcome::FullPath);
			let unique: HashSet<CellCoord> = path.waypoints.iter().copied().collect();
			assert_eq!(unique.len(), path.waypoints.len());
			assert_eq!(*path.waypoints.last().unwrap(), target);
		}
	}
	/// Occupied cells mean nothing to an airborne agent
	#[test]
	fn flies_over_occupants() {
		let mut grid = TerrainGrid::new(40, 40);
		for row in 0..40 {
			grid.set_occupied(CellCoord::new(25, row), true, false);
		}
		let mut stats = SearchStats::default();
		let path = plan_flying(
			&grid,
			CellCoord::new(20, 20),
			CellCoord::new(30, 20),
			0,
			&mut stats,
		);
		assert_eq!(path.outcome, PathOutcome::FullPath);
		assert!(path.waypoints.contains(&CellCoord::new(25, 20)));
	}
	/// A destination beyond the window comes back as a partial path to resume
	#[test]
	fn distant_destination_is_partial() {
		let grid = TerrainGrid::new(60, 60);
		let mut stats = SearchStats::default();
		let path = plan_flying(
			&grid,
			CellCoord::new(5, 5),
			CellCoord::new(55, 55),
			0,
			&mut stats,
		);
		assert_eq!(path.outcome, PathOutcome::PartialPath);
		assert_eq!(path.waypoints.len(), FLYING_STEPS as usize);
		// resumed flights eventually arrive
		let mut position = *path.waypoints.last().unwrap();
		let mut flights = 1;
		loop {
			let mut stats = SearchStats::default();
			let next = plan_flying(&grid, position, CellCoord::new(55, 55), 0, &mut stats);
			assert_ne!(next.outcome, PathOutcome::NoPath);
			if next.outcome == PathOutcome::FullPath {
				assert_eq!(*next.waypoints.last().unwrap(), CellCoord::new(55, 55));
				break;
			}
			position = *next.waypoints.last().unwrap();
			flights += 1;
			assert!(flights < 20);
		}
	}
	/// Straight flight is preferred over zig-zagging of equal length
	#[test]
	fn turning_is_penalised() {
		let grid = TerrainGrid::new(40, 40);
		let mut stats = SearchStats::default();
		let path = plan_flying(
			&grid,
			CellCoord::new(10, 20),
			CellCoord::new(24, 20),
			0,
			&mut stats,
		);
		assert_eq!(path.outcome, PathOutcome::FullPath);
		// every step of the straight line shares row 20
		for waypoint in &path.waypoints {
			assert_eq!(waypoint.get_row(), 20);
		}
	}
	/// Mountains block even airborne agents, the flight settles for the
	/// closest approach outside the massif
	#[test]
	fn impassable_destination_gets_closest_approach() {
		let mut grid = TerrainGrid::new(40, 40);
		for dx in -2i32..=2 {
			for dy in -2i32..=2 {
				grid.set_passability(
					CellCoord::new(30 + dx, 20 + dy),
					Passability::NotPassable,
				);
			}
		}
		let dest = CellCoord::new(30, 20);
		let mut stats = SearchStats::default();
		let path = plan_flying(&grid, CellCoord::new(20, 20), dest, 0, &mut stats);
		assert_eq!(path.outcome, PathOutcome::AlternatePath);
		let last = *path.waypoints.last().unwrap();
		assert_ne!(last, dest);
		// the closest open cell sits just outside the 5x5 block
		assert_eq!(last.chebyshev(dest), 3);
	}
}
