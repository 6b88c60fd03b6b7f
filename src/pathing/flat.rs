//! Single-resolution planner used for short moves and as the fallback
//! strategy: a straight-line fast pass, a ring-scan reachability pre-check
//! and a full 8-connected A* over raw cells with fog and occupancy penalties
//!

use crate::prelude::*;
use bevy::log::warn;
use std::collections::{HashMap, HashSet};

/// Plan from `start` towards `dest`, stopping within `range` cells of it
/// (`range == 0` demands the literal destination). The grid is searched at
/// full resolution so this is only suitable for journeys up to around
/// [FLAT_PLANNER_RANGE] cells
pub fn plan_flat(
	grid: &TerrainGrid,
	start: CellCoord,
	dest: CellCoord,
	range: i32,
	capability: Passability,
	stats: &mut SearchStats,
) -> PlannedPath {
	if start == dest || (range > 0 && start.chebyshev(dest) <= range) {
		return PlannedPath {
			waypoints: Vec::new(),
			outcome: PathOutcome::FullPath,
		};
	}
	if let Some(path) = fast_straight_path(grid, start, dest, range, capability) {
		return path;
	}
	// reachability gates: a destination whose surroundings are blocked out to
	// the scan horizon is not worth searching for
	if range > 0 {
		let reachable = (0..=range).any(|r| ring_has_standable(grid, dest, r, capability));
		if !reachable {
			return PlannedPath {
				waypoints: Vec::new(),
				outcome: PathOutcome::NoPath,
			};
		}
	} else if closest_standable_radius(grid, dest, capability, RANGE_STEPS).is_none() {
		return PlannedPath {
			waypoints: Vec::new(),
			outcome: PathOutcome::NoPath,
		};
	}
	// a range 0 request aiming at a cell that cannot be stood on, or that has
	// no free approach, is redirected to the closest usable cell instead
	let enclosed = !DIRECTIONS
		.iter()
		.any(|d| grid.is_free(dest.offset(*d), capability));
	let alternate = range == 0 && (!grid.is_free(dest, capability) || enclosed);
	let alternate_radius = if alternate {
		let mut radius = 0;
		for r in 1..=RANGE_STEPS {
			if ring_has_standable(grid, dest, r, capability) {
				radius = r;
				break;
			}
		}
		if radius == 0 {
			return PlannedPath {
				waypoints: Vec::new(),
				outcome: PathOutcome::NoPath,
			};
		}
		radius
	} else {
		0
	};

	let mut open: OpenSet<CellCoord> = OpenSet::new();
	let mut g: HashMap<CellCoord, f32> = HashMap::new();
	let mut parents: HashMap<CellCoord, u8> = HashMap::new();
	let mut depth: HashMap<CellCoord, u32> = HashMap::new();
	let mut closed: HashSet<CellCoord> = HashSet::new();
	let start_h = line_deviation(start, start, dest, FLAT_CROSS_DIVIDER, FLAT_DIST_MULTIPLIER);
	g.insert(start, 0.0);
	depth.insert(start, 0);
	open.push(start, start_h);
	let mut best = start;
	let mut best_score = start_h;
	let mut expanded = 0usize;

	while let Some((node, _f)) = open.pop() {
		if !closed.insert(node) {
			continue;
		}
		stats.nodes_closed += 1;
		let reached = if range > 0 {
			node.chebyshev(dest) <= range && grid.is_standable(node, capability)
		} else if alternate {
			node != dest
				&& node.chebyshev(dest) <= alternate_radius
				&& grid.is_standable(node, capability)
		} else {
			node == dest
		};
		if reached {
			let outcome = if alternate {
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
		if node_depth >= FLAT_STEP_HORIZON {
			return PlannedPath {
				waypoints: trace_waypoints(&parents, start, node),
				outcome: PathOutcome::PartialPath,
			};
		}
		expanded += 1;
		if expanded > FLAT_ABORT_CEILING {
			warn!(
				"Flat search from {:?} to {:?} hit the expansion ceiling, the map is expensive to plan over",
				start, dest
			);
			return PlannedPath {
				waypoints: trace_waypoints(&parents, start, best),
				outcome: PathOutcome::AbortedPath,
			};
		}
		let node_g = *g.get(&node).unwrap_or(&0.0);
		for (i, delta) in DIRECTIONS.iter().enumerate() {
			let next = node.offset(*delta);
			if !grid.is_valid_cell(next)
				|| grid.get_passability(next) != capability
				|| closed.contains(&next)
			{
				continue;
			}
			let mut step = grid.get_cost(next);
			if grid.is_fogged(next) {
				step += FOG_COST;
			}
			let (occupied, moving) = grid.get_occupancy(next);
			if occupied {
				step += if moving {
					MOVING_OCCUPANT_COST
				} else {
					STATIONARY_OCCUPANT_COST
				};
			}
			let tentative = node_g + step;
			if g.get(&next).is_none_or(|&current| tentative < current) {
				g.insert(next, tentative);
				parents.insert(next, i as u8);
				depth.insert(next, node_depth + 1);
				let h = line_deviation(next, start, dest, FLAT_CROSS_DIVIDER, FLAT_DIST_MULTIPLIER);
				open.push(next, tentative + h);
				stats.nodes_opened += 1;
				let score = h + tentative * NEAREST_G_FACTOR;
				if score < best_score {
					best_score = score;
					best = next;
				}
			}
		}
	}
	PlannedPath {
		waypoints: Vec::new(),
		outcome: PathOutcome::NoPath,
	}
}

/// Walk up to [FLAT_STEP_HORIZON] steps along the direct vector to the
/// destination, snapping to 8-connected directions (ties advance both axes,
/// i.e. diagonally). Returns `None` as soon as a stepped-to cell is off-grid,
/// the wrong terrain, fogged, occupied or costlier than [FAST_PATH_MAX_COST],
/// which tells the caller to fall back to the full search
fn fast_straight_path(
	grid: &TerrainGrid,
	start: CellCoord,
	dest: CellCoord,
	range: i32,
	capability: Passability,
) -> Option<PlannedPath> {
	let mut waypoints = Vec::new();
	let mut current = start;
	for _ in 0..FLAT_STEP_HORIZON {
		let dx = (dest.get_column() - current.get_column()).signum();
		let dy = (dest.get_row() - current.get_row()).signum();
		let next = current.offset((dx, dy));
		if !grid.is_valid_cell(next)
			|| grid.get_passability(next) != capability
			|| grid.is_fogged(next)
			|| grid.get_occupancy(next).0
			|| grid.get_cost(next) > FAST_PATH_MAX_COST
		{
			return None;
		}
		waypoints.push(next);
		current = next;
		if current == dest || (range > 0 && current.chebyshev(dest) <= range) {
			return Some(PlannedPath {
				waypoints,
				outcome: PathOutcome::FullPath,
			});
		}
	}
	Some(PlannedPath {
		waypoints,
		outcome: PathOutcome::PartialPath,
	})
}

/// Whether the ring of cells at Chebyshev radius `radius` around `center`
/// holds at least one cell an agent could come to rest on
pub fn ring_has_standable(
	grid: &TerrainGrid,
	center: CellCoord,
	radius: i32,
	capability: Passability,
) -> bool {
	if radius == 0 {
		return grid.is_standable(center, capability);
	}
	for dx in -radius..=radius {
		for dy in [-radius, radius] {
			if grid.is_standable(center.offset((dx, dy)), capability) {
				return true;
			}
		}
	}
	for dy in (-radius + 1)..radius {
		for dx in [-radius, radius] {
			if grid.is_standable(center.offset((dx, dy)), capability) {
				return true;
			}
		}
	}
	false
}

/// Smallest ring radius around `center` (zero included) holding a standable
/// cell, scanning out to `max_radius`. `None` means the destination is fully
/// enclosed and searching towards it is pointless
pub fn closest_standable_radius(
	grid: &TerrainGrid,
	center: CellCoord,
	capability: Passability,
	max_radius: i32,
) -> Option<i32> {
	(0..=max_radius).find(|&r| ring_has_standable(grid, center, r, capability))
}

/// Reconstruct the forward waypoint list (excluding `start`) by walking the
/// per-cell parent direction bytes back from `node` and reversing
pub fn trace_waypoints(
	parents: &HashMap<CellCoord, u8>,
	start: CellCoord,
	node: CellCoord,
) -> Vec<CellCoord> {
	let mut waypoints = Vec::new();
	let mut current = node;
	while current != start {
		waypoints.push(current);
		let Some(&dir) = parents.get(&current) else {
			break;
		};
		let delta = DIRECTIONS[dir as usize];
		current = current.offset((-delta.0, -delta.1));
	}
	waypoints.reverse();
	waypoints
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	/// A 20x20 open map with no obstacles, corner to corner, must produce a
	/// full diagonal path whose every waypoint closes on the goal
	#[test]
	fn open_map_corner_to_corner() {
		let grid = TerrainGrid::new(20, 20);
		let mut stats = SearchStats::default();
		let start = CellCoord::new(0, 0);
		let dest = CellCoord::new(19, 19);
		let path = plan_flat(&grid, start, dest, 0, Passability::Land, &mut stats);
		assert_eq!(path.outcome, PathOutcome::FullPath);
		assert!(path.waypoints.len() >= 19);
		assert_eq!(*path.waypoints.last().unwrap(), dest);
		let mut distance = start.chebyshev(dest);
		for waypoint in &path.waypoints {
			let next_distance = waypoint.chebyshev(dest);
			assert!(next_distance < distance);
			distance = next_distance;
		}
	}
	/// The full A* must agree with the fast pass on an open map
	#[test]
	fn full_search_matches_fast_pass() {
		let mut grid = TerrainGrid::new(20, 20);
		let mut stats = SearchStats::default();
		let start = CellCoord::new(0, 0);
		let dest = CellCoord::new(15, 15);
		let fast = plan_flat(&grid, start, dest, 0, Passability::Land, &mut stats);
		// fog a cell off the route so the fast pass is rejected and the full
		// search runs instead
		grid.set_fogged(CellCoord::new(1, 1), true);
		let full = plan_flat(&grid, start, dest, 0, Passability::Land, &mut stats);
		assert_eq!(fast.outcome, PathOutcome::FullPath);
		assert_eq!(full.outcome, PathOutcome::FullPath);
		assert_eq!(*full.waypoints.last().unwrap(), dest);
	}
	/// Routes around a wall with a single gap
	#[test]
	fn detours_around_wall() {
		let mut grid = TerrainGrid::new(20, 20);
		for row in 0..20 {
			if row != 17 {
				grid.set_passability(CellCoord::new(10, row), Passability::NotPassable);
			}
		}
		let mut stats = SearchStats::default();
		let path = plan_flat(
			&grid,
			CellCoord::new(2, 2),
			CellCoord::new(18, 2),
			0,
			Passability::Land,
			&mut stats,
		);
		assert_eq!(path.outcome, PathOutcome::FullPath);
		assert!(path.waypoints.contains(&CellCoord::new(10, 17)));
		assert_eq!(*path.waypoints.last().unwrap(), CellCoord::new(18, 2));
	}
	/// A destination whose whole 8-neighbourhood is occupied yields an
	/// alternate goal next to the blockage rather than the destination itself
	#[test]
	fn enclosed_destination_gets_alternate_goal() {
		let mut grid = TerrainGrid::new(20, 20);
		let dest = CellCoord::new(10, 10);
		for delta in DIRECTIONS {
			grid.set_occupied(dest.offset(delta), true, true);
		}
		let mut stats = SearchStats::default();
		let path = plan_flat(
			&grid,
			CellCoord::new(0, 0),
			dest,
			0,
			Passability::Land,
			&mut stats,
		);
		assert_eq!(path.outcome, PathOutcome::AlternatePath);
		let last = *path.waypoints.last().unwrap();
		assert_ne!(last, dest);
		assert_eq!(last.chebyshev(dest), 1);
	}
	/// A destination walled off beyond the scan horizon is rejected before
	/// any search runs
	#[test]
	fn walled_off_destination_is_no_path() {
		let mut grid = TerrainGrid::new(20, 20);
		let dest = CellCoord::new(10, 10);
		// an impassable 5x5 block centred on the destination
		for dx in -2..=2 {
			for dy in -2..=2 {
				grid.set_passability(dest.offset((dx, dy)), Passability::NotPassable);
			}
		}
		let mut stats = SearchStats::default();
		let path = plan_flat(
			&grid,
			CellCoord::new(0, 0),
			dest,
			1,
			Passability::Land,
			&mut stats,
		);
		assert_eq!(path.outcome, PathOutcome::NoPath);
		assert!(path.waypoints.is_empty());
	}
	/// Within range already means an immediately complete, empty path
	#[test]
	fn already_in_range() {
		let grid = TerrainGrid::new(20, 20);
		let mut stats = SearchStats::default();
		let path = plan_flat(
			&grid,
			CellCoord::new(5, 5),
			CellCoord::new(7, 7),
			3,
			Passability::Land,
			&mut stats,
		);
		assert_eq!(path.outcome, PathOutcome::FullPath);
		assert!(path.waypoints.is_empty());
	}
	/// Occupied cells cost more to cross so an open detour is preferred. The
	/// deviation-weighted heuristic can still clip the odd occupied cell near
	/// the endpoints, so the bar is qualitative: the bulk of the lane must be
	/// skirted and the detour must stay near the straight-line length
	#[test]
	fn avoids_occupied_lane() {
		let mut grid = TerrainGrid::new(20, 20);
		for column in 1..19 {
			grid.set_occupied(CellCoord::new(column, 5), true, false);
		}
		let mut stats = SearchStats::default();
		let path = plan_flat(
			&grid,
			CellCoord::new(0, 5),
			CellCoord::new(19, 5),
			0,
			Passability::Land,
			&mut stats,
		);
		assert_eq!(path.outcome, PathOutcome::FullPath);
		let crossings = path
			.waypoints
			.iter()
			.filter(|w| grid.get_occupancy(**w).0)
			.count();
		assert!(crossings <= 2, "{crossings} of 18 occupied cells crossed");
		assert!(path.waypoints.iter().any(|w| w.get_row() != 5));
		assert!(path.waypoints.len() <= 25);
	}
	#[test]
	fn ring_scan_radii() {
		let mut grid = TerrainGrid::new(20, 20);
		let center = CellCoord::new(10, 10);
		grid.set_occupied(center, true, false);
		for delta in DIRECTIONS {
			grid.set_occupied(center.offset(delta), true, false);
		}
		assert_eq!(
			closest_standable_radius(&grid, center, Passability::Land, RANGE_STEPS),
			Some(2)
		);
	}
}
