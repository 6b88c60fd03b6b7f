//! Cell-resolution planning for one leg of a hierarchical journey. The
//! search is confined to a 1-cell-padded box around the current Region and
//! the next Region of the high-level path, so a leg never explores more of
//! the map than the two Regions it travels between
//!

use crate::prelude::*;
use bevy::log::warn;
use std::collections::{HashMap, HashSet};

/// The result of planning one leg
#[derive(Debug, Clone, PartialEq)]
pub struct LegPlan {
	/// Cells to travel through in order, excluding the leg's start cell
	pub waypoints: Vec<CellCoord>,
	/// How the search concluded
	pub outcome: PathOutcome,
	/// Whether the leg ended inside the next Region, telling the caller to
	/// advance its step index into the high-level path
	pub reached_next: bool,
}

/// Plan from `start` through `current` towards `next`, or to the literal
/// destination when `next` is `None` because this is the final leg
#[allow(clippy::too_many_arguments)]
pub fn plan_leg(
	grid: &TerrainGrid,
	arena: &RegionArena,
	current: RegionId,
	next: Option<RegionId>,
	start: CellCoord,
	dest: CellCoord,
	range: i32,
	capability: Passability,
	stats: &mut SearchStats,
) -> LegPlan {
	let Some(current_region) = arena.get(current) else {
		return failed();
	};
	let (mut min, mut max) = current_region.get_bounds();
	if let Some(next_region) = next.and_then(|id| arena.get(id)) {
		let (next_min, next_max) = next_region.get_bounds();
		min = CellCoord::new(
			min.get_column().min(next_min.get_column()),
			min.get_row().min(next_min.get_row()),
		);
		max = CellCoord::new(
			max.get_column().max(next_max.get_column()),
			max.get_row().max(next_max.get_row()),
		);
	}
	// pad by one so the search may step across the sector boundary, and make
	// sure the leg's own start sits inside the window
	min = CellCoord::new(
		min.get_column().min(start.get_column()) - 1,
		min.get_row().min(start.get_row()) - 1,
	);
	max = CellCoord::new(
		max.get_column().max(start.get_column()) + 1,
		max.get_row().max(start.get_row()) + 1,
	);

	let mut open: OpenSet<CellCoord> = OpenSet::new();
	let mut g: HashMap<CellCoord, f32> = HashMap::new();
	let mut parents: HashMap<CellCoord, u8> = HashMap::new();
	let mut closed: HashSet<CellCoord> = HashSet::new();
	let start_h = line_deviation(start, start, dest, LOW_CROSS_DIVIDER, LOW_DIST_MULTIPLIER);
	g.insert(start, 0.0);
	open.push(start, start_h);
	let mut best = start;
	let mut best_score = start_h;
	let mut expanded = 0usize;

	while let Some((node, _f)) = open.pop() {
		if !closed.insert(node) {
			continue;
		}
		stats.nodes_closed += 1;
		if let Some(next_id) = next {
			if grid.get_region(node) == Some(next_id) {
				return LegPlan {
					waypoints: trace_waypoints(&parents, start, node),
					outcome: PathOutcome::FullPath,
					reached_next: true,
				};
			}
		} else if node == dest || (range > 0 && node.chebyshev(dest) <= range) {
			return LegPlan {
				waypoints: trace_waypoints(&parents, start, node),
				outcome: PathOutcome::FullPath,
				reached_next: false,
			};
		}
		expanded += 1;
		if expanded > LOW_MAX_NODES {
			warn!(
				"Leg search from {:?} hit the expansion ceiling inside region {:?}",
				start, current
			);
			return LegPlan {
				waypoints: trace_waypoints(&parents, start, best),
				outcome: PathOutcome::AbortedPath,
				reached_next: false,
			};
		}
		let node_g = *g.get(&node).unwrap_or(&0.0);
		for (i, delta) in DIRECTIONS.iter().enumerate() {
			let cell = node.offset(*delta);
			if cell.get_column() < min.get_column()
				|| cell.get_column() > max.get_column()
				|| cell.get_row() < min.get_row()
				|| cell.get_row() > max.get_row()
				|| !grid.is_valid_cell(cell)
				|| grid.get_passability(cell) != capability
				|| closed.contains(&cell)
			{
				continue;
			}
			// expansion stays on the leg's two Regions, which also guarantees
			// the cells are unoccupied
			let in_leg = match grid.get_region(cell) {
				Some(region) => region == current || Some(region) == next,
				None => false,
			};
			if !in_leg {
				continue;
			}
			let tentative = node_g + LOW_BASE_COST + grid.get_cost(cell);
			if g.get(&cell).is_none_or(|&existing| tentative < existing) {
				g.insert(cell, tentative);
				parents.insert(cell, i as u8);
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
	// exhausted: a ranged request has provably nothing to reach, a range-zero
	// request settles for the closest approach found
	if range == 0 && best != start {
		return LegPlan {
			waypoints: trace_waypoints(&parents, start, best),
			outcome: PathOutcome::AlternatePath,
			reached_next: false,
		};
	}
	failed()
}

/// An empty, failed leg
fn failed() -> LegPlan {
	LegPlan {
		waypoints: Vec::new(),
		outcome: PathOutcome::NoPath,
		reached_next: false,
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	/// Build a two-sector map and its Region graph
	fn build(mutate: impl Fn(&mut TerrainGrid)) -> (TerrainGrid, SectorGrid, RegionArena, RegionGroups) {
		let mut grid = TerrainGrid::new(20, 10);
		mutate(&mut grid);
		let mut sectors = SectorGrid::new(20, 10);
		let mut arena = RegionArena::new();
		let mut groups = RegionGroups::new();
		for sector_id in sectors.get_all_sector_ids() {
			rebuild_sector(sector_id, &mut grid, &mut sectors, &mut arena, &mut groups);
		}
		let all = sectors.get_all_sector_ids();
		rebuild_neighbours_in_area(&grid, &sectors, &mut arena, &all);
		let ids = arena.get_live_ids();
		rebuild_costs(&mut arena, &ids);
		rebuild_groups(&mut arena, &mut groups);
		(grid, sectors, arena, groups)
	}
	#[test]
	fn leg_crosses_into_next_region() {
		let (grid, _sectors, arena, _groups) = build(|_| {});
		let start = CellCoord::new(2, 5);
		let dest = CellCoord::new(18, 5);
		let current = grid.get_region(start).unwrap();
		let next = grid.get_region(dest).unwrap();
		assert_ne!(current, next);
		let mut stats = SearchStats::default();
		let leg = plan_leg(
			&grid,
			&arena,
			current,
			Some(next),
			start,
			dest,
			0,
			Passability::Land,
			&mut stats,
		);
		assert_eq!(leg.outcome, PathOutcome::FullPath);
		assert!(leg.reached_next);
		let last = *leg.waypoints.last().unwrap();
		assert_eq!(grid.get_region(last), Some(next));
		// the first cell of the next sector is column 10, no overshoot
		assert_eq!(last.get_column(), 10);
	}
	#[test]
	fn final_leg_reaches_destination() {
		let (grid, _sectors, arena, _groups) = build(|_| {});
		let dest = CellCoord::new(8, 3);
		let current = grid.get_region(dest).unwrap();
		let mut stats = SearchStats::default();
		let leg = plan_leg(
			&grid,
			&arena,
			current,
			None,
			CellCoord::new(1, 8),
			dest,
			0,
			Passability::Land,
			&mut stats,
		);
		assert_eq!(leg.outcome, PathOutcome::FullPath);
		assert!(!leg.reached_next);
		assert_eq!(*leg.waypoints.last().unwrap(), dest);
	}
	#[test]
	fn final_leg_respects_range() {
		let (grid, _sectors, arena, _groups) = build(|_| {});
		let dest = CellCoord::new(8, 3);
		let current = grid.get_region(dest).unwrap();
		let mut stats = SearchStats::default();
		let leg = plan_leg(
			&grid,
			&arena,
			current,
			None,
			CellCoord::new(1, 8),
			dest,
			2,
			Passability::Land,
			&mut stats,
		);
		assert_eq!(leg.outcome, PathOutcome::FullPath);
		let last = *leg.waypoints.last().unwrap();
		assert!(last.chebyshev(dest) <= 2);
	}
	#[test]
	fn occupied_destination_settles_for_closest() {
		let (mut grid, mut sectors, mut arena, mut groups) = build(|_| {});
		let dest = CellCoord::new(8, 3);
		grid.set_occupied(dest, true, false);
		rebuild_sector(
			SectorId::new(0, 0),
			&mut grid,
			&mut sectors,
			&mut arena,
			&mut groups,
		);
		rebuild_groups(&mut arena, &mut groups);
		let start = CellCoord::new(1, 8);
		let current = grid.get_region(start).unwrap();
		let mut stats = SearchStats::default();
		let leg = plan_leg(
			&grid,
			&arena,
			current,
			None,
			start,
			dest,
			0,
			Passability::Land,
			&mut stats,
		);
		assert_eq!(leg.outcome, PathOutcome::AlternatePath);
		let last = *leg.waypoints.last().unwrap();
		assert_ne!(last, dest);
		assert_eq!(last.chebyshev(dest), 1);
	}
	/// A naval leg stays on its water region, the land either side is never
	/// expanded
	#[test]
	fn water_leg_stays_on_water() {
		let (grid, _sectors, arena, _groups) = build(|grid| {
			for row in 0..10 {
				for column in 4..8 {
					grid.set_passability(CellCoord::new(column, row), Passability::Water);
				}
			}
		});
		let start = CellCoord::new(5, 1);
		let dest = CellCoord::new(6, 8);
		let current = grid.get_region(start).unwrap();
		let mut stats = SearchStats::default();
		let leg = plan_leg(
			&grid,
			&arena,
			current,
			None,
			start,
			dest,
			0,
			Passability::Water,
			&mut stats,
		);
		assert_eq!(leg.outcome, PathOutcome::FullPath);
		for waypoint in &leg.waypoints {
			assert_eq!(grid.get_passability(*waypoint), Passability::Water);
		}
	}
	#[test]
	fn ranged_leg_with_nothing_reachable_fails() {
		// wall the east half off from the west
		let (grid, _sectors, arena, _groups) = build(|grid| {
			for row in 0..10 {
				grid.set_passability(CellCoord::new(10, row), Passability::NotPassable);
			}
		});
		let start = CellCoord::new(2, 5);
		let dest = CellCoord::new(18, 5);
		let current = grid.get_region(start).unwrap();
		let mut stats = SearchStats::default();
		let leg = plan_leg(
			&grid,
			&arena,
			current,
			None,
			start,
			dest,
			1,
			Passability::Land,
			&mut stats,
		);
		assert_eq!(leg.outcome, PathOutcome::NoPath);
		assert!(leg.waypoints.is_empty());
	}
}
