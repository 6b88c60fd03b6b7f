//! The [PathEngine] owns every pathfinding structure for one map: the
//! terrain grid, the Sector/Region partition, the neighbour graph and
//! groups, the high-level path cache, the in-flight requests and the search
//! counters. Constructed once at map load, it replaces any notion of global
//! planner state. Agents hold a [PathRequestHandle] and pull waypoints one
//! leg at a time until the continuation tells them to stop
//!

use crate::prelude::*;
use bevy::prelude::*;

/// One in-flight journey owned by the engine
#[derive(Debug, Clone)]
struct PathRequest {
	/// Origin of the next leg, advanced as waypoints are handed out
	start: CellCoord,
	/// Final destination of the journey
	dest: CellCoord,
	/// Acceptance range around the destination, zero demands the exact cell
	range: i32,
	/// Terrain the agent can traverse
	capability: Passability,
	/// The planner serving the request, chosen once at creation
	strategy: Strategy,
	/// Hold on the cached high-level path, hierarchical strategy only
	high_path: Option<HighLevelPathId>,
	/// Index of the current Region within the high-level path
	step_index: usize,
}

/// One leg of a journey handed back from [PathEngine::step_path]
#[derive(Debug, Clone, PartialEq)]
pub struct PathStep {
	/// Cells to travel through in order
	pub waypoints: Vec<CellCoord>,
	/// What to do once the waypoints are consumed
	pub continuation: Continuation,
	/// How the underlying search concluded
	pub outcome: PathOutcome,
}

/// A failed, empty step
fn failed_step() -> PathStep {
	PathStep {
		waypoints: Vec::new(),
		continuation: Continuation::Failed,
		outcome: PathOutcome::NoPath,
	}
}

/// The pathfinding context of one map
#[derive(Component)]
pub struct PathEngine {
	/// Per-cell terrain state
	grid: TerrainGrid,
	/// The Sector partition of the map
	sectors: SectorGrid,
	/// Arena of every live Region
	regions: RegionArena,
	/// Arena of every live RegionGroup
	groups: RegionGroups,
	/// Cached high-level paths shared between requests
	cache: PathCache,
	/// Debug colouring of the Regions
	colors: RegionColorMap,
	/// Active requests, `None` marks a free slot
	requests: Vec<Option<PathRequest>>,
	/// Indices of free request slots available for reuse
	free_requests: Vec<usize>,
	/// Search counters
	stats: SearchStats,
}

impl PathEngine {
	/// Create a new instance of [PathEngine] for an open-land map of
	/// `map_columns` by `map_rows` cells. The dimensions must be exact
	/// factors of [SECTOR_RESOLUTION]
	pub fn new(map_columns: i32, map_rows: i32) -> Self {
		let mut engine = PathEngine {
			grid: TerrainGrid::new(map_columns, map_rows),
			sectors: SectorGrid::new(map_columns, map_rows),
			regions: RegionArena::new(),
			groups: RegionGroups::new(),
			cache: PathCache::new(),
			colors: RegionColorMap::new(),
			requests: Vec::new(),
			free_requests: Vec::new(),
			stats: SearchStats::default(),
		};
		engine.rebuild_all();
		engine
	}
	/// Rebuild every Sector, edge, cost, group and colour from the grid.
	/// Used at construction and after bulk terrain edits at map load, cached
	/// paths and in-flight requests are not expected to exist yet
	pub fn rebuild_all(&mut self) {
		for sector_id in self.sectors.get_all_sector_ids() {
			rebuild_sector(
				sector_id,
				&mut self.grid,
				&mut self.sectors,
				&mut self.regions,
				&mut self.groups,
			);
		}
		let all = self.sectors.get_all_sector_ids();
		rebuild_neighbours_in_area(&self.grid, &self.sectors, &mut self.regions, &all);
		let ids = self.regions.get_live_ids();
		rebuild_costs(&mut self.regions, &ids);
		rebuild_groups(&mut self.regions, &mut self.groups);
		self.colors.recolor(&self.regions);
	}
	/// Get the terrain grid
	pub fn get_grid(&self) -> &TerrainGrid {
		&self.grid
	}
	/// Get the terrain grid mutably. Occupancy edits must be followed by
	/// [PathEngine::notify_occupancy_changed] over the touched rectangle
	pub fn get_grid_mut(&mut self) -> &mut TerrainGrid {
		&mut self.grid
	}
	/// Get the Sector partition
	pub fn get_sectors(&self) -> &SectorGrid {
		&self.sectors
	}
	/// Get the Region arena
	pub fn get_regions(&self) -> &RegionArena {
		&self.regions
	}
	/// Get the RegionGroups
	pub fn get_groups(&self) -> &RegionGroups {
		&self.groups
	}
	/// Get the high-level path cache
	pub fn get_cache(&self) -> &PathCache {
		&self.cache
	}
	/// Get the debug colouring of the Regions
	pub fn get_colors(&self) -> &RegionColorMap {
		&self.colors
	}
	/// Get the accumulated search counters
	pub fn get_stats(&self) -> &SearchStats {
		&self.stats
	}
	/// Number of active requests
	pub fn active_requests(&self) -> usize {
		self.requests.len() - self.free_requests.len()
	}
	/// Register a journey from `start` to `dest`, stopping within `range`
	/// cells of it. Flying agents ignore `capability`. Fails fast on
	/// malformed input, reachability is only judged when stepping
	pub fn request_path(
		&mut self,
		start: CellCoord,
		dest: CellCoord,
		range: i32,
		capability: Passability,
		flying: bool,
	) -> Result<PathRequestHandle, PathError> {
		for cell in [start, dest] {
			if !self.grid.is_valid_cell(cell) {
				return Err(PathError::InvalidCoordinate(
					cell.get_column(),
					cell.get_row(),
				));
			}
		}
		if range < 0 {
			return Err(PathError::InvalidRange(range));
		}
		if !flying && capability == Passability::NotPassable {
			return Err(PathError::InvalidCapability);
		}
		let strategy = if flying {
			Strategy::Flying
		} else if start.chebyshev(dest) <= FLAT_PLANNER_RANGE {
			Strategy::Flat
		} else {
			Strategy::Hierarchical
		};
		trace!(
			"Path request {:?} -> {:?} range {} served by {:?}",
			start,
			dest,
			range,
			strategy
		);
		let request = PathRequest {
			start,
			dest,
			range,
			capability,
			strategy,
			high_path: None,
			step_index: 0,
		};
		let index = if let Some(free) = self.free_requests.pop() {
			self.requests[free] = Some(request);
			free
		} else {
			self.requests.push(Some(request));
			self.requests.len() - 1
		};
		Ok(PathRequestHandle::new(index))
	}
	/// Plan the next leg of a journey. Re-invoke whenever the continuation
	/// says [Continuation::NextLeg] and the previous waypoints are consumed
	pub fn step_path(&mut self, handle: PathRequestHandle) -> Result<PathStep, PathError> {
		let index = handle.get();
		// taken out of the slot for the duration of the planning call
		let mut request = self
			.requests
			.get_mut(index)
			.and_then(|slot| slot.take())
			.ok_or(PathError::UnknownHandle(handle))?;
		let step = match request.strategy {
			Strategy::Flat => self.step_flat(&mut request),
			Strategy::Flying => self.step_flying(&mut request),
			Strategy::Hierarchical => self.step_hierarchical(&mut request),
		};
		self.requests[index] = Some(request);
		Ok(step)
	}
	/// Give up the hold on a journey. Must be called exactly once per
	/// request regardless of how the journey went
	pub fn release_path(&mut self, handle: PathRequestHandle) -> Result<(), PathError> {
		let index = handle.get();
		let request = self
			.requests
			.get_mut(index)
			.and_then(|slot| slot.take())
			.ok_or(PathError::UnknownHandle(handle))?;
		if let Some(id) = request.high_path {
			self.cache.release(id);
		}
		self.free_requests.push(index);
		Ok(())
	}
	/// Fold an occupancy change over the inclusive cell rectangle into the
	/// Region structures, eagerly, so later searches in the tick see a
	/// consistent graph
	pub fn notify_occupancy_changed(&mut self, min: CellCoord, max: CellCoord) {
		on_occupancy_changed(
			&mut self.grid,
			&mut self.sectors,
			&mut self.regions,
			&mut self.groups,
			&mut self.cache,
			&mut self.colors,
			min,
			max,
		);
	}
	/// Overwrite the occupancy of one cell and fold the change in
	pub fn set_cell_occupied(&mut self, cell: CellCoord, occupied: bool, moving: bool) {
		self.grid.set_occupied(cell, occupied, moving);
		self.notify_occupancy_changed(cell, cell);
	}
	/// Human-readable dump of a cell and the Region structures above it
	pub fn debug_text(&self, cell: CellCoord) -> String {
		if !self.grid.is_valid_cell(cell) {
			return format!("Cell {:?}: outside the grid", cell);
		}
		let (occupied, moving) = self.grid.get_occupancy(cell);
		let mut text = format!(
			"Cell {:?}: passability {:?}, cost {}, air cost {}, fogged {}, occupied {} (moving {})\n",
			cell,
			self.grid.get_passability(cell),
			self.grid.get_cost(cell),
			self.grid.get_air_cost(cell),
			self.grid.is_fogged(cell),
			occupied,
			moving
		);
		let sector_id = self.sectors.get_sector_id_of_cell(cell);
		text.push_str(&format!(
			"Sector {:?} holding {} region(s)\n",
			sector_id,
			self.sectors.get_sector(sector_id).get_regions().len()
		));
		match self.grid.get_region(cell) {
			Some(region_id) => {
				if let Some(region) = self.regions.get(region_id) {
					text.push_str(&format!(
						"Region {:?}: {:?}, {} cell(s), cost {:.2}, centroid {:?}, group {:?}, {} neighbour(s), color {:?}\n",
						region_id,
						region.get_passability(),
						region.get_cell_count(),
						region.get_cost(),
						region.get_centroid(),
						region.get_group(),
						region.get_neighbours().len(),
						self.colors.get_color(region_id)
					));
				}
			}
			None => text.push_str("No region\n"),
		}
		text
	}
	/// One step of a flat journey
	fn step_flat(&mut self, request: &mut PathRequest) -> PathStep {
		let plan = plan_flat(
			&self.grid,
			request.start,
			request.dest,
			request.range,
			request.capability,
			&mut self.stats,
		);
		Self::step_from_planned(request, plan)
	}
	/// One step of an airborne journey
	fn step_flying(&mut self, request: &mut PathRequest) -> PathStep {
		let plan = plan_flying(
			&self.grid,
			request.start,
			request.dest,
			request.range,
			&mut self.stats,
		);
		Self::step_from_planned(request, plan)
	}
	/// Translate a planner result into a step, advancing the request's
	/// position when the journey continues
	fn step_from_planned(request: &mut PathRequest, plan: PlannedPath) -> PathStep {
		let continuation = match plan.outcome {
			PathOutcome::FullPath | PathOutcome::AlternatePath => Continuation::EndOfPath,
			PathOutcome::PartialPath | PathOutcome::AbortedPath => {
				if let Some(last) = plan.waypoints.last() {
					request.start = *last;
					Continuation::NextLeg
				} else {
					Continuation::Failed
				}
			}
			PathOutcome::NoPath => Continuation::Failed,
		};
		PathStep {
			waypoints: plan.waypoints,
			continuation,
			outcome: plan.outcome,
		}
	}
	/// One step of a hierarchical journey: make sure a valid high-level path
	/// is held (cache first, Region graph search second), then plan the leg
	/// from the current Region towards the next
	fn step_hierarchical(&mut self, request: &mut PathRequest) -> PathStep {
		let stale = match request.high_path {
			Some(id) => !self.cache.get(id).is_some_and(|path| path.is_valid()),
			None => true,
		};
		if stale {
			if let Some(id) = request.high_path.take() {
				self.cache.release(id);
			}
			request.step_index = 0;
			let Some(start_region) = find_start_region(
				&self.grid,
				&self.regions,
				request.start,
				request.capability,
			) else {
				return failed_step();
			};
			let goal_regions = find_goal_regions(
				&self.grid,
				&self.regions,
				request.dest,
				request.range,
				request.capability,
			);
			let start_group = match self.regions.get(start_region) {
				Some(region) => region.get_group(),
				None => return failed_step(),
			};
			let destinations: Vec<RegionId> = goal_regions
				.iter()
				.copied()
				.filter(|id| {
					self.regions
						.get(*id)
						.is_some_and(|region| region.get_group() == start_group)
				})
				.collect();
			// regions exist around the goal but none shares a group with the
			// start: provably disconnected, refuse without searching. A
			// ranged request with no goal regions at all is equally hopeless
			if destinations.is_empty() && (!goal_regions.is_empty() || request.range > 0) {
				return failed_step();
			}
			if let Some(id) = self.cache.find_and_retain(start_region, &destinations) {
				self.stats.cache_hits += 1;
				request.high_path = Some(id);
			} else {
				self.stats.cache_misses += 1;
				// a range-zero goal settles for the region scoring closest when
				// the search cannot reach a goal region (an occupied destination
				// cell, say, belongs to no region at all)
				let allow_nearest = request.range == 0;
				match plan_high_level(
					&self.regions,
					start_region,
					&destinations,
					request.start,
					request.dest,
					request.capability,
					allow_nearest,
					&mut self.stats,
				) {
					Some(region_path) => {
						request.high_path = Some(self.cache.insert(region_path));
					}
					None => return failed_step(),
				}
			}
		}
		let Some(id) = request.high_path else {
			return failed_step();
		};
		let (current, next) = match self.cache.get(id) {
			Some(path) => {
				let region_path = path.get_regions();
				if region_path.is_empty() {
					return failed_step();
				}
				let i = request.step_index.min(region_path.len() - 1);
				(region_path[i], region_path.get(i + 1).copied())
			}
			None => return failed_step(),
		};
		let leg = plan_leg(
			&self.grid,
			&self.regions,
			current,
			next,
			request.start,
			request.dest,
			request.range,
			request.capability,
			&mut self.stats,
		);
		let continuation = match leg.outcome {
			PathOutcome::NoPath => Continuation::Failed,
			PathOutcome::FullPath | PathOutcome::AlternatePath if !leg.reached_next => {
				Continuation::EndOfPath
			}
			_ => {
				if leg.reached_next {
					request.step_index += 1;
				}
				if let Some(last) = leg.waypoints.last() {
					request.start = *last;
					Continuation::NextLeg
				} else {
					Continuation::Failed
				}
			}
		};
		PathStep {
			waypoints: leg.waypoints,
			continuation,
			outcome: leg.outcome,
		}
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	#[test]
	fn new_engine_partitions_the_map() {
		let engine = PathEngine::new(30, 30);
		assert_eq!(engine.get_regions().len(), 9);
		assert_eq!(engine.get_groups().len(), 1);
		assert_eq!(engine.get_colors().len(), 9);
		assert_eq!(engine.active_requests(), 0);
	}
	#[test]
	fn malformed_requests_fail_fast() {
		let mut engine = PathEngine::new(30, 30);
		assert_eq!(
			engine.request_path(
				CellCoord::new(-1, 0),
				CellCoord::new(5, 5),
				0,
				Passability::Land,
				false
			),
			Err(PathError::InvalidCoordinate(-1, 0))
		);
		assert_eq!(
			engine.request_path(
				CellCoord::new(0, 0),
				CellCoord::new(5, 30),
				0,
				Passability::Land,
				false
			),
			Err(PathError::InvalidCoordinate(5, 30))
		);
		assert_eq!(
			engine.request_path(
				CellCoord::new(0, 0),
				CellCoord::new(5, 5),
				-2,
				Passability::Land,
				false
			),
			Err(PathError::InvalidRange(-2))
		);
		assert_eq!(
			engine.request_path(
				CellCoord::new(0, 0),
				CellCoord::new(5, 5),
				0,
				Passability::NotPassable,
				false
			),
			Err(PathError::InvalidCapability)
		);
	}
	#[test]
	fn unknown_handles_are_rejected() {
		let mut engine = PathEngine::new(30, 30);
		let handle = engine
			.request_path(
				CellCoord::new(0, 0),
				CellCoord::new(5, 5),
				0,
				Passability::Land,
				false,
			)
			.unwrap();
		engine.release_path(handle).unwrap();
		assert_eq!(
			engine.step_path(handle),
			Err(PathError::UnknownHandle(handle))
		);
		assert_eq!(
			engine.release_path(handle),
			Err(PathError::UnknownHandle(handle))
		);
	}
	#[test]
	fn short_journeys_use_the_flat_planner() {
		let mut engine = PathEngine::new(30, 30);
		let start = CellCoord::new(0, 0);
		let dest = CellCoord::new(19, 19);
		let handle = engine
			.request_path(start, dest, 0, Passability::Land, false)
			.unwrap();
		let step = engine.step_path(handle).unwrap();
		assert_eq!(step.outcome, PathOutcome::FullPath);
		assert_eq!(step.continuation, Continuation::EndOfPath);
		assert!(step.waypoints.len() >= 19);
		assert_eq!(*step.waypoints.last().unwrap(), dest);
		engine.release_path(handle).unwrap();
	}
	#[test]
	fn long_journeys_cross_regions_leg_by_leg() {
		let mut engine = PathEngine::new(60, 60);
		let start = CellCoord::new(1, 1);
		let dest = CellCoord::new(58, 58);
		let handle = engine
			.request_path(start, dest, 0, Passability::Land, false)
			.unwrap();
		let mut position = start;
		let mut legs = 0;
		loop {
			let step = engine.step_path(handle).unwrap();
			assert_ne!(step.continuation, Continuation::Failed);
			if let Some(last) = step.waypoints.last() {
				position = *last;
			}
			if step.continuation == Continuation::EndOfPath {
				break;
			}
			legs += 1;
			assert!(legs < 60, "journey must terminate");
		}
		assert_eq!(position, dest);
		assert!(legs > 0, "a 57-cell journey cannot be a single leg");
		engine.release_path(handle).unwrap();
	}
	#[test]
	fn disconnected_destination_fails_without_searching() {
		let mut engine = PathEngine::new(60, 60);
		for row in 0..60 {
			engine
				.get_grid_mut()
				.set_passability(CellCoord::new(30, row), Passability::NotPassable);
		}
		engine.rebuild_all();
		let handle = engine
			.request_path(
				CellCoord::new(1, 1),
				CellCoord::new(58, 58),
				0,
				Passability::Land,
				false,
			)
			.unwrap();
		let step = engine.step_path(handle).unwrap();
		assert_eq!(step.outcome, PathOutcome::NoPath);
		assert_eq!(step.continuation, Continuation::Failed);
		assert!(step.waypoints.is_empty());
		// the group gate refused before any search ran
		assert_eq!(engine.get_stats().nodes_closed, 0);
		engine.release_path(handle).unwrap();
	}
	#[test]
	fn high_level_paths_are_shared() {
		let mut engine = PathEngine::new(60, 60);
		let start = CellCoord::new(1, 1);
		let dest = CellCoord::new(58, 58);
		let first = engine
			.request_path(start, dest, 0, Passability::Land, false)
			.unwrap();
		engine.step_path(first).unwrap();
		assert_eq!(engine.get_stats().cache_misses, 1);
		assert_eq!(engine.get_cache().len(), 1);
		let second = engine
			.request_path(start, dest, 0, Passability::Land, false)
			.unwrap();
		engine.step_path(second).unwrap();
		assert_eq!(engine.get_stats().cache_hits, 1);
		assert_eq!(engine.get_cache().len(), 1);
		engine.release_path(first).unwrap();
		engine.release_path(second).unwrap();
		// released but still cached for the next request
		assert_eq!(engine.get_cache().len(), 1);
	}
	#[test]
	fn flying_requests_ignore_ground_structure() {
		let mut engine = PathEngine::new(30, 30);
		// water means nothing in the air
		for row in 0..30 {
			engine
				.get_grid_mut()
				.set_passability(CellCoord::new(15, row), Passability::Water);
		}
		engine.rebuild_all();
		let handle = engine
			.request_path(
				CellCoord::new(10, 10),
				CellCoord::new(20, 10),
				0,
				Passability::Land,
				true,
			)
			.unwrap();
		let step = engine.step_path(handle).unwrap();
		assert_eq!(step.outcome, PathOutcome::FullPath);
		assert!(step.waypoints.contains(&CellCoord::new(15, 10)));
		engine.release_path(handle).unwrap();
	}
	#[test]
	fn debug_text_describes_the_cell() {
		let engine = PathEngine::new(30, 30);
		let text = engine.debug_text(CellCoord::new(5, 5));
		assert!(text.contains("passability Land"));
		assert!(text.contains("Region"));
		assert!(engine
			.debug_text(CellCoord::new(-3, 5))
			.contains("outside the grid"));
	}
	#[test]
	fn request_slots_are_reused() {
		let mut engine = PathEngine::new(30, 30);
		let a = engine
			.request_path(
				CellCoord::new(0, 0),
				CellCoord::new(5, 5),
				0,
				Passability::Land,
				false,
			)
			.unwrap();
		engine.release_path(a).unwrap();
		let b = engine
			.request_path(
				CellCoord::new(1, 1),
				CellCoord::new(6, 6),
				0,
				Passability::Land,
				false,
			)
			.unwrap();
		assert_eq!(a, b);
		assert_eq!(engine.active_requests(), 1);
	}
}
