//! Coarse planning over the Region neighbour graph. Results are sequences
//! of Region ids held in a reference-counted cache so that requests sharing
//! a start Region and a compatible destination Region skip the search
//! entirely. Invalidation never destroys an entry outright, holders observe
//! the cleared flag and replan, the slot is freed once the last holder lets go
//!

use crate::prelude::*;
use bevy::log::{debug, trace};
use bevy::prelude::*;
use std::collections::{HashMap, HashSet};

/// Unique ID of a cached high-level path, an index into [PathCache]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash, Reflect)]
pub struct HighLevelPathId(usize);

impl HighLevelPathId {
	/// Create a new instance of [HighLevelPathId]
	pub fn new(index: usize) -> Self {
		HighLevelPathId(index)
	}
	/// Get the cache slot index
	pub fn get(&self) -> usize {
		self.0
	}
}

/// An ordered Region sequence from a start Region to a destination Region,
/// shared between every request that retained it
#[derive(Debug, Clone)]
pub struct HighLevelPath {
	/// The Region sequence, first entry is the start Region
	regions: Vec<RegionId>,
	/// Cleared when any Region on the path is rebuilt
	valid: bool,
	/// Number of requests currently holding the path
	refcount: u32,
}

impl HighLevelPath {
	/// Get the Region sequence
	pub fn get_regions(&self) -> &[RegionId] {
		&self.regions
	}
	/// Whether every Region on the path still exists
	pub fn is_valid(&self) -> bool {
		self.valid
	}
	/// Get the number of requests holding the path
	pub fn get_refcount(&self) -> u32 {
		self.refcount
	}
}

/// Slot arena of cached [HighLevelPath] entries
#[derive(Debug, Default)]
pub struct PathCache {
	/// Path storage, `None` marks a free slot
	slots: Vec<Option<HighLevelPath>>,
	/// Indices of free slots available for reuse
	free: Vec<usize>,
}

impl PathCache {
	/// Create a new instance of [PathCache]
	pub fn new() -> Self {
		PathCache::default()
	}
	/// Number of cached paths, invalidated-but-held entries included
	pub fn len(&self) -> usize {
		self.slots.len() - self.free.len()
	}
	/// Whether the cache holds no paths
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
	/// Store a freshly planned path with one holder
	pub fn insert(&mut self, regions: Vec<RegionId>) -> HighLevelPathId {
		let path = HighLevelPath {
			regions,
			valid: true,
			refcount: 1,
		};
		if let Some(index) = self.free.pop() {
			self.slots[index] = Some(path);
			HighLevelPathId(index)
		} else {
			self.slots.push(Some(path));
			HighLevelPathId(self.slots.len() - 1)
		}
	}
	/// Get a cached path
	pub fn get(&self, id: HighLevelPathId) -> Option<&HighLevelPath> {
		self.slots.get(id.0).and_then(|slot| slot.as_ref())
	}
	/// Find a valid cached path starting at `start` and ending in one of
	/// `destinations`, taking a hold on it
	pub fn find_and_retain(
		&mut self,
		start: RegionId,
		destinations: &[RegionId],
	) -> Option<HighLevelPathId> {
		for (index, slot) in self.slots.iter_mut().enumerate() {
			let Some(path) = slot else {
				continue;
			};
			if !path.valid {
				continue;
			}
			let matches = path.regions.first() == Some(&start)
				&& path
					.regions
					.last()
					.is_some_and(|last| destinations.contains(last));
			if matches {
				path.refcount += 1;
				trace!("Cache hit for start region {:?}", start);
				return Some(HighLevelPathId(index));
			}
		}
		None
	}
	/// Release one hold on a path, freeing the slot once an invalidated path
	/// loses its last holder. Valid paths stay cached at refcount zero for reuse
	pub fn release(&mut self, id: HighLevelPathId) {
		let mut freeable = false;
		if let Some(Some(path)) = self.slots.get_mut(id.0) {
			path.refcount = path.refcount.saturating_sub(1);
			freeable = !path.valid && path.refcount == 0;
		}
		if freeable {
			self.slots[id.0] = None;
			self.free.push(id.0);
		}
	}
	/// Mark every path crossing one of `rebuilt` as invalid. Entries with no
	/// holder are destroyed immediately, held entries linger until released
	pub fn invalidate_referencing(&mut self, rebuilt: &HashSet<RegionId>) {
		for index in 0..self.slots.len() {
			let Some(path) = &self.slots[index] else {
				continue;
			};
			if !path.regions.iter().any(|r| rebuilt.contains(r)) {
				continue;
			}
			if path.refcount == 0 {
				self.slots[index] = None;
				self.free.push(index);
			} else if path.valid {
				debug!(
					"Invalidating cached high-level path {} held by {} request(s)",
					index, path.refcount
				);
				if let Some(Some(path)) = self.slots.get_mut(index) {
					path.valid = false;
				}
			}
		}
	}
}

/// The Region containing `start`, or the nearest Region of the right
/// passability within a couple of cells (the start cell itself is typically
/// occupied by the requesting agent and so belongs to no Region)
pub fn find_start_region(
	grid: &TerrainGrid,
	arena: &RegionArena,
	start: CellCoord,
	capability: Passability,
) -> Option<RegionId> {
	for radius in 0..=2i32 {
		for dx in -radius..=radius {
			for dy in -radius..=radius {
				if dx.abs() != radius && dy.abs() != radius {
					continue;
				}
				let cell = start.offset((dx, dy));
				if !grid.is_valid_cell(cell) {
					continue;
				}
				if let Some(region_id) = grid.get_region(cell) {
					if let Some(region) = arena.get(region_id) {
						if region.get_passability() == capability {
							return Some(region_id);
						}
					}
				}
			}
		}
	}
	None
}

/// Every distinct Region of the right passability whose cells fall inside
/// the destination's acceptance-range box
pub fn find_goal_regions(
	grid: &TerrainGrid,
	arena: &RegionArena,
	dest: CellCoord,
	range: i32,
	capability: Passability,
) -> Vec<RegionId> {
	let mut found = Vec::new();
	for dx in -range..=range {
		for dy in -range..=range {
			let cell = dest.offset((dx, dy));
			if !grid.is_valid_cell(cell) {
				continue;
			}
			let Some(region_id) = grid.get_region(cell) else {
				continue;
			};
			if found.contains(&region_id) {
				continue;
			}
			if let Some(region) = arena.get(region_id) {
				if region.get_passability() == capability {
					found.push(region_id);
				}
			}
		}
	}
	found
}

/// A* over the Region graph from `start_region` to any member of
/// `destinations`. `g` accumulates edge crossing costs plus the aggregate
/// cost of each entered Region; `h` measures deviation from the straight
/// line between the request's actual start and destination points so small
/// Regions do not bias the estimate. With `allow_nearest` an exhausted
/// search (a range-zero request whose destination has no Region) settles
/// for the visited Region scoring closest to the destination
pub fn plan_high_level(
	arena: &RegionArena,
	start_region: RegionId,
	destinations: &[RegionId],
	start: CellCoord,
	dest: CellCoord,
	capability: Passability,
	allow_nearest: bool,
	stats: &mut SearchStats,
) -> Option<Vec<RegionId>> {
	let mut open: OpenSet<RegionId> = OpenSet::new();
	let mut g: HashMap<RegionId, f32> = HashMap::new();
	let mut parents: HashMap<RegionId, RegionId> = HashMap::new();
	let mut closed: HashSet<RegionId> = HashSet::new();
	// the start Region is measured from the agent's true position, all other
	// Regions from their centroid
	let start_h = point_deviation(
		(start.get_column() as f32, start.get_row() as f32),
		start,
		dest,
		HIGH_CROSS_DIVIDER,
		HIGH_DIST_MULTIPLIER,
	);
	g.insert(start_region, 0.0);
	open.push(start_region, start_h);
	let mut best = start_region;
	let mut best_score = start_h;
	let mut expanded = 0usize;
	while let Some((node, _f)) = open.pop() {
		if !closed.insert(node) {
			continue;
		}
		stats.nodes_closed += 1;
		if destinations.contains(&node) {
			return Some(trace_regions(&parents, start_region, node));
		}
		expanded += 1;
		if expanded > HIGH_MAX_NODES {
			break;
		}
		let node_g = *g.get(&node).unwrap_or(&0.0);
		let neighbours: Vec<(RegionId, f32)> = match arena.get(node) {
			Some(region) => region
				.get_neighbours()
				.iter()
				.map(|n| (n.get_region(), n.get_cost()))
				.collect(),
			None => continue,
		};
		for (neighbour_id, edge_cost) in neighbours {
			if closed.contains(&neighbour_id) {
				continue;
			}
			let Some(neighbour) = arena.get(neighbour_id) else {
				continue;
			};
			if neighbour.get_passability() != capability {
				continue;
			}
			let tentative = node_g + edge_cost + neighbour.get_cost();
			if g.get(&neighbour_id).is_none_or(|&current| tentative < current) {
				g.insert(neighbour_id, tentative);
				parents.insert(neighbour_id, node);
				let h = point_deviation(
					neighbour.get_centroid(),
					start,
					dest,
					HIGH_CROSS_DIVIDER,
					HIGH_DIST_MULTIPLIER,
				);
				open.push(neighbour_id, tentative + h);
				stats.nodes_opened += 1;
				let score = h + tentative * NEAREST_G_FACTOR;
				if score < best_score {
					best_score = score;
					best = neighbour_id;
				}
			}
		}
	}
	if allow_nearest && best != start_region {
		return Some(trace_regions(&parents, start_region, best));
	}
	None
}

/// Reconstruct the Region sequence from the parent links, start Region first
fn trace_regions(
	parents: &HashMap<RegionId, RegionId>,
	start_region: RegionId,
	node: RegionId,
) -> Vec<RegionId> {
	let mut regions = vec![node];
	let mut current = node;
	while current != start_region {
		let Some(&parent) = parents.get(&current) else {
			break;
		};
		regions.push(parent);
		current = parent;
	}
	regions.reverse();
	regions
}
