//! Regions are maximal connected clusters of passable, unoccupied,
//! same-passability cells inside one Sector. They live in an arena indexed
//! by stable integer ids; Sectors and RegionGroups refer to them by id and
//! neighbour edges are `(id, cost, border_count)` adjacency entries, so a
//! Sector rebuild is a slot free-and-reuse rather than pointer chasing
//!

use crate::prelude::*;
use bevy::prelude::*;
use std::collections::{HashSet, VecDeque};

/// Unique ID of a Region, an index into the [RegionArena]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash, Reflect)]
pub struct RegionId(usize);

impl RegionId {
	/// Create a new instance of [RegionId]
	pub fn new(index: usize) -> Self {
		RegionId(index)
	}
	/// Get the arena slot index
	pub fn get(&self) -> usize {
		self.0
	}
}

/// Unique ID of a RegionGroup, an index into [RegionGroups]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash, Reflect)]
pub struct RegionGroupId(usize);

impl RegionGroupId {
	/// Create a new instance of [RegionGroupId]
	pub fn new(index: usize) -> Self {
		RegionGroupId(index)
	}
	/// Get the group slot index
	pub fn get(&self) -> usize {
		self.0
	}
}

/// One edge of the Region neighbour graph as seen from one of its endpoints
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionNeighbour {
	/// The Region on the far side of the edge
	region: RegionId,
	/// Cost of crossing the edge, [MAX_BORDER_COST] divided by the border count
	cost: f32,
	/// How many cell pairs straddle the border between the two Regions
	border_count: u32,
}

impl RegionNeighbour {
	/// Get the Region on the far side of the edge
	pub fn get_region(&self) -> RegionId {
		self.region
	}
	/// Get the cost of crossing the edge
	pub fn get_cost(&self) -> f32 {
		self.cost
	}
	/// Get the border cell count of the edge
	pub fn get_border_count(&self) -> u32 {
		self.border_count
	}
}

/// A maximal connected set of same-passability, unoccupied cells within one
/// Sector. Destroyed and rebuilt whenever its Sector's occupancy changes
#[derive(Debug, Clone)]
pub struct Region {
	/// The Sector whose cells this Region partitions
	sector: SectorId,
	/// The passability type shared by every cell of the Region
	passability: Passability,
	/// Number of cells in the Region
	cell_count: u32,
	/// Aggregate traversal cost: the sum of cell costs normalised by the
	/// square root of the cell count
	cost: f32,
	/// Average cell position of the Region
	centroid: (f32, f32),
	/// Inclusive min/max cell of the Region, the low-level planner searches
	/// within a padded union of these
	bounds: (CellCoord, CellCoord),
	/// The RegionGroup this Region belongs to, assigned by the group rebuild
	group: Option<RegionGroupId>,
	/// Adjacency entries to neighbouring Regions
	neighbours: Vec<RegionNeighbour>,
}

impl Region {
	/// Create a new instance of [Region] from the accumulations of a flood fill
	pub fn new(
		sector: SectorId,
		passability: Passability,
		cell_count: u32,
		cost: f32,
		centroid: (f32, f32),
		bounds: (CellCoord, CellCoord),
	) -> Self {
		Region {
			sector,
			passability,
			cell_count,
			cost,
			centroid,
			bounds,
			group: None,
			neighbours: Vec::new(),
		}
	}
	/// Get the owning Sector
	pub fn get_sector(&self) -> SectorId {
		self.sector
	}
	/// Get the passability type of the Region
	pub fn get_passability(&self) -> Passability {
		self.passability
	}
	/// Get the number of cells in the Region
	pub fn get_cell_count(&self) -> u32 {
		self.cell_count
	}
	/// Get the aggregate traversal cost of the Region
	pub fn get_cost(&self) -> f32 {
		self.cost
	}
	/// Get the average cell position of the Region
	pub fn get_centroid(&self) -> (f32, f32) {
		self.centroid
	}
	/// Get the inclusive min/max cell bounds of the Region
	pub fn get_bounds(&self) -> (CellCoord, CellCoord) {
		self.bounds
	}
	/// Get the RegionGroup of the Region. Panics if the group rebuild has not
	/// run since the Region was created, which is a maintenance bug
	pub fn get_group(&self) -> RegionGroupId {
		match self.group {
			Some(group) => group,
			None => panic!("Region of sector {:?} has no RegionGroup", self.sector),
		}
	}
	/// Assign the RegionGroup of the Region
	pub fn set_group(&mut self, group: RegionGroupId) {
		self.group = Some(group);
	}
	/// Get the adjacency entries of the Region
	pub fn get_neighbours(&self) -> &[RegionNeighbour] {
		&self.neighbours
	}
	/// Get just the ids of the neighbouring Regions
	pub fn get_neighbour_ids(&self) -> Vec<RegionId> {
		self.neighbours.iter().map(|n| n.region).collect()
	}
	/// Record one border cell pair towards `other`: idempotent edge creation,
	/// repeat borders only increment the count
	pub fn add_border(&mut self, other: RegionId) {
		for n in self.neighbours.iter_mut() {
			if n.region == other {
				n.border_count += 1;
				return;
			}
		}
		self.neighbours.push(RegionNeighbour {
			region: other,
			cost: MAX_BORDER_COST,
			border_count: 1,
		});
	}
	/// Drop the adjacency entry towards `other`, if any
	pub fn remove_neighbour(&mut self, other: RegionId) {
		self.neighbours.retain(|n| n.region != other);
	}
	/// Drop every adjacency entry
	pub fn clear_neighbours(&mut self) {
		self.neighbours.clear();
	}
	/// Overwrite the crossing cost of the edge towards `other`
	pub fn set_neighbour_cost(&mut self, other: RegionId, cost: f32) {
		for n in self.neighbours.iter_mut() {
			if n.region == other {
				n.cost = cost;
			}
		}
	}
}

/// Slot arena owning every live [Region], freed slots are reused
#[derive(Debug, Default)]
pub struct RegionArena {
	/// Region storage, `None` marks a free slot
	slots: Vec<Option<Region>>,
	/// Indices of free slots available for reuse
	free: Vec<usize>,
}

impl RegionArena {
	/// Create a new instance of [RegionArena]
	pub fn new() -> Self {
		RegionArena::default()
	}
	/// Number of live Regions
	pub fn len(&self) -> usize {
		self.slots.len() - self.free.len()
	}
	/// Whether no Regions are live
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
	/// Store a Region, reusing a free slot when available
	pub fn insert(&mut self, region: Region) -> RegionId {
		if let Some(index) = self.free.pop() {
			self.slots[index] = Some(region);
			RegionId(index)
		} else {
			self.slots.push(Some(region));
			RegionId(self.slots.len() - 1)
		}
	}
	/// Get a live Region
	pub fn get(&self, id: RegionId) -> Option<&Region> {
		self.slots.get(id.0).and_then(|slot| slot.as_ref())
	}
	/// Get a live Region mutably
	pub fn get_mut(&mut self, id: RegionId) -> Option<&mut Region> {
		self.slots.get_mut(id.0).and_then(|slot| slot.as_mut())
	}
	/// Free a slot and return the Region it held
	pub fn remove(&mut self, id: RegionId) -> Option<Region> {
		let region = self.slots.get_mut(id.0).and_then(|slot| slot.take());
		if region.is_some() {
			self.free.push(id.0);
		}
		region
	}
	/// Ids of every live Region in slot order
	pub fn get_live_ids(&self) -> Vec<RegionId> {
		self.slots
			.iter()
			.enumerate()
			.filter_map(|(i, slot)| slot.as_ref().map(|_| RegionId(i)))
			.collect()
	}
	/// Remove a Region, unlinking it from the neighbour graph and its group
	pub fn detach_and_remove(&mut self, id: RegionId, groups: &mut RegionGroups) {
		let Some(region) = self.remove(id) else {
			return;
		};
		for neighbour in &region.neighbours {
			if let Some(other) = self.get_mut(neighbour.region) {
				other.remove_neighbour(id);
			}
		}
		if let Some(group) = region.group {
			groups.remove_member(group, id);
		}
	}
}

/// A reachability equivalence class: the Regions of one passability type
/// that are mutually reachable over the neighbour graph
#[derive(Debug, Clone)]
pub struct RegionGroup {
	/// The passability type shared by every member
	passability: Passability,
	/// The member Regions
	regions: Vec<RegionId>,
}

impl RegionGroup {
	/// Get the passability type of the group
	pub fn get_passability(&self) -> Passability {
		self.passability
	}
	/// Get the member Regions
	pub fn get_regions(&self) -> &[RegionId] {
		&self.regions
	}
}

/// Slot arena owning every live [RegionGroup]
#[derive(Debug, Default)]
pub struct RegionGroups {
	/// Group storage, `None` marks a free slot
	slots: Vec<Option<RegionGroup>>,
	/// Indices of free slots available for reuse
	free: Vec<usize>,
}

impl RegionGroups {
	/// Create a new instance of [RegionGroups]
	pub fn new() -> Self {
		RegionGroups::default()
	}
	/// Number of live groups
	pub fn len(&self) -> usize {
		self.slots.len() - self.free.len()
	}
	/// Whether no groups are live
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
	/// Store a group of `members`, reusing a free slot when available
	pub fn insert(&mut self, passability: Passability, regions: Vec<RegionId>) -> RegionGroupId {
		let group = RegionGroup {
			passability,
			regions,
		};
		if let Some(index) = self.free.pop() {
			self.slots[index] = Some(group);
			RegionGroupId(index)
		} else {
			self.slots.push(Some(group));
			RegionGroupId(self.slots.len() - 1)
		}
	}
	/// Get a live group
	pub fn get(&self, id: RegionGroupId) -> Option<&RegionGroup> {
		self.slots.get(id.0).and_then(|slot| slot.as_ref())
	}
	/// Remove a Region from a group, freeing the group once empty
	pub fn remove_member(&mut self, id: RegionGroupId, region: RegionId) {
		let mut emptied = false;
		if let Some(Some(group)) = self.slots.get_mut(id.0) {
			group.regions.retain(|r| *r != region);
			emptied = group.regions.is_empty();
		}
		if emptied {
			self.slots[id.0] = None;
			self.free.push(id.0);
		}
	}
	/// Discard every group
	pub fn clear(&mut self) {
		self.slots.clear();
		self.free.clear();
	}
}

/// Record one border cell pair between `a` and `b` on both sides of the edge
pub fn add_border(arena: &mut RegionArena, a: RegionId, b: RegionId) {
	if let Some(region) = arena.get_mut(a) {
		region.add_border(b);
	}
	if let Some(region) = arena.get_mut(b) {
		region.add_border(a);
	}
}

/// Rebuild the neighbour edges of every Region within `area`: existing edges
/// touching those Regions are dropped, then every 8-connected cell pair that
/// straddles two different Regions is recounted. Edges wholly outside `area`
/// are untouched
pub fn rebuild_neighbours_in_area(
	grid: &TerrainGrid,
	sectors: &SectorGrid,
	arena: &mut RegionArena,
	area: &[SectorId],
) {
	let area_set: HashSet<SectorId> = area.iter().copied().collect();
	for sector_id in area {
		let region_ids = sectors.get_sector(*sector_id).get_regions().to_vec();
		for region_id in region_ids {
			let neighbour_ids = match arena.get(region_id) {
				Some(region) => region.get_neighbour_ids(),
				None => continue,
			};
			for neighbour_id in neighbour_ids {
				if let Some(other) = arena.get_mut(neighbour_id) {
					other.remove_neighbour(region_id);
				}
			}
			if let Some(region) = arena.get_mut(region_id) {
				region.clear_neighbours();
			}
		}
	}
	// scanning forward directions once per cell counts each in-area pair
	// exactly once, the backward directions pick up pairs whose other cell
	// lies outside the scanned area and so is never itself visited
	let forward: [(i32, i32); 4] = [(1, 0), (1, 1), (0, 1), (-1, 1)];
	for sector_id in area {
		let (min, max) = sectors.get_cell_bounds(*sector_id);
		for row in min.get_row()..=max.get_row() {
			for column in min.get_column()..=max.get_column() {
				let cell = CellCoord::new(column, row);
				let Some(a) = grid.get_region(cell) else {
					continue;
				};
				for delta in forward {
					let neighbour = cell.offset(delta);
					if !grid.is_valid_cell(neighbour) {
						continue;
					}
					if let Some(b) = grid.get_region(neighbour) {
						if b != a {
							add_border(arena, a, b);
						}
					}
				}
				for delta in forward {
					let neighbour = cell.offset((-delta.0, -delta.1));
					if !grid.is_valid_cell(neighbour)
						|| area_set.contains(&sectors.get_sector_id_of_cell(neighbour))
					{
						continue;
					}
					if let Some(b) = grid.get_region(neighbour) {
						if b != a {
							add_border(arena, a, b);
						}
					}
				}
			}
		}
	}
}

/// Recompute the crossing cost of every edge touching the given Regions:
/// more shared border means a cheaper crossing
pub fn rebuild_costs(arena: &mut RegionArena, region_ids: &[RegionId]) {
	for region_id in region_ids {
		let entries: Vec<(RegionId, u32)> = match arena.get(*region_id) {
			Some(region) => region
				.get_neighbours()
				.iter()
				.map(|n| (n.region, n.border_count))
				.collect(),
			None => continue,
		};
		for (neighbour_id, border_count) in entries {
			let cost = MAX_BORDER_COST / border_count as f32;
			if let Some(region) = arena.get_mut(*region_id) {
				region.set_neighbour_cost(neighbour_id, cost);
			}
			if let Some(other) = arena.get_mut(neighbour_id) {
				other.set_neighbour_cost(*region_id, cost);
			}
		}
	}
}

/// Recompute every RegionGroup from scratch: BFS over same-passability edges
/// finds the connected components and each becomes one group. Splits and
/// merges both fall out of the recomputation
pub fn rebuild_groups(arena: &mut RegionArena, groups: &mut RegionGroups) {
	groups.clear();
	let mut visited: HashSet<RegionId> = HashSet::new();
	for region_id in arena.get_live_ids() {
		if visited.contains(&region_id) {
			continue;
		}
		let Some(region) = arena.get(region_id) else {
			continue;
		};
		let passability = region.get_passability();
		let mut members = Vec::new();
		let mut queue = VecDeque::from([region_id]);
		visited.insert(region_id);
		while let Some(current) = queue.pop_front() {
			members.push(current);
			let neighbour_ids = match arena.get(current) {
				Some(r) => r.get_neighbour_ids(),
				None => continue,
			};
			for neighbour_id in neighbour_ids {
				if visited.contains(&neighbour_id) {
					continue;
				}
				if let Some(neighbour) = arena.get(neighbour_id) {
					if neighbour.get_passability() == passability {
						visited.insert(neighbour_id);
						queue.push_back(neighbour_id);
					}
				}
			}
		}
		let group_id = groups.insert(passability, members.clone());
		for member in members {
			if let Some(r) = arena.get_mut(member) {
				r.set_group(group_id);
			}
		}
	}
}
