//! Reacts to occupancy changes. Rebuild work is localised: only the Sectors
//! covered by a changed rectangle are re-flood-filled, only their Regions
//! and immediate neighbours get fresh edges, costs and groups, and only
//! cached high-level paths crossing a rebuilt Region are invalidated. The
//! debug colouring of Regions is refreshed at the end
//!

use crate::prelude::*;
use bevy::log::debug;
use std::collections::{HashMap, HashSet};

/// Colour indices for visualising Regions: no two adjacent Regions share an
/// index. Purely diagnostic, drawing is the host's concern
#[derive(Debug, Default)]
pub struct RegionColorMap(HashMap<RegionId, u8>);

impl RegionColorMap {
	/// Create a new instance of [RegionColorMap]
	pub fn new() -> Self {
		RegionColorMap::default()
	}
	/// Get the colour index of a Region
	pub fn get_color(&self, region: RegionId) -> Option<u8> {
		self.0.get(&region).copied()
	}
	/// Number of coloured Regions
	pub fn len(&self) -> usize {
		self.0.len()
	}
	/// Whether no Regions are coloured
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
	/// Reassign every Region the smallest colour index unused by its
	/// neighbours, greedy in id order
	pub fn recolor(&mut self, arena: &RegionArena) {
		self.0.clear();
		for region_id in arena.get_live_ids() {
			let Some(region) = arena.get(region_id) else {
				continue;
			};
			let taken: Vec<u8> = region
				.get_neighbour_ids()
				.iter()
				.filter_map(|n| self.0.get(n).copied())
				.collect();
			let mut color = 0u8;
			while taken.contains(&color) {
				color += 1;
			}
			self.0.insert(region_id, color);
		}
	}
}

/// Fold an occupancy change over the inclusive cell rectangle `min..=max`
/// back into the Region structures. Rebuilds happen eagerly here so that
/// every search run later in the tick sees a consistent graph
#[allow(clippy::too_many_arguments)]
pub fn on_occupancy_changed(
	grid: &mut TerrainGrid,
	sectors: &mut SectorGrid,
	arena: &mut RegionArena,
	groups: &mut RegionGroups,
	cache: &mut PathCache,
	colors: &mut RegionColorMap,
	min: CellCoord,
	max: CellCoord,
) {
	let (a, b) = (min, max);
	let min = CellCoord::new(
		a.get_column().min(b.get_column()),
		a.get_row().min(b.get_row()),
	);
	let max = CellCoord::new(
		a.get_column().max(b.get_column()),
		a.get_row().max(b.get_row()),
	);
	let affected = sectors.get_sectors_in_rect(min, max);
	// the Regions about to be destroyed poison any cached path through them
	let mut rebuilt_regions: HashSet<RegionId> = HashSet::new();
	for sector_id in &affected {
		for region_id in sectors.get_sector(*sector_id).get_regions() {
			rebuilt_regions.insert(*region_id);
		}
	}
	cache.invalidate_referencing(&rebuilt_regions);
	for sector_id in &affected {
		rebuild_sector(*sector_id, grid, sectors, arena, groups);
	}
	// neighbour edges must be recounted for the rebuilt Sectors and for the
	// adjacent Sectors whose Regions bordered the old ones
	let mut area: Vec<SectorId> = affected.clone();
	for sector_id in &affected {
		for neighbour in sectors.get_neighbouring_sectors(*sector_id) {
			if !area.contains(&neighbour) {
				area.push(neighbour);
			}
		}
	}
	rebuild_neighbours_in_area(grid, sectors, arena, &area);
	let mut touched_regions: Vec<RegionId> = Vec::new();
	for sector_id in &area {
		touched_regions.extend_from_slice(sectors.get_sector(*sector_id).get_regions());
	}
	rebuild_costs(arena, &touched_regions);
	rebuild_groups(arena, groups);
	colors.recolor(arena);
	debug!(
		"Occupancy change over {:?}..={:?} rebuilt {} sector(s) into {} region(s)",
		min,
		max,
		affected.len(),
		touched_regions.len()
	);
}
