//! A map is split into a series of fixed-size Sectors so that occupancy
//! changes only force Region rebuilds for the Sectors actually touched.
//! Each Sector owns the ids of the Regions flood-filled from its cells
//!

use crate::prelude::*;
use bevy::prelude::*;
use std::collections::VecDeque;

/// Unique ID of a sector
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash, Reflect)]
pub struct SectorId((u32, u32));

impl SectorId {
	/// Create a new instance of [SectorId]
	pub fn new(column: u32, row: u32) -> Self {
		SectorId((column, row))
	}
	/// Get the sector `(column, row)` tuple
	pub fn get(&self) -> (u32, u32) {
		self.0
	}
	/// Get the sector column
	pub fn get_column(&self) -> u32 {
		self.0 .0
	}
	/// Get the sector row
	pub fn get_row(&self) -> u32 {
		self.0 .1
	}
}

/// One fixed-size tile of the map owning the Regions built from its cells
#[derive(Debug, Default, Clone)]
pub struct Sector {
	/// The Regions whose cells lie inside this Sector
	regions: Vec<RegionId>,
}

impl Sector {
	/// Get the Regions of the Sector
	pub fn get_regions(&self) -> &[RegionId] {
		&self.regions
	}
	/// Replace the Regions of the Sector after a rebuild
	pub fn set_regions(&mut self, regions: Vec<RegionId>) {
		self.regions = regions;
	}
}

/// The Sectors of the map in row-major order
#[derive(Debug, Clone)]
pub struct SectorGrid {
	/// Number of sector columns
	columns: u32,
	/// Number of sector rows
	rows: u32,
	/// The sectors in row-major order
	sectors: Vec<Sector>,
}

impl SectorGrid {
	/// Create a new instance of [SectorGrid] for a map of `map_columns` by
	/// `map_rows` cells
	pub fn new(map_columns: i32, map_rows: i32) -> Self {
		let resolution = SECTOR_RESOLUTION as i32;
		if map_columns <= 0
			|| map_rows <= 0
			|| map_columns % resolution != 0
			|| map_rows % resolution != 0
		{
			panic!(
				"Map dimensions `({}, {})` cannot support sectors, dimensions must be exact factors of {}",
				map_columns, map_rows, SECTOR_RESOLUTION
			);
		}
		let columns = (map_columns / resolution) as u32;
		let rows = (map_rows / resolution) as u32;
		SectorGrid {
			columns,
			rows,
			sectors: vec![Sector::default(); (columns * rows) as usize],
		}
	}
	/// Get the number of sector columns
	pub fn get_columns(&self) -> u32 {
		self.columns
	}
	/// Get the number of sector rows
	pub fn get_rows(&self) -> u32 {
		self.rows
	}
	/// Row-major index of a sector
	fn index(&self, id: SectorId) -> usize {
		(id.get_row() * self.columns + id.get_column()) as usize
	}
	/// Get a Sector
	pub fn get_sector(&self, id: SectorId) -> &Sector {
		&self.sectors[self.index(id)]
	}
	/// Get a Sector mutably
	pub fn get_sector_mut(&mut self, id: SectorId) -> &mut Sector {
		let i = self.index(id);
		&mut self.sectors[i]
	}
	/// The Sector a cell belongs to, the caller must have validated the coordinate
	pub fn get_sector_id_of_cell(&self, cell: CellCoord) -> SectorId {
		let resolution = SECTOR_RESOLUTION as i32;
		SectorId::new(
			(cell.get_column() / resolution) as u32,
			(cell.get_row() / resolution) as u32,
		)
	}
	/// Inclusive min/max cell of a Sector
	pub fn get_cell_bounds(&self, id: SectorId) -> (CellCoord, CellCoord) {
		let resolution = SECTOR_RESOLUTION as i32;
		let min = CellCoord::new(
			id.get_column() as i32 * resolution,
			id.get_row() as i32 * resolution,
		);
		let max = min.offset((resolution - 1, resolution - 1));
		(min, max)
	}
	/// Every Sector overlapping the inclusive cell rectangle `min..=max`,
	/// clamped to the map
	pub fn get_sectors_in_rect(&self, min: CellCoord, max: CellCoord) -> Vec<SectorId> {
		let resolution = SECTOR_RESOLUTION as i32;
		let min_col = (min.get_column().max(0) / resolution).min(self.columns as i32 - 1);
		let max_col = (max.get_column().max(0) / resolution).min(self.columns as i32 - 1);
		let min_row = (min.get_row().max(0) / resolution).min(self.rows as i32 - 1);
		let max_row = (max.get_row().max(0) / resolution).min(self.rows as i32 - 1);
		let mut ids = Vec::new();
		for row in min_row..=max_row {
			for column in min_col..=max_col {
				ids.push(SectorId::new(column as u32, row as u32));
			}
		}
		ids
	}
	/// The up-to-8 Sectors adjacent to `id`, diagonals included since Regions
	/// border one another across sector corners
	pub fn get_neighbouring_sectors(&self, id: SectorId) -> Vec<SectorId> {
		let mut neighbours = Vec::new();
		for delta in DIRECTIONS {
			let column = id.get_column() as i32 + delta.0;
			let row = id.get_row() as i32 + delta.1;
			if column >= 0 && column < self.columns as i32 && row >= 0 && row < self.rows as i32 {
				neighbours.push(SectorId::new(column as u32, row as u32));
			}
		}
		neighbours
	}
	/// Every Sector of the map
	pub fn get_all_sector_ids(&self) -> Vec<SectorId> {
		let mut ids = Vec::new();
		for row in 0..self.rows {
			for column in 0..self.columns {
				ids.push(SectorId::new(column, row));
			}
		}
		ids
	}
}

/// Discard and re-flood-fill the Regions of one Sector. Every passable,
/// unoccupied cell ends up in exactly one Region of its passability type,
/// grown by 8-connected BFS confined to the Sector. Returns the new Regions
pub fn rebuild_sector(
	sector_id: SectorId,
	grid: &mut TerrainGrid,
	sectors: &mut SectorGrid,
	arena: &mut RegionArena,
	groups: &mut RegionGroups,
) -> Vec<RegionId> {
	let (min, max) = sectors.get_cell_bounds(sector_id);
	let old_regions = sectors.get_sector(sector_id).get_regions().to_vec();
	for region_id in old_regions {
		arena.detach_and_remove(region_id, groups);
	}
	for row in min.get_row()..=max.get_row() {
		for column in min.get_column()..=max.get_column() {
			grid.set_region(CellCoord::new(column, row), None);
		}
	}
	let mut new_regions = Vec::new();
	for row in min.get_row()..=max.get_row() {
		for column in min.get_column()..=max.get_column() {
			let seed = CellCoord::new(column, row);
			if grid.get_region(seed).is_some() {
				continue;
			}
			let passability = grid.get_passability(seed);
			if passability == Passability::NotPassable || grid.get_occupancy(seed).0 {
				continue;
			}
			new_regions.push(flood_fill_region(
				seed,
				passability,
				sector_id,
				(min, max),
				grid,
				arena,
			));
		}
	}
	sectors
		.get_sector_mut(sector_id)
		.set_regions(new_regions.clone());
	new_regions
}

/// Grow one Region from `seed` by 8-connected BFS over unassigned, unoccupied
/// cells of the same passability within the Sector bounds, accumulating the
/// cell count, cost sum, centroid and bounds as it goes
fn flood_fill_region(
	seed: CellCoord,
	passability: Passability,
	sector_id: SectorId,
	sector_bounds: (CellCoord, CellCoord),
	grid: &mut TerrainGrid,
	arena: &mut RegionArena,
) -> RegionId {
	let (sector_min, sector_max) = sector_bounds;
	let region_id = arena.insert(Region::new(
		sector_id,
		passability,
		0,
		0.0,
		(0.0, 0.0),
		(seed, seed),
	));
	let mut cell_count = 0u32;
	let mut cost_sum = 0.0f32;
	let mut centroid_sum = (0.0f32, 0.0f32);
	let mut bounds_min = seed;
	let mut bounds_max = seed;
	let mut queue = VecDeque::from([seed]);
	grid.set_region(seed, Some(region_id));
	while let Some(cell) = queue.pop_front() {
		cell_count += 1;
		cost_sum += grid.get_cost(cell);
		centroid_sum.0 += cell.get_column() as f32;
		centroid_sum.1 += cell.get_row() as f32;
		bounds_min = CellCoord::new(
			bounds_min.get_column().min(cell.get_column()),
			bounds_min.get_row().min(cell.get_row()),
		);
		bounds_max = CellCoord::new(
			bounds_max.get_column().max(cell.get_column()),
			bounds_max.get_row().max(cell.get_row()),
		);
		for delta in DIRECTIONS {
			let next = cell.offset(delta);
			if next.get_column() < sector_min.get_column()
				|| next.get_column() > sector_max.get_column()
				|| next.get_row() < sector_min.get_row()
				|| next.get_row() > sector_max.get_row()
			{
				continue;
			}
			if grid.get_region(next).is_some()
				|| grid.get_passability(next) != passability
				|| grid.get_occupancy(next).0
			{
				continue;
			}
			grid.set_region(next, Some(region_id));
			queue.push_back(next);
		}
	}
	if let Some(region) = arena.get_mut(region_id) {
		*region = Region::new(
			sector_id,
			passability,
			cell_count,
			cost_sum / (cell_count as f32).sqrt(),
			(
				centroid_sum.0 / cell_count as f32,
				centroid_sum.1 / cell_count as f32,
			),
			(bounds_min, bounds_max),
		);
	}
	region_id
}
