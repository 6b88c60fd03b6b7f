//!
//!

use crate::prelude::*;
use bevy::prelude::*;

/// The length `x` and depth `y` of the map in cells
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Component, Default)]
pub struct MapDimensions(i32, i32);

impl MapDimensions {
	/// Create a new instance of [MapDimensions]. The dimensions are measured
	/// by the number of cells that fit into the `x` (length) and `y` (depth)
	/// axes and must be exact factors of [SECTOR_RESOLUTION]
	pub fn new(length: i32, depth: i32) -> Self {
		let length_rem = length % SECTOR_RESOLUTION as i32;
		let depth_rem = depth % SECTOR_RESOLUTION as i32;
		if length <= 0 || depth <= 0 || length_rem > 0 || depth_rem > 0 {
			panic!(
				"Map dimensions `({}, {})` cannot support sectors, dimensions must be exact factors of {}",
				length, depth, SECTOR_RESOLUTION
			);
		}
		MapDimensions(length, depth)
	}
	pub fn get_column(&self) -> i32 {
		self.0
	}
	pub fn get_row(&self) -> i32 {
		self.1
	}
}

#[derive(Bundle)]
pub struct RegionPathBundle {
	/// The pathfinding context of the map
	engine: PathEngine,
	/// Cell dimensions of the map
	map_dimensions: MapDimensions,
}

impl RegionPathBundle {
	/// Create a new instance of [RegionPathBundle] based on map dimensions
	pub fn new(map_length: i32, map_depth: i32) -> Self {
		let map_dimensions = MapDimensions::new(map_length, map_depth);
		let engine = PathEngine::new(map_length, map_depth);
		RegionPathBundle {
			engine,
			map_dimensions,
		}
	}
}
