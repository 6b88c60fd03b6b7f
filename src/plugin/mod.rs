//! Defines the Bevy [Plugin] for region-based pathfinding
//!

use crate::prelude::*;
use bevy::prelude::*;

pub mod occupancy_layer;
pub mod path_layer;

/// Occupancy maintenance runs before any planning so that every search in a
/// tick sees a consistent Region graph
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum OrderingSet {
	Maintain,
	Plan,
}

pub struct RegionPathPlugin;

impl Plugin for RegionPathPlugin {
	#[cfg(not(tarpaulin_include))]
	fn build(&self, app: &mut App) {
		app.register_type::<CellCoord>()
			.register_type::<Passability>()
			.register_type::<PathOutcome>()
			.register_type::<Continuation>()
			.register_type::<Strategy>()
			.register_type::<PathRequestHandle>()
			.register_type::<SectorId>()
			.register_type::<RegionId>()
			.register_type::<RegionGroupId>()
			.register_type::<HighLevelPathId>()
			.add_event::<occupancy_layer::EventUpdateOccupancyCell>()
			.add_event::<occupancy_layer::EventOccupancyChanged>()
			.add_event::<path_layer::EventPathRequest>()
			.add_event::<path_layer::EventReleasePath>()
			.configure_sets(Update, (OrderingSet::Maintain, OrderingSet::Plan).chain())
			.add_systems(
				Update,
				(
					(
						occupancy_layer::process_occupancy_updates,
						occupancy_layer::process_occupancy_changes,
					)
						.chain()
						.in_set(OrderingSet::Maintain),
					(
						path_layer::process_path_requests,
						path_layer::step_active_paths,
						path_layer::process_path_releases,
					)
						.chain()
						.in_set(OrderingSet::Plan),
				),
			);
	}
}
