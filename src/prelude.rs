//! `use bevy_region_path_plugin::prelude::*;` to import common structures and methods
//!

#[doc(hidden)]
pub use crate::pathing::{
	engine::*, flat::*, flying::*, grid::*, high_level::*, low_level::*, maintainer::*,
	regions::*, search::*, sectors::*, *,
};

#[doc(hidden)]
pub use crate::{
	bundle::*,
	plugin::{occupancy_layer::*, path_layer::*, *},
};
