//! This is a plugin for Bevy game engine to setup and handle the logic for hierarchical region-based unit pathfinding
//!

pub mod pathing;
pub mod bundle;
pub mod plugin;

pub mod prelude;
