//! Logic relating to serving path requests made by actor entities. An actor
//! sends an [EventPathRequest], receives a [PathHandle] and an [ActorPath]
//! holding the waypoints of its current leg, and sends an [EventReleasePath]
//! once the journey is over
//!

use crate::prelude::*;
use bevy::prelude::*;
use std::collections::VecDeque;

/// A request to plan a journey for an actor entity
#[derive(Event)]
pub struct EventPathRequest {
	/// The entity the journey belongs to
	actor: Entity,
	/// The cell the actor currently stands on
	start: CellCoord,
	/// The cell to travel to
	dest: CellCoord,
	/// Acceptance range around the destination, zero demands the exact cell
	range: i32,
	/// Terrain the actor can traverse
	capability: Passability,
	/// Whether the actor is airborne
	flying: bool,
}

impl EventPathRequest {
	/// Create a new instance of [EventPathRequest]
	pub fn new(
		actor: Entity,
		start: CellCoord,
		dest: CellCoord,
		range: i32,
		capability: Passability,
		flying: bool,
	) -> Self {
		EventPathRequest {
			actor,
			start,
			dest,
			range,
			capability,
			flying,
		}
	}
}

/// A request to give up an actor's hold on its journey
#[derive(Event)]
pub struct EventReleasePath {
	/// The entity whose journey is over
	actor: Entity,
}

impl EventReleasePath {
	/// Create a new instance of [EventReleasePath]
	pub fn new(actor: Entity) -> Self {
		EventReleasePath { actor }
	}
}

/// Attached to an actor once its request is registered with the [PathEngine]
#[derive(Component)]
pub struct PathHandle(PathRequestHandle);

impl PathHandle {
	/// Create a new instance of [PathHandle]
	pub fn new(handle: PathRequestHandle) -> Self {
		PathHandle(handle)
	}
	pub fn get(&self) -> PathRequestHandle {
		self.0
	}
}

/// The waypoints of an actor's current leg, consumed front-to-back by the
/// host's steering systems. Once drained, [step_active_paths] refills it with
/// the next leg until the continuation says the journey is over
#[derive(Component)]
pub struct ActorPath {
	/// Cells still to travel through, in order
	waypoints: VecDeque<CellCoord>,
	/// What happens once the waypoints are drained
	continuation: Continuation,
	/// How the last planning step concluded
	outcome: Option<PathOutcome>,
}

impl ActorPath {
	/// Create a new instance of [ActorPath] awaiting its first leg
	pub fn new() -> Self {
		ActorPath {
			waypoints: VecDeque::new(),
			continuation: Continuation::NextLeg,
			outcome: None,
		}
	}
	/// Take the next cell to travel towards
	pub fn pop_waypoint(&mut self) -> Option<CellCoord> {
		self.waypoints.pop_front()
	}
	/// Peek the remaining waypoints
	pub fn get_waypoints(&self) -> &VecDeque<CellCoord> {
		&self.waypoints
	}
	pub fn get_continuation(&self) -> Continuation {
		self.continuation
	}
	pub fn get_outcome(&self) -> Option<PathOutcome> {
		self.outcome
	}
	/// Whether the journey has concluded, successfully or not
	pub fn is_over(&self) -> bool {
		self.waypoints.is_empty() && self.continuation != Continuation::NextLeg
	}
}

impl Default for ActorPath {
	fn default() -> Self {
		ActorPath::new()
	}
}

/// Read [EventPathRequest] and register each journey with the [PathEngine],
/// attaching a [PathHandle] and an empty [ActorPath] to the actor
#[cfg(not(tarpaulin_include))]
pub fn process_path_requests(
	mut events: EventReader<EventPathRequest>,
	mut query: Query<&mut PathEngine>,
	mut commands: Commands,
) {
	for event in events.read() {
		for mut engine in query.iter_mut() {
			match engine.request_path(
				event.start,
				event.dest,
				event.range,
				event.capability,
				event.flying,
			) {
				Ok(handle) => {
					if let Ok(mut entity) = commands.get_entity(event.actor) {
						entity.insert((PathHandle::new(handle), ActorPath::new()));
					} else {
						// the actor died between sending and processing
						if let Err(error) = engine.release_path(handle) {
							error!("Releasing an orphaned request failed: {}", error);
						}
					}
				}
				Err(error) => {
					error!("Path request for {:?} rejected: {}", event.actor, error);
				}
			}
		}
	}
}

/// Refill every drained [ActorPath] whose journey wants another leg
#[cfg(not(tarpaulin_include))]
pub fn step_active_paths(
	mut engine_q: Query<&mut PathEngine>,
	mut actor_q: Query<(Entity, &PathHandle, &mut ActorPath)>,
) {
	for mut engine in engine_q.iter_mut() {
		for (actor, handle, mut path) in actor_q.iter_mut() {
			if !path.waypoints.is_empty() || path.continuation != Continuation::NextLeg {
				continue;
			}
			match engine.step_path(handle.get()) {
				Ok(step) => {
					trace!(
						"Leg of {} waypoint(s) for {:?}, then {:?}",
						step.waypoints.len(),
						actor,
						step.continuation
					);
					path.waypoints = step.waypoints.into();
					path.continuation = step.continuation;
					path.outcome = Some(step.outcome);
				}
				Err(error) => {
					error!("Stepping the path of {:?} failed: {}", actor, error);
					path.continuation = Continuation::Failed;
					path.outcome = Some(PathOutcome::NoPath);
				}
			}
		}
	}
}

/// Read [EventReleasePath], give up the engine's hold on each journey and
/// strip the pathing components from the actor
#[cfg(not(tarpaulin_include))]
pub fn process_path_releases(
	mut events: EventReader<EventReleasePath>,
	mut engine_q: Query<&mut PathEngine>,
	actor_q: Query<&PathHandle>,
	mut commands: Commands,
) {
	for event in events.read() {
		let Ok(handle) = actor_q.get(event.actor) else {
			warn!("Release for {:?} which holds no path", event.actor);
			continue;
		};
		for mut engine in engine_q.iter_mut() {
			if let Err(error) = engine.release_path(handle.get()) {
				error!("Releasing the path of {:?} failed: {}", event.actor, error);
			}
		}
		if let Ok(mut entity) = commands.get_entity(event.actor) {
			entity.remove::<(PathHandle, ActorPath)>();
		}
	}
}
