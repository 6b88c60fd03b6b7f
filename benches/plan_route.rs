//! Measure planning a full journey across a large world with scattered
//! impassable cells, leg by leg until the destination is reached
//!

use std::time::Duration;

use bevy_region_path_plugin::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Build a 300x300 world where roughly five percent of cells are impassable
fn prepare_engine() -> PathEngine {
	let mut engine = PathEngine::new(300, 300);
	let mut rng = StdRng::seed_from_u64(0xFEED);
	for _ in 0..4500 {
		let cell = CellCoord::new(rng.random_range(0..300), rng.random_range(0..300));
		// keep the corners open so the journey always exists
		if cell.chebyshev(CellCoord::new(1, 1)) < 15
			|| cell.chebyshev(CellCoord::new(298, 298)) < 15
		{
			continue;
		}
		engine
			.get_grid_mut()
			.set_passability(cell, Passability::NotPassable);
	}
	engine.rebuild_all();
	engine
}

/// Step a corner-to-corner request until it concludes
fn plan_route(engine: &mut PathEngine) {
	let handle = engine
		.request_path(
			CellCoord::new(1, 1),
			CellCoord::new(298, 298),
			0,
			Passability::Land,
			false,
		)
		.unwrap();
	loop {
		let step = engine.step_path(black_box(handle)).unwrap();
		if step.continuation != Continuation::NextLeg {
			break;
		}
	}
	engine.release_path(handle).unwrap();
}

criterion_group! {
	name = benches;
	config = Criterion::default().measurement_time(Duration::from_secs(45));
	targets = criterion_benchmark
}
criterion_main!(benches);

fn criterion_benchmark(c: &mut Criterion) {
	let mut engine = prepare_engine();
	c.bench_function("plan_route_300x300", |b| {
		b.iter(|| {
			plan_route(black_box(&mut engine));
		})
	});
}
