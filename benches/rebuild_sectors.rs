//! Measure folding an occupancy change into a large world, the per-tick cost
//! of agents parking and vacating
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
		engine
			.get_grid_mut()
			.set_passability(cell, Passability::NotPassable);
	}
	engine.rebuild_all();
	engine
}

/// Park a 3x3 block of agents in the middle of the world and vacate it again
fn occupy_and_vacate(engine: &mut PathEngine) {
	let min = CellCoord::new(150, 150);
	let max = CellCoord::new(152, 152);
	for column in 150..=152 {
		for row in 150..=152 {
			engine
				.get_grid_mut()
				.set_occupied(CellCoord::new(column, row), true, false);
		}
	}
	engine.notify_occupancy_changed(min, max);
	for column in 150..=152 {
		for row in 150..=152 {
			engine
				.get_grid_mut()
				.set_occupied(CellCoord::new(column, row), false, false);
		}
	}
	engine.notify_occupancy_changed(min, max);
}

criterion_group! {
	name = benches;
	config = Criterion::default().measurement_time(Duration::from_secs(30));
	targets = criterion_benchmark
}
criterion_main!(benches);

fn criterion_benchmark(c: &mut Criterion) {
	let mut engine = prepare_engine();
	c.bench_function("rebuild_sectors_occupy_vacate", |b| {
		b.iter(|| {
			occupy_and_vacate(black_box(&mut engine));
		})
	});
}
