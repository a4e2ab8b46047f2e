//! # Collider Benchmark
//!
//! Brute-force pairwise intersection over mixed shapes, the way the
//! collision pass walks every instance pair of a registered kind pair.
//!
//! Run with: `cargo bench --bench collision`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{DQuat, DVec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use bending::core::{Aabb, Collider, Obb, Sphere};
use bending::game::collision::first_hit;

const AXES: [DVec3; 3] = [DVec3::X, DVec3::Y, DVec3::Z];

fn random_vector(rng: &mut StdRng, scale: f64) -> DVec3 {
    DVec3::new(
        rng.gen_range(-1.0..=1.0),
        rng.gen_range(-1.0..=1.0),
        rng.gen_range(-1.0..=1.0),
    ) * scale
}

/// `60 * size` instances. Each has one box, oriented box or sphere and
/// with `extra` set up to nine satellites around it.
fn generate(size: usize, extra: bool, seed: u64) -> Vec<Vec<Collider>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut result = Vec::with_capacity(60 * size);

    for (i, axis) in AXES.iter().enumerate() {
        for j in 1..=size {
            let mut extents = DVec3::ONE;
            extents[i] = rng.gen_range(0.5..j as f64 + 0.5);
            let aabb = Aabb::new(-extents, extents);
            let rotation = DQuat::from_axis_angle(*axis, rng.gen_range(0.0..std::f64::consts::TAU));

            for k in 1..=20 {
                let center = random_vector(&mut rng, k as f64 * 0.5 * j as f64);
                let collider: Collider = match rng.gen_range(0..3) {
                    0 => Obb::rotated(&aabb.at(center), rotation).into(),
                    1 => Sphere::new(center, 1.0).into(),
                    _ => aabb.at(center).into(),
                };

                let mut colliders = vec![collider];
                if extra && rng.gen_bool(0.5) {
                    for _ in 0..rng.gen_range(0..10) {
                        let offset = random_vector(&mut rng, k as f64 * 0.2);
                        colliders.push(Sphere::new(center + offset, rng.gen_range(0.1..2.0)).into());
                    }
                }
                result.push(colliders);
            }
        }
    }

    result
}

fn count_hits(instances: &[Vec<Collider>]) -> usize {
    let mut hits = 0;
    for (i, first) in instances.iter().enumerate() {
        for second in &instances[i + 1..] {
            if first_hit(first, second).is_some() {
                hits += 1;
            }
        }
    }
    hits
}

fn bench_pairwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("pairwise");

    for size in [1, 5, 10] {
        let single = generate(size, false, 42);
        group.bench_with_input(BenchmarkId::new("single", size), &single, |b, instances| {
            b.iter(|| black_box(count_hits(instances)));
        });

        let multi = generate(size, true, 42);
        group.bench_with_input(BenchmarkId::new("multi", size), &multi, |b, instances| {
            b.iter(|| black_box(count_hits(instances)));
        });
    }

    group.finish();
}

fn bench_shapes(c: &mut Criterion) {
    let aabb = Aabb::new(DVec3::splat(-1.0), DVec3::ONE);
    let obb: Collider = Obb::rotated(&aabb.at(DVec3::splat(0.5)), DQuat::from_rotation_y(0.7)).into();
    let sphere: Collider = Sphere::new(DVec3::new(1.5, 0.0, 0.0), 1.0).into();
    let aabb: Collider = aabb.into();

    c.bench_function("obb_obb", |b| b.iter(|| black_box(&obb).intersects(black_box(&obb))));
    c.bench_function("obb_sphere", |b| b.iter(|| black_box(&obb).intersects(black_box(&sphere))));
    c.bench_function("aabb_sphere", |b| b.iter(|| black_box(&aabb).intersects(black_box(&sphere))));
}

criterion_group!(benches, bench_pairwise, bench_shapes);
criterion_main!(benches);
