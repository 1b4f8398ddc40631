//! Contouring throughput over analytic fields at several sizes and
//! simplification thresholds.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{IVec3, Vec3};
use manifold_contour::{
  BlobField, ContourConfig, ManifoldDualContouring, MeshOutput, OctreeMount, QefData, QefSettings,
  SphereField,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn sphere_for(size: u32) -> SphereField {
  let half = size as f32 * 0.5;
  SphereField::new(Vec3::new(half + 0.13, half - 0.21, half + 0.07), half * 0.7)
}

fn blobs_for(size: u32, seed: u64) -> BlobField {
  let mut rng = StdRng::seed_from_u64(seed);
  let s = size as f32;
  let mut field = BlobField::default();
  for _ in 0..6 {
    let radius = rng.random_range(0.08 * s..0.2 * s);
    let lo = radius + 1.5;
    let hi = s - radius - 1.5;
    field = field.with_sphere(
      Vec3::new(
        rng.random_range(lo..hi),
        rng.random_range(lo..hi),
        rng.random_range(lo..hi),
      ),
      radius,
    );
  }
  field
}

/// Full pipeline on a sphere, growing the octree.
fn bench_sphere_sizes(c: &mut Criterion) {
  let mut group = c.benchmark_group("contour/sphere");
  group.sample_size(20);

  for size in [16u32, 32, 64] {
    let field = sphere_for(size);
    group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
      let mut mdc = ManifoldDualContouring::new(ContourConfig::new(size)).unwrap();
      let mut mesh = MeshOutput::new();
      b.iter(|| {
        mdc.contour(black_box(&field), &mut mesh).unwrap();
        black_box(mesh.triangle_count())
      })
    });
  }
  group.finish();
}

/// Effect of the simplification bound on a blob field.
fn bench_blob_thresholds(c: &mut Criterion) {
  let mut group = c.benchmark_group("contour/blobs_64");
  group.sample_size(10);

  let field = blobs_for(64, 42);
  for threshold in [0.0f32, 0.01, 0.1, 1.0] {
    let config = ContourConfig::new(64).with_threshold(threshold);
    group.bench_with_input(BenchmarkId::from_parameter(threshold), &config, |b, config| {
      let mut mdc = ManifoldDualContouring::new(config.clone()).unwrap();
      let mut mesh = MeshOutput::new();
      b.iter(|| {
        mdc.contour(black_box(&field), &mut mesh).unwrap();
        black_box(mesh.triangle_count())
      })
    });
  }
  group.finish();
}

/// Two 32-extent mounts stitched across their seam, at equal and mixed
/// resolution.
fn bench_composite_seam(c: &mut Criterion) {
  let mut group = c.benchmark_group("contour/composite");
  group.sample_size(10);

  let field = SphereField::new(Vec3::new(32.3, 16.2, 16.4), 11.7);
  for right_size in [32u32, 16] {
    let mounts = [
      OctreeMount::new(0, ContourConfig::new(32)),
      OctreeMount::new(
        1,
        ContourConfig::new(right_size)
          .with_origin(IVec3::new(32, 0, 0))
          .with_scale((32 / right_size) as i32),
      ),
    ];
    group.bench_with_input(BenchmarkId::from_parameter(right_size), &mounts, |b, mounts| {
      let mut mdc = ManifoldDualContouring::new(ContourConfig::default()).unwrap();
      let mut mesh = MeshOutput::new();
      b.iter(|| {
        mdc.contour_composite(mounts, black_box(&field), &mut mesh).unwrap();
        black_box(mesh.triangle_count())
      })
    });
  }
  group.finish();
}

/// QEF solve for a typical leaf (three to six tangent planes).
fn bench_qef_solve(c: &mut Criterion) {
  let mut rng = StdRng::seed_from_u64(7);
  let qefs: Vec<QefData> = (0..256)
    .map(|_| {
      let mut qef = QefData::new();
      for _ in 0..rng.random_range(3..=6) {
        let p = Vec3::new(rng.random(), rng.random(), rng.random());
        let n = Vec3::new(
          rng.random_range(-1.0..1.0),
          rng.random_range(-1.0..1.0),
          rng.random_range(-1.0..1.0),
        )
        .normalize_or(Vec3::Y);
        qef.add(p, n);
      }
      qef
    })
    .collect();
  let settings = QefSettings::default();

  c.bench_function("qef::solve (256 leaves)", |b| {
    b.iter(|| {
      for qef in &qefs {
        black_box(qef.solve(black_box(&settings)));
      }
    })
  });
}

criterion_group!(
  benches,
  bench_sphere_sizes,
  bench_blob_thresholds,
  bench_composite_seam,
  bench_qef_solve
);
criterion_main!(benches);
