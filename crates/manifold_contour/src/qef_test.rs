use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;

const EPS: f32 = 1e-4;

fn settings() -> QefSettings {
  QefSettings::default()
}

fn random_unit(rng: &mut StdRng) -> Vec3 {
  loop {
    let v = Vec3::new(
      rng.random_range(-1.0..1.0),
      rng.random_range(-1.0..1.0),
      rng.random_range(-1.0..1.0),
    );
    if v.length_squared() > 0.01 {
      return v.normalize();
    }
  }
}

#[test]
fn test_empty_qef_is_zero_residual() {
  let qef = QefData::new();
  let solution = qef.solve(&settings());
  assert_eq!(solution.position, Vec3::ZERO);
  assert_eq!(solution.error, 0.0);
  assert_eq!(qef.error(Vec3::new(5.0, 1.0, 2.0)), 0.0);
  assert!(qef.is_empty());
}

#[test]
fn test_box_corner() {
  let mut qef = QefData::new();
  qef.add(Vec3::new(1.0, 0.2, 0.3), Vec3::X);
  qef.add(Vec3::new(0.5, 2.0, 0.1), Vec3::Y);
  qef.add(Vec3::new(0.4, 0.6, 3.0), Vec3::Z);

  let solution = qef.solve(&settings());
  assert!((solution.position - Vec3::new(1.0, 2.0, 3.0)).length() < EPS);
  assert!(solution.error < EPS);
}

#[test]
fn test_flat_constraints_stay_at_mass_point() {
  // Every plane is z = 1: x and y are unconstrained and keep the centroid.
  let mut qef = QefData::new();
  qef.add(Vec3::new(0.0, 0.0, 1.0), Vec3::Z);
  qef.add(Vec3::new(1.0, 1.0, 1.0), Vec3::Z);

  let solution = qef.solve(&settings());
  assert!((solution.position - Vec3::new(0.5, 0.5, 1.0)).length() < EPS);
  assert!(solution.error < EPS);
}

#[test]
fn test_ridge_constraints_project_onto_line() {
  // Planes x = 2 and y = 3 meet in a line along Z.
  let mut qef = QefData::new();
  qef.add(Vec3::new(2.0, 0.0, 0.0), Vec3::X);
  qef.add(Vec3::new(0.0, 3.0, 4.0), Vec3::Y);

  let solution = qef.solve(&settings());
  assert!((solution.position - Vec3::new(2.0, 3.0, 2.0)).length() < EPS);
}

#[test]
fn test_rotated_planes_through_point() {
  let mut rng = StdRng::seed_from_u64(7);
  let target = Vec3::new(1.3, -0.7, 2.2);

  for _ in 0..20 {
    let mut qef = QefData::new();
    for _ in 0..6 {
      let normal = random_unit(&mut rng);
      let tangent = Vec3::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
      );
      let point = target + tangent - normal * tangent.dot(normal);
      qef.add(point, normal);
    }

    let solution = qef.solve(&settings());
    assert!(
      (solution.position - target).length() < 1e-3,
      "solved {:?}, expected {:?}",
      solution.position,
      target
    );
    assert!(solution.error < 1e-4);
  }
}

#[test]
fn test_error_matches_plane_distances() {
  let mut qef = QefData::new();
  qef.add(Vec3::ZERO, Vec3::X);
  qef.add(Vec3::ZERO, Vec3::Y);

  // Squared distances 2² + 3².
  let error = qef.error(Vec3::new(2.0, 3.0, 9.0));
  assert!((error - 13.0).abs() < EPS);
}

#[test]
fn test_solve_idempotent() {
  let mut rng = StdRng::seed_from_u64(11);
  let mut qef = QefData::new();
  for _ in 0..5 {
    let point = Vec3::new(
      rng.random_range(0.0..4.0),
      rng.random_range(0.0..4.0),
      rng.random_range(0.0..4.0),
    );
    qef.add(point, random_unit(&mut rng));
  }

  let first = qef.solve(&settings());
  let second = qef.solve(&settings());
  assert_eq!(first, second);
  assert!((qef.error(first.position) - first.error).abs() < EPS);
}

#[test]
fn test_merge_equals_combined_accumulation() {
  let points = [
    (Vec3::new(0.5, 0.0, 0.0), Vec3::X),
    (Vec3::new(0.0, 1.5, 0.0), Vec3::Y),
    (Vec3::new(0.0, 0.0, 2.5), Vec3::Z),
    (Vec3::new(0.3, 0.3, 0.3), Vec3::ONE.normalize()),
  ];

  let mut combined = QefData::new();
  let mut left = QefData::new();
  let mut right = QefData::new();
  for (i, (p, n)) in points.iter().enumerate() {
    combined.add(*p, *n);
    if i < 2 {
      left.add(*p, *n);
    } else {
      right.add(*p, *n);
    }
  }
  left.merge(&right);

  assert_eq!(left.count(), 4);
  let a = left.solve(&settings());
  let b = combined.solve(&settings());
  assert!((a.position - b.position).length() < EPS);
  assert!((a.error - b.error).abs() < EPS);
  assert!((left.mass_point() - combined.mass_point()).length() < EPS);
}

#[test]
fn test_more_sweeps_never_worse() {
  let mut rng = StdRng::seed_from_u64(5);
  let mut qef = QefData::new();
  for _ in 0..8 {
    let point = Vec3::new(
      rng.random_range(-2.0..2.0),
      rng.random_range(-2.0..2.0),
      rng.random_range(-2.0..2.0),
    );
    qef.add(point, random_unit(&mut rng));
  }

  let coarse = qef.solve(&QefSettings {
    max_sweeps: 1,
    ..settings()
  });
  let fine = qef.solve(&QefSettings {
    max_sweeps: 16,
    ..settings()
  });
  assert!(fine.error <= coarse.error + EPS);
}
