//! Mesh checks shared by the test modules.

use std::collections::HashMap;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::sampler::{gradient, ScalarField};
use crate::sdf_samplers::BlobField;
use crate::types::MeshOutput;

/// Undirected edge -> number of triangles using it.
pub fn edge_uses(indices: &[u32]) -> HashMap<(u32, u32), usize> {
  let mut uses = HashMap::new();
  for tri in indices.chunks_exact(3) {
    for k in 0..3 {
      let (a, b) = (tri[k], tri[(k + 1) % 3]);
      *uses.entry((a.min(b), a.max(b))).or_insert(0) += 1;
    }
  }
  uses
}

/// Directed edges used by more than one triangle.
pub fn repeated_directed_edges(indices: &[u32]) -> usize {
  let mut uses: HashMap<(u32, u32), usize> = HashMap::new();
  for tri in indices.chunks_exact(3) {
    for k in 0..3 {
      *uses.entry((tri[k], tri[(k + 1) % 3])).or_insert(0) += 1;
    }
  }
  uses.values().filter(|&&n| n > 1).count()
}

/// Closed, consistently wound 2-manifold: every edge shared by exactly two
/// triangles traversing it in opposite directions.
pub fn assert_watertight(mesh: &MeshOutput) {
  assert_eq!(mesh.indices.len() % 3, 0);
  for &index in &mesh.indices {
    assert!((index as usize) < mesh.vertices.len(), "index {} out of range", index);
  }

  let open: Vec<_> = edge_uses(&mesh.indices)
    .into_iter()
    .filter(|&(_, n)| n != 2)
    .collect();
  assert!(open.is_empty(), "{} non-manifold edges, e.g. {:?}", open.len(), &open[..open.len().min(4)]);
  assert_eq!(repeated_directed_edges(&mesh.indices), 0, "inconsistent winding");
}

/// Fraction of triangles whose winding normal agrees with the field
/// gradient at the triangle centroid.
pub fn outward_fraction<F: ScalarField + ?Sized>(mesh: &MeshOutput, field: &F) -> f32 {
  let triangles = mesh.triangle_count();
  if triangles == 0 {
    return 1.0;
  }
  let outward = (0..triangles)
    .filter(|&t| {
      let [a, b, c] = mesh.triangle(t);
      let normal = (b - a).cross(c - a);
      let centroid = (a + b + c) / 3.0;
      normal.dot(gradient(field, centroid, 1e-3)) > 0.0
    })
    .count();
  outward as f32 / triangles as f32
}

/// A few overlapping spheres kept clear of the bounds of a `size` cube.
pub fn random_blobs(seed: u64, size: f32) -> BlobField {
  let mut rng = StdRng::seed_from_u64(seed);
  let count = rng.random_range(1..=4);
  let mut field = BlobField::default();
  for _ in 0..count {
    let radius = rng.random_range(0.1 * size..0.22 * size);
    let lo = radius + 1.5;
    let hi = size - radius - 1.5;
    let center = Vec3::new(
      rng.random_range(lo..hi),
      rng.random_range(lo..hi),
      rng.random_range(lo..hi),
    );
    field = field.with_sphere(center, radius);
  }
  field
}

/// Sphere of radius 11 centred in a 32 cube, with ripples strong enough at
/// amplitude ~1 to put ambiguous faces on both sides of many leaf faces.
pub fn rippled_sphere(amplitude: f32) -> impl Fn(f32, f32, f32) -> f32 + Send + Sync {
  move |x, y, z| {
    let d = Vec3::new(x, y, z).distance(Vec3::splat(16.0)) - 11.0;
    d + amplitude * ((0.9 * x).sin() + (1.1 * y).sin() * (0.7 * z).cos() + (0.3 * x + 1.3 * z).sin())
  }
}

/// [`rippled_sphere`] intersected with a box, so strong ripples stay clear
/// of the 32 cube's boundary.
pub fn boxed_rippled_sphere(amplitude: f32) -> impl Fn(f32, f32, f32) -> f32 + Send + Sync {
  let rippled = rippled_sphere(amplitude);
  move |x, y, z| {
    let box_distance = (Vec3::new(x, y, z) - Vec3::splat(16.0)).abs().max_element() - 13.3;
    rippled(x, y, z).max(box_distance)
  }
}
