use glam::Vec3;

use super::*;

#[test]
fn test_aabb_grow() {
  let mut aabb = Aabb::INVERTED;
  assert!(aabb.is_inverted());
  aabb.grow(Vec3::new(1.0, 2.0, 3.0));
  assert_eq!(aabb.min, aabb.max);
  aabb.grow(Vec3::new(-1.0, -2.0, -3.0));

  assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, -3.0));
  assert_eq!(aabb.max, Vec3::new(1.0, 2.0, 3.0));
  assert!(!aabb.is_inverted());
}

#[test]
fn test_aabb_clamp_and_contains() {
  let aabb = Aabb::new(Vec3::ZERO, Vec3::splat(2.0));
  assert_eq!(aabb.clamp(Vec3::new(-1.0, 1.0, 5.0)), Vec3::new(0.0, 1.0, 2.0));
  assert!(aabb.contains(Vec3::ONE, 0.0));
  assert!(!aabb.contains(Vec3::new(2.5, 1.0, 1.0), 0.0));
  assert!(aabb.contains(Vec3::new(2.5, 1.0, 1.0), 0.5));
}

#[test]
fn test_vertex_duplicates_normal() {
  let vertex = MeshVertex::new(Vec3::new(1.0, 2.0, 3.0), Vec3::Z);
  assert_eq!(vertex.position, [1.0, 2.0, 3.0]);
  assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
  assert_eq!(vertex.shading_normal, vertex.normal);
}

#[test]
fn test_vertex_color_is_unit_remapped_normal() {
  let vertex = MeshVertex::new(Vec3::ZERO, Vec3::Z);
  // (0.5, 0.5, 1.0) normalized.
  let expected = Vec3::new(0.5, 0.5, 1.0).normalize();
  assert!((Vec3::from_array(vertex.color) - expected).length() < 1e-6);
  assert!((Vec3::from_array(vertex.color).length() - 1.0).abs() < 1e-6);
}

#[test]
fn test_mesh_output_clear() {
  let mut output = MeshOutput::new();
  output.vertices.push(MeshVertex::default());
  output.indices.extend([0, 0, 0]);
  output.recompute_bounds();
  assert!(!output.bounds.is_inverted());
  assert_eq!(output.triangle_count(), 1);

  output.clear();
  assert!(output.is_empty());
  assert_eq!(output.triangle_count(), 0);
  assert!(output.bounds.is_inverted());
}
