use glam::Vec3;

use super::*;
use crate::sdf_samplers::SphereField;

#[test]
fn test_closure_is_a_field() {
  let field = |x: f32, y: f32, z: f32| x + 2.0 * y - z;
  assert_eq!(field.sample(1.0, 1.0, 1.0), 2.0);
  assert_eq!(field.sample_at(Vec3::new(0.0, 1.0, 0.0)), 2.0);
}

#[test]
fn test_dyn_field() {
  let sphere = SphereField::new(Vec3::ZERO, 1.0);
  let field: &dyn ScalarField = &sphere;
  assert!(field.sample(0.0, 0.0, 0.0) < 0.0);
  let g = gradient(field, Vec3::new(2.0, 0.0, 0.0), 0.001);
  assert!((g - Vec3::X).length() < 1e-3);
}

#[test]
fn test_gradient_of_plane() {
  let field = |x: f32, _y: f32, _z: f32| 3.0 * x - 1.0;
  let g = gradient(&field, Vec3::new(0.2, 5.0, -1.0), 0.001);
  assert!((g - Vec3::X).length() < 1e-5);
}

#[test]
fn test_gradient_points_outward_on_sphere() {
  let sphere = SphereField::new(Vec3::splat(4.0), 2.0);
  let p = Vec3::new(4.0, 6.0, 4.0);
  let g = gradient(&sphere, p, 0.001);
  assert!((g - Vec3::Y).length() < 1e-3);
}

#[test]
fn test_gradient_of_constant_is_zero() {
  let field = |_x: f32, _y: f32, _z: f32| 1.0;
  assert_eq!(gradient(&field, Vec3::ONE, 0.001), Vec3::ZERO);
}
