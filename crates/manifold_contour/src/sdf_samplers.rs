//! Simple analytic fields for testing and benchmarking.
//!
//! These are exact (or near-exact) signed distance functions whose surfaces
//! are easy to verify: vertex positions can be checked against the analytic
//! surface and normals against the analytic gradient.

use glam::Vec3;

use crate::sampler::ScalarField;

/// Sphere SDF.
#[derive(Clone, Debug)]
pub struct SphereField {
  pub center: Vec3,
  pub radius: f32,
}

impl SphereField {
  pub fn new(center: Vec3, radius: f32) -> Self {
    Self { center, radius }
  }
}

impl ScalarField for SphereField {
  #[inline]
  fn sample(&self, x: f32, y: f32, z: f32) -> f32 {
    (Vec3::new(x, y, z) - self.center).length() - self.radius
  }
}

/// Tilted plane SDF.
///
/// Creates a plane through `point` tilted by `angle` radians from the XZ
/// plane around the Z axis. Inside is below the plane.
///
/// SDF: `(p - point) · (-sin(angle), cos(angle), 0)`
#[derive(Clone, Debug)]
pub struct TiltedPlaneField {
  pub point: Vec3,
  pub angle: f32,
}

impl Default for TiltedPlaneField {
  fn default() -> Self {
    Self {
      point: Vec3::ZERO,
      angle: std::f32::consts::FRAC_PI_4,
    }
  }
}

impl TiltedPlaneField {
  pub fn new(point: Vec3) -> Self {
    Self {
      point,
      ..Self::default()
    }
  }

  pub fn with_angle_degrees(mut self, degrees: f32) -> Self {
    self.angle = degrees.to_radians();
    self
  }

  /// Unit normal pointing out of the solid.
  pub fn normal(&self) -> Vec3 {
    Vec3::new(-self.angle.sin(), self.angle.cos(), 0.0)
  }
}

impl ScalarField for TiltedPlaneField {
  #[inline]
  fn sample(&self, x: f32, y: f32, z: f32) -> f32 {
    (Vec3::new(x, y, z) - self.point).dot(self.normal())
  }
}

/// Torus SDF lying in the XZ plane around `center`.
#[derive(Clone, Debug)]
pub struct TorusField {
  pub center: Vec3,
  /// Distance from the center to the tube center.
  pub major_radius: f32,
  /// Tube radius.
  pub minor_radius: f32,
}

impl TorusField {
  pub fn new(center: Vec3, major_radius: f32, minor_radius: f32) -> Self {
    Self {
      center,
      major_radius,
      minor_radius,
    }
  }
}

impl ScalarField for TorusField {
  #[inline]
  fn sample(&self, x: f32, y: f32, z: f32) -> f32 {
    let p = Vec3::new(x, y, z) - self.center;
    let ring = (p.x * p.x + p.z * p.z).sqrt() - self.major_radius;
    (ring * ring + p.y * p.y).sqrt() - self.minor_radius
  }
}

/// Union of spheres (hard minimum). Produces several components, thin
/// necks and concave creases depending on placement.
#[derive(Clone, Debug, Default)]
pub struct BlobField {
  pub spheres: Vec<SphereField>,
}

impl BlobField {
  pub fn new(spheres: Vec<SphereField>) -> Self {
    Self { spheres }
  }

  pub fn with_sphere(mut self, center: Vec3, radius: f32) -> Self {
    self.spheres.push(SphereField::new(center, radius));
    self
  }
}

impl ScalarField for BlobField {
  #[inline]
  fn sample(&self, x: f32, y: f32, z: f32) -> f32 {
    self
      .spheres
      .iter()
      .map(|s| s.sample(x, y, z))
      .fold(f32::INFINITY, f32::min)
  }
}

/// Same value everywhere.
#[derive(Clone, Copy, Debug)]
pub struct ConstantField(pub f32);

impl ScalarField for ConstantField {
  #[inline]
  fn sample(&self, _x: f32, _y: f32, _z: f32) -> f32 {
    self.0
  }
}

#[cfg(test)]
#[path = "sdf_samplers_test.rs"]
mod sdf_samplers_test;
