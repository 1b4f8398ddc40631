//! Scalar field input.
//!
//! The contourer only ever asks a field for point samples. Fields are shared
//! across rayon workers, so implementations must be pure.

use glam::Vec3;

/// Scalar field sampled at world-space points.
///
/// Negative values are inside the surface, positive values outside.
pub trait ScalarField: Send + Sync {
  fn sample(&self, x: f32, y: f32, z: f32) -> f32;

  #[inline]
  fn sample_at(&self, p: Vec3) -> f32 {
    self.sample(p.x, p.y, p.z)
  }
}

impl<F> ScalarField for F
where
  F: Fn(f32, f32, f32) -> f32 + Send + Sync,
{
  #[inline]
  fn sample(&self, x: f32, y: f32, z: f32) -> f32 {
    self(x, y, z)
  }
}

/// Unit gradient at `p` by central differences with step `h`.
///
/// Returns zero where the field is flat.
pub fn gradient<F: ScalarField + ?Sized>(field: &F, p: Vec3, h: f32) -> Vec3 {
  let dx = field.sample(p.x + h, p.y, p.z) - field.sample(p.x - h, p.y, p.z);
  let dy = field.sample(p.x, p.y + h, p.z) - field.sample(p.x, p.y - h, p.z);
  let dz = field.sample(p.x, p.y, p.z + h) - field.sample(p.x, p.y, p.z - h);
  Vec3::new(dx, dy, dz).normalize_or_zero()
}

#[cfg(test)]
#[path = "sampler_test.rs"]
mod sampler_test;
