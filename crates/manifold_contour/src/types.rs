//! Output mesh types handed to a [`crate::MeshSink`].

use glam::Vec3;

/// Output vertex with all mesh attributes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshVertex {
  /// World-space position.
  pub position: [f32; 3],

  /// Normal remapped to a unit-length RGB triple for debug shading.
  pub color: [f32; 3],

  /// Surface normal (unit vector).
  pub normal: [f32; 3],

  /// Copy of `normal` for pipelines that bind two normal channels.
  pub shading_normal: [f32; 3],
}

impl MeshVertex {
  /// Build a vertex from a position and unit normal.
  pub fn new(position: Vec3, normal: Vec3) -> Self {
    let color = (normal * 0.5 + Vec3::splat(0.5)).normalize_or_zero();
    Self {
      position: position.to_array(),
      color: color.to_array(),
      normal: normal.to_array(),
      shading_normal: normal.to_array(),
    }
  }
}

impl Default for MeshVertex {
  fn default() -> Self {
    Self::new(Vec3::ZERO, Vec3::Y)
  }
}

/// World-space box, used for cell clamping and mesh bounds.
///
/// [`Aabb::INVERTED`] has `min > max` on every axis, so the first point
/// grown into it sets both corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
  pub min: Vec3,
  pub max: Vec3,
}

impl Aabb {
  pub const INVERTED: Aabb = Aabb {
    min: Vec3::INFINITY,
    max: Vec3::NEG_INFINITY,
  };

  pub fn new(min: Vec3, max: Vec3) -> Self {
    Self { min, max }
  }

  #[inline]
  pub fn grow(&mut self, point: Vec3) {
    self.min = self.min.min(point);
    self.max = self.max.max(point);
  }

  /// No point has been grown into the box yet.
  pub fn is_inverted(&self) -> bool {
    self.min.cmpgt(self.max).any()
  }

  #[inline]
  pub fn clamp(&self, point: Vec3) -> Vec3 {
    point.clamp(self.min, self.max)
  }

  /// Whether `point` lies in the box widened by `margin` on every side.
  pub fn contains(&self, point: Vec3, margin: f32) -> bool {
    point.cmpge(self.min - margin).all() && point.cmple(self.max + margin).all()
  }
}

impl Default for Aabb {
  fn default() -> Self {
    Self::INVERTED
  }
}

/// Contouring result.
#[derive(Clone, Debug, Default)]
pub struct MeshOutput {
  /// Output vertices, in octree post-order.
  pub vertices: Vec<MeshVertex>,

  /// Triangle indices (3 indices per triangle).
  pub indices: Vec<u32>,

  /// Box around every vertex; inverted while the mesh is empty.
  pub bounds: Aabb,
}

impl MeshOutput {
  pub fn new() -> Self {
    Self::default()
  }

  /// Clear all buffers, preserving capacity.
  pub fn clear(&mut self) {
    self.vertices.clear();
    self.indices.clear();
    self.bounds = Aabb::INVERTED;
  }

  /// Returns true if no geometry was generated.
  pub fn is_empty(&self) -> bool {
    self.vertices.is_empty()
  }

  /// Number of triangles in the mesh.
  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  /// Recompute `bounds` from the vertex positions.
  pub fn recompute_bounds(&mut self) {
    self.bounds = self
      .vertices
      .iter()
      .fold(Aabb::INVERTED, |mut bounds, vertex| {
        bounds.grow(Vec3::from_array(vertex.position));
        bounds
      });
  }

  /// Positions of one triangle.
  pub fn triangle(&self, triangle: usize) -> [Vec3; 3] {
    std::array::from_fn(|k| {
      let index = self.indices[triangle * 3 + k] as usize;
      Vec3::from_array(self.vertices[index].position)
    })
  }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
