//! ContourConfig - octree extent, grid-to-world mapping and simplification
//! settings for one contour run.

use glam::{IVec3, Vec3};

use crate::error::{ContourError, Result};
use crate::qef::QefSettings;
use crate::types::Aabb;

/// Deepest supported tree: size 128 with unit leaves.
pub const MAX_OCTREE_LEVELS: usize = 8;

/// Configuration for one contour run.
#[derive(Clone, Debug, PartialEq)]
pub struct ContourConfig {
  /// Root edge length in grid units. Power of two.
  pub size: u32,

  /// Integer multiplier applied to grid offsets from `origin`. Lets several
  /// octrees of different resolution tile one world.
  pub scale: i32,

  /// Grid position of the root's min corner.
  pub origin: IVec3,

  /// Simplification error bound. 0 keeps every leaf vertex.
  pub threshold: f32,

  /// QEF solve parameters.
  pub solver: QefSettings,

  /// Central-difference step for normals, before scaling.
  pub gradient_step: f32,

  /// Clamp solved vertex positions into their owning cell.
  pub clamp_to_cell: bool,
}

impl Default for ContourConfig {
  fn default() -> Self {
    Self {
      size: 32,
      scale: 1,
      origin: IVec3::ZERO,
      threshold: 0.0,
      solver: QefSettings::default(),
      gradient_step: 0.001,
      clamp_to_cell: false,
    }
  }
}

impl ContourConfig {
  pub fn new(size: u32) -> Self {
    Self {
      size,
      ..Self::default()
    }
  }

  pub fn with_scale(mut self, scale: i32) -> Self {
    self.scale = scale;
    self
  }

  pub fn with_origin(mut self, origin: IVec3) -> Self {
    self.origin = origin;
    self
  }

  pub fn with_threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn with_solver(mut self, solver: QefSettings) -> Self {
    self.solver = solver;
    self
  }

  pub fn with_gradient_step(mut self, step: f32) -> Self {
    self.gradient_step = step;
    self
  }

  pub fn with_clamp_to_cell(mut self, clamp: bool) -> Self {
    self.clamp_to_cell = clamp;
    self
  }

  /// Reject configurations the pipeline cannot run.
  pub fn validate(&self) -> Result<()> {
    if !self.size.is_power_of_two() {
      return Err(ContourError::InvalidSize(self.size));
    }
    if self.level_count() > MAX_OCTREE_LEVELS {
      return Err(ContourError::TooDeep {
        size: self.size,
        max_levels: MAX_OCTREE_LEVELS,
      });
    }
    if self.scale <= 0 {
      return Err(ContourError::InvalidScale(self.scale));
    }
    if !self.threshold.is_finite() || self.threshold < 0.0 {
      return Err(ContourError::InvalidThreshold(self.threshold));
    }
    if self.solver.max_sweeps == 0 {
      return Err(ContourError::InvalidSolver("max_sweeps must be at least 1"));
    }
    if !(self.solver.svd_tolerance >= 0.0 && self.solver.pinv_tolerance >= 0.0) {
      return Err(ContourError::InvalidSolver("tolerances must be non-negative"));
    }
    if !(self.gradient_step > 0.0) {
      return Err(ContourError::InvalidSolver("gradient step must be positive"));
    }
    Ok(())
  }

  /// Number of tree levels including the root: log2(size) + 1.
  #[inline]
  pub fn level_count(&self) -> usize {
    self.size.max(1).ilog2() as usize + 1
  }

  /// Node edge length in grid units at `level`.
  #[inline]
  pub fn cell_size(&self, level: usize) -> u32 {
    self.size >> level
  }

  /// World position of a grid point: `origin + (grid - origin) * scale`.
  #[inline]
  pub fn to_world(&self, grid: IVec3) -> Vec3 {
    self.to_world_grid(grid).as_vec3()
  }

  /// [`Self::to_world`] without the float conversion. Exact, so cells of
  /// different octrees can be matched by position.
  #[inline]
  pub fn to_world_grid(&self, grid: IVec3) -> IVec3 {
    self.origin + (grid - self.origin) * self.scale
  }

  /// Grid point at world position `world`, if it lies on this octree's
  /// lattice. Points outside the root are still mapped.
  #[inline]
  pub fn to_grid(&self, world: IVec3) -> Option<IVec3> {
    let offset = world - self.origin;
    (offset % self.scale == IVec3::ZERO).then(|| self.origin + offset / self.scale)
  }

  /// Whether grid point `grid` is the min corner of a cell inside the root.
  #[inline]
  pub fn contains_cell(&self, grid: IVec3) -> bool {
    let rel = grid - self.origin;
    rel.cmpge(IVec3::ZERO).all() && rel.cmplt(IVec3::splat(self.size as i32)).all()
  }

  /// World-space bounds of a cell.
  pub fn cell_bounds(&self, position: IVec3, size: u32) -> Aabb {
    let min = self.to_world(position);
    let max = self.to_world(position + IVec3::splat(size as i32));
    Aabb::new(min, max)
  }

  /// Gradient step in world units.
  #[inline]
  pub fn world_gradient_step(&self) -> f32 {
    self.gradient_step * self.scale as f32
  }

  /// Whether a vertex with residual `error` may replace its descendants.
  ///
  /// A zero threshold never admits anything, so an exact fit does not
  /// collapse geometry when simplification is off.
  #[inline]
  pub fn admits(&self, error: f32) -> bool {
    self.threshold > 0.0 && error <= self.threshold
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
