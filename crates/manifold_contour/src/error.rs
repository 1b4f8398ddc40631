//! Error types for contouring.
//!
//! Only configuration problems, allocation failures and sink failures are
//! reported. Table mismatches during extraction and empty QEFs are handled
//! where they occur and never reach the caller.

use std::collections::TryReserveError;

/// Errors returned by the contouring pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ContourError {
  #[error("octree size {0} is not a power of two")]
  InvalidSize(u32),

  #[error("octree size {size} needs more than {max_levels} levels")]
  TooDeep { size: u32, max_levels: usize },

  #[error("scale must be positive, got {0}")]
  InvalidScale(i32),

  #[error("threshold must be finite and non-negative, got {0}")]
  InvalidThreshold(f32),

  #[error("invalid solver settings: {0}")]
  InvalidSolver(&'static str),

  /// A composite layout that cannot tile one shared root.
  #[error("invalid octree mount: {0}")]
  InvalidMount(&'static str),

  /// Scaffolding or output buffers could not be reserved. The whole contour
  /// operation is abandoned.
  #[error("failed to allocate {count} {what}")]
  Allocation {
    what: &'static str,
    count: usize,
    #[source]
    source: TryReserveError,
  },

  /// The mesh sink rejected the finished buffers.
  #[error("mesh upload failed")]
  Sink(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

pub type Result<T> = std::result::Result<T, ContourError>;

/// Reserve `additional` slots in `vec`, mapping failure to
/// [`ContourError::Allocation`].
pub(crate) fn try_reserve<T>(vec: &mut Vec<T>, additional: usize, what: &'static str) -> Result<()> {
  vec.try_reserve_exact(additional).map_err(|source| ContourError::Allocation {
    what,
    count: additional,
    source,
  })
}

/// Make room for `additional` more elements, growing geometrically so
/// repeated small pushes stay amortized.
pub(crate) fn try_grow<T>(vec: &mut Vec<T>, additional: usize, what: &'static str) -> Result<()> {
  if vec.capacity() - vec.len() >= additional {
    return Ok(());
  }
  try_reserve(vec, additional.max(vec.len()).max(64), what)
}

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;
