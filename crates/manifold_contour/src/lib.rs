//! manifold_contour - Manifold dual contouring of scalar fields
//!
//! Converts a signed scalar field (negative inside) into a watertight,
//! consistently wound triangle mesh, simplifying flat regions through a
//! hierarchy of clustered vertices while keeping the surface 2-manifold.
//!
//! # Pipeline
//!
//! - **Construction**: flat per-level octree arrays, leaves sampled in
//!   parallel. Ambiguous faces are resolved between neighbouring leaves,
//!   then each sign-changing cell gets one vertex per edge group, placed by
//!   a QEF solve.
//! - **Clustering**: post-order merge of child vertices into one parent per
//!   connected surface, tracking the Euler characteristic and face crossings
//!   that decide whether a merge is topologically safe.
//! - **Extraction**: a post-order vertex buffer, then one quad per minimal
//!   sign-changing edge using the highest simplifiable ancestor of each
//!   vertex.
//!
//! Several octrees, possibly of different resolution, can be mounted under
//! one shared root and contoured as a single seamless surface with
//! [`ManifoldDualContouring::contour_composite`].
//!
//! # Example
//!
//! ```ignore
//! use glam::Vec3;
//! use manifold_contour::{ContourConfig, ManifoldDualContouring, MeshOutput, SphereField};
//!
//! let config = ContourConfig::new(32).with_threshold(0.01);
//! let mut mdc = ManifoldDualContouring::new(config)?;
//!
//! let mut mesh = MeshOutput::new();
//! let stats = mdc.contour(&SphereField::new(Vec3::splat(16.1), 10.0), &mut mesh)?;
//!
//! println!("{} vertices, {} triangles", stats.output_vertices, stats.triangles);
//! ```

pub mod error;
pub mod qef;
pub mod tables;
pub mod types;

pub use error::{ContourError, Result};
pub use qef::{QefData, QefSettings, QefSolution};
pub use types::{Aabb, MeshOutput, MeshVertex};

pub mod config;
pub use config::{ContourConfig, MAX_OCTREE_LEVELS};

// Field input
pub mod sampler;
pub mod sdf_samplers;
pub use sampler::ScalarField;
pub use sdf_samplers::{BlobField, ConstantField, SphereField, TiltedPlaneField, TorusField};

// Octree arena and construction
pub mod octree;
pub use octree::{NodeCounts, NodeKind, NodeRef, NodeStore, Octree, OctreeNode, TeardownReport};

pub mod cluster;
pub mod composite;
pub mod extract;
pub use composite::{CompositeOctree, OctreeMount};

pub mod contour;
pub use contour::{ContourStats, ManifoldDualContouring, MeshSink, StageTimings};

#[cfg(test)]
mod test_utils;
