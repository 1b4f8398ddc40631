//! ManifoldDualContouring - the facade driving one contour run.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │ contour(field, sink)                                               │
//! │                                                                    │
//! │  teardown previous tree                                            │
//! │        │                                                           │
//! │        ▼                                                           │
//! │  construct ──► cluster ──► vertex buffer ──► index buffer          │
//! │  (per level)   (8-way)     (8-way)           (8-way + root seams)  │
//! │        │                                                           │
//! │        ▼                                                           │
//! │  MeshOutput kept by the facade, copy uploaded to the MeshSink      │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`ManifoldDualContouring::contour_composite`] runs the same stages over
//! several octrees mounted under one root (see [`crate::composite`]).
//!
//! Any fatal error leaves the facade with an empty mesh and no tree.

use std::convert::Infallible;

use web_time::Instant;

use crate::cluster::cluster_tree;
use crate::composite::{CompositeOctree, OctreeMount};
use crate::config::ContourConfig;
use crate::error::{ContourError, Result};
use crate::extract::{generate_indices, generate_vertex_buffer};
use crate::octree::{construct, NodeCounts, Octree, TeardownReport};
use crate::sampler::ScalarField;
use crate::types::{MeshOutput, MeshVertex};

/// Receiver of finished mesh buffers.
pub trait MeshSink {
  type Error: std::error::Error + Send + Sync + 'static;

  fn upload(&mut self, vertices: &[MeshVertex], indices: &[u32]) -> std::result::Result<(), Self::Error>;
}

impl MeshSink for MeshOutput {
  type Error = Infallible;

  fn upload(&mut self, vertices: &[MeshVertex], indices: &[u32]) -> std::result::Result<(), Infallible> {
    self.clear();
    self.vertices.extend_from_slice(vertices);
    self.indices.extend_from_slice(indices);
    self.recompute_bounds();
    Ok(())
  }
}

/// Per-stage wall time in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTimings {
  pub construct_us: u64,
  pub cluster_us: u64,
  pub vertices_us: u64,
  pub indices_us: u64,
  pub upload_us: u64,
  pub total_us: u64,
}

/// Statistics of the latest contour run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContourStats {
  pub nodes: NodeCounts,
  /// Leaf and clustered vertices held by the tree.
  pub pooled_vertices: usize,
  pub output_vertices: usize,
  pub triangles: usize,
  pub timings: StageTimings,
}

/// Stages shared by single and composite runs, after construction.
trait ContourPass {
  fn cluster(&mut self) -> Result<()>;
  fn vertex_buffer(&mut self) -> Result<Vec<MeshVertex>>;
  fn indices(&self) -> Result<Vec<u32>>;
  fn node_counts(&self) -> NodeCounts;
  fn pooled_vertex_count(&self) -> usize;
}

impl ContourPass for Octree {
  fn cluster(&mut self) -> Result<()> {
    cluster_tree(self)
  }

  fn vertex_buffer(&mut self) -> Result<Vec<MeshVertex>> {
    generate_vertex_buffer(self)
  }

  fn indices(&self) -> Result<Vec<u32>> {
    generate_indices(self)
  }

  fn node_counts(&self) -> NodeCounts {
    Octree::node_counts(self)
  }

  fn pooled_vertex_count(&self) -> usize {
    Octree::pooled_vertex_count(self)
  }
}

impl ContourPass for CompositeOctree {
  fn cluster(&mut self) -> Result<()> {
    CompositeOctree::cluster(self)
  }

  fn vertex_buffer(&mut self) -> Result<Vec<MeshVertex>> {
    self.generate_vertex_buffer()
  }

  fn indices(&self) -> Result<Vec<u32>> {
    self.generate_indices()
  }

  fn node_counts(&self) -> NodeCounts {
    CompositeOctree::node_counts(self)
  }

  fn pooled_vertex_count(&self) -> usize {
    CompositeOctree::pooled_vertex_count(self)
  }
}

/// Manifold dual contouring over one octree, or several mounted side by
/// side.
#[derive(Debug)]
pub struct ManifoldDualContouring {
  config: ContourConfig,
  tree: Option<Octree>,
  composite: Option<CompositeOctree>,
  mesh: MeshOutput,
  stats: ContourStats,
}

impl ManifoldDualContouring {
  /// Validates `config` up front; nothing is sampled until [`Self::contour`].
  pub fn new(config: ContourConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self {
      config,
      tree: None,
      composite: None,
      mesh: MeshOutput::new(),
      stats: ContourStats::default(),
    })
  }

  pub fn config(&self) -> &ContourConfig {
    &self.config
  }

  /// Mesh of the latest successful run.
  pub fn mesh(&self) -> &MeshOutput {
    &self.mesh
  }

  /// Tree of the latest successful run, kept until the next run or
  /// [`Self::teardown`].
  pub fn tree(&self) -> Option<&Octree> {
    self.tree.as_ref()
  }

  /// Composite of the latest successful [`Self::contour_composite`] run.
  pub fn composite(&self) -> Option<&CompositeOctree> {
    self.composite.as_ref()
  }

  pub fn stats(&self) -> &ContourStats {
    &self.stats
  }

  /// Contour `field`, keep the mesh and hand a copy to `sink`.
  ///
  /// The sink is only called when the mesh has vertices.
  pub fn contour<F, S>(&mut self, field: &F, sink: &mut S) -> Result<&ContourStats>
  where
    F: ScalarField + ?Sized,
    S: MeshSink,
  {
    let _span = tracing::info_span!("contour", size = self.config.size, threshold = self.config.threshold).entered();

    self.reset();
    let config = self.config.clone();
    match self.run(|| construct(&config, field), sink) {
      Ok(tree) => {
        self.tree = Some(tree);
        Ok(&self.stats)
      }
      Err(error) => Err(self.fail(error)),
    }
  }

  /// Contour `field` over several octrees mounted under one root and
  /// stitched along their seams. The facade's own config is not used.
  ///
  /// Mounts may differ in resolution but must cover the same world extent
  /// and tile the shared root; see [`crate::composite::validate_mounts`].
  pub fn contour_composite<F, S>(
    &mut self,
    mounts: &[OctreeMount],
    field: &F,
    sink: &mut S,
  ) -> Result<&ContourStats>
  where
    F: ScalarField + ?Sized,
    S: MeshSink,
  {
    let _span = tracing::info_span!("contour_composite", mounts = mounts.len()).entered();

    self.reset();
    match self.run(|| CompositeOctree::construct(mounts, field), sink) {
      Ok(composite) => {
        self.composite = Some(composite);
        Ok(&self.stats)
      }
      Err(error) => Err(self.fail(error)),
    }
  }

  fn reset(&mut self) {
    self.teardown();
    self.mesh.clear();
    self.stats = ContourStats::default();
  }

  fn fail(&mut self, error: ContourError) -> ContourError {
    tracing::warn!(%error, "contour failed, mesh cleared");
    self.reset();
    error
  }

  fn run<T, C, S>(&mut self, construct: C, sink: &mut S) -> Result<T>
  where
    T: ContourPass,
    C: FnOnce() -> Result<T>,
    S: MeshSink,
  {
    let start = Instant::now();
    let mut timings = StageTimings::default();

    let stage = Instant::now();
    let mut tree = construct()?;
    timings.construct_us = stage.elapsed().as_micros() as u64;

    let stage = Instant::now();
    tree.cluster()?;
    timings.cluster_us = stage.elapsed().as_micros() as u64;

    let stage = Instant::now();
    self.mesh.vertices = tree.vertex_buffer()?;
    timings.vertices_us = stage.elapsed().as_micros() as u64;

    let stage = Instant::now();
    self.mesh.indices = tree.indices()?;
    self.mesh.recompute_bounds();
    timings.indices_us = stage.elapsed().as_micros() as u64;

    if !self.mesh.vertices.is_empty() {
      let stage = Instant::now();
      sink
        .upload(&self.mesh.vertices, &self.mesh.indices)
        .map_err(|e| ContourError::Sink(Box::new(e)))?;
      timings.upload_us = stage.elapsed().as_micros() as u64;
    }
    timings.total_us = start.elapsed().as_micros() as u64;

    self.stats = ContourStats {
      nodes: tree.node_counts(),
      pooled_vertices: tree.pooled_vertex_count(),
      output_vertices: self.mesh.vertices.len(),
      triangles: self.mesh.triangle_count(),
      timings,
    };
    tracing::debug!(
      leaves = self.stats.nodes.leaf,
      collapsed = self.stats.nodes.collapsed,
      vertices = self.stats.output_vertices,
      triangles = self.stats.triangles,
      total_us = timings.total_us,
      "contour complete"
    );
    Ok(tree)
  }

  /// Release the retained tree or composite, if any.
  pub fn teardown(&mut self) -> Option<TeardownReport> {
    let tree = self.tree.take().map(Octree::teardown);
    let composite = self.composite.take().map(CompositeOctree::teardown);
    match (tree, composite) {
      (Some(mut report), Some(other)) => {
        report += other;
        Some(report)
      }
      (report, other) => report.or(other),
    }
  }
}

#[cfg(test)]
#[path = "contour_test.rs"]
mod contour_test;
