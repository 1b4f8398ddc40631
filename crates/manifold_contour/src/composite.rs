//! Several octrees contoured as one surface.
//!
//! Each [`OctreeMount`] places an octree in one octant of a shared root.
//! Mounts may differ in resolution (`size`) as long as every mount covers
//! the same world extent (`size * scale`), so the shared root is exactly
//! twice that extent:
//!
//! ```text
//!            shared root (never clustered)
//!   ┌────────────────┬────────────────┐
//!   │ slot 2         │ slot 3         │
//!   │                │                │
//!   ├────────────────┼────────────────┤
//!   │ slot 0         │ slot 1         │   slot 0: size 32, scale 1
//!   │ ┌┬┬┬┬┬┬┐       │ ┌─┬─┬─┬─┐      │   slot 1: size 16, scale 2
//!   │ ├┼┼┼┼┼┼┤       │ ├─┼─┼─┼─┤      │
//!   └────────────────┴────────────────┘
//! ```
//!
//! Every mount is sampled, clustered and extracted on its own. Ambiguous
//! faces are resolved across mounts whose leaves line up, and the seams
//! between mounts come from one dual walk over the shared root's interior.

use glam::IVec3;
use rayon::prelude::*;

use crate::cluster::cluster_tree;
use crate::config::ContourConfig;
use crate::error::{try_reserve, ContourError, Result};
use crate::extract::{generate_indices, generate_vertex_buffer, seam_indices, DualTree};
use crate::octree::ambiguity::{resolve_ambiguous_faces, LeafGrid};
use crate::octree::construct::{place_vertices, sample};
use crate::octree::{NodeCounts, NodeKind, NodeRef, NodeStore, Octree, OctreeNode, TeardownReport, VertexPool};
use crate::sampler::ScalarField;
use crate::tables::octant_offset;
use crate::types::MeshVertex;

/// An octree placed in one octant of the shared root.
#[derive(Clone, Debug, PartialEq)]
pub struct OctreeMount {
  /// Octant of the shared root, same numbering as corners.
  pub slot: u8,
  pub config: ContourConfig,
}

impl OctreeMount {
  pub fn new(slot: u8, config: ContourConfig) -> Self {
    Self { slot, config }
  }

  /// World extent covered by the mounted octree.
  #[inline]
  pub fn extent(&self) -> i32 {
    self.config.size as i32 * self.config.scale
  }

  /// World min corner of the shared root implied by this mount.
  #[inline]
  pub fn root_origin(&self) -> IVec3 {
    self.config.origin - octant_offset(self.slot) * self.extent()
  }
}

/// Check that `mounts` tile one shared root. Returns the root's world min
/// corner and the extent of one mount.
pub fn validate_mounts(mounts: &[OctreeMount]) -> Result<(IVec3, i32)> {
  let Some(first) = mounts.first() else {
    return Err(ContourError::InvalidMount("no octrees to mount"));
  };

  let mut taken = 0u8;
  for mount in mounts {
    mount.config.validate()?;
    if mount.slot >= 8 {
      return Err(ContourError::InvalidMount("slot must be an octant (0..8)"));
    }
    if taken & (1 << mount.slot) != 0 {
      return Err(ContourError::InvalidMount("two octrees share a slot"));
    }
    taken |= 1 << mount.slot;

    if mount.extent() != first.extent() {
      return Err(ContourError::InvalidMount("mounted octrees must cover the same world extent"));
    }
    if mount.root_origin() != first.root_origin() {
      return Err(ContourError::InvalidMount("mount origins do not tile the shared root"));
    }
  }
  Ok((first.root_origin(), first.extent()))
}

/// Address of a node in a [`CompositeOctree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CompositeRef {
  /// Index into the mount list, or `u8::MAX` for the shared root.
  pub mount: u8,
  pub node: NodeRef,
}

impl CompositeRef {
  pub const ROOT: CompositeRef = CompositeRef {
    mount: u8::MAX,
    node: NodeRef::ROOT,
  };
}

#[derive(Debug)]
struct Mounted {
  slot: u8,
  tree: Octree,
}

/// Octrees mounted under one shared root.
#[derive(Debug)]
pub struct CompositeOctree {
  root: OctreeNode,
  /// Unit-scale config spanning the shared root.
  root_config: ContourConfig,
  /// The shared root owns no vertices; stays empty.
  root_pool: VertexPool,
  mounts: Vec<Mounted>,
  /// Slot -> index into `mounts`.
  slots: [Option<u8>; 8],
}

impl CompositeOctree {
  /// Sample every mount, resolve ambiguous faces across all of them, then
  /// place vertices.
  #[tracing::instrument(skip_all, name = "composite::construct", fields(mounts = mounts.len()))]
  pub fn construct<F: ScalarField + ?Sized>(mounts: &[OctreeMount], field: &F) -> Result<Self> {
    let (base, extent) = validate_mounts(mounts)?;

    let mut trees: Vec<Octree> = mounts
      .par_iter()
      .map(|mount| sample(&mount.config, field))
      .collect::<Result<_>>()?;

    {
      let mut grids: Vec<LeafGrid<'_>> = trees.iter_mut().filter_map(LeafGrid::new).collect();
      resolve_ambiguous_faces(&mut grids);
    }

    trees.par_iter_mut().try_for_each(|tree| place_vertices(tree, field))?;

    let mut slots = [None; 8];
    let mut child_mask = 0u8;
    for (index, (mount, tree)) in mounts.iter().zip(&trees).enumerate() {
      slots[mount.slot as usize] = Some(index as u8);
      if tree.root().kind != NodeKind::None {
        child_mask |= 1 << mount.slot;
      }
    }

    let root_size = 2 * extent as u32;
    let root = OctreeNode {
      position: base,
      size: root_size,
      kind: if child_mask != 0 {
        NodeKind::Internal
      } else {
        NodeKind::None
      },
      child_mask,
      ..Default::default()
    };

    let composite = Self {
      root,
      root_config: ContourConfig::new(root_size).with_origin(base),
      root_pool: VertexPool::new(),
      mounts: mounts
        .iter()
        .zip(trees)
        .map(|(mount, tree)| Mounted { slot: mount.slot, tree })
        .collect(),
      slots,
    };
    tracing::debug!(
      leaves = composite.node_counts().leaf,
      vertices = composite.pooled_vertex_count(),
      "composite constructed"
    );
    Ok(composite)
  }

  /// Cluster every mount. The shared root and the mount roots are never
  /// clustered.
  #[tracing::instrument(skip_all, name = "composite::cluster")]
  pub fn cluster(&mut self) -> Result<()> {
    self.mounts.par_iter_mut().try_for_each(|mounted| cluster_tree(&mut mounted.tree))
  }

  /// One buffer holding every mount's vertices, mount by mount.
  #[tracing::instrument(skip_all, name = "composite::vertices")]
  pub fn generate_vertex_buffer(&mut self) -> Result<Vec<MeshVertex>> {
    let mut vertices = Vec::new();
    for mounted in &mut self.mounts {
      let chunk = generate_vertex_buffer(&mut mounted.tree)?;
      let offset = vertices.len() as u32;
      for pool in mounted.tree.pools_mut() {
        for vertex in pool.iter_mut() {
          vertex.index = vertex.index.map(|local| local + offset);
        }
      }
      try_reserve(&mut vertices, chunk.len(), "output vertices")?;
      vertices.extend(chunk);
    }
    Ok(vertices)
  }

  /// Indices of every mount plus the seams between mounts.
  #[tracing::instrument(skip_all, name = "composite::indices")]
  pub fn generate_indices(&self) -> Result<Vec<u32>> {
    let mut chunks: Vec<Vec<u32>> = self
      .mounts
      .par_iter()
      .map(|mounted| generate_indices(&mounted.tree))
      .collect::<Result<_>>()?;
    if self.root.kind.has_children() {
      chunks.push(seam_indices(self, CompositeRef::ROOT)?);
    }

    let total = chunks.iter().map(Vec::len).sum();
    let mut indices = Vec::new();
    try_reserve(&mut indices, total, "triangle indices")?;
    for chunk in chunks {
      indices.extend(chunk);
    }
    Ok(indices)
  }

  pub fn root(&self) -> &OctreeNode {
    &self.root
  }

  /// Mounted octrees with their slots, in mount order.
  pub fn mounts(&self) -> impl Iterator<Item = (u8, &Octree)> + '_ {
    self.mounts.iter().map(|mounted| (mounted.slot, &mounted.tree))
  }

  /// Octree mounted at `slot`.
  pub fn mount_at(&self, slot: u8) -> Option<&Octree> {
    let index = (*self.slots.get(slot as usize)?)?;
    Some(&self.mounts[index as usize].tree)
  }

  /// Node counts over every mount, the shared root included.
  pub fn node_counts(&self) -> NodeCounts {
    let mut counts = NodeCounts::default();
    match self.root.kind {
      NodeKind::None => counts.empty += 1,
      _ => counts.internal += 1,
    }
    for mounted in &self.mounts {
      counts += mounted.tree.node_counts();
    }
    counts
  }

  pub fn pooled_vertex_count(&self) -> usize {
    self.mounts.iter().map(|m| m.tree.pooled_vertex_count()).sum()
  }

  /// Release every mount, reporting the totals.
  #[tracing::instrument(skip_all, name = "composite::teardown")]
  pub fn teardown(self) -> TeardownReport {
    let mut report = TeardownReport {
      nodes_released: 1,
      ..Default::default()
    };
    for mounted in self.mounts {
      report += mounted.tree.teardown();
    }
    report
  }
}

impl DualTree for CompositeOctree {
  type Ref = CompositeRef;

  #[inline]
  fn cell(&self, r: CompositeRef) -> &OctreeNode {
    match self.mounts.get(r.mount as usize) {
      Some(mounted) => mounted.tree.node(r.node),
      None => &self.root,
    }
  }

  fn cell_child(&self, r: CompositeRef, octant: u8) -> Option<CompositeRef> {
    match self.mounts.get(r.mount as usize) {
      Some(mounted) => mounted.tree.child(r.node, octant).map(|node| CompositeRef { node, ..r }),
      None => {
        if self.root.child_mask & (1 << octant) == 0 {
          return None;
        }
        let mount = self.slots[octant as usize]?;
        Some(CompositeRef {
          mount,
          node: NodeRef::ROOT,
        })
      }
    }
  }

  #[inline]
  fn cell_config(&self, r: CompositeRef) -> &ContourConfig {
    match self.mounts.get(r.mount as usize) {
      Some(mounted) => mounted.tree.config(),
      None => &self.root_config,
    }
  }

  #[inline]
  fn cell_pool(&self, r: CompositeRef) -> &VertexPool {
    match self.mounts.get(r.mount as usize) {
      Some(mounted) => mounted.tree.pool_of(r.node),
      None => &self.root_pool,
    }
  }
}

#[cfg(test)]
#[path = "composite_test.rs"]
mod composite_test;
