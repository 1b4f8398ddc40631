//! Octree arena for manifold dual contouring.
//!
//! Nodes are stored level by level in flat arrays: level `L` holds `8^L`
//! slots and the children of `(L, i)` are `(L + 1, 8i .. 8i + 8)`. Every
//! slot exists, including culled ones, so addressing is pure arithmetic.
//!
//! ```text
//! level 0:  [R]
//! level 1:  [0 1 2 3 4 5 6 7]                     one slot per root octant
//! level 2:  [0..8 | 8..16 | ... | 56..64]          chunk j = subtree under octant j
//! level L:  8 contiguous chunks of 8^(L-1) slots   chunk j = subtree under octant j
//! ```
//!
//! Because the subtree below each root octant occupies one contiguous chunk
//! per level, the tree splits into eight disjoint mutable views
//! ([`SubtreeMut`]) that rayon can process without locks. Each subtree also
//! owns one [`VertexPool`], which holds every vertex created under it.

pub(crate) mod ambiguity;
pub mod construct;
pub mod node;
pub mod vertex;

pub use construct::construct;
pub use node::{NodeKind, NodeRef, OctreeNode};
pub use vertex::{Vertex, VertexId, VertexPool};

use crate::config::ContourConfig;

/// Read access to nodes by address.
pub trait NodeStore {
  fn node(&self, r: NodeRef) -> &OctreeNode;

  #[inline]
  fn child(&self, r: NodeRef, octant: u8) -> Option<NodeRef> {
    self.node(r).child_ref(r, octant)
  }

  /// Child at `octant` for nodes with children; leaves stand in for
  /// themselves.
  #[inline]
  fn descend(&self, r: NodeRef, octant: u8) -> Option<NodeRef> {
    if self.node(r).kind.has_children() {
      self.child(r, octant)
    } else {
      Some(r)
    }
  }
}

impl NodeStore for [&mut [OctreeNode]] {
  #[inline]
  fn node(&self, r: NodeRef) -> &OctreeNode {
    &self[r.level as usize][r.index as usize]
  }
}

/// Node counts by kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeCounts {
  pub empty: usize,
  pub internal: usize,
  pub leaf: usize,
  pub collapsed: usize,
}

impl std::ops::AddAssign for NodeCounts {
  fn add_assign(&mut self, other: Self) {
    self.empty += other.empty;
    self.internal += other.internal;
    self.leaf += other.leaf;
    self.collapsed += other.collapsed;
  }
}

/// What a teardown released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
  /// Node slots released, culled ones included.
  pub nodes_released: usize,
  /// Pooled vertices released. Each is released exactly once.
  pub vertices_released: usize,
  /// Distinct vertices reachable from node lists or parent chains.
  pub reachable_vertices: usize,
}

impl std::ops::AddAssign for TeardownReport {
  fn add_assign(&mut self, other: Self) {
    self.nodes_released += other.nodes_released;
    self.vertices_released += other.vertices_released;
    self.reachable_vertices += other.reachable_vertices;
  }
}

/// Built octree plus the vertex pools of its eight subtrees.
#[derive(Debug)]
pub struct Octree {
  config: ContourConfig,
  levels: Vec<Vec<OctreeNode>>,
  pools: Vec<VertexPool>,
}

impl NodeStore for Octree {
  #[inline]
  fn node(&self, r: NodeRef) -> &OctreeNode {
    &self.levels[r.level as usize][r.index as usize]
  }
}

impl Octree {
  pub(crate) fn from_parts(
    config: ContourConfig,
    levels: Vec<Vec<OctreeNode>>,
    pools: Vec<VertexPool>,
  ) -> Self {
    Self {
      config,
      levels,
      pools,
    }
  }

  /// Configuration the tree was built with.
  pub fn config(&self) -> &ContourConfig {
    &self.config
  }

  pub fn level_count(&self) -> usize {
    self.levels.len()
  }

  /// All slots of one level.
  pub fn level(&self, level: usize) -> &[OctreeNode] {
    &self.levels[level]
  }

  pub fn root(&self) -> &OctreeNode {
    &self.levels[0][0]
  }

  /// One pool per root octant (empty when the root has no children).
  pub fn pools(&self) -> &[VertexPool] {
    &self.pools
  }

  pub(crate) fn pools_mut(&mut self) -> &mut [VertexPool] {
    &mut self.pools
  }

  /// Root octant whose subtree contains `r`. The root itself maps to 0.
  #[inline]
  pub fn subtree_of(r: NodeRef) -> usize {
    match r.level {
      0 => 0,
      level => (r.index >> (3 * (level as u32 - 1))) as usize,
    }
  }

  /// Pool holding the vertices of `r`.
  #[inline]
  pub fn pool_of(&self, r: NodeRef) -> &VertexPool {
    &self.pools[Self::subtree_of(r)]
  }

  #[inline]
  pub fn vertex(&self, r: NodeRef, id: VertexId) -> &Vertex {
    self.pool_of(r).get(id)
  }

  pub fn pooled_vertex_count(&self) -> usize {
    self.pools.iter().map(VertexPool::len).sum()
  }

  pub fn node_counts(&self) -> NodeCounts {
    let mut counts = NodeCounts::default();
    for node in self.levels.iter().flatten() {
      match node.kind {
        NodeKind::None => counts.empty += 1,
        NodeKind::Internal => counts.internal += 1,
        NodeKind::Leaf => counts.leaf += 1,
        NodeKind::Collapsed => counts.collapsed += 1,
      }
    }
    counts
  }

  /// Split into one mutable view per root octant.
  pub(crate) fn subtrees_mut(&mut self) -> Vec<SubtreeMut<'_>> {
    let depth = self.levels.len().saturating_sub(1);
    let mut subtrees: Vec<SubtreeMut<'_>> = self
      .pools
      .iter_mut()
      .enumerate()
      .map(|(octant, pool)| SubtreeMut {
        octant: octant as u8,
        levels: Vec::with_capacity(depth),
        pool,
      })
      .collect();

    for (level, nodes) in self.levels.iter_mut().enumerate().skip(1) {
      let per_subtree = 8usize.pow(level as u32 - 1);
      for (subtree, chunk) in subtrees.iter_mut().zip(nodes.chunks_mut(per_subtree)) {
        subtree.levels.push(chunk);
      }
    }
    subtrees
  }

  /// Count distinct vertices reachable from any node's list or any parent
  /// chain.
  pub fn reachable_vertex_count(&self) -> usize {
    let mut marks: Vec<Vec<bool>> = self.pools.iter().map(|p| vec![false; p.len()]).collect();
    let mut reachable = 0;

    for (level, nodes) in self.levels.iter().enumerate().skip(1) {
      for (index, node) in nodes.iter().enumerate() {
        let r = NodeRef {
          level: level as u8,
          index: index as u32,
        };
        let subtree = Self::subtree_of(r);
        let pool = &self.pools[subtree];
        let seen = &mut marks[subtree];
        for &id in &node.vertices {
          let mut cursor = Some(id);
          while let Some(v) = cursor {
            if seen[v.index()] {
              break;
            }
            seen[v.index()] = true;
            reachable += 1;
            cursor = pool.get(v).parent;
          }
        }
      }
    }
    reachable
  }

  /// Release the tree, reporting what was freed.
  ///
  /// Vertices are pool-owned, so each is dropped exactly once however many
  /// parent chains pass through it.
  #[tracing::instrument(skip_all, name = "octree::teardown")]
  pub fn teardown(self) -> TeardownReport {
    let report = TeardownReport {
      nodes_released: self.levels.iter().map(Vec::len).sum(),
      vertices_released: self.pooled_vertex_count(),
      reachable_vertices: self.reachable_vertex_count(),
    };
    if report.reachable_vertices != report.vertices_released {
      tracing::warn!(
        reachable = report.reachable_vertices,
        pooled = report.vertices_released,
        "unreachable vertices in pool"
      );
    }
    drop(self);
    tracing::debug!(
      nodes = report.nodes_released,
      vertices = report.vertices_released,
      "octree released"
    );
    report
  }
}

/// Mutable view of the subtree under one root octant.
///
/// Addresses are relative to the subtree: `NodeRef::ROOT` is the root
/// octant's node and level `l` here is tree level `l + 1`.
pub(crate) struct SubtreeMut<'a> {
  pub octant: u8,
  pub levels: Vec<&'a mut [OctreeNode]>,
  pub pool: &'a mut VertexPool,
}

impl NodeStore for SubtreeMut<'_> {
  #[inline]
  fn node(&self, r: NodeRef) -> &OctreeNode {
    &self.levels[r.level as usize][r.index as usize]
  }
}

impl SubtreeMut<'_> {
  #[inline]
  pub fn node_mut(&mut self, r: NodeRef) -> &mut OctreeNode {
    &mut self.levels[r.level as usize][r.index as usize]
  }
}
