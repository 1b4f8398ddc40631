//! Bottom-up vertex clustering.
//!
//! Every internal node below the root merges the vertices of its children
//! into one vertex per connected surface patch:
//!
//! ```text
//!   children clustered first (post-order)
//!           │
//!           ▼
//!   walk the 12 internal faces and 6 internal edges of the node
//!   (same recursion as extraction); every minimal edge quad unions
//!   the chain roots of the vertices that share its edge
//!           │
//!           ▼
//!   untouched child vertices become singleton surfaces
//!           │
//!           ▼
//!   one parent vertex per surface: merged QEF, Euler characteristic,
//!   boundary edges, face test, collapsibility
//! ```
//!
//! The root is never clustered. The eight root octant subtrees own disjoint
//! node ranges and vertex pools, so they cluster in parallel.

use glam::Vec3;
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::config::ContourConfig;
use crate::error::Result;
use crate::octree::construct::place_vertex;
use crate::octree::{NodeKind, NodeRef, NodeStore, Octree, SubtreeMut, Vertex, VertexId, VertexPool};
use crate::qef::QefData;
use crate::tables::{
  CELL_PROC_EDGE, CELL_PROC_FACE, EDGE_PROC_EDGE, EXTERNAL_EDGE_MASKS, FACE_EDGE_MASKS,
  FACE_EDGE_ORDERS, FACE_PROC_EDGE, FACE_PROC_FACE, INTERNAL_EDGE_MASKS, PROCESS_EDGE,
};
use crate::types::Aabb;

type Quad = [Option<NodeRef>; 4];

/// Cluster every internal node below the root.
#[tracing::instrument(skip_all, name = "cluster::tree")]
pub fn cluster_tree(tree: &mut Octree) -> Result<()> {
  if !tree.root().kind.has_children() {
    return Ok(());
  }
  let config = tree.config().clone();
  let before = tree.pooled_vertex_count();

  tree
    .subtrees_mut()
    .into_par_iter()
    .try_for_each(|mut subtree| {
      let _span = tracing::debug_span!("subtree", octant = subtree.octant).entered();
      cluster_cell(&mut subtree, NodeRef::ROOT, &config)
    })?;

  tracing::debug!(
    leaf_vertices = before,
    clustered = tree.pooled_vertex_count() - before,
    "vertices clustered"
  );
  Ok(())
}

fn cluster_cell(subtree: &mut SubtreeMut<'_>, r: NodeRef, config: &ContourConfig) -> Result<()> {
  if subtree.node(r).kind != NodeKind::Internal {
    return Ok(());
  }

  for octant in 0..8 {
    if let Some(child) = subtree.child(r, octant) {
      cluster_cell(subtree, child, config)?;
    }
  }

  let corners = synthesize_corners(&*subtree, r);

  let surfaces = {
    let mut union = SurfaceUnion::new(&subtree.levels[..], &mut *subtree.pool);
    for &[c0, c1, dir] in &CELL_PROC_FACE {
      let pair = [union.child(r, c0), union.child(r, c1)];
      union.cluster_face(pair, dir as usize);
    }
    for row in &CELL_PROC_EDGE {
      let quad = std::array::from_fn(|i| union.child(r, row[i]));
      union.cluster_edge(quad, row[4] as usize);
    }
    union.tag_remaining(r);
    union.into_surfaces()
  };

  let node = subtree.node(r);
  let owner = Owner {
    in_cell: node.child_index,
    cell: config.cell_bounds(node.position, node.size),
  };

  let mut vertices: SmallVec<[VertexId; 2]> = SmallVec::new();
  let mut all_collapsible = true;
  for members in &surfaces {
    let id = merge_surface(subtree.pool, members, &owner, config)?;
    all_collapsible &= subtree.pool.get(id).collapsible;
    vertices.push(id);
  }

  let node = subtree.node_mut(r);
  node.corners = corners;
  if !vertices.is_empty() && all_collapsible {
    node.kind = NodeKind::Collapsed;
  }
  node.vertices = vertices;
  Ok(())
}

/// Corner signs of an internal node, taken from the matching corner of each
/// present child. A missing child is homogeneous, so its corner takes the
/// sign at the cell center, read from any present child.
fn synthesize_corners<S: NodeStore + ?Sized>(nodes: &S, r: NodeRef) -> u8 {
  let mut signs = [None; 8];
  let mut mid = false;

  for octant in 0..8u8 {
    if let Some(child) = nodes.child(r, octant) {
      let child = nodes.node(child);
      mid = child.corner_inside(7 - octant);
      signs[octant as usize] = Some(child.corner_inside(octant));
    }
  }

  signs
    .iter()
    .enumerate()
    .fold(0u8, |mask, (i, sign)| if sign.unwrap_or(mid) { mask | (1 << i) } else { mask })
}

/// Cell an internal node's new vertices belong to.
struct Owner {
  in_cell: u8,
  cell: Aabb,
}

/// Build the parent vertex of one surface and link its members to it.
fn merge_surface(
  pool: &mut VertexPool,
  members: &[VertexId],
  owner: &Owner,
  config: &ContourConfig,
) -> Result<VertexId> {
  let mut qef = QefData::new();
  let mut normal = Vec3::ZERO;
  let mut eis = 0u16;
  let mut euler = 0i32;
  let mut internal_crossings = 0i32;

  for &id in members {
    let v = pool.get(id);
    qef.merge(&v.qef);
    normal += v.normal;
    eis |= v.eis & EXTERNAL_EDGE_MASKS[v.in_cell as usize];
    euler += v.euler;
    internal_crossings += (v.eis & INTERNAL_EDGE_MASKS[v.in_cell as usize]).count_ones() as i32;
  }

  let solution = place_vertex(&qef, config, &owner.cell);
  let face_prop2 = FACE_EDGE_MASKS
    .iter()
    .all(|&face| matches!((eis & face).count_ones(), 0 | 2));

  let parent = pool.push(Vertex {
    parent: None,
    index: None,
    collapsible: config.admits(solution.error),
    qef,
    position: solution.position,
    normal: (normal / members.len() as f32).normalize_or_zero(),
    error: solution.error,
    euler: euler - internal_crossings / 4,
    eis,
    in_cell: owner.in_cell,
    face_prop2,
    surface_index: None,
  })?;

  for &id in members {
    pool.get_mut(id).parent = Some(parent);
  }
  Ok(parent)
}

/// Union-find over the chain roots touched while clustering one node.
///
/// Surfaces are tagged through `Vertex::surface_index`; every tagged vertex
/// is also recorded so tags can be relabelled and cleared afterwards.
struct SurfaceUnion<'a, S: NodeStore + ?Sized> {
  nodes: &'a S,
  pool: &'a mut VertexPool,
  tagged: Vec<VertexId>,
  next: u32,
}

impl<'a, S: NodeStore + ?Sized> SurfaceUnion<'a, S> {
  fn new(nodes: &'a S, pool: &'a mut VertexPool) -> Self {
    Self {
      nodes,
      pool,
      tagged: Vec::new(),
      next: 0,
    }
  }

  #[inline]
  fn child(&self, r: NodeRef, octant: u8) -> Option<NodeRef> {
    self.nodes.child(r, octant)
  }

  fn cluster_face(&mut self, pair: [Option<NodeRef>; 2], dir: usize) {
    let [Some(n0), Some(n1)] = pair else {
      return;
    };

    let nodes = self.nodes;
    if !(nodes.node(n0).kind.is_leaf() && nodes.node(n1).kind.is_leaf()) {
      for &[c0, c1, sub_dir] in &FACE_PROC_FACE[dir] {
        let sub = [nodes.descend(n0, c0), nodes.descend(n1, c1)];
        self.cluster_face(sub, sub_dir as usize);
      }
    }

    let face = [n0, n1];
    for row in &FACE_PROC_EDGE[dir] {
      let order = FACE_EDGE_ORDERS[row[0] as usize];
      let quad = std::array::from_fn(|j| nodes.descend(face[order[j] as usize], row[1 + j]));
      self.cluster_edge(quad, row[5] as usize);
    }
  }

  fn cluster_edge(&mut self, quad: Quad, dir: usize) {
    let nodes = self.nodes;
    let minimal = quad.iter().flatten().all(|&r| !nodes.node(r).kind.has_children());
    if minimal {
      self.union_edge(quad, dir);
      return;
    }

    for row in &EDGE_PROC_EDGE[dir] {
      let sub = std::array::from_fn(|j| quad[j].and_then(|r| nodes.descend(r, row[j])));
      self.cluster_edge(sub, row[4] as usize);
    }
  }

  /// Join the surfaces of every vertex meeting at a minimal edge.
  fn union_edge(&mut self, quad: Quad, dir: usize) {
    let nodes = self.nodes;
    let mut roots: SmallVec<[VertexId; 4]> = SmallVec::new();
    for (slot, r) in quad.iter().enumerate() {
      let Some(r) = *r else { continue };
      let node = nodes.node(r);
      let Some(group) = node.vertex_groups().group_of(PROCESS_EDGE[dir][slot]) else {
        continue;
      };
      let Some(&id) = node.vertices.get(group) else {
        continue;
      };
      roots.push(self.pool.chain_root(id));
    }
    if roots.is_empty() {
      return;
    }

    let mut surface = None;
    for &v in &roots {
      let Some(tag) = self.pool.get(v).surface_index else {
        continue;
      };
      match surface {
        None => surface = Some(tag),
        Some(current) if current != tag => self.relabel(tag, current),
        Some(_) => {}
      }
    }

    let surface = surface.unwrap_or_else(|| self.fresh());
    for v in roots {
      let vertex = self.pool.get_mut(v);
      if vertex.surface_index.is_none() {
        self.tagged.push(v);
      }
      vertex.surface_index = Some(surface);
    }
  }

  fn relabel(&mut self, from: u32, to: u32) {
    for &v in &self.tagged {
      let vertex = self.pool.get_mut(v);
      if vertex.surface_index == Some(from) {
        vertex.surface_index = Some(to);
      }
    }
  }

  fn fresh(&mut self) -> u32 {
    let surface = self.next;
    self.next += 1;
    surface
  }

  /// Child vertices no edge reached each form their own surface.
  fn tag_remaining(&mut self, r: NodeRef) {
    let nodes = self.nodes;
    for octant in 0..8 {
      let Some(child) = nodes.child(r, octant) else {
        continue;
      };
      for &id in &nodes.node(child).vertices {
        if self.pool.get(id).surface_index.is_none() {
          let surface = self.fresh();
          self.pool.get_mut(id).surface_index = Some(surface);
          self.tagged.push(id);
        }
      }
    }
  }

  /// Members of each non-empty surface, in surface order. Clears every tag.
  fn into_surfaces(self) -> Vec<SmallVec<[VertexId; 8]>> {
    let mut surfaces: Vec<SmallVec<[VertexId; 8]>> = vec![SmallVec::new(); self.next as usize];
    for &v in &self.tagged {
      let vertex = self.pool.get_mut(v);
      if let Some(surface) = vertex.surface_index.take() {
        surfaces[surface as usize].push(v);
      }
    }
    surfaces.retain(|members| !members.is_empty());
    surfaces
  }
}

#[cfg(test)]
#[path = "cluster_test.rs"]
mod cluster_test;
