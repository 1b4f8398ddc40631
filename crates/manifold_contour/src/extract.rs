//! Mesh extraction: vertex buffer and triangle indices.
//!
//! The vertex buffer holds every pooled vertex, leaves and clustered
//! ancestors alike, in post-order (children before their parent). Each
//! vertex records its buffer slot in `Vertex::index`.
//!
//! Indices come from the dual walk: every minimal edge shared by four
//! leaves with a sign change emits one quad. Each leaf contributes the
//! highest ancestor of its vertex that is simplifiable, so collapsed
//! regions reuse one vertex and their inner quads degenerate away.
//!
//! ```text
//!   process_cell ─┬─► process_cell (children)
//!                 ├─► process_face ×12 ─┬─► process_face ×4
//!                 │                     └─► process_edge ×4
//!                 └─► process_edge ×6 ──► process_edge ×2 ──► quad
//! ```
//!
//! The walk only needs node access, so it runs over anything implementing
//! [`DualTree`]: a single [`Octree`], or several octrees mounted under a
//! shared root (see [`crate::composite`]). Across a mount seam the cells of
//! a quad can differ in world size. The smallest one decides whether the
//! edge crosses the surface, and a larger cell that does not see the
//! crossing on its own edge contributes its vertex nearest to the edge.

use glam::Vec3;
use rayon::prelude::*;

use crate::config::ContourConfig;
use crate::error::{try_grow, try_reserve, Result};
use crate::octree::{NodeRef, NodeStore, Octree, OctreeNode, VertexPool};
use crate::tables::{
  octant_offset, CELL_PROC_EDGE, CELL_PROC_FACE, EDGE_CORNERS, EDGE_PROC_EDGE, FACE_EDGE_ORDERS,
  FACE_PROC_EDGE, FACE_PROC_FACE, PROCESS_EDGE,
};
use crate::types::MeshVertex;

/// Node access for the dual walk.
pub(crate) trait DualTree: Sync {
  type Ref: Copy + Send;

  fn cell(&self, r: Self::Ref) -> &OctreeNode;

  fn cell_child(&self, r: Self::Ref, octant: u8) -> Option<Self::Ref>;

  /// Config of the octree `r` belongs to.
  fn cell_config(&self, r: Self::Ref) -> &ContourConfig;

  /// Pool holding the vertices of `r`.
  fn cell_pool(&self, r: Self::Ref) -> &VertexPool;

  /// Child at `octant` for nodes with children; leaves stand in for
  /// themselves.
  #[inline]
  fn cell_descend(&self, r: Self::Ref, octant: u8) -> Option<Self::Ref> {
    if self.cell(r).kind.has_children() {
      self.cell_child(r, octant)
    } else {
      Some(r)
    }
  }

  /// Edge length of `r` in world units.
  #[inline]
  fn world_size(&self, r: Self::Ref) -> u32 {
    self.cell(r).size * self.cell_config(r).scale as u32
  }

  /// World midpoint of edge `edge` of `r`.
  fn edge_midpoint(&self, r: Self::Ref, edge: u8) -> Vec3 {
    let node = self.cell(r);
    let config = self.cell_config(r);
    let [c1, c2] = EDGE_CORNERS[edge as usize];
    let corner = |c: u8| config.to_world(node.position + octant_offset(c) * node.size as i32);
    (corner(c1) + corner(c2)) * 0.5
  }
}

impl DualTree for Octree {
  type Ref = NodeRef;

  #[inline]
  fn cell(&self, r: NodeRef) -> &OctreeNode {
    self.node(r)
  }

  #[inline]
  fn cell_child(&self, r: NodeRef, octant: u8) -> Option<NodeRef> {
    self.child(r, octant)
  }

  #[inline]
  fn cell_config(&self, _r: NodeRef) -> &ContourConfig {
    self.config()
  }

  #[inline]
  fn cell_pool(&self, r: NodeRef) -> &VertexPool {
    self.pool_of(r)
  }
}

/// Write every pooled vertex into one buffer and record its slot.
#[tracing::instrument(skip_all, name = "extract::vertices")]
pub fn generate_vertex_buffer(tree: &mut Octree) -> Result<Vec<MeshVertex>> {
  if !tree.root().kind.has_children() {
    return Ok(Vec::new());
  }

  let chunks: Vec<Vec<MeshVertex>> = tree
    .subtrees_mut()
    .into_par_iter()
    .map(|subtree| -> Result<Vec<MeshVertex>> {
      let mut out = Vec::new();
      try_reserve(&mut out, subtree.pool.len(), "output vertices")?;
      emit_post_order(&subtree.levels[..], subtree.pool, NodeRef::ROOT, &mut out);
      Ok(out)
    })
    .collect::<Result<_>>()?;

  let offsets: Vec<u32> = chunks
    .iter()
    .scan(0u32, |offset, chunk| {
      let start = *offset;
      *offset += chunk.len() as u32;
      Some(start)
    })
    .collect();

  tree
    .pools_mut()
    .par_iter_mut()
    .zip(offsets.par_iter())
    .for_each(|(pool, &offset)| {
      for vertex in pool.iter_mut() {
        vertex.index = vertex.index.map(|local| local + offset);
      }
    });

  let total = chunks.iter().map(Vec::len).sum();
  let mut vertices = Vec::new();
  try_reserve(&mut vertices, total, "output vertices")?;
  for chunk in chunks {
    vertices.extend(chunk);
  }
  Ok(vertices)
}

fn emit_post_order<S: NodeStore + ?Sized>(
  nodes: &S,
  pool: &mut VertexPool,
  r: NodeRef,
  out: &mut Vec<MeshVertex>,
) {
  let node = nodes.node(r);
  if node.kind.has_children() {
    for octant in 0..8 {
      if let Some(child) = nodes.child(r, octant) {
        emit_post_order(nodes, pool, child, out);
      }
    }
  }

  for &id in &node.vertices {
    let vertex = pool.get_mut(id);
    vertex.index = Some(out.len() as u32);
    out.push(MeshVertex::new(vertex.position, vertex.normal));
  }
}

/// Triangle indices for a tree whose vertex buffer has been generated.
#[tracing::instrument(skip_all, name = "extract::indices")]
pub fn generate_indices(tree: &Octree) -> Result<Vec<u32>> {
  if !tree.root().kind.has_children() {
    return Ok(Vec::new());
  }

  let mut walks: Vec<IndexWalk<'_, Octree>> = (0..8u8)
    .into_par_iter()
    .map(|octant| -> Result<IndexWalk<'_, Octree>> {
      let mut walk = IndexWalk::new(tree);
      if let Some(child) = tree.child(NodeRef::ROOT, octant) {
        walk.process_cell(child)?;
      }
      Ok(walk)
    })
    .collect::<Result<_>>()?;

  // Faces and edges between the root's children.
  let mut seams = IndexWalk::new(tree);
  seams.cell_interior(NodeRef::ROOT)?;
  walks.push(seams);

  concat_walks(walks)
}

/// Indices from the faces and edges between the children of `r` only.
pub(crate) fn seam_indices<T: DualTree>(tree: &T, r: T::Ref) -> Result<Vec<u32>> {
  let mut walk = IndexWalk::new(tree);
  walk.cell_interior(r)?;
  concat_walks(vec![walk])
}

fn concat_walks<T: DualTree>(walks: Vec<IndexWalk<'_, T>>) -> Result<Vec<u32>> {
  let skipped: usize = walks.iter().map(|w| w.skipped).sum();
  if skipped > 0 {
    tracing::debug!(skipped, "edge units without a matching vertex");
  }

  let total = walks.iter().map(|w| w.indices.len()).sum();
  let mut indices = Vec::new();
  try_reserve(&mut indices, total, "triangle indices")?;
  for walk in walks {
    indices.extend(walk.indices);
  }
  Ok(indices)
}

/// One sequential dual walk collecting indices.
struct IndexWalk<'a, T: DualTree> {
  tree: &'a T,
  indices: Vec<u32>,
  /// Edge units dropped because a leaf had no vertex for its edge group.
  skipped: usize,
}

impl<'a, T: DualTree> IndexWalk<'a, T> {
  fn new(tree: &'a T) -> Self {
    Self {
      tree,
      indices: Vec::new(),
      skipped: 0,
    }
  }

  fn process_cell(&mut self, r: T::Ref) -> Result<()> {
    if !self.tree.cell(r).kind.has_children() {
      return Ok(());
    }
    for octant in 0..8 {
      if let Some(child) = self.tree.cell_child(r, octant) {
        self.process_cell(child)?;
      }
    }
    self.cell_interior(r)
  }

  fn cell_interior(&mut self, r: T::Ref) -> Result<()> {
    let tree = self.tree;
    for &[c0, c1, dir] in &CELL_PROC_FACE {
      self.process_face([tree.cell_child(r, c0), tree.cell_child(r, c1)], dir as usize)?;
    }
    for row in &CELL_PROC_EDGE {
      let quad = std::array::from_fn(|i| tree.cell_child(r, row[i]));
      self.process_edge(quad, row[4] as usize)?;
    }
    Ok(())
  }

  fn process_face(&mut self, pair: [Option<T::Ref>; 2], dir: usize) -> Result<()> {
    let tree = self.tree;
    let [Some(n0), Some(n1)] = pair else {
      return Ok(());
    };
    if tree.cell(n0).kind.is_leaf() && tree.cell(n1).kind.is_leaf() {
      return Ok(());
    }

    for &[c0, c1, sub_dir] in &FACE_PROC_FACE[dir] {
      self.process_face([tree.cell_descend(n0, c0), tree.cell_descend(n1, c1)], sub_dir as usize)?;
    }

    let face = [n0, n1];
    for row in &FACE_PROC_EDGE[dir] {
      let order = FACE_EDGE_ORDERS[row[0] as usize];
      let quad = std::array::from_fn(|j| tree.cell_descend(face[order[j] as usize], row[1 + j]));
      self.process_edge(quad, row[5] as usize)?;
    }
    Ok(())
  }

  fn process_edge(&mut self, quad: [Option<T::Ref>; 4], dir: usize) -> Result<()> {
    let tree = self.tree;
    let [Some(a), Some(b), Some(c), Some(d)] = quad else {
      return Ok(());
    };
    let quad = [a, b, c, d];

    if quad.iter().all(|&r| tree.cell(r).kind.is_leaf()) {
      return self.process_indexes(quad, dir);
    }

    for row in &EDGE_PROC_EDGE[dir] {
      let sub = std::array::from_fn(|j| tree.cell_descend(quad[j], row[j]));
      self.process_edge(sub, row[4] as usize)?;
    }
    Ok(())
  }

  /// Emit the quad around one minimal edge.
  fn process_indexes(&mut self, quad: [T::Ref; 4], dir: usize) -> Result<()> {
    let tree = self.tree;

    // The smallest cell sees the edge at full resolution.
    let sizes = quad.map(|r| tree.world_size(r));
    let Some(min_slot) = (0..4).min_by_key(|&slot| sizes[slot]) else {
      return Ok(());
    };
    let min_edge = PROCESS_EDGE[dir][min_slot];
    let min_node = tree.cell(quad[min_slot]);
    let [c1, c2] = EDGE_CORNERS[min_edge as usize];
    let flip = min_node.corner_inside(c1);
    if flip == min_node.corner_inside(c2) {
      return Ok(());
    }

    let mut slots: [Option<u32>; 4] = [None; 4];
    for (slot, &r) in quad.iter().enumerate() {
      let node = tree.cell(r);
      let pool = tree.cell_pool(r);
      let edge = PROCESS_EDGE[dir][slot];

      let group = match node.vertex_groups().group_of(edge) {
        Some(group) => group,
        None if sizes[slot] > sizes[min_slot] => {
          let target = tree.edge_midpoint(quad[min_slot], min_edge);
          let Some(group) = nearest_vertex(node, pool, target) else {
            continue;
          };
          group
        }
        None => continue,
      };
      let Some(&id) = node.vertices.get(group) else {
        tracing::trace!(group, "vertex group without a vertex");
        self.skipped += 1;
        return Ok(());
      };

      let config = tree.cell_config(r);
      let chosen = pool
        .ancestors(id)
        .filter(|&a| {
          let ancestor = pool.get(a);
          config.admits(ancestor.error) && ancestor.euler == 1 && ancestor.face_prop2
        })
        .last()
        .unwrap_or(id);
      slots[slot] = pool.get(chosen).index;
    }

    let triangles: [[usize; 3]; 2] = if flip {
      [[0, 3, 1], [0, 2, 3]]
    } else {
      [[0, 1, 3], [0, 3, 2]]
    };
    for tri in triangles {
      let [Some(a), Some(b), Some(c)] = tri.map(|k| slots[k]) else {
        continue;
      };
      if a != b && b != c && a != c {
        try_grow(&mut self.indices, 3, "triangle indices")?;
        self.indices.extend([a, b, c]);
      }
    }
    Ok(())
  }
}

/// Slot in `node.vertices` of the vertex closest to `target`.
fn nearest_vertex(node: &OctreeNode, pool: &VertexPool, target: Vec3) -> Option<usize> {
  node
    .vertices
    .iter()
    .enumerate()
    .min_by(|a, b| {
      let da = pool.get(*a.1).position.distance_squared(target);
      let db = pool.get(*b.1).position.distance_squared(target);
      da.total_cmp(&db)
    })
    .map(|(slot, _)| slot)
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod extract_test;
