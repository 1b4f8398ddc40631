//! Octree construction.
//!
//! Four phases, each parallel across the nodes of one level and sequential
//! across levels:
//!
//! 1. **Scaffold**: levels 1..depth get grid positions from their parent.
//! 2. **Sample**: the deepest level samples the field at its corners. Cells
//!    without a sign change are culled.
//! 3. **Classify**: levels depth-1..0 become `Internal` when any child
//!    survived, `None` otherwise.
//! 4. **Place**: once ambiguous faces are resolved (see
//!    [`super::ambiguity`]), every leaf gets one vertex per vertex group,
//!    placed by a QEF over that group's edge intersections.
//!
//! [`construct`] runs all four on one tree. Composite builds run the first
//! three per octree, resolve faces across all of them, then place.

use glam::Vec3;
use rayon::prelude::*;
use smallvec::SmallVec;

use super::ambiguity::{resolve_ambiguous_faces, LeafGrid};
use super::node::{NodeKind, OctreeNode};
use super::vertex::{Vertex, VertexId, VertexPool};
use super::Octree;
use crate::config::ContourConfig;
use crate::error::{try_reserve, Result};
use crate::qef::{QefData, QefSolution};
use crate::sampler::{gradient, ScalarField};
use crate::tables::{octant_offset, EDGE_CORNERS};
use crate::types::Aabb;

/// Build the octree for `field`. Expects a validated config.
#[tracing::instrument(skip_all, name = "octree::construct", fields(size = config.size))]
pub fn construct<F: ScalarField + ?Sized>(config: &ContourConfig, field: &F) -> Result<Octree> {
  let mut tree = sample(config, field)?;
  if let Some(grid) = LeafGrid::new(&mut tree) {
    resolve_ambiguous_faces(&mut [grid]);
  }
  place_vertices(&mut tree, field)?;

  let counts = tree.node_counts();
  tracing::debug!(
    levels = tree.level_count(),
    leaves = counts.leaf,
    internal = counts.internal,
    vertices = tree.pooled_vertex_count(),
    "octree constructed"
  );
  Ok(tree)
}

/// Scaffold, sample and classify. Leaves carry corners but no vertices, and
/// the tree has no pools yet.
pub(crate) fn sample<F: ScalarField + ?Sized>(config: &ContourConfig, field: &F) -> Result<Octree> {
  let level_count = config.level_count();

  let mut levels: Vec<Vec<OctreeNode>> = Vec::new();
  try_reserve(&mut levels, level_count, "octree levels")?;

  let mut root_level = alloc_level(1)?;
  root_level[0] = OctreeNode {
    position: config.origin,
    size: config.size,
    kind: NodeKind::Internal,
    ..Default::default()
  };
  levels.push(root_level);

  // A single unit cell has nothing to subdivide into.
  if level_count <= 1 {
    levels[0][0].kind = NodeKind::None;
    return Ok(Octree::from_parts(config.clone(), levels, Vec::new()));
  }

  {
    let _span = tracing::info_span!("scaffold").entered();
    for level in 1..level_count {
      let mut nodes = alloc_level(8usize.pow(level as u32))?;
      let parents = &levels[level - 1];
      let cell_size = config.cell_size(level);

      nodes.par_iter_mut().enumerate().for_each(|(i, node)| {
        let octant = (i & 7) as u8;
        node.position = parents[i >> 3].position + octant_offset(octant) * cell_size as i32;
        node.size = cell_size;
        node.child_index = octant;
        node.kind = NodeKind::Internal;
      });
      levels.push(nodes);
    }
  }

  let leaf_level = level_count - 1;
  {
    let _span = tracing::info_span!("sample").entered();
    levels[leaf_level]
      .par_iter_mut()
      .for_each(|node| sample_leaf(config, field, node));
  }

  {
    let _span = tracing::info_span!("classify").entered();
    for level in (0..leaf_level).rev() {
      let (upper, lower) = levels.split_at_mut(level + 1);
      let children = &lower[0];

      upper[level].par_iter_mut().enumerate().for_each(|(i, node)| {
        let child_mask = (0..8)
          .filter(|&j| children[i * 8 + j].kind != NodeKind::None)
          .fold(0u8, |mask, j| mask | (1 << j));
        node.child_mask = child_mask;
        node.kind = if child_mask != 0 {
          NodeKind::Internal
        } else {
          NodeKind::None
        };
      });
    }
  }

  Ok(Octree::from_parts(config.clone(), levels, Vec::new()))
}

fn alloc_level(count: usize) -> Result<Vec<OctreeNode>> {
  let mut nodes = Vec::new();
  try_reserve(&mut nodes, count, "octree nodes")?;
  nodes.resize_with(count, OctreeNode::default);
  Ok(nodes)
}

fn corner_positions(config: &ContourConfig, node: &OctreeNode) -> [Vec3; 8] {
  std::array::from_fn(|c| config.to_world(node.position + octant_offset(c as u8)))
}

/// Sample one leaf's corners and cull it when there is no sign change.
fn sample_leaf<F: ScalarField + ?Sized>(config: &ContourConfig, field: &F, node: &mut OctreeNode) {
  let corners = corner_positions(config, node)
    .iter()
    .enumerate()
    .fold(0u8, |mask, (i, &p)| if field.sample_at(p) < 0.0 { mask | (1 << i) } else { mask });
  node.corners = corners;
  node.kind = if corners == 0 || corners == 0xFF {
    NodeKind::None
  } else {
    NodeKind::Leaf
  };
}

/// Place the vertices of every sampled leaf and move them into one pool per
/// root octant.
#[tracing::instrument(skip_all, name = "octree::place")]
pub(crate) fn place_vertices<F: ScalarField + ?Sized>(tree: &mut Octree, field: &F) -> Result<()> {
  if tree.levels.len() <= 1 {
    return Ok(());
  }
  let config = &tree.config;
  let Some(leaves) = tree.levels.last_mut() else {
    return Ok(());
  };

  let built: Vec<(usize, SmallVec<[Vertex; 2]>)> = leaves
    .par_iter()
    .enumerate()
    .filter(|(_, node)| node.kind == NodeKind::Leaf)
    .map(|(i, node)| (i, leaf_vertices(config, field, node)))
    .collect();

  let per_pool = leaves.len() / 8;
  let mut pools: Vec<VertexPool> = (0..8).map(|_| VertexPool::new()).collect();
  for (i, vertices) in built {
    let pool = &mut pools[i / per_pool];
    let mut ids: SmallVec<[VertexId; 2]> = SmallVec::new();
    for vertex in vertices {
      ids.push(pool.push(vertex)?);
    }
    leaves[i].vertices = ids;
  }
  tree.pools = pools;
  Ok(())
}

/// One vertex per vertex group of a sampled leaf, under its face resolution.
fn leaf_vertices<F: ScalarField + ?Sized>(
  config: &ContourConfig,
  field: &F,
  node: &OctreeNode,
) -> SmallVec<[Vertex; 2]> {
  let corner_world = corner_positions(config, node);
  let samples: [f32; 8] = corner_world.map(|p| field.sample_at(p));

  let h = config.world_gradient_step();
  let cell = config.cell_bounds(node.position, node.size);

  node
    .vertex_groups()
    .masks()
    .iter()
    .map(|&eis| {
      let mut qef = QefData::new();
      let mut normal = Vec3::ZERO;

      for edge in (0..12).filter(|e| eis & (1 << e) != 0) {
        let [a, b] = EDGE_CORNERS[edge];
        let (sa, sb) = (samples[a as usize], samples[b as usize]);
        // Corners were classified from these same samples, so the signs
        // differ and the denominator is never zero.
        let t = sa / (sa - sb);
        let p = corner_world[a as usize].lerp(corner_world[b as usize], t);
        let n = gradient(field, p, h);
        qef.add(p, n);
        normal += n;
      }

      let normal = (normal / eis.count_ones() as f32).normalize_or_zero();
      let solution = place_vertex(&qef, config, &cell);
      Vertex::leaf(qef, solution.position, solution.error, normal, eis, node.child_index)
    })
    .collect()
}

/// Solve a vertex QEF, clamping into `cell` when configured.
pub(crate) fn place_vertex(qef: &QefData, config: &ContourConfig, cell: &Aabb) -> QefSolution {
  let solution = qef.solve(&config.solver);
  if !config.clamp_to_cell {
    return solution;
  }
  let position = cell.clamp(solution.position);
  QefSolution {
    position,
    error: qef.error(position),
  }
}

#[cfg(test)]
#[path = "construct_test.rs"]
mod construct_test;
