//! Ambiguous face resolution between neighbouring leaves.
//!
//! A face with four crossing edges can be split two ways. Each leaf picks
//! one on its own, and when the pick makes a single vertex group cross the
//! face twice on *both* sides, the dual triangles around that face share an
//! edge four times. Exactly one of the two resolutions crosses twice, so
//! toggling the face on both leaves clears it. A toggle can change how the
//! leaf's other faces are crossed, so the pass repeats until nothing moves.
//!
//! ```text
//!   leaf A          leaf B
//!   ┌─────┐┌─────┐
//!   │  ╭──┼┼──╮  │     one group per side spans the shared face:
//!   │  │  ││  │  │     four triangles meet on each crossing edge
//!   │  ╰──┼┼──╯  │
//!   └─────┘└─────┘
//! ```
//!
//! Neighbours are found by world position, so the same pass runs across
//! the leaves of several octrees as long as their leaves are the same size.

use glam::IVec3;
use rayon::prelude::*;

use super::node::{NodeKind, OctreeNode};
use super::Octree;
use crate::config::ContourConfig;
use crate::tables::AMBIGUOUS_FACES;

/// Upper bound on repair passes. Real fields settle in one or two.
pub const MAX_RESOLVE_PASSES: usize = 8;

/// Leaf level of one octree, addressed by world position.
pub(crate) struct LeafGrid<'a> {
  config: &'a ContourConfig,
  depth: u32,
  leaves: &'a mut [OctreeNode],
}

impl<'a> LeafGrid<'a> {
  /// Leaf view of `tree`, or `None` for a single-cell tree.
  pub fn new(tree: &'a mut Octree) -> Option<Self> {
    let depth = tree.levels.len().checked_sub(1).filter(|&d| d > 0)?;
    let leaves = tree.levels.last_mut()?;
    Some(Self {
      config: &tree.config,
      depth: depth as u32,
      leaves: leaves.as_mut_slice(),
    })
  }

  /// Leaf edge length in world units.
  #[inline]
  fn leaf_extent(&self) -> i32 {
    self.config.scale
  }

  /// Slot of the leaf whose min corner is at `world`.
  fn index_of(&self, world: IVec3) -> Option<usize> {
    let grid = self.config.to_grid(world)?;
    if !self.config.contains_cell(grid) {
      return None;
    }
    let rel = (grid - self.config.origin).as_uvec3();
    let index = (1..=self.depth).fold(0usize, |index, level| {
      let shift = self.depth - level;
      let octant = ((rel.x >> shift) & 1) | ((rel.y >> shift) & 1) << 1 | ((rel.z >> shift) & 1) << 2;
      index * 8 + octant as usize
    });
    Some(index)
  }
}

/// Leaves that have at least one ambiguous face, as `(grid, slot)`.
fn ambiguous_leaves(grids: &[LeafGrid<'_>]) -> Vec<(usize, usize)> {
  grids
    .iter()
    .enumerate()
    .flat_map(|(g, grid)| {
      grid
        .leaves
        .par_iter()
        .enumerate()
        .filter(|(_, leaf)| leaf.kind == NodeKind::Leaf && AMBIGUOUS_FACES[leaf.corners as usize] != 0)
        .map(|(i, _)| (g, i))
        .collect::<Vec<_>>()
    })
    .collect()
}

/// Leaf of matching size whose min corner is at `world`, in any grid.
fn find_leaf(grids: &[LeafGrid<'_>], world: IVec3, extent: i32) -> Option<(usize, usize)> {
  grids
    .iter()
    .enumerate()
    .filter(|(_, grid)| grid.leaf_extent() == extent)
    .find_map(|(g, grid)| grid.index_of(world).map(|i| (g, i)))
    .filter(|&(g, i)| grids[g].leaves[i].kind == NodeKind::Leaf)
}

/// Flip ambiguous faces until no two neighbouring leaves both cross their
/// shared face twice. Returns the number of faces toggled.
///
/// Expects sampled leaves (corners and kinds set) and runs before any
/// vertex is placed.
#[tracing::instrument(skip_all, name = "octree::resolve_faces", fields(grids = grids.len()))]
pub(crate) fn resolve_ambiguous_faces(grids: &mut [LeafGrid<'_>]) -> usize {
  let candidates = ambiguous_leaves(grids);
  if candidates.is_empty() {
    return 0;
  }

  let mut toggled = 0;
  for pass in 0..MAX_RESOLVE_PASSES {
    let mut changed = 0;

    for &(g, i) in &candidates {
      // Each shared face is visited once, from the leaf on its low side.
      for face in [1usize, 3, 5] {
        let leaf = &grids[g].leaves[i];
        if (AMBIGUOUS_FACES[leaf.corners as usize] >> face) & 1 == 0 {
          continue;
        }
        if !leaf.vertex_groups().crosses_face_twice(face) {
          continue;
        }

        let extent = grids[g].leaf_extent();
        let step = IVec3::AXES[face / 2] * extent;
        let world = grids[g].config.to_world_grid(leaf.position) + step;
        let Some((ng, ni)) = find_leaf(grids, world, extent) else {
          continue;
        };
        if !grids[ng].leaves[ni].vertex_groups().crosses_face_twice(face ^ 1) {
          continue;
        }

        grids[g].leaves[i].face_flips ^= 1 << face;
        grids[ng].leaves[ni].face_flips ^= 1 << (face ^ 1);
        changed += 1;
      }
    }

    toggled += changed;
    if changed == 0 {
      tracing::trace!(passes = pass, toggled, "ambiguous faces resolved");
      return toggled;
    }
  }

  tracing::debug!(
    passes = MAX_RESOLVE_PASSES,
    toggled,
    candidates = candidates.len(),
    "ambiguous faces still conflicting after last pass"
  );
  toggled
}

#[cfg(test)]
#[path = "ambiguity_test.rs"]
mod ambiguity_test;
