//! Topology tables for manifold dual contouring.
//!
//! Every table here is immutable data. The cell/face/edge recursions in
//! [`crate::cluster`] and [`crate::extract`] are driven entirely by them, so
//! both passes walk the octree in exactly the same order.
//!
//! # Cube Topology
//!
//! ```text
//!       6──────7         Corners / octants (binary ZYX):
//!      /│     /│           0=(0,0,0)  1=(1,0,0)  2=(0,1,0)  3=(1,1,0)
//!     4─┼────5 │           4=(0,0,1)  5=(1,0,1)  6=(0,1,1)  7=(1,1,1)
//!     │ 2────┼─3
//!     │/     │/          +Y
//!     0──────1            │  +Z
//!                         │ /
//!                         └───+X
//! ```
//!
//! # Edge Layout
//!
//! ```text
//! X-axis edges:  0=[0,1]  5=[2,3]  8=[4,5]  11=[6,7]
//! Y-axis edges:  1=[0,2]  3=[1,3]  9=[4,6]  10=[5,7]
//! Z-axis edges:  2=[0,4]  4=[1,5]  6=[2,6]   7=[3,7]
//! ```
//!
//! # Quad Ordering
//!
//! Four cells sharing an edge along axis `d` are ordered by their offsets on
//! the two remaining axes `a = (d + 1) % 3` (high bit) and `b = (d + 2) % 3`
//! (low bit). Cell `i` sits at `(i >> 1, i & 1)` on `(a, b)`, so the shared
//! edge is the cell's own edge at `(1 - (i >> 1), 1 - (i & 1))`.
//!
//! ```text
//!   b ▲
//!     │  1 │ 3
//!     │ ───●───    ● = shared edge, pointing along d
//!     │  0 │ 2
//!     └────────▶ a
//! ```

use glam::IVec3;

/// Edge endpoint corner indices (lower corner first).
pub const EDGE_CORNERS: [[u8; 2]; 12] = [
  [0, 1], // Edge 0:  X axis at Y=0, Z=0
  [0, 2], // Edge 1:  Y axis at X=0, Z=0
  [0, 4], // Edge 2:  Z axis at X=0, Y=0
  [1, 3], // Edge 3:  Y axis at X=1, Z=0
  [1, 5], // Edge 4:  Z axis at X=1, Y=0
  [2, 3], // Edge 5:  X axis at Y=1, Z=0
  [2, 6], // Edge 6:  Z axis at X=0, Y=1
  [3, 7], // Edge 7:  Z axis at X=1, Y=1
  [4, 5], // Edge 8:  X axis at Y=0, Z=1
  [4, 6], // Edge 9:  Y axis at X=0, Z=1
  [5, 7], // Edge 10: Y axis at X=1, Z=1
  [6, 7], // Edge 11: X axis at Y=1, Z=1
];

/// Edges of each cube face, ordered -X, +X, -Y, +Y, -Z, +Z.
pub const FACE_EDGES: [[u8; 4]; 6] = [
  [1, 2, 6, 9],
  [3, 4, 7, 10],
  [0, 2, 4, 8],
  [5, 6, 7, 11],
  [0, 1, 3, 5],
  [8, 9, 10, 11],
];

/// Corner mask -> 12-bit mask of edges with a sign change.
pub const EDGE_TABLE: [u16; 256] = generate_edge_table();

/// Bitmask form of [`FACE_EDGES`].
pub const FACE_EDGE_MASKS: [u16; 6] = generate_face_edge_masks();

/// Octant -> edges of the parent cube that the child at that octant touches.
///
/// A child's edge `e` lies on the parent's edge `e` exactly when the edge is
/// incident to the child's own octant corner.
pub const EXTERNAL_EDGE_MASKS: [u16; 8] = generate_external_edge_masks();

/// Octant -> edges of the child cube that lie inside the parent cube.
pub const INTERNAL_EDGE_MASKS: [u16; 8] = generate_internal_edge_masks();

/// Face pairs inside a cell: `[child0, child1, axis]`, child1 on the +axis side.
pub const CELL_PROC_FACE: [[u8; 3]; 12] = [
  [0, 1, 0],
  [4, 5, 0],
  [2, 3, 0],
  [6, 7, 0],
  [0, 2, 1],
  [1, 3, 1],
  [4, 6, 1],
  [5, 7, 1],
  [0, 4, 2],
  [2, 6, 2],
  [1, 5, 2],
  [3, 7, 2],
];

/// Edge quads inside a cell: `[c0, c1, c2, c3, axis]` in quad order.
pub const CELL_PROC_EDGE: [[u8; 5]; 6] = [
  [0, 4, 2, 6, 0],
  [1, 5, 3, 7, 0],
  [0, 1, 4, 5, 1],
  [2, 3, 6, 7, 1],
  [0, 2, 1, 3, 2],
  [4, 6, 5, 7, 2],
];

/// Sub-faces of a face along `axis`: `[child of node0, child of node1, axis]`.
pub const FACE_PROC_FACE: [[[u8; 3]; 4]; 3] = [
  [[1, 0, 0], [5, 4, 0], [3, 2, 0], [7, 6, 0]],
  [[2, 0, 1], [3, 1, 1], [6, 4, 1], [7, 5, 1]],
  [[4, 0, 2], [6, 2, 2], [5, 1, 2], [7, 3, 2]],
];

/// Edge quads lying in a face along `axis`:
/// `[order, c0, c1, c2, c3, edge_axis]`. `order` picks a row of
/// [`FACE_EDGE_ORDERS`] that says which of the two face nodes each quad
/// slot descends from.
pub const FACE_PROC_EDGE: [[[u8; 6]; 4]; 3] = [
  [[1, 1, 0, 5, 4, 1], [1, 3, 2, 7, 6, 1], [0, 1, 3, 0, 2, 2], [0, 5, 7, 4, 6, 2]],
  [[1, 2, 0, 3, 1, 2], [1, 6, 4, 7, 5, 2], [0, 2, 6, 0, 4, 0], [0, 3, 7, 1, 5, 0]],
  [[1, 4, 0, 6, 2, 0], [1, 5, 1, 7, 3, 0], [0, 4, 5, 0, 1, 1], [0, 6, 7, 2, 3, 1]],
];

/// Face node feeding each quad slot, indexed by the `order` of a
/// [`FACE_PROC_EDGE`] row.
pub const FACE_EDGE_ORDERS: [[u8; 4]; 2] = [[0, 0, 1, 1], [0, 1, 0, 1]];

/// Sub-quads of an edge quad along `axis`: `[c0, c1, c2, c3, axis]`, one per
/// half of the edge.
pub const EDGE_PROC_EDGE: [[[u8; 5]; 2]; 3] = [
  [[6, 2, 4, 0, 0], [7, 3, 5, 1, 0]],
  [[5, 4, 1, 0, 1], [7, 6, 3, 2, 1]],
  [[3, 1, 2, 0, 2], [7, 5, 6, 4, 2]],
];

/// The shared edge, in each quad slot's own edge numbering.
pub const PROCESS_EDGE: [[u8; 4]; 3] = [[11, 5, 8, 0], [10, 9, 3, 1], [7, 4, 6, 2]];

/// Upper bound on vertex groups in one cell (reached by the four-corner
/// checkerboard configurations).
pub const MAX_VERTEX_GROUPS: usize = 4;

/// Crossing edges of one corner configuration, partitioned into groups that
/// each become one vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexGroups {
  /// Number of populated entries in `masks`.
  pub count: u8,
  /// 12-bit edge masks, ordered by their lowest edge.
  pub masks: [u16; MAX_VERTEX_GROUPS],
}

impl VertexGroups {
  const EMPTY: Self = Self {
    count: 0,
    masks: [0; MAX_VERTEX_GROUPS],
  };

  /// Group masks in vertex order.
  #[inline]
  pub fn masks(&self) -> &[u16] {
    &self.masks[..self.count as usize]
  }

  /// Index of the group containing `edge`, if that edge crosses the surface.
  #[inline]
  pub fn group_of(&self, edge: u8) -> Option<usize> {
    let bit = 1u16 << edge;
    self.masks().iter().position(|mask| mask & bit != 0)
  }

  /// True when a single group owns all four crossings of `face`.
  ///
  /// Only possible on an ambiguous face. Two neighbouring cells that both
  /// do this on their shared face produce a non-manifold edge there.
  #[inline]
  pub fn crosses_face_twice(&self, face: usize) -> bool {
    let face_mask = FACE_EDGE_MASKS[face];
    self.masks().iter().any(|mask| (mask & face_mask).count_ones() > 2)
  }
}

/// Corner mask -> vertex groups, with every ambiguous face in its default
/// resolution.
///
/// Two crossing edges share a vertex when they bound the same surface patch
/// on some face. A face with two crossings links them. An ambiguous face
/// (four crossings) links the pair around each inside corner, so the inside
/// corners are cut off separately on that face and the outside region
/// stays connected across it.
pub const VERTEX_GROUPS: [VertexGroups; 256] = generate_vertex_groups();

/// Corner mask -> 6-bit mask of ambiguous faces (four crossing edges).
pub const AMBIGUOUS_FACES: [u8; 256] = generate_ambiguous_faces();

/// Vertex groups for `corners` with the faces in `flips` resolved the other
/// way round, linking the pairs around the outside corners instead.
///
/// Flip bits on faces that are not ambiguous have no effect.
#[inline]
pub fn vertex_groups(corners: u8, flips: u8) -> VertexGroups {
  let flips = flips & AMBIGUOUS_FACES[corners as usize];
  if flips == 0 {
    VERTEX_GROUPS[corners as usize]
  } else {
    vertex_groups_for(corners as usize, flips)
  }
}

/// Grid offset of an octant (or corner) inside a unit cube.
#[inline]
pub fn octant_offset(octant: u8) -> IVec3 {
  IVec3::new(
    (octant & 1) as i32,
    ((octant >> 1) & 1) as i32,
    ((octant >> 2) & 1) as i32,
  )
}

/// Axis an edge runs along (0 = X, 1 = Y, 2 = Z).
#[inline]
pub const fn edge_axis(edge: usize) -> usize {
  let delta = EDGE_CORNERS[edge][0] ^ EDGE_CORNERS[edge][1];
  (delta >> 1) as usize
}

const fn generate_edge_table() -> [u16; 256] {
  let mut table = [0u16; 256];
  let mut corner_mask = 0usize;

  while corner_mask < 256 {
    let mut edge_mask = 0u16;
    let mut edge = 0;

    while edge < 12 {
      let c0 = EDGE_CORNERS[edge][0] as usize;
      let c1 = EDGE_CORNERS[edge][1] as usize;

      if (corner_mask >> c0) & 1 != (corner_mask >> c1) & 1 {
        edge_mask |= 1 << edge;
      }

      edge += 1;
    }

    table[corner_mask] = edge_mask;
    corner_mask += 1;
  }

  table
}

const fn generate_face_edge_masks() -> [u16; 6] {
  let mut masks = [0u16; 6];
  let mut face = 0;
  while face < 6 {
    let mut k = 0;
    while k < 4 {
      masks[face] |= 1 << FACE_EDGES[face][k];
      k += 1;
    }
    face += 1;
  }
  masks
}

const fn generate_external_edge_masks() -> [u16; 8] {
  let mut masks = [0u16; 8];
  let mut octant = 0;
  while octant < 8 {
    let mut edge = 0;
    while edge < 12 {
      if EDGE_CORNERS[edge][0] as usize == octant || EDGE_CORNERS[edge][1] as usize == octant {
        masks[octant] |= 1 << edge;
      }
      edge += 1;
    }
    octant += 1;
  }
  masks
}

const fn generate_internal_edge_masks() -> [u16; 8] {
  let external = generate_external_edge_masks();
  let mut masks = [0u16; 8];
  let mut octant = 0;
  while octant < 8 {
    masks[octant] = !external[octant] & 0x0FFF;
    octant += 1;
  }
  masks
}

const fn find_root(parent: &[u8; 12], mut edge: usize) -> usize {
  while parent[edge] as usize != edge {
    edge = parent[edge] as usize;
  }
  edge
}

/// Corner shared by two edges, or 8 if they are disjoint.
const fn shared_corner(e0: usize, e1: usize) -> usize {
  let [a0, a1] = EDGE_CORNERS[e0];
  let [b0, b1] = EDGE_CORNERS[e1];
  if a0 == b0 || a0 == b1 {
    a0 as usize
  } else if a1 == b0 || a1 == b1 {
    a1 as usize
  } else {
    8
  }
}

const fn vertex_groups_for(corners: usize, flips: u8) -> VertexGroups {
  let crossing = EDGE_TABLE[corners];
  let mut parent = [0u8; 12];
  let mut edge = 0;
  while edge < 12 {
    parent[edge] = edge as u8;
    edge += 1;
  }

  let mut face = 0;
  while face < 6 {
    let edges = FACE_EDGES[face];
    let crossings = (crossing & FACE_EDGE_MASKS[face]).count_ones();
    let linked_sign = if (flips >> face) & 1 == 1 { 0 } else { 1 };

    let mut i = 0;
    while i < 4 {
      let mut j = i + 1;
      while j < 4 {
        let ei = edges[i] as usize;
        let ej = edges[j] as usize;
        let both = (crossing >> ei) & 1 == 1 && (crossing >> ej) & 1 == 1;
        let link = if !both {
          false
        } else if crossings == 2 {
          true
        } else {
          // Ambiguous face: adjacent edges around a corner of the linked sign.
          let corner = shared_corner(ei, ej);
          corner < 8 && (corners >> corner) & 1 == linked_sign
        };
        if link {
          let ri = find_root(&parent, ei);
          let rj = find_root(&parent, ej);
          if ri != rj {
            parent[ri] = rj as u8;
          }
        }
        j += 1;
      }
      i += 1;
    }
    face += 1;
  }

  let mut groups = VertexGroups::EMPTY;
  let mut root_group = [u8::MAX; 12];
  edge = 0;
  while edge < 12 {
    if (crossing >> edge) & 1 == 1 {
      let root = find_root(&parent, edge);
      if root_group[root] == u8::MAX {
        root_group[root] = groups.count;
        groups.count += 1;
      }
      groups.masks[root_group[root] as usize] |= 1 << edge;
    }
    edge += 1;
  }
  groups
}

const fn generate_vertex_groups() -> [VertexGroups; 256] {
  let mut table = [VertexGroups::EMPTY; 256];
  let mut corners = 0;
  while corners < 256 {
    table[corners] = vertex_groups_for(corners, 0);
    corners += 1;
  }
  table
}

const fn generate_ambiguous_faces() -> [u8; 256] {
  let mut table = [0u8; 256];
  let mut corners = 0;
  while corners < 256 {
    let crossing = EDGE_TABLE[corners];
    let mut face = 0;
    while face < 6 {
      if (crossing & FACE_EDGE_MASKS[face]).count_ones() == 4 {
        table[corners] |= 1 << face;
      }
      face += 1;
    }
    corners += 1;
  }
  table
}

#[cfg(test)]
#[path = "tables_test.rs"]
mod tables_test;
