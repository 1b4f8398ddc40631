//! OctreeNode - one cube of the contouring octree.

use glam::IVec3;
use smallvec::SmallVec;

use super::vertex::VertexId;
use crate::tables::{vertex_groups, VertexGroups};

/// Node classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeKind {
  /// No surface inside: culled leaf, or interior with no surviving children.
  #[default]
  None,
  /// Has at least one non-`None` child.
  Internal,
  /// Unit cell containing a sign change.
  Leaf,
  /// Internal node whose clustered vertices are all within the error bound.
  /// Its children remain in the tree; extraction decides how far to collapse.
  Collapsed,
}

impl NodeKind {
  #[inline]
  pub fn is_leaf(self) -> bool {
    self == NodeKind::Leaf
  }

  /// Whether the node owns child slots (`Internal` or `Collapsed`).
  #[inline]
  pub fn has_children(self) -> bool {
    matches!(self, NodeKind::Internal | NodeKind::Collapsed)
  }
}

/// Address of a node: level (0 = root) and index within that level.
///
/// Children of `(level, index)` live at `(level + 1, index * 8 + octant)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
  pub level: u8,
  pub index: u32,
}

impl NodeRef {
  pub const ROOT: NodeRef = NodeRef { level: 0, index: 0 };

  #[inline]
  pub fn child(self, octant: u8) -> NodeRef {
    NodeRef {
      level: self.level + 1,
      index: self.index * 8 + octant as u32,
    }
  }

  /// Octant this node occupies inside its parent.
  #[inline]
  pub fn octant(self) -> u8 {
    (self.index & 7) as u8
  }
}

/// Octree node.
#[derive(Clone, Debug, Default)]
pub struct OctreeNode {
  /// Grid position of the min corner.
  pub position: IVec3,
  /// Edge length in grid units.
  pub size: u32,
  pub kind: NodeKind,
  /// Bit i set when corner i is inside. Sampled for leaves, synthesized from
  /// children for internal nodes.
  pub corners: u8,
  /// Bit i set when child i exists (non-`None`).
  pub child_mask: u8,
  /// Octant inside the parent (0 for the root).
  pub child_index: u8,
  /// Ambiguous faces (bit = face index) resolved around the outside corners
  /// instead of the inside ones. Only meaningful on leaves.
  pub face_flips: u8,
  /// Vertices owned by this node, one per vertex group (leaves) or per
  /// clustered surface (internal nodes).
  pub vertices: SmallVec<[VertexId; 2]>,
}

impl OctreeNode {
  /// Child address if the node has a child at `octant`.
  #[inline]
  pub fn child_ref(&self, this: NodeRef, octant: u8) -> Option<NodeRef> {
    (self.kind.has_children() && self.child_mask & (1 << octant) != 0).then(|| this.child(octant))
  }

  /// Whether corner `corner` is inside the surface.
  #[inline]
  pub fn corner_inside(&self, corner: u8) -> bool {
    (self.corners >> corner) & 1 == 1
  }

  /// Vertex groups of this cell under its current face resolution.
  #[inline]
  pub fn vertex_groups(&self) -> VertexGroups {
    vertex_groups(self.corners, self.face_flips)
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
