//! Vertex records and their index-stable pool.
//!
//! Every vertex created under one root octant (leaf vertices and every
//! clustered ancestor) lives in that octant's [`VertexPool`]. Parent links are
//! pool indices, so a parent chain never leaves its pool and the whole
//! forest is released by dropping the pool.

use glam::Vec3;

use crate::error::{try_grow, Result};
use crate::qef::QefData;

/// Index of a vertex inside its pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub u32);

impl VertexId {
  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

/// Candidate surface vertex.
#[derive(Clone, Debug)]
pub struct Vertex {
  /// Vertex this one was merged into, if any.
  pub parent: Option<VertexId>,
  /// Slot in the output vertex buffer once assigned.
  pub index: Option<u32>,
  /// Residual within the simplification bound.
  pub collapsible: bool,
  pub qef: QefData,
  /// Cached QEF solution.
  pub position: Vec3,
  pub normal: Vec3,
  /// QEF residual at `position`.
  pub error: f32,
  /// Euler characteristic of the surface patch this vertex stands for.
  pub euler: i32,
  /// Crossing edges of the owning cell represented by this vertex.
  pub eis: u16,
  /// Octant of the owning node inside its parent.
  pub in_cell: u8,
  /// Every face of the owning cell has 0 or 2 crossings in `eis`.
  pub face_prop2: bool,
  /// Transient union tag, only set while the parent node is clustering.
  pub surface_index: Option<u32>,
}

impl Vertex {
  /// A vertex for one vertex group of a leaf.
  pub fn leaf(qef: QefData, position: Vec3, error: f32, normal: Vec3, eis: u16, in_cell: u8) -> Self {
    Self {
      parent: None,
      index: None,
      collapsible: true,
      qef,
      position,
      normal,
      error,
      euler: 1,
      eis,
      in_cell,
      face_prop2: true,
      surface_index: None,
    }
  }
}

/// Arena owning every vertex of one subtree.
#[derive(Clone, Debug, Default)]
pub struct VertexPool {
  vertices: Vec<Vertex>,
}

impl VertexPool {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a vertex, reporting allocation failure instead of aborting.
  pub fn push(&mut self, vertex: Vertex) -> Result<VertexId> {
    try_grow(&mut self.vertices, 1, "vertices")?;
    let id = VertexId(self.vertices.len() as u32);
    self.vertices.push(vertex);
    Ok(id)
  }

  #[inline]
  pub fn get(&self, id: VertexId) -> &Vertex {
    &self.vertices[id.index()]
  }

  #[inline]
  pub fn get_mut(&mut self, id: VertexId) -> &mut Vertex {
    &mut self.vertices[id.index()]
  }

  pub fn len(&self) -> usize {
    self.vertices.len()
  }

  pub fn is_empty(&self) -> bool {
    self.vertices.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Vertex> {
    self.vertices.iter()
  }

  pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vertex> {
    self.vertices.iter_mut()
  }

  /// Topmost ancestor of `id`.
  pub fn chain_root(&self, mut id: VertexId) -> VertexId {
    while let Some(parent) = self.get(id).parent {
      id = parent;
    }
    id
  }

  /// Ancestors of `id`, nearest first, excluding `id` itself.
  pub fn ancestors(&self, id: VertexId) -> impl Iterator<Item = VertexId> + '_ {
    std::iter::successors(self.get(id).parent, move |&v| self.get(v).parent)
  }
}

#[cfg(test)]
#[path = "vertex_test.rs"]
mod vertex_test;
