use glam::Vec3;

use super::*;
use crate::octree::construct;
use crate::sdf_samplers::{BlobField, SphereField, TiltedPlaneField};
use crate::tables::EDGE_CORNERS;

fn clustered(config: &ContourConfig, field: &impl crate::sampler::ScalarField) -> Octree {
  let mut tree = construct(config, field).unwrap();
  cluster_tree(&mut tree).unwrap();
  tree
}

fn node_ref(level: usize, index: usize) -> NodeRef {
  NodeRef {
    level: level as u8,
    index: index as u32,
  }
}

/// Edges incident to `corner`.
fn corner_edges(corner: u8) -> u16 {
  (0..12)
    .filter(|&e| EDGE_CORNERS[e].contains(&corner))
    .fold(0, |mask, e| mask | (1 << e))
}

fn central_sphere() -> SphereField {
  SphereField::new(Vec3::new(8.2, 7.7, 8.4), 5.3)
}

#[test]
fn test_every_vertex_below_top_has_parent() {
  let tree = clustered(&ContourConfig::new(16), &central_sphere());

  for level in 2..tree.level_count() {
    for (index, node) in tree.level(level).iter().enumerate() {
      for &id in &node.vertices {
        let vertex = tree.vertex(node_ref(level, index), id);
        assert!(vertex.parent.is_some(), "orphan at level {}", level);
      }
    }
  }
  for (index, node) in tree.level(1).iter().enumerate() {
    for &id in &node.vertices {
      assert_eq!(tree.vertex(node_ref(1, index), id).parent, None);
    }
  }
}

#[test]
fn test_surface_tags_cleared() {
  let tree = clustered(&ContourConfig::new(16), &central_sphere());
  for pool in tree.pools() {
    assert!(pool.iter().all(|v| v.surface_index.is_none()));
  }
}

#[test]
fn test_every_pooled_vertex_reachable() {
  let tree = clustered(&ContourConfig::new(16), &central_sphere());
  assert_eq!(tree.reachable_vertex_count(), tree.pooled_vertex_count());
}

#[test]
fn test_sphere_octants_are_disks() {
  let tree = clustered(&ContourConfig::new(16), &central_sphere());

  for (octant, node) in tree.level(1).iter().enumerate() {
    assert_eq!(node.vertices.len(), 1, "octant {}", octant);
    let vertex = tree.vertex(node_ref(1, octant), node.vertices[0]);
    assert_eq!(vertex.euler, 1);
    assert!(vertex.face_prop2);
    assert_eq!(vertex.in_cell, octant as u8);
    // The surface leaves each octant through the three edges meeting at the
    // root's center.
    assert_eq!(vertex.eis, corner_edges(7 - octant as u8));
  }
}

#[test]
fn test_enclosed_spheres_stay_separate() {
  let field = BlobField::default()
    .with_sphere(Vec3::new(2.3, 2.4, 2.2), 1.3)
    .with_sphere(Vec3::new(5.7, 5.6, 5.8), 1.3);
  let tree = clustered(&ContourConfig::new(16), &field);

  assert_eq!(tree.root().child_mask, 0b0000_0001);
  let top = &tree.level(1)[0];
  assert_eq!(top.vertices.len(), 2);
  for &id in &top.vertices {
    let vertex = tree.vertex(node_ref(1, 0), id);
    assert_eq!(vertex.euler, 2);
    assert_eq!(vertex.eis, 0);
  }

  for index in [0, 7] {
    let node = &tree.level(2)[index];
    assert_eq!(node.vertices.len(), 1);
    let vertex = tree.vertex(node_ref(2, index), node.vertices[0]);
    assert_eq!(vertex.euler, 2);
    assert!(vertex.parent.is_some());
  }
}

#[test]
fn test_merged_qef_counts_leaf_planes() {
  let tree = clustered(&ContourConfig::new(16), &central_sphere());
  let top_planes: u32 = (0..8)
    .map(|octant| {
      let node = &tree.level(1)[octant];
      node
        .vertices
        .iter()
        .map(|&id| tree.vertex(node_ref(1, octant), id).qef.count())
        .sum::<u32>()
    })
    .sum();
  let leaf_total: u32 = tree
    .level(4)
    .iter()
    .enumerate()
    .flat_map(|(index, leaf)| leaf.vertices.iter().map(move |&id| (index, id)))
    .map(|(index, id)| tree.vertex(node_ref(4, index), id).qef.count())
    .sum();
  assert_eq!(top_planes, leaf_total);
}

#[test]
fn test_internal_corners_follow_children() {
  let tree = clustered(&ContourConfig::new(16), &central_sphere());

  for level in 1..4 {
    for (index, node) in tree.level(level).iter().enumerate() {
      if !node.kind.has_children() {
        continue;
      }
      for octant in 0..8u8 {
        if let Some(child) = tree.child(node_ref(level, index), octant) {
          let child = tree.node(child);
          assert_eq!(node.corner_inside(octant), child.corner_inside(octant));
        }
      }
    }
  }
}

#[test]
fn test_zero_threshold_never_collapses() {
  let plane = TiltedPlaneField::new(Vec3::new(8.0, 8.3, 8.0)).with_angle_degrees(0.0);
  let tree = clustered(&ContourConfig::new(16), &plane);

  assert_eq!(tree.node_counts().collapsed, 0);
  for level in 1..tree.level_count() - 1 {
    for (index, node) in tree.level(level).iter().enumerate() {
      for &id in &node.vertices {
        assert!(!tree.vertex(node_ref(level, index), id).collapsible);
      }
    }
  }
}

#[test]
fn test_flat_plane_collapses_with_threshold() {
  let plane = TiltedPlaneField::new(Vec3::new(8.0, 8.3, 8.0)).with_angle_degrees(0.0);
  let tree = clustered(&ContourConfig::new(16).with_threshold(0.01), &plane);

  let counts = tree.node_counts();
  assert!(counts.collapsed > 0);
  for (index, node) in tree.level(1).iter().enumerate() {
    if node.vertices.is_empty() {
      continue;
    }
    assert_eq!(node.kind, NodeKind::Collapsed);
    assert_eq!(node.vertices.len(), 1);
    let vertex = tree.vertex(node_ref(1, index), node.vertices[0]);
    assert!(vertex.collapsible);
    assert_eq!(vertex.euler, 1);
    assert!(vertex.face_prop2);
    assert!((vertex.position.y - 8.3).abs() < 1e-3);
  }
}

#[test]
fn test_clustering_is_deterministic() {
  let field = BlobField::default()
    .with_sphere(Vec3::new(5.2, 6.1, 4.9), 3.1)
    .with_sphere(Vec3::new(9.7, 8.8, 10.3), 3.6);
  let config = ContourConfig::new(16).with_threshold(0.05);
  let a = clustered(&config, &field);
  let b = clustered(&config, &field);

  for (pa, pb) in a.pools().iter().zip(b.pools()) {
    assert_eq!(pa.len(), pb.len());
    for (va, vb) in pa.iter().zip(pb.iter()) {
      assert_eq!(va.position, vb.position);
      assert_eq!(va.parent, vb.parent);
      assert_eq!(va.euler, vb.euler);
    }
  }
}

#[test]
fn test_uniform_tree_has_nothing_to_cluster() {
  let mut tree = construct(&ContourConfig::new(8), &crate::sdf_samplers::ConstantField(-1.0)).unwrap();
  cluster_tree(&mut tree).unwrap();
  assert_eq!(tree.pooled_vertex_count(), 0);
}
