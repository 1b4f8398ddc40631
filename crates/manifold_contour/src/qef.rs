//! Quadratic error function accumulation and solving.
//!
//! A QEF stores the normal equations of a set of tangent planes
//! `(point, normal)` and finds the position minimizing the summed squared
//! point-to-plane distances:
//!
//! ```text
//! E(x) = Σ (nᵢ · (x - pᵢ))²  =  xᵀ(AᵀA)x - 2xᵀ(Aᵀb) + bᵀb
//! ```
//!
//! Only `AᵀA` (symmetric, six terms), `Aᵀb`, `bᵀb` and the mass point are
//! kept, so accumulating and merging never allocate. Solving runs a cyclic
//! Jacobi eigen-decomposition of `AᵀA` and applies its pseudo-inverse around
//! the mass point: directions the planes do not constrain (flat or ridge
//! configurations) stay at the centroid of the intersection points.
//!
//! Accumulation and solving run in `f64`; callers see `f32` positions.

use glam::{DVec3, Vec3};

/// Parameters of a QEF solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QefSettings {
  /// Jacobi sweeps stop once the off-diagonal norm falls below this
  /// fraction of the matrix norm.
  pub svd_tolerance: f32,
  /// Upper bound on Jacobi sweeps.
  pub max_sweeps: u32,
  /// Eigenvalues with magnitude below this are treated as zero.
  pub pinv_tolerance: f32,
}

impl Default for QefSettings {
  fn default() -> Self {
    Self {
      svd_tolerance: 1e-6,
      max_sweeps: 4,
      pinv_tolerance: 1e-6,
    }
  }
}

/// Accumulated plane constraints.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QefData {
  /// Upper triangle of AᵀA: xx, xy, xz, yy, yz, zz.
  ata: [f64; 6],
  atb: DVec3,
  btb: f64,
  mass_point: DVec3,
  count: u32,
}

/// Result of a QEF solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QefSolution {
  pub position: Vec3,
  pub error: f32,
}

impl QefData {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add the plane through `point` with unit `normal`.
  pub fn add(&mut self, point: Vec3, normal: Vec3) {
    let p = point.as_dvec3();
    let n = normal.as_dvec3();
    let d = n.dot(p);

    self.ata[0] += n.x * n.x;
    self.ata[1] += n.x * n.y;
    self.ata[2] += n.x * n.z;
    self.ata[3] += n.y * n.y;
    self.ata[4] += n.y * n.z;
    self.ata[5] += n.z * n.z;
    self.atb += n * d;
    self.btb += d * d;
    self.mass_point += p;
    self.count += 1;
  }

  /// Fold another accumulator into this one.
  pub fn merge(&mut self, other: &QefData) {
    for (a, b) in self.ata.iter_mut().zip(other.ata) {
      *a += b;
    }
    self.atb += other.atb;
    self.btb += other.btb;
    self.mass_point += other.mass_point;
    self.count += other.count;
  }

  /// Number of accumulated planes.
  #[inline]
  pub fn count(&self) -> u32 {
    self.count
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.count == 0
  }

  /// Centroid of the accumulated points (origin when empty).
  pub fn mass_point(&self) -> Vec3 {
    if self.count == 0 {
      return Vec3::ZERO;
    }
    (self.mass_point / self.count as f64).as_vec3()
  }

  /// Position minimizing the QEF.
  ///
  /// An empty accumulator solves to the origin with zero error.
  pub fn solve(&self, settings: &QefSettings) -> QefSolution {
    if self.count == 0 {
      return QefSolution {
        position: Vec3::ZERO,
        error: 0.0,
      };
    }

    let position = self.solve_f64(settings);
    QefSolution {
      position: position.as_vec3(),
      error: self.error_f64(position) as f32,
    }
  }

  /// Residual `E(position)`.
  pub fn error(&self, position: Vec3) -> f32 {
    if self.count == 0 {
      return 0.0;
    }
    self.error_f64(position.as_dvec3()) as f32
  }

  fn error_f64(&self, x: DVec3) -> f64 {
    // Rounding can push an exact fit slightly negative.
    (x.dot(self.ata_mul(x)) - 2.0 * x.dot(self.atb) + self.btb).max(0.0)
  }

  fn ata_mul(&self, v: DVec3) -> DVec3 {
    let a = &self.ata;
    DVec3::new(
      a[0] * v.x + a[1] * v.y + a[2] * v.z,
      a[1] * v.x + a[3] * v.y + a[4] * v.z,
      a[2] * v.x + a[4] * v.y + a[5] * v.z,
    )
  }

  fn solve_f64(&self, settings: &QefSettings) -> DVec3 {
    let mass_point = self.mass_point / self.count as f64;
    // Solve for the offset from the mass point.
    let rhs = self.atb - self.ata_mul(mass_point);

    let mut m = [
      [self.ata[0], self.ata[1], self.ata[2]],
      [self.ata[1], self.ata[3], self.ata[4]],
      [self.ata[2], self.ata[4], self.ata[5]],
    ];
    let mut v = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    jacobi_eigen(&mut m, &mut v, settings);

    let pinv_tolerance = settings.pinv_tolerance as f64;
    let inverse: [f64; 3] = std::array::from_fn(|i| {
      let sigma = m[i][i];
      if sigma.abs() < pinv_tolerance || (1.0 / sigma).abs() < pinv_tolerance {
        0.0
      } else {
        1.0 / sigma
      }
    });

    // x = V Σ⁺ Vᵀ rhs
    let rhs = rhs.to_array();
    let projected: [f64; 3] = std::array::from_fn(|i| (0..3).map(|k| v[k][i] * rhs[k]).sum());
    let offset: [f64; 3] =
      std::array::from_fn(|i| (0..3).map(|j| v[i][j] * inverse[j] * projected[j]).sum());

    mass_point + DVec3::from_array(offset)
  }
}

/// Diagonalize symmetric `m` in place with cyclic Jacobi rotations,
/// accumulating the rotations into `v`.
fn jacobi_eigen(m: &mut [[f64; 3]; 3], v: &mut [[f64; 3]; 3], settings: &QefSettings) {
  let norm = m.iter().flatten().map(|x| x * x).sum::<f64>().sqrt();
  let delta = settings.svd_tolerance as f64 * norm;

  for _ in 0..settings.max_sweeps {
    let off = (2.0 * (m[0][1] * m[0][1] + m[0][2] * m[0][2] + m[1][2] * m[1][2])).sqrt();
    if off <= delta {
      break;
    }
    for (p, q) in [(0, 1), (0, 2), (1, 2)] {
      rotate(m, v, p, q);
    }
  }
}

/// One Jacobi rotation zeroing `m[p][q]`.
fn rotate(m: &mut [[f64; 3]; 3], v: &mut [[f64; 3]; 3], p: usize, q: usize) {
  if m[p][q] == 0.0 {
    return;
  }

  let tau = (m[q][q] - m[p][p]) / (2.0 * m[p][q]);
  let stt = (1.0 + tau * tau).sqrt();
  let t = if tau >= 0.0 { 1.0 / (tau + stt) } else { 1.0 / (tau - stt) };
  let c = 1.0 / (1.0 + t * t).sqrt();
  let s = t * c;

  for row in m.iter_mut() {
    let (mp, mq) = (row[p], row[q]);
    row[p] = c * mp - s * mq;
    row[q] = s * mp + c * mq;
  }
  for k in 0..3 {
    let (mp, mq) = (m[p][k], m[q][k]);
    m[p][k] = c * mp - s * mq;
    m[q][k] = s * mp + c * mq;
  }
  for row in v.iter_mut() {
    let (vp, vq) = (row[p], row[q]);
    row[p] = c * vp - s * vq;
    row[q] = s * vp + c * vq;
  }
}

#[cfg(test)]
#[path = "qef_test.rs"]
mod qef_test;
