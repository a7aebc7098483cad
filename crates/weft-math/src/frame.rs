//! Orthonormal frame helpers.
//!
//! Frames are stored with their axes as matrix *rows* (a world-to-local
//! rotation). glam matrices are column-major, so the helpers here
//! transpose at the boundary.

use glam::{Mat3, Vec3};

/// Builds a matrix whose rows are `r0`, `r1`, `r2`.
#[inline]
pub fn from_rows(r0: Vec3, r1: Vec3, r2: Vec3) -> Mat3 {
    Mat3::from_cols(r0, r1, r2).transpose()
}

/// Returns the three rows of `m`.
#[inline]
pub fn rows(m: &Mat3) -> [Vec3; 3] {
    [m.row(0), m.row(1), m.row(2)]
}

/// Gram–Schmidt orthonormalisation of three row vectors.
///
/// The row at `pivot` keeps its direction; the next row (cyclically) is
/// made orthogonal to it and the last row is their cross product, so the
/// result is a proper rotation (det = +1). Degenerate input falls back to
/// an arbitrary orthonormal completion.
pub fn orthonormalise_rows(input: [Vec3; 3], pivot: usize) -> Mat3 {
    let p = pivot % 3;
    let q = (p + 1) % 3;
    let r = (p + 2) % 3;

    let axis_p = input[p].try_normalize().unwrap_or(Vec3::Z);
    let mut axis_q = input[q] - axis_p * axis_p.dot(input[q]);
    axis_q = axis_q
        .try_normalize()
        .unwrap_or_else(|| axis_p.any_orthonormal_vector());
    let axis_r = axis_p.cross(axis_q);

    let mut out = [Vec3::ZERO; 3];
    out[p] = axis_p;
    out[q] = axis_q;
    out[r] = axis_r;
    from_rows(out[0], out[1], out[2])
}

/// Row-wise orthonormalisation of an existing matrix.
pub fn orthonormalise(m: &Mat3, pivot: usize) -> Mat3 {
    orthonormalise_rows(rows(m), pivot)
}
