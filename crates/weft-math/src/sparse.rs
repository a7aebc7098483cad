//! Scalar CSR matrices and the direct-solver interface.
//!
//! The block system used by the simulations is flattened into a scalar CSR
//! matrix here before being handed to a factorizing solver.

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};
use weft_types::{WeftError, WeftResult};

use crate::block_sparse::BlockSparseMatrix;

/// Compressed Sparse Row (CSR) matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrMatrix {
    pub rows: usize,
    pub cols: usize,
    /// `row_ptr[i]..row_ptr[i+1]` index the non-zeros of row `i`.
    pub row_ptr: Vec<usize>,
    pub col_idx: Vec<usize>,
    pub values: Vec<f64>,
}

impl CsrMatrix {
    /// Creates an empty matrix with the given dimensions.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            row_ptr: vec![0; rows + 1],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Builds a CSR matrix from `(row, col, value)` triplets.
    ///
    /// Duplicate entries are summed. Out-of-range indices are rejected.
    pub fn from_triplets(
        rows: usize,
        cols: usize,
        triplets: &[(usize, usize, f64)],
    ) -> WeftResult<Self> {
        let mut per_row: Vec<Vec<(usize, f64)>> = vec![Vec::new(); rows];
        for &(r, c, v) in triplets {
            if r >= rows || c >= cols {
                return Err(WeftError::InvalidTopology(format!(
                    "Triplet ({r}, {c}) outside a {rows}×{cols} matrix"
                )));
            }
            per_row[r].push((c, v));
        }

        let mut row_ptr = Vec::with_capacity(rows + 1);
        let mut col_idx = Vec::with_capacity(triplets.len());
        let mut values = Vec::with_capacity(triplets.len());
        row_ptr.push(0);

        for mut entries in per_row {
            entries.sort_unstable_by_key(|&(c, _)| c);
            let row_start = col_idx.len();
            for (c, v) in entries {
                if col_idx.len() > row_start && col_idx[col_idx.len() - 1] == c {
                    let last = values.len() - 1;
                    values[last] += v;
                } else {
                    col_idx.push(c);
                    values.push(v);
                }
            }
            row_ptr.push(col_idx.len());
        }

        Ok(Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        })
    }

    /// Value at `(row, col)`, zero when not stored.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        self.col_idx[range.clone()]
            .binary_search(&col)
            .map(|offset| self.values[range.start + offset])
            .unwrap_or(0.0)
    }

    /// Flattens a filtered block system into scalar form.
    ///
    /// Produces `S·A·S + (I − S)` with its symmetric part taken, so pinned
    /// DOFs decouple into identity rows and the result is suitable for a
    /// Cholesky factorization. The matching right-hand side is `S·b`.
    pub fn from_filtered_blocks(
        a: &BlockSparseMatrix,
        constraints: &[Mat3],
    ) -> WeftResult<Self> {
        let n = a.dim();
        if constraints.len() != n {
            return Err(WeftError::InvariantViolation(format!(
                "{} constraint blocks for a {n}-DOF system",
                constraints.len()
            )));
        }

        let mut triplets = Vec::with_capacity(a.nnz_blocks() * 18 + n * 3);
        for i in 0..n {
            for (j, block) in a.row(i) {
                let filtered = constraints[i] * *block * constraints[j];
                for r in 0..3 {
                    for c in 0..3 {
                        let v = filtered.col(c)[r] as f64 * 0.5;
                        if v != 0.0 {
                            triplets.push((3 * i + r, 3 * j + c, v));
                            triplets.push((3 * j + c, 3 * i + r, v));
                        }
                    }
                }
            }
            let free = Mat3::IDENTITY - constraints[i];
            for r in 0..3 {
                for c in 0..3 {
                    let v = free.col(c)[r] as f64;
                    if v != 0.0 {
                        triplets.push((3 * i + r, 3 * i + c, v));
                    }
                }
            }
        }
        Self::from_triplets(3 * n, 3 * n, &triplets)
    }
}

/// Flattens `S·b` into a scalar vector.
pub fn filtered_rhs(b: &[Vec3], constraints: &[Mat3]) -> Vec<f64> {
    b.iter()
        .zip(constraints)
        .flat_map(|(v, s)| {
            let f = *s * *v;
            [f.x as f64, f.y as f64, f.z as f64]
        })
        .collect()
}

/// Factorize-once, solve-many interface for sparse SPD solvers.
pub trait SparseSolver {
    /// Factorizes the matrix. Call again after the values change.
    fn factorize(&mut self, matrix: &CsrMatrix) -> WeftResult<()>;

    /// Solves `A·x = b` with the cached factorization.
    fn solve(&self, rhs: &[f64], solution: &mut [f64]) -> WeftResult<()>;

    fn is_factorized(&self) -> bool;
}
