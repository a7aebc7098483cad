//! Sparse Cholesky solver backed by `faer`.
//!
//! Used as the direct alternative to [`crate::Mpcg`]. The block system is
//! flattened and filtered in [`crate::sparse`], factorized with faer's
//! supernodal LLᵀ, and solved by forward/backward substitution.

use faer::Side;
use faer::linalg::solvers::Solve;
use faer::sparse::SparseColMat;
use faer::sparse::Triplet;
use faer::sparse::linalg::solvers::{Llt, SymbolicLlt};
use glam::{Mat3, Vec3};
use weft_types::{WeftError, WeftResult};

use crate::block_sparse::BlockSparseMatrix;
use crate::sparse::{CsrMatrix, SparseSolver, filtered_rhs};

/// Sparse LLᵀ solver holding its last factorization.
pub struct FaerSolver {
    factorization: Option<Llt<usize, f64>>,
    dimension: usize,
}

impl FaerSolver {
    pub fn new() -> Self {
        Self {
            factorization: None,
            dimension: 0,
        }
    }

    fn csr_to_csc(matrix: &CsrMatrix) -> WeftResult<SparseColMat<usize, f64>> {
        let mut triplets: Vec<Triplet<usize, usize, f64>> =
            Vec::with_capacity(matrix.values.len());
        for row in 0..matrix.rows {
            for idx in matrix.row_ptr[row]..matrix.row_ptr[row + 1] {
                triplets.push(Triplet {
                    row,
                    col: matrix.col_idx[idx],
                    val: matrix.values[idx],
                });
            }
        }

        SparseColMat::try_new_from_triplets(matrix.rows, matrix.cols, &triplets)
            .map_err(|e| WeftError::InvariantViolation(format!("faer CSC construction failed: {e:?}")))
    }

    /// Factorizes and solves the filtered block system `S·A·S + (I − S)`
    /// against `S·b`, returning one `Vec3` per DOF.
    pub fn solve_block_system(
        &mut self,
        a: &BlockSparseMatrix,
        constraints: &[Mat3],
        b: &[Vec3],
    ) -> WeftResult<Vec<Vec3>> {
        let csr = CsrMatrix::from_filtered_blocks(a, constraints)?;
        self.factorize(&csr)?;

        let rhs = filtered_rhs(b, constraints);
        let mut sol = vec![0.0f64; rhs.len()];
        self.solve(&rhs, &mut sol)?;

        Ok(sol
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32))
            .collect())
    }
}

impl Default for FaerSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseSolver for FaerSolver {
    fn factorize(&mut self, matrix: &CsrMatrix) -> WeftResult<()> {
        if matrix.rows != matrix.cols {
            return Err(WeftError::InvariantViolation(format!(
                "Matrix must be square, got {}×{}",
                matrix.rows, matrix.cols
            )));
        }
        if matrix.rows == 0 {
            return Err(WeftError::InvariantViolation(
                "Cannot factorize an empty matrix".into(),
            ));
        }

        self.dimension = matrix.rows;
        let csc = Self::csr_to_csc(matrix)?;

        let symbolic = SymbolicLlt::try_new(csc.symbolic().as_ref(), Side::Upper)
            .map_err(|e| WeftError::InvariantViolation(format!("Symbolic analysis failed: {e:?}")))?;
        let llt = Llt::try_new_with_symbolic(symbolic, csc.as_ref(), Side::Upper).map_err(|e| {
            WeftError::NumericalInstability(format!("Cholesky factorization failed: {e:?}"))
        })?;

        self.factorization = Some(llt);
        Ok(())
    }

    fn solve(&self, rhs: &[f64], solution: &mut [f64]) -> WeftResult<()> {
        let llt = self.factorization.as_ref().ok_or_else(|| {
            WeftError::InvariantViolation("Solver not factorized".into())
        })?;

        if rhs.len() != self.dimension || solution.len() != self.dimension {
            return Err(WeftError::InvariantViolation(format!(
                "RHS/solution lengths ({}, {}) != matrix dimension ({})",
                rhs.len(),
                solution.len(),
                self.dimension
            )));
        }

        let rhs_mat: faer::Mat<f64> = faer::Mat::from_fn(self.dimension, 1, |i, _| rhs[i]);
        let sol = llt.solve(&rhs_mat);
        for (i, out) in solution.iter_mut().enumerate() {
            *out = sol[(i, 0)];
        }
        Ok(())
    }

    fn is_factorized(&self) -> bool {
        self.factorization.is_some()
    }
}
