//! Block-sparse matrix of 3×3 blocks.
//!
//! Row-compressed storage where every stored entry is a `Mat3` coupling
//! two degrees of freedom. The sparsity pattern is fixed when the matrix
//! is built from element connectivity; assembly then only adds into
//! existing slots, so the pattern survives every `zero()` between steps.
//!
//! The matrix-vector product is split into an upper half (diagonal and
//! right of it) and a lower half. Each output row is written by exactly
//! one worker, so both halves run row-parallel without synchronization.

use glam::{Mat3, Vec3};
use rayon::prelude::*;
use weft_types::{WeftError, WeftResult};

/// Block CSR matrix with a diagonal block in every row.
#[derive(Debug, Clone)]
pub struct BlockSparseMatrix {
    /// Number of block rows (= block columns).
    dim: usize,
    /// `row_ptr[i]..row_ptr[i+1]` are the slots of row `i`.
    row_ptr: Vec<usize>,
    /// Block column of each slot, sorted within a row.
    col_idx: Vec<usize>,
    /// Slot of the diagonal block of each row.
    diag: Vec<usize>,
    /// Block values.
    blocks: Vec<Mat3>,
}

impl BlockSparseMatrix {
    /// Creates a diagonal-only matrix.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            row_ptr: (0..=dim).collect(),
            col_idx: (0..dim).collect(),
            diag: (0..dim).collect(),
            blocks: vec![Mat3::ZERO; dim],
        }
    }

    /// Builds a matrix whose pattern contains every `(row, col)` pair given,
    /// plus the full diagonal. Duplicate pairs are merged.
    pub fn from_pattern<I>(dim: usize, pairs: I) -> WeftResult<Self>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut rows: Vec<Vec<usize>> = (0..dim).map(|i| vec![i]).collect();
        for (r, c) in pairs {
            if r >= dim || c >= dim {
                return Err(WeftError::InvalidTopology(format!(
                    "Block ({r}, {c}) is outside a {dim}×{dim} system"
                )));
            }
            rows[r].push(c);
        }

        let mut row_ptr = Vec::with_capacity(dim + 1);
        let mut col_idx = Vec::new();
        let mut diag = Vec::with_capacity(dim);
        row_ptr.push(0);

        for (i, mut cols) in rows.into_iter().enumerate() {
            cols.sort_unstable();
            cols.dedup();
            let start = col_idx.len();
            // The diagonal is always present, so the search cannot miss.
            let offset = cols.binary_search(&i).unwrap_or(0);
            diag.push(start + offset);
            col_idx.extend(cols);
            row_ptr.push(col_idx.len());
        }

        let nnz = col_idx.len();
        Ok(Self {
            dim,
            row_ptr,
            col_idx,
            diag,
            blocks: vec![Mat3::ZERO; nnz],
        })
    }

    /// Number of block rows.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored blocks.
    pub fn nnz_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Slot index of block `(row, col)`, if it is part of the pattern.
    pub fn slot(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.dim {
            return None;
        }
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        self.col_idx[start..end]
            .binary_search(&col)
            .ok()
            .map(|offset| start + offset)
    }

    /// Block `(row, col)`, if stored.
    pub fn block(&self, row: usize, col: usize) -> Option<&Mat3> {
        self.slot(row, col).map(|s| &self.blocks[s])
    }

    /// Diagonal block of `row`.
    #[inline]
    pub fn diagonal(&self, row: usize) -> Mat3 {
        self.blocks[self.diag[row]]
    }

    /// Overwrites the diagonal block of `row`.
    #[inline]
    pub fn set_diagonal(&mut self, row: usize, block: Mat3) {
        let slot = self.diag[row];
        self.blocks[slot] = block;
    }

    /// Adds into a slot obtained from [`BlockSparseMatrix::slot`].
    #[inline]
    pub fn add_to_slot(&mut self, slot: usize, block: Mat3) {
        self.blocks[slot] += block;
    }

    /// Adds into block `(row, col)`. Fails if the block is not in the pattern.
    pub fn add_block(&mut self, row: usize, col: usize, block: Mat3) -> WeftResult<()> {
        let slot = self.slot(row, col).ok_or_else(|| {
            WeftError::InvariantViolation(format!(
                "Block ({row}, {col}) is not part of the sparsity pattern"
            ))
        })?;
        self.blocks[slot] += block;
        Ok(())
    }

    /// Zeroes every block, keeping the pattern.
    pub fn zero(&mut self) {
        self.blocks.iter_mut().for_each(|b| *b = Mat3::ZERO);
    }

    /// Iterates the stored blocks of `row` as `(col, block)`.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, &Mat3)> {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        self.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.blocks[range].iter())
    }

    /// `y = U·x`, where U holds the diagonal and every block right of it.
    pub fn mul_upper(&self, x: &[Vec3], y: &mut [Vec3]) {
        y.par_iter_mut().enumerate().for_each(|(i, yi)| {
            let mut acc = Vec3::ZERO;
            for s in self.diag[i]..self.row_ptr[i + 1] {
                acc += self.blocks[s] * x[self.col_idx[s]];
            }
            *yi = acc;
        });
    }

    /// `y += L·x`, where L holds every block left of the diagonal.
    pub fn mul_lower_add(&self, x: &[Vec3], y: &mut [Vec3]) {
        y.par_iter_mut().enumerate().for_each(|(i, yi)| {
            let mut acc = Vec3::ZERO;
            for s in self.row_ptr[i]..self.diag[i] {
                acc += self.blocks[s] * x[self.col_idx[s]];
            }
            *yi += acc;
        });
    }

    /// `y = A·x`.
    pub fn mul(&self, x: &[Vec3], y: &mut [Vec3]) {
        self.mul_upper(x, y);
        self.mul_lower_add(x, y);
    }

    /// Largest asymmetry `|A_ij − A_jiᵀ|` over all stored blocks.
    pub fn max_asymmetry(&self) -> f32 {
        let mut worst = 0.0f32;
        for i in 0..self.dim {
            for (j, block) in self.row(i) {
                let mirror = self.block(j, i).map(|m| m.transpose()).unwrap_or(Mat3::ZERO);
                let diff = *block - mirror;
                let norm = diff
                    .to_cols_array()
                    .iter()
                    .fold(0.0f32, |acc, v| acc.max(v.abs()));
                worst = worst.max(norm);
            }
        }
        worst
    }
}
