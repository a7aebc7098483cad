//! # weft-math
//!
//! Linear algebra primitives for the Weft simulation engine.
//!
//! Provides:
//! - Re-exports of `glam` types (`Vec3`, `Mat3`, etc.)
//! - A block-sparse matrix of 3×3 blocks with a fixed sparsity pattern
//! - The modified preconditioned conjugate gradient solver ([`Mpcg`])
//!   with per-DOF constraint projection and warm start
//! - A CSR matrix and a `faer` sparse Cholesky solver used as a direct
//!   reference path
//! - Frame helpers (row-wise orthonormalisation)

pub mod block_sparse;
pub mod faer_solver;
pub mod frame;
pub mod mpcg;
pub mod sparse;

pub use block_sparse::BlockSparseMatrix;
pub use faer_solver::FaerSolver;
pub use mpcg::{Mpcg, MpcgConfig, SolveStats};
pub use sparse::{CsrMatrix, SparseSolver};

// Re-export glam types as the canonical math types for Weft.
pub use glam::{Mat3, Mat4, Vec2, Vec3};
