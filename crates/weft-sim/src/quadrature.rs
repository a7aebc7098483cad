//! 12-point Gauss rule on the reference triangle.
//!
//! Points are barycentric `(ξ, η, ζ)` with `ζ = 1 − ξ − η`; weights sum
//! to one, so `Σ wᵢ·Aᵢ` integrates over the element area.

use glam::Vec3;

/// A quadrature sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussPoint {
    /// Barycentric coordinates.
    pub coords: Vec3,
    pub weight: f32,
}

const A1: f32 = 0.873_821_97;
const B1: f32 = 0.063_089_014;
const W1: f32 = 0.050_844_906;

const A2: f32 = 0.501_426_5;
const B2: f32 = 0.249_286_75;
const W2: f32 = 0.116_786_27;

const A3: f32 = 0.636_502_5;
const B3: f32 = 0.310_352_45;
const C3: f32 = 0.053_145_05;
const W3: f32 = 0.082_851_08;

const fn gp(x: f32, y: f32, z: f32, weight: f32) -> GaussPoint {
    GaussPoint {
        coords: Vec3::new(x, y, z),
        weight,
    }
}

/// Sixth-order, strictly interior rule.
pub const GAUSS_12: [GaussPoint; 12] = [
    gp(A1, B1, B1, W1),
    gp(B1, B1, A1, W1),
    gp(B1, A1, B1, W1),
    gp(A2, B2, B2, W2),
    gp(B2, B2, A2, W2),
    gp(B2, A2, B2, W2),
    gp(A3, B3, C3, W3),
    gp(A3, C3, B3, W3),
    gp(B3, A3, C3, W3),
    gp(B3, C3, A3, W3),
    gp(C3, B3, A3, W3),
    gp(C3, A3, B3, W3),
];
