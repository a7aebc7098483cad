//! Plane-stress elasticity.

use nalgebra::Matrix3;

/// Isotropic plane-stress matrix mapping Voigt strain `(εxx, εyy, γxy)`
/// to stress `(σxx, σyy, τxy)`.
pub fn plane_stress(youngs_modulus: f32, poisson_ratio: f32) -> Matrix3<f32> {
    let v = poisson_ratio;
    let scale = youngs_modulus / (1.0 - v * v);
    #[rustfmt::skip]
    let e = Matrix3::new(
        1.0, v, 0.0,
        v, 1.0, 0.0,
        0.0, 0.0, (1.0 - v) * 0.5,
    );
    e * scale
}
