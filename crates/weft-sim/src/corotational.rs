//! Corotational shell kernel shared by the FE formulations.
//!
//! At every Gauss point a local material frame is built from the two
//! natural-coordinate directions of the element surface. Strain is
//! measured in that frame, so rigid rotations of the element produce no
//! strain. The strain-displacement operator is the linear part plus the
//! nonlinear correction `½·D(G·d)·G`, where `G` maps displacements to the
//! frame-projected surface gradients.
//!
//! Per element and Gauss point:
//!
//! ```text
//! B_nl, strain  ← rest configuration with displacement d = x − X
//! stress        = E · strain
//! B₀, G, Ja     ← current configuration
//! area          = det(Ja) / 2        (must be > 0)
//! K += (B₀ᵀ·E·B_nl + Gᵀ·Σ·G) · w · area
//! f += B₀ᵀ · stress · w · area
//! ```

use glam::{Mat3, Vec3};
use nalgebra::{DMatrix, DVector, Matrix2, Matrix3, Matrix3x6, Matrix3xX, Matrix6, Matrix6xX, Vector3, Vector6};
use weft_types::{WeftError, WeftResult};

use crate::quadrature::GAUSS_12;
use crate::shape::ShapeDerivatives;

/// Orthonormal local frame and the 2×2 Jacobian of the surface map.
#[derive(Debug, Clone, Copy)]
pub struct MaterialFrame {
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub normal: Vec3,
    pub jacobian: Matrix2<f32>,
}

impl MaterialFrame {
    /// Builds the frame from local DOF positions and shape derivatives.
    pub fn new(positions: &[Vec3], dn: &ShapeDerivatives) -> Self {
        let mut v_xi = Vec3::ZERO;
        let mut v_eta = Vec3::ZERO;
        for (i, p) in positions.iter().enumerate() {
            v_xi += *p * dn.d_xi[i];
            v_eta += *p * dn.d_eta[i];
        }

        let normal = v_xi.cross(v_eta).normalize_or_zero();
        let x_axis = v_eta.cross(normal).normalize_or_zero();
        let y_axis = normal.cross(x_axis).normalize_or_zero();

        let jacobian = Matrix2::new(
            v_xi.dot(x_axis),
            v_xi.dot(y_axis),
            v_eta.dot(x_axis),
            v_eta.dot(y_axis),
        );

        Self {
            x_axis,
            y_axis,
            normal,
            jacobian,
        }
    }

    /// Signed area of the element as seen by this Gauss point.
    pub fn area(&self) -> f32 {
        self.jacobian.determinant() * 0.5
    }

    /// The frame as a rotation matrix with the axes as columns.
    pub fn rotation(&self) -> Mat3 {
        Mat3::from_cols(self.x_axis, self.y_axis, self.normal)
    }

    fn rows(&self) -> [Vec3; 3] {
        [self.x_axis, self.y_axis, self.normal]
    }
}

/// Strain-displacement operator `B` (3 × 3n) and gradient operator `G` (6 × 3n).
#[derive(Debug, Clone)]
pub struct StrainOperators {
    pub b: Matrix3xX<f32>,
    pub g: Matrix6xX<f32>,
    pub frame: MaterialFrame,
}

impl StrainOperators {
    /// Builds `B` and `G` for the given frame. With a displacement the
    /// nonlinear correction is included. Returns `None` when the Jacobian
    /// is singular.
    pub fn from_frame(
        frame: MaterialFrame,
        dn: &ShapeDerivatives,
        dofs: usize,
        displacement: Option<&DVector<f32>>,
    ) -> Option<Self> {
        let ja_inv = frame.jacobian.try_inverse()?;
        let t = frame.rows();

        let mut b = Matrix3xX::zeros(3 * dofs);
        let mut g = Matrix6xX::zeros(3 * dofs);
        for i in 0..dofs {
            let a0 = ja_inv[(0, 0)] * dn.d_xi[i] + ja_inv[(0, 1)] * dn.d_eta[i];
            let a1 = ja_inv[(1, 0)] * dn.d_xi[i] + ja_inv[(1, 1)] * dn.d_eta[i];
            for c in 0..3 {
                let col = 3 * i + c;
                b[(0, col)] = t[0][c] * a0;
                b[(1, col)] = t[1][c] * a1;
                b[(2, col)] = t[0][c] * a1 + t[1][c] * a0;
                for r in 0..3 {
                    g[(r, col)] = t[r][c] * a0;
                    g[(r + 3, col)] = t[r][c] * a1;
                }
            }
        }

        if let Some(d) = displacement {
            let delta: Vector6<f32> = &g * d;
            #[rustfmt::skip]
            let derivatives = Matrix3x6::new(
                delta[0], delta[1], delta[2], 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, delta[3], delta[4], delta[5],
                delta[3], delta[4], delta[5], delta[0], delta[1], delta[2],
            );
            b += derivatives * &g * 0.5;
        }

        Some(Self { b, g, frame })
    }

    pub fn new(
        positions: &[Vec3],
        dn: &ShapeDerivatives,
        displacement: Option<&DVector<f32>>,
    ) -> Option<Self> {
        Self::from_frame(
            MaterialFrame::new(positions, dn),
            dn,
            positions.len(),
            displacement,
        )
    }
}

/// Local force vector and tangent stiffness of one element.
#[derive(Debug, Clone)]
pub struct ElementContribution {
    /// Internal force, 3 entries per local DOF.
    pub force: DVector<f32>,
    /// Elastic plus geometric stiffness, (3n × 3n).
    pub stiffness: DMatrix<f32>,
}

impl ElementContribution {
    /// The 3×3 block coupling local DOFs `j` and `k`.
    pub fn block(&self, j: usize, k: usize) -> Mat3 {
        let s = &self.stiffness;
        let col = |c: usize| {
            Vec3::new(
                s[(3 * j, 3 * k + c)],
                s[(3 * j + 1, 3 * k + c)],
                s[(3 * j + 2, 3 * k + c)],
            )
        };
        Mat3::from_cols(col(0), col(1), col(2))
    }

    pub fn force(&self, j: usize) -> Vec3 {
        Vec3::new(
            self.force[3 * j],
            self.force[3 * j + 1],
            self.force[3 * j + 2],
        )
    }
}

/// Flattened `current − rest`.
pub fn displacement(rest: &[Vec3], current: &[Vec3]) -> DVector<f32> {
    DVector::from_iterator(
        3 * rest.len(),
        rest.iter()
            .zip(current)
            .flat_map(|(r, c)| (*c - *r).to_array()),
    )
}

/// Integrates the element over the 12-point rule.
///
/// `shapes[j]` are the shape derivatives at Gauss point `j`. Fails with
/// [`WeftError::DegenerateElement`] if the element is collapsed or
/// inverted at any Gauss point, in either configuration.
pub fn element_contribution(
    element: u32,
    rest: &[Vec3],
    current: &[Vec3],
    shapes: &[ShapeDerivatives],
    elasticity: &Matrix3<f32>,
) -> WeftResult<ElementContribution> {
    let dofs = rest.len();
    let d = displacement(rest, current);
    let mut stiffness = DMatrix::zeros(3 * dofs, 3 * dofs);
    let mut force = DVector::zeros(3 * dofs);

    for (j, (gauss, dn)) in GAUSS_12.iter().zip(shapes).enumerate() {
        let rest_frame = MaterialFrame::new(rest, dn);
        let rest_ops = StrainOperators::from_frame(rest_frame, dn, dofs, Some(&d))
            .ok_or_else(|| degenerate(element, j, rest_frame.area()))?;
        let strain: Vector3<f32> = &rest_ops.b * &d;
        let stress = elasticity * strain;

        let frame = MaterialFrame::new(current, dn);
        let area = frame.area();
        if !(area > 0.0) {
            return Err(degenerate(element, j, area));
        }
        let ops = StrainOperators::from_frame(frame, dn, dofs, None)
            .ok_or_else(|| degenerate(element, j, area))?;

        let scale = gauss.weight * area;
        let sigma = stress_block(&stress);
        let b0_t = ops.b.transpose();
        stiffness += (&b0_t * elasticity * &rest_ops.b + ops.g.transpose() * sigma * &ops.g) * scale;
        force += b0_t * stress * scale;
    }

    Ok(ElementContribution { force, stiffness })
}

/// Stress and strain at one point, measured against the rest shape.
pub fn rest_stress_strain(
    rest: &[Vec3],
    current: &[Vec3],
    dn: &ShapeDerivatives,
    elasticity: &Matrix3<f32>,
) -> Option<(Vec3, Vec3)> {
    let d = displacement(rest, current);
    let ops = StrainOperators::new(rest, dn, Some(&d))?;
    let strain: Vector3<f32> = &ops.b * &d;
    let stress = elasticity * strain;
    Some((
        Vec3::new(stress.x, stress.y, stress.z),
        Vec3::new(strain.x, strain.y, strain.z),
    ))
}

/// The 6×6 stress block `Σ` of the geometric stiffness.
fn stress_block(stress: &Vector3<f32>) -> Matrix6<f32> {
    let (sx, sy, sz) = (stress.x, stress.y, stress.z);
    let mut m = Matrix6::zeros();
    for i in 0..3 {
        m[(i, i)] = sx;
        m[(i + 3, i + 3)] = sy;
        m[(i, i + 3)] = sz;
        m[(i + 3, i)] = sz;
    }
    m
}

fn degenerate(element: u32, gauss_point: usize, area: f32) -> WeftError {
    WeftError::DegenerateElement {
        element,
        gauss_point: gauss_point as u32,
        area,
    }
}
