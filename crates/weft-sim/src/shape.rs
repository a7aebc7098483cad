//! Shape functions of the 6-node elements.
//!
//! A [`Formulation`] fixes the local DOF layout of an element and the
//! interpolation over it:
//!
//! - [`C0`]: quadratic Lagrange interpolation over the six nodes.
//! - [`C1`]: quartic interpolation over the six nodes plus nine tangent
//!   DOFs, with each tangent's sign folded into its shape function.
//! - [`C1Alt`]: the same quartic, unsigned; the signs are applied to the
//!   tangents themselves when they are gathered into the element.
//!
//! Local DOFs are ordered `[A, B, C, AB, BC, CA, t12, t13, t21, t23, t31,
//! t32, tab, tbc, tca]`. Derivatives are taken along the natural
//! directions ξ and η of the barycentric point `(ξ, η, ζ)`, ζ = 1 − ξ − η.

use glam::Vec3;

/// Largest local DOF count over all formulations.
pub const MAX_LOCAL_DOFS: usize = 15;

/// One value per local DOF (only the first `LOCAL_DOFS` are meaningful).
pub type ShapeRow = [f32; MAX_LOCAL_DOFS];

/// Natural-coordinate derivatives of the shape functions at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeDerivatives {
    pub d_xi: ShapeRow,
    pub d_eta: ShapeRow,
}

impl ShapeDerivatives {
    /// Multiplies every column by `scale`.
    pub fn scaled(&self, scale: &[f32]) -> Self {
        let mut out = *self;
        for (i, s) in scale.iter().enumerate().take(MAX_LOCAL_DOFS) {
            out.d_xi[i] *= s;
            out.d_eta[i] *= s;
        }
        out
    }
}

/// Static description of an element formulation.
pub trait Formulation: Send + Sync + 'static {
    /// Short name used in logs and events.
    const NAME: &'static str;
    /// Local DOFs per element (6 nodes, or 6 nodes + 9 tangents).
    const LOCAL_DOFS: usize;
    /// Multiplier on the nodal mass block.
    const NODE_MASS_DAMPING: f32;
    /// Tangent signs live in the shape functions (true) or are applied to
    /// the gathered tangents and the scattered forces (false).
    const SIGNS_IN_SHAPE: bool;

    /// Derivatives of the shape functions at barycentric point `gp`.
    fn derivatives(gp: Vec3) -> ShapeDerivatives;

    /// Shape function values at barycentric point `gp`.
    fn form(gp: Vec3) -> ShapeRow;

    fn uses_tangents() -> bool {
        Self::LOCAL_DOFS > 6
    }
}

/// Standard quadratic 6-node element.
#[derive(Debug, Clone, Copy, Default)]
pub struct C0;

/// Slope-continuous element with signed shape functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct C1;

/// Slope-continuous element with signed tangent gather/scatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct C1Alt;

impl Formulation for C0 {
    const NAME: &'static str = "fe_c0";
    const LOCAL_DOFS: usize = 6;
    const NODE_MASS_DAMPING: f32 = 1.0;
    const SIGNS_IN_SHAPE: bool = false;

    fn derivatives(gp: Vec3) -> ShapeDerivatives {
        let (x, y, z) = (gp.x, gp.y, gp.z);
        let mut d = ShapeDerivatives {
            d_xi: [0.0; MAX_LOCAL_DOFS],
            d_eta: [0.0; MAX_LOCAL_DOFS],
        };
        d.d_xi[..6].copy_from_slice(&[
            4.0 * x - 1.0,
            0.0,
            1.0 - 4.0 * z,
            4.0 * y,
            -4.0 * y,
            4.0 * (z - x),
        ]);
        d.d_eta[..6].copy_from_slice(&[
            0.0,
            4.0 * y - 1.0,
            1.0 - 4.0 * z,
            4.0 * x,
            4.0 * (z - y),
            -4.0 * x,
        ]);
        d
    }

    fn form(gp: Vec3) -> ShapeRow {
        let (x, y, z) = (gp.x, gp.y, gp.z);
        let mut n = [0.0; MAX_LOCAL_DOFS];
        n[..6].copy_from_slice(&[
            x * (2.0 * x - 1.0),
            y * (2.0 * y - 1.0),
            z * (2.0 * z - 1.0),
            4.0 * x * y,
            4.0 * y * z,
            4.0 * x * z,
        ]);
        n
    }
}

impl Formulation for C1 {
    const NAME: &'static str = "fe_c1";
    const LOCAL_DOFS: usize = 15;
    const NODE_MASS_DAMPING: f32 = 1.0 + 1e-6;
    const SIGNS_IN_SHAPE: bool = true;

    fn derivatives(gp: Vec3) -> ShapeDerivatives {
        quartic_derivatives(gp)
    }

    fn form(gp: Vec3) -> ShapeRow {
        quartic_form(gp)
    }
}

impl Formulation for C1Alt {
    const NAME: &'static str = "fe_c1_alt";
    const LOCAL_DOFS: usize = 15;
    const NODE_MASS_DAMPING: f32 = 1.0 + 1e-6;
    const SIGNS_IN_SHAPE: bool = false;

    fn derivatives(gp: Vec3) -> ShapeDerivatives {
        quartic_derivatives(gp)
    }

    fn form(gp: Vec3) -> ShapeRow {
        quartic_form(gp)
    }
}

/// Partial derivatives of the quartic functions with ξ, η and ζ treated
/// as independent; the natural derivatives follow by the chain rule
/// (∂/∂ξ − ∂/∂ζ and ∂/∂η − ∂/∂ζ).
fn quartic_partials(gp: Vec3) -> [ShapeRow; 3] {
    let (x, y, z) = (gp.x, gp.y, gp.z);
    let (x2, y2, z2) = (x * x, y * y, z * z);
    let (x3, y3, z3) = (x2 * x, y2 * y, z2 * z);

    let px = [
        -10.0 * x + 42.0 * x2 - 32.0 * x3 + 6.0 * (2.0 * x * y - 3.0 * x2 * y - 2.0 * x * y2),
        6.0 * (y2 - y3 - 2.0 * x * y2),
        0.0,
        -16.0 * y + 48.0 * (2.0 * x * y + y2) - 32.0 * (3.0 * x2 * y + y3) - 96.0 * x * y2,
        0.0,
        -16.0 * z + 48.0 * (2.0 * x * z + z2) - 32.0 * (z3 + 3.0 * x2 * z) - 96.0 * x * z2,
        0.5 * (-y + 2.0 * x * y + 3.0 * y2) + 3.0 * x2 * y - 4.0 * x * y2 - y3,
        0.5 * (-z + 2.0 * x * z + 3.0 * z2) + 3.0 * x2 * z - 4.0 * x * z2 - z3,
        0.5 * (-y + 6.0 * x * y + y2) - 3.0 * x2 * y - 4.0 * x * y2 + y3,
        0.0,
        0.5 * (z - 6.0 * x * z - z2) + 3.0 * x2 * z - z3 + 4.0 * x * z2,
        0.0,
        -4.0 * y + 12.0 * (2.0 * x * y + y2) - 8.0 * (3.0 * x2 * y + 4.0 * x * y2 + y3),
        0.0,
        -4.0 * z + 12.0 * (2.0 * x * z + z2) - 8.0 * (3.0 * x2 * z + 4.0 * x * z2 + z3),
    ];

    let py = [
        6.0 * (x2 - x3 - 2.0 * x2 * y),
        -10.0 * y + 42.0 * y2 - 32.0 * y3 + 6.0 * (2.0 * x * y - 3.0 * x * y2 - 2.0 * x2 * y),
        6.0 * (z2 - z3 - 2.0 * y * z2),
        -16.0 * x + 48.0 * (x2 + 2.0 * x * y) - 32.0 * (x3 + 3.0 * x * y2) - 96.0 * x2 * y,
        -16.0 * z + 48.0 * (2.0 * y * z + z2) - 32.0 * (z3 + 3.0 * y2 * z) - 96.0 * y * z2,
        0.0,
        0.5 * (-x + x2 + 6.0 * x * y) + x3 - 4.0 * x2 * y - 3.0 * x * y2,
        0.0,
        0.5 * (-x + 3.0 * x2 + 2.0 * x * y) - x3 - 4.0 * x2 * y + 3.0 * x * y2,
        0.5 * (-z + 2.0 * y * z + 3.0 * z2) + 3.0 * y2 * z - 4.0 * y * z2 - z3,
        0.0,
        0.5 * (z - 6.0 * y * z - z2) + 3.0 * y2 * z - z3 + 4.0 * y * z2,
        -4.0 * x + 12.0 * (x2 + 2.0 * x * y) - 8.0 * (x3 + 4.0 * x2 * y + 3.0 * x * y2),
        -4.0 * z + 12.0 * (2.0 * y * z + z2) - 8.0 * (3.0 * y2 * z + 4.0 * y * z2 + z3),
        0.0,
    ];

    let pz = [
        0.0,
        0.0,
        -10.0 * z + 42.0 * z2 - 32.0 * z3 + 6.0 * (2.0 * y * z - 3.0 * y * z2 - 2.0 * y2 * z),
        0.0,
        -16.0 * y + 48.0 * (y2 + 2.0 * y * z) - 32.0 * (3.0 * y * z2 + y3) - 96.0 * y2 * z,
        -16.0 * x + 48.0 * (x2 + 2.0 * x * z) - 32.0 * (3.0 * x * z2 + x3) - 96.0 * x2 * z,
        0.0,
        0.5 * (-x + x2 + 6.0 * x * z) + x3 - 4.0 * x2 * z - 3.0 * x * z2,
        0.0,
        0.5 * (-y + y2 + 6.0 * y * z) + y3 - 4.0 * y2 * z - 3.0 * y * z2,
        0.5 * (x - 3.0 * x2 - 2.0 * x * z) + x3 - 3.0 * x * z2 + 4.0 * x2 * z,
        0.5 * (y - 3.0 * y2 - 2.0 * y * z) + y3 - 3.0 * y * z2 + 4.0 * y2 * z,
        0.0,
        -4.0 * y + 12.0 * (y2 + 2.0 * y * z) - 8.0 * (y3 + 4.0 * y2 * z + 3.0 * y * z2),
        -4.0 * x + 12.0 * (x2 + 2.0 * x * z) - 8.0 * (x3 + 4.0 * x2 * z + 3.0 * x * z2),
    ];

    [px, py, pz]
}

fn quartic_derivatives(gp: Vec3) -> ShapeDerivatives {
    let [px, py, pz] = quartic_partials(gp);
    let mut d = ShapeDerivatives {
        d_xi: [0.0; MAX_LOCAL_DOFS],
        d_eta: [0.0; MAX_LOCAL_DOFS],
    };
    for i in 0..MAX_LOCAL_DOFS {
        d.d_xi[i] = px[i] - pz[i];
        d.d_eta[i] = py[i] - pz[i];
    }
    d
}

fn quartic_form(gp: Vec3) -> ShapeRow {
    let (x, y, z) = (gp.x, gp.y, gp.z);
    let (x2, y2, z2) = (x * x, y * y, z * z);
    let (x3, y3, z3) = (x2 * x, y2 * y, z2 * z);
    let (x4, y4, z4) = (x2 * x2, y2 * y2, z2 * z2);

    [
        // Corners.
        -5.0 * x2 + 14.0 * x3 - 8.0 * x4 + 6.0 * (x2 * y - x3 * y - x2 * y2),
        -5.0 * y2 + 14.0 * y3 - 8.0 * y4 + 6.0 * (x * y2 - x * y3 - x2 * y2),
        -5.0 * z2 + 14.0 * z3 - 8.0 * z4 + 6.0 * (y * z2 - y * z3 - y2 * z2),
        // Mid-edges.
        -16.0 * x * y + 48.0 * (x2 * y + x * y2) - 32.0 * (x3 * y + x * y3) - 48.0 * x2 * y2,
        -16.0 * y * z + 48.0 * (y2 * z + y * z2) - 32.0 * (y * z3 + y3 * z) - 48.0 * y2 * z2,
        -16.0 * x * z + 48.0 * (x2 * z + x * z2) - 32.0 * (x * z3 + x3 * z) - 48.0 * x2 * z2,
        // Corner tangents.
        0.5 * (-x * y + x2 * y + 3.0 * x * y2) + x3 * y - 2.0 * x2 * y2 - x * y3,
        0.5 * (-x * z + x2 * z + 3.0 * x * z2) + x3 * z - 2.0 * x2 * z2 - x * z3,
        0.5 * (-x * y + 3.0 * x2 * y + x * y2) - x3 * y - 2.0 * x2 * y2 + x * y3,
        0.5 * (-y * z + y2 * z + 3.0 * y * z2) + y3 * z - 2.0 * y2 * z2 - y * z3,
        0.5 * (x * z - 3.0 * x2 * z - x * z2) + x3 * z - x * z3 + 2.0 * x2 * z2,
        0.5 * (y * z - 3.0 * y2 * z - y * z2) + y3 * z - y * z3 + 2.0 * y2 * z2,
        // Mid-edge tangents.
        -4.0 * x * y + 12.0 * (x2 * y + x * y2) - 8.0 * (x3 * y + 2.0 * x2 * y2 + x * y3),
        -4.0 * y * z + 12.0 * (y2 * z + y * z2) - 8.0 * (y3 * z + 2.0 * y2 * z2 + y * z3),
        -4.0 * x * z + 12.0 * (x2 * z + x * z2) - 8.0 * (x3 * z + 2.0 * x2 * z2 + x * z3),
    ]
}
