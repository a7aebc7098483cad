//! Integration tests for weft-sim.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use glam::{Mat3, Mat4, Vec3};
use nalgebra::DMatrix;
use weft_mesh::{Actuator, BendTest, Generator, GeneratorOutput, SquareGrid};
use weft_sim::corotational::StrainOperators;
use weft_sim::elasticity::plane_stress;
use weft_sim::pbd::sweep_stiffness;
use weft_sim::quadrature::GAUSS_12;
use weft_sim::{
    FeC0, FeC1, FeC1Alt, FieldQuery, Formulation, IntegrationType, Integrator, LinearSolverKind,
    Manager, Pbd, PbdConfig, SimConfig, SimType, Simulation, StepReport, C0, C1,
};
use weft_telemetry::{EventKind, VecSink};
use weft_types::{ProfilingTimer, WeftError, WeftResult};

const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

fn grid(v: u32) -> GeneratorOutput {
    SquareGrid::new(v).generate().unwrap()
}

/// Small deterministic out-of-plane bump on the nodes.
fn bumped(out: &GeneratorOutput) -> Vec<Vec3> {
    let mut x = out.positions.clone();
    for (i, p) in x.iter_mut().take(out.node_count).enumerate() {
        p.z += 0.01 * (i as f32 * 0.7).sin();
    }
    x
}

// ─── Config Tests ────────────────────────────────────────────

#[test]
fn config_defaults() {
    let cfg = SimConfig::default();
    assert_eq!(cfg.material.youngs_modulus, 2500.0);
    assert_eq!(cfg.material.poisson_ratio, 0.3);
    assert_eq!(cfg.tangents.mass, 0.0002);
    assert_eq!(cfg.pbd.solver_steps, 20);
    assert_eq!(cfg.integrator.kind, IntegrationType::Rk2);
    assert_eq!(cfg.integrator.sub_timestep, 0.0005);
    assert_eq!(cfg.integrator.gravity(), GRAVITY);
    assert_eq!(cfg.solver.linear_solver, LinearSolverKind::Mpcg);
    assert!(cfg.validate().is_ok());
}

#[test]
fn config_presets_validate() {
    assert!(SimConfig::debug().validate().is_ok());
    assert!(SimConfig::high_quality().validate().is_ok());
    assert_eq!(SimConfig::high_quality().integrator.kind, IntegrationType::Rk4);
}

#[test]
fn config_toml_roundtrip() {
    let cfg = SimConfig::high_quality();
    let text = cfg.to_toml_string().unwrap();
    let back = SimConfig::from_toml_str(&text).unwrap();
    assert_eq!(cfg, back);
}

#[test]
fn config_partial_toml() {
    let cfg = SimConfig::from_toml_str(
        r#"
        [solver]
        max_iterations = 50
        linear_solver = "cholesky"

        [integrator]
        kind = "rk4"
        "#,
    )
    .unwrap();
    assert_eq!(cfg.solver.max_iterations, 50);
    assert_eq!(cfg.solver.linear_solver, LinearSolverKind::Cholesky);
    assert_eq!(cfg.integrator.kind, IntegrationType::Rk4);
    assert_eq!(cfg.material, SimConfig::default().material);
}

#[test]
fn config_rejects_bad_values() {
    let mut cfg = SimConfig::default();
    cfg.material.poisson_ratio = 0.5;
    assert!(matches!(cfg.validate(), Err(WeftError::InvalidConfig(_))));

    let mut cfg = SimConfig::default();
    cfg.integrator.sub_timestep = 0.0;
    assert!(cfg.validate().is_err());

    let mut cfg = SimConfig::default();
    cfg.pbd.k_bend = 1.5;
    assert!(cfg.validate().is_err());

    assert!(SimConfig::from_toml_str("[material]\nyoungs_modulus = -1.0").is_err());
}

// ─── Element Tests ───────────────────────────────────────────

#[test]
fn gauss_rule_is_normalised() {
    let total: f32 = GAUSS_12.iter().map(|g| g.weight).sum();
    assert!((total - 1.0).abs() < 1e-5);
    for g in &GAUSS_12 {
        let c = g.coords;
        assert!((c.x + c.y + c.z - 1.0).abs() < 1e-5);
        assert!(c.min_element() > 0.0);
    }
}

#[test]
fn plane_stress_matrix() {
    let e = plane_stress(1.0, 0.0);
    assert_eq!(e[(0, 0)], 1.0);
    assert_eq!(e[(1, 1)], 1.0);
    assert_eq!(e[(2, 2)], 0.5);
    assert_eq!(e[(0, 1)], 0.0);

    let e = plane_stress(2500.0, 0.3);
    assert!((e[(0, 1)] - e[(1, 0)]).abs() < 1e-6);
}

#[test]
fn quadratic_shape_functions_interpolate_nodes() {
    let points = [
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(0.5, 0.5, 0.0),
        Vec3::new(0.0, 0.5, 0.5),
        Vec3::new(0.5, 0.0, 0.5),
    ];
    for (node, gp) in points.iter().enumerate() {
        let n = C0::form(*gp);
        for (i, value) in n.iter().take(6).enumerate() {
            let expected = if i == node { 1.0 } else { 0.0 };
            assert!((value - expected).abs() < 1e-6, "N{i} at node {node} = {value}");
        }
    }

    let n = C0::form(Vec3::new(0.2, 0.3, 0.5));
    let total: f32 = n[..6].iter().sum();
    assert!((total - 1.0).abs() < 1e-6);
}

#[test]
fn quartic_shape_functions_interpolate_corners() {
    let corners = [Vec3::X, Vec3::Y, Vec3::Z];
    for (node, gp) in corners.iter().enumerate() {
        let n = C1::form(*gp);
        for (i, value) in n.iter().enumerate() {
            let expected = if i == node { 1.0 } else { 0.0 };
            assert!((value - expected).abs() < 1e-6, "N{i} at corner {node} = {value}");
        }
    }
    assert_eq!(C1::LOCAL_DOFS, 15);
    assert!(C1::uses_tangents());
    assert!(!C0::uses_tangents());
}

// ─── FE Tests ────────────────────────────────────────────────

#[test]
fn fe_initialize_counts() {
    let out = grid(2);
    let mut c1 = FeC1::new(SimConfig::default());
    c1.initialize(&out).unwrap();
    assert_eq!(c1.node_count(), 25);
    assert_eq!(c1.tangent_count(), out.tangent_count);
    assert_eq!(c1.element_count(), 8);
    assert_eq!(c1.name(), "fe_c1");
    assert!(c1.solver().is_some());

    let mut c0 = FeC0::new(SimConfig::default());
    c0.initialize(&out).unwrap();
    assert_eq!(c0.dof_count(), 25);
    // Unit square, unit density: node masses add up to one.
    assert!((c0.node_mass() * 25.0 - 1.0).abs() < 1e-5);
}

#[test]
fn fe_rejects_invalid_output() {
    let mut out = grid(1);
    out.elements[0].nodes[0] = 999;
    let mut sim = FeC1::new(SimConfig::default());
    assert!(matches!(sim.initialize(&out), Err(WeftError::InvalidTopology(_))));
}

#[test]
fn fe_undeformed_has_no_force() {
    let out = grid(1);
    let mut sim = FeC1::new(SimConfig::default());
    sim.initialize(&out).unwrap();
    for e in 0..sim.element_count() {
        let c = sim.element_contribution(e, &out.rest_positions).unwrap();
        assert!(c.force.amax() < 1e-6);
    }
}

#[test]
fn fe_rest_stiffness_is_purely_elastic() {
    let out = grid(1);
    let mut sim = FeC0::new(SimConfig::default());
    sim.initialize(&out).unwrap();
    let elasticity = *sim.elasticity();

    for (e, element) in out.elements.iter().enumerate() {
        let local: Vec<Vec3> = element
            .nodes
            .iter()
            .map(|&v| out.rest_positions[v as usize])
            .collect();
        // Σ B₀ᵀ E B₀ · w · A with no stress, hence no geometric term.
        let mut elastic = DMatrix::<f32>::zeros(18, 18);
        for g in &GAUSS_12 {
            let dn = C0::derivatives(g.coords);
            let ops = StrainOperators::new(&local, &dn, None).unwrap();
            let scale = g.weight * ops.frame.area();
            elastic += ops.b.transpose() * elasticity * &ops.b * scale;
        }

        let c = sim.element_contribution(e, &out.rest_positions).unwrap();
        let tol = 1e-4 * elastic.amax();
        assert!(elastic.amax() > 0.0);
        assert!((&c.stiffness - &elastic).amax() < tol);
        assert!((&c.stiffness - c.stiffness.transpose()).amax() < tol);
    }
}

#[test]
fn fe_rigid_motion_has_no_force() {
    let out = grid(1);
    let mut sim = FeC0::new(SimConfig::default());
    sim.initialize(&out).unwrap();

    let translated: Vec<Vec3> = out
        .rest_positions
        .iter()
        .map(|p| *p + Vec3::new(1.0, 2.0, 3.0))
        .collect();
    let rotation = Mat3::from_rotation_z(0.5) * Mat3::from_rotation_x(0.3);
    let rotated: Vec<Vec3> = out.rest_positions.iter().map(|p| rotation * *p).collect();

    for x in [&translated, &rotated] {
        for e in 0..sim.element_count() {
            let c = sim.element_contribution(e, x).unwrap();
            assert!(c.force.amax() < 1e-2, "force {}", c.force.amax());
        }
    }
}

#[test]
fn fe_stretch_produces_restoring_force() {
    let out = grid(1);
    let mut sim = FeC0::new(SimConfig::default());
    sim.initialize(&out).unwrap();

    let stretched: Vec<Vec3> = out
        .rest_positions
        .iter()
        .map(|p| Vec3::new(p.x * 1.1, p.y, p.z))
        .collect();
    let c = sim.element_contribution(0, &stretched).unwrap();
    assert!(c.force.amax() > 1e-3);

    let (stress, strain) = sim
        .vertex_stress_strain(0, Vec3::splat(1.0 / 3.0), &stretched)
        .unwrap();
    assert!(strain.x > 0.0);
    assert!(stress.x > 0.0);
}

#[test]
fn fe_gravity_drop_is_uniform() {
    let out = grid(1);
    let mut sim = FeC0::new(SimConfig::default());
    sim.initialize(&out).unwrap();

    let dofs = out.dof_count();
    let v = vec![Vec3::ZERO; dofs];
    let mut out_v = vec![Vec3::ONE; dofs];
    let dt = 0.0005;
    let report = sim
        .step_simulation(dt, GRAVITY, &out.positions, &v, &mut out_v)
        .unwrap();

    assert!(report.valid_timestep);
    assert!(report.solver.is_some_and(|s| s.converged));
    let expected = GRAVITY.y * dt;
    for vel in &out_v[..out.node_count] {
        assert!((vel.y - expected).abs() < 1e-3 * expected.abs(), "{vel}");
    }
    // C0 leaves the tangent DOFs at rest.
    assert!(out_v[out.node_count..].iter().all(|v| *v == Vec3::ZERO));
}

#[test]
fn fe_static_nodes_do_not_move() {
    let out = grid(1);
    for sim in [
        Box::new(FeC0::new(SimConfig::default())) as Box<dyn Simulation>,
        Box::new(FeC1::new(SimConfig::default())),
    ] {
        let mut sim = sim;
        sim.initialize(&out).unwrap();
        sim.set_static(0, true).unwrap();
        sim.set_static(8, true).unwrap();
        assert!(sim.is_static(0));
        assert!(sim.set_static(out.node_count, true).is_err());

        let dofs = out.dof_count();
        let v = vec![Vec3::ZERO; dofs];
        let mut out_v = vec![Vec3::ZERO; dofs];
        sim.step_simulation(0.0005, GRAVITY, &out.positions, &v, &mut out_v)
            .unwrap();
        assert_eq!(out_v[0], Vec3::ZERO);
        assert_eq!(out_v[8], Vec3::ZERO);
        assert!(out_v[4].y < 0.0);
    }
}

#[test]
fn fe_c1_variants_agree() {
    let out = grid(2);
    let x = bumped(&out);
    let dofs = out.dof_count();
    let v = vec![Vec3::ZERO; dofs];

    let mut c1 = FeC1::new(SimConfig::default());
    let mut alt = FeC1Alt::new(SimConfig::default());
    c1.initialize(&out).unwrap();
    alt.initialize(&out).unwrap();

    let mut v1 = vec![Vec3::ZERO; dofs];
    let mut v2 = vec![Vec3::ZERO; dofs];
    c1.step_simulation(0.0005, GRAVITY, &x, &v, &mut v1).unwrap();
    alt.step_simulation(0.0005, GRAVITY, &x, &v, &mut v2).unwrap();

    for (a, b) in v1.iter().zip(&v2) {
        assert!((*a - *b).length() < 1e-4, "{a} vs {b}");
    }

    let gp = Vec3::new(0.2, 0.3, 0.5);
    for e in 0..c1.element_count() {
        let p1 = c1.vertex_ws_pos(e, gp, &x).unwrap();
        let p2 = alt.vertex_ws_pos(e, gp, &x).unwrap();
        assert!((p1 - p2).length() < 1e-5);
    }
}

#[test]
fn fe_direct_solver_matches_mpcg() {
    let out = grid(1);
    let x = bumped(&out);
    let dofs = out.dof_count();
    let v = vec![Vec3::ZERO; dofs];

    let mut cfg = SimConfig::default();
    cfg.solver.tolerance = 1e-8;
    cfg.solver.max_iterations = 1000;
    let mut iterative = FeC1::new(cfg.clone());
    cfg.solver.linear_solver = LinearSolverKind::Cholesky;
    let mut direct = FeC1::new(cfg);
    iterative.initialize(&out).unwrap();
    direct.initialize(&out).unwrap();

    let mut v1 = vec![Vec3::ZERO; dofs];
    let mut v2 = vec![Vec3::ZERO; dofs];
    iterative.step_simulation(0.0005, GRAVITY, &x, &v, &mut v1).unwrap();
    direct.step_simulation(0.0005, GRAVITY, &x, &v, &mut v2).unwrap();
    for (a, b) in v1.iter().zip(&v2) {
        assert!((*a - *b).length() < 1e-3, "{a} vs {b}");
    }
}

#[test]
fn fe_collapsed_element_is_reported() {
    let out = grid(1);
    let mut sim = FeC0::new(SimConfig::default());
    sim.initialize(&out).unwrap();

    let dofs = out.dof_count();
    let x = vec![Vec3::ZERO; dofs];
    let v = vec![Vec3::ZERO; dofs];
    let mut out_v = vec![Vec3::ZERO; dofs];
    let err = sim
        .step_simulation(0.0005, GRAVITY, &x, &v, &mut out_v)
        .unwrap_err();
    assert!(matches!(err, WeftError::DegenerateElement { .. }));
}

#[test]
fn fe_queries() {
    let out = grid(1);
    let mut sim = FeC1::new(SimConfig::default());
    sim.initialize(&out).unwrap();

    let corner = out.elements[0].nodes[0] as usize;
    let p = sim.vertex_ws_pos(0, Vec3::X, &out.positions).unwrap();
    assert!((p - out.positions[corner]).length() < 1e-5);

    let r = sim
        .vertex_rotation(0, Vec3::splat(1.0 / 3.0), &out.positions)
        .unwrap();
    // Flat sheet in XY: the normal is ±Z.
    assert!((r.z_axis.z.abs() - 1.0).abs() < 1e-5);

    let (stress, strain) = sim
        .vertex_stress_strain(0, Vec3::splat(1.0 / 3.0), &out.positions)
        .unwrap();
    assert!(stress.length() < 1e-5 && strain.length() < 1e-6);

    assert!(matches!(
        sim.vertex_ws_pos(99, Vec3::X, &out.positions),
        Err(WeftError::InvariantViolation(_))
    ));
}

// ─── PBD Tests ───────────────────────────────────────────────

#[test]
fn pbd_constraint_counts() {
    let out = grid(1);
    let mut pbd = Pbd::default();
    pbd.initialize(&out).unwrap();

    assert_eq!(pbd.width(), 3);
    assert_eq!(pbd.triangles().len(), 8);
    // 8 shear + 6 warp + 6 weft.
    assert_eq!(pbd.distance_constraints().len(), 20);
    assert_eq!(pbd.bending_constraints().len(), 6);
    assert!(pbd.solver().is_none());
    assert_eq!(pbd.element_count(), 8);

    for c in pbd.distance_constraints() {
        assert!(c.rest_length > 0.0);
        assert!(c.k_prime > 0.0 && c.k_prime <= 1.0);
    }
}

#[test]
fn pbd_sweep_stiffness_compounds() {
    assert_eq!(sweep_stiffness(1.0, 20), 1.0);
    assert!((sweep_stiffness(0.5, 1) - 0.5).abs() < 1e-6);
    let kp = sweep_stiffness(0.5, 20);
    assert!(((1.0 - kp).powi(20) - 0.5).abs() < 1e-4);
}

#[test]
fn pbd_rest_state_stays_at_rest() {
    let out = grid(2);
    let mut pbd = Pbd::default();
    pbd.initialize(&out).unwrap();

    let dofs = out.dof_count();
    let v = vec![Vec3::ZERO; dofs];
    let mut out_v = vec![Vec3::ONE; dofs];
    pbd.step_simulation(0.0005, Vec3::ZERO, &out.positions, &v, &mut out_v)
        .unwrap();
    assert!(out_v.iter().all(|v| v.length() < 1e-4));
}

#[test]
fn pbd_static_nodes_hold_and_free_nodes_fall() {
    let out = grid(1);
    let mut pbd = Pbd::default();
    pbd.initialize(&out).unwrap();
    pbd.set_static(0, true).unwrap();
    pbd.set_static(2, true).unwrap();
    assert!(pbd.set_static(9, true).is_err());

    let dofs = out.dof_count();
    let v = vec![Vec3::ZERO; dofs];
    let mut out_v = vec![Vec3::ZERO; dofs];
    pbd.step_simulation(0.01, GRAVITY, &out.positions, &v, &mut out_v)
        .unwrap();
    assert_eq!(out_v[0], Vec3::ZERO);
    assert_eq!(out_v[2], Vec3::ZERO);
    assert!(out_v[4].y < 0.0);
    assert!(out_v[8].y < 0.0);
}

#[test]
fn pbd_restores_stretched_edges() {
    let out = grid(1);
    let mut pbd = Pbd::default();
    pbd.initialize(&out).unwrap();

    let dofs = out.dof_count();
    let mut x = out.positions.clone();
    for p in x.iter_mut().take(out.node_count) {
        p.x *= 1.2;
    }
    let v = vec![Vec3::ZERO; dofs];
    let mut out_v = vec![Vec3::ZERO; dofs];
    let dt = 0.01;
    pbd.step_simulation(dt, Vec3::ZERO, &x, &v, &mut out_v).unwrap();

    let before: f32 = pbd
        .distance_constraints()
        .iter()
        .map(|c| ((x[c.a] - x[c.b]).length() - c.rest_length).abs())
        .sum();
    let after: f32 = pbd
        .distance_constraints()
        .iter()
        .map(|c| {
            let (pa, pb) = (x[c.a] + out_v[c.a] * dt, x[c.b] + out_v[c.b] * dt);
            ((pa - pb).length() - c.rest_length).abs()
        })
        .sum();
    assert!(after < before);
}

#[test]
fn pbd_full_stiffness_reaches_rest_length() {
    let out = grid(1);
    let config = PbdConfig {
        solver_steps: 20,
        k_weft: 1.0,
        k_warp: 0.0,
        k_shear: 0.0,
        k_bend: 0.0,
        velocity_blend: 1.0,
        ..PbdConfig::default()
    };
    let mut pbd = Pbd::new(config);
    pbd.initialize(&out).unwrap();

    let dofs = out.dof_count();
    let mut x = out.positions.clone();
    for p in x.iter_mut().take(out.node_count) {
        p.x *= 1.2;
    }
    let v = vec![Vec3::ZERO; dofs];
    let mut out_v = vec![Vec3::ZERO; dofs];
    let dt = 0.01;
    pbd.step_simulation(dt, Vec3::ZERO, &x, &v, &mut out_v).unwrap();

    let weft: Vec<_> = pbd
        .distance_constraints()
        .iter()
        .filter(|c| c.k == 1.0)
        .collect();
    assert_eq!(weft.len(), 6);
    for c in weft {
        let (pa, pb) = (x[c.a] + out_v[c.a] * dt, x[c.b] + out_v[c.b] * dt);
        let len = (pa - pb).length();
        assert!((len - c.rest_length).abs() < 1e-3, "{len} vs {}", c.rest_length);
    }
}

#[test]
fn pbd_non_finite_state_is_an_error_and_spares_statics() {
    let out = grid(1);
    let mut pbd = Pbd::default();
    pbd.initialize(&out).unwrap();
    pbd.set_static(0, true).unwrap();

    let dofs = out.dof_count();
    let mut x = out.positions.clone();
    x[4] = Vec3::NAN;
    let v = vec![Vec3::ZERO; dofs];
    let mut out_v = vec![Vec3::ZERO; dofs];
    let err = pbd
        .step_simulation(0.001, GRAVITY, &x, &v, &mut out_v)
        .unwrap_err();
    assert!(matches!(err, WeftError::NumericalInstability(_)));
    assert_eq!(out_v[0], Vec3::ZERO);
}

#[test]
fn pbd_rotation_follows_each_step() {
    let out = grid(1);
    let mut pbd = Pbd::default();
    pbd.initialize(&out).unwrap();
    assert!(pbd.is_position_based());

    let gp = Vec3::splat(1.0 / 3.0);
    let at_rest = pbd.vertex_rotation(0, gp, &out.positions).unwrap();
    assert!(at_rest.abs_diff_eq(Mat3::IDENTITY, 1e-4));

    let turn = Mat3::from_rotation_z(0.5);
    let x: Vec<Vec3> = out.positions.iter().map(|p| turn * *p).collect();
    let dofs = out.dof_count();
    let v = vec![Vec3::ZERO; dofs];
    let mut out_v = vec![Vec3::ZERO; dofs];
    pbd.step_simulation(0.001, Vec3::ZERO, &x, &v, &mut out_v)
        .unwrap();

    let first = pbd.vertex_rotation(0, gp, &x).unwrap();
    let second = pbd.vertex_rotation(0, gp, &x).unwrap();
    assert_eq!(first, second);
    assert!(!first.abs_diff_eq(Mat3::IDENTITY, 0.1));
    assert!((first.determinant() - 1.0).abs() < 1e-3);
}

#[test]
fn pbd_is_deterministic_for_a_seed() {
    let out = grid(2);
    let x = bumped(&out);
    let dofs = out.dof_count();
    let v = vec![Vec3::ZERO; dofs];

    let run = || {
        let mut pbd = Pbd::default();
        pbd.initialize(&out).unwrap();
        let mut out_v = vec![Vec3::ZERO; dofs];
        pbd.step_simulation(0.001, GRAVITY, &x, &v, &mut out_v).unwrap();
        out_v
    };
    assert_eq!(run(), run());
}

#[test]
fn pbd_queries() {
    let out = grid(1);
    let mut pbd = Pbd::default();
    pbd.initialize(&out).unwrap();

    let [v1, v2, v3] = pbd.triangles()[0];
    let gp = Vec3::new(0.2, 0.3, 0.5);
    let p = pbd.vertex_ws_pos(0, gp, &out.positions).unwrap();
    let expected = out.positions[v1] * 0.2 + out.positions[v2] * 0.3 + out.positions[v3] * 0.5;
    assert!((p - expected).length() < 1e-6);

    // Undeformed: every triangle rotation is the identity.
    let r = pbd.vertex_rotation(0, gp, &out.positions).unwrap();
    assert!((r - Mat3::IDENTITY).abs_diff_eq(Mat3::ZERO, 1e-4));

    let (stress, strain) = pbd.vertex_stress_strain(0, gp, &out.positions).unwrap();
    assert_eq!(stress, Vec3::ZERO);
    assert_eq!(strain, Vec3::ZERO);
}

#[test]
fn pbd_rejects_non_square_output() {
    let mut out = grid(1);
    out.node_count = 8;
    out.descriptors.truncate(8);
    out.positions.remove(0);
    out.rest_positions.remove(0);
    out.elements.clear();
    let mut pbd = Pbd::default();
    assert!(matches!(pbd.initialize(&out), Err(WeftError::InvalidTopology(_))));
}

// ─── Integrator Tests ────────────────────────────────────────

/// Adds a constant acceleration to every DOF; optionally fails on one call.
struct ConstantAcceleration {
    accel: Vec3,
    calls: u32,
    fail_on: Option<u32>,
    timer: ProfilingTimer,
}

impl ConstantAcceleration {
    fn new(accel: Vec3) -> Self {
        Self {
            accel,
            calls: 0,
            fail_on: None,
            timer: ProfilingTimer::new("Total Time"),
        }
    }
}

impl FieldQuery for ConstantAcceleration {
    fn element_count(&self) -> usize {
        0
    }

    fn vertex_ws_pos(&self, _: usize, _: Vec3, _: &[Vec3]) -> WeftResult<Vec3> {
        Ok(Vec3::ZERO)
    }

    fn vertex_rotation(&self, _: usize, _: Vec3, _: &[Vec3]) -> WeftResult<Mat3> {
        Ok(Mat3::IDENTITY)
    }

    fn vertex_stress_strain(&self, _: usize, _: Vec3, _: &[Vec3]) -> WeftResult<(Vec3, Vec3)> {
        Ok((Vec3::ZERO, Vec3::ZERO))
    }
}

impl Simulation for ConstantAcceleration {
    fn name(&self) -> &'static str {
        "constant_acceleration"
    }

    fn initialize(&mut self, _: &GeneratorOutput) -> WeftResult<()> {
        Ok(())
    }

    fn step_simulation(
        &mut self,
        dt: f32,
        _gravity: Vec3,
        _x: &[Vec3],
        v: &[Vec3],
        out_v: &mut [Vec3],
    ) -> WeftResult<StepReport> {
        self.calls += 1;
        if self.fail_on == Some(self.calls) {
            return Err(WeftError::DegenerateElement {
                element: 0,
                gauss_point: 0,
                area: 0.0,
            });
        }
        for (o, v) in out_v.iter_mut().zip(v) {
            *o = *v + self.accel * dt;
        }
        Ok(StepReport::default())
    }

    fn is_static(&self, _: usize) -> bool {
        false
    }

    fn set_static(&mut self, _: usize, _: bool) -> WeftResult<()> {
        Ok(())
    }

    fn profiler_total(&self) -> &ProfilingTimer {
        &self.timer
    }

    fn sub_profilers(&self) -> Vec<&ProfilingTimer> {
        Vec::new()
    }
}

fn integrator_with(sim: ConstantAcceleration, kind: IntegrationType) -> (Integrator, GeneratorOutput) {
    let out = grid(1);
    let mut integrator = Integrator::new();
    integrator.set_integration_type(kind);
    integrator.set_sub_timestep(0.25).unwrap();
    integrator.initialize(Box::new(sim), &out).unwrap();
    (integrator, out)
}

#[test]
fn integrator_defaults() {
    let integrator = Integrator::new();
    assert_eq!(integrator.integration_type(), IntegrationType::Rk2);
    assert_eq!(integrator.sub_timestep(), 0.0005);
    assert_eq!(integrator.gravity(), GRAVITY);
    assert!(integrator.simulation().is_none());
}

#[test]
fn integrator_requires_simulation() {
    let mut integrator = Integrator::new();
    assert!(integrator.update_simulation(0.1).is_err());
    assert!(integrator.set_sub_timestep(0.0).is_err());
}

#[test]
fn explicit_constant_acceleration() {
    let accel = Vec3::new(0.0, -8.0, 0.0);
    let (mut integrator, out) =
        integrator_with(ConstantAcceleration::new(accel), IntegrationType::Explicit);

    assert_eq!(integrator.update_simulation(0.25).unwrap(), 1);
    for (x, x0) in integrator.x().iter().zip(&out.positions) {
        assert!((x.y - (x0.y - 0.5)).abs() < 1e-6);
    }
    assert!(integrator.dxdt().iter().all(|v| (v.y + 2.0).abs() < 1e-6));
    assert_eq!(integrator.solver_calls(), 1);
}

#[test]
fn midpoint_constant_acceleration() {
    let accel = Vec3::new(0.0, -8.0, 0.0);
    let (mut integrator, out) =
        integrator_with(ConstantAcceleration::new(accel), IntegrationType::Rk2);

    integrator.update_simulation(0.25).unwrap();
    // One midpoint step lands on ½·a·h² with the full a·h of velocity.
    for (x, x0) in integrator.x().iter().zip(&out.positions) {
        assert!((x.y - (x0.y - 0.25)).abs() < 1e-6);
    }
    assert!(integrator.dxdt().iter().all(|v| (v.y + 2.0).abs() < 1e-6));
    assert_eq!(integrator.solver_calls(), 1);
}

#[test]
fn rk2_and_rk4_agree_under_constant_acceleration() {
    let accel = Vec3::new(0.0, -8.0, 0.0);
    for kind in [IntegrationType::Rk2, IntegrationType::Rk4] {
        let (mut integrator, out) = integrator_with(ConstantAcceleration::new(accel), kind);
        integrator.dxdt_mut().fill(Vec3::X);

        assert_eq!(integrator.update_simulation(1.0).unwrap(), 4);
        // x = x0 + v·t + ½·a·t², v = v0 + a·t.
        for (x, x0) in integrator.x().iter().zip(&out.positions) {
            assert!((x.x - (x0.x + 1.0)).abs() < 1e-4, "{kind:?}");
            assert!((x.y - (x0.y - 4.0)).abs() < 1e-4, "{kind:?}");
        }
        for v in integrator.dxdt() {
            assert!((*v - Vec3::new(1.0, -8.0, 0.0)).length() < 1e-4, "{kind:?}");
        }
    }
}

#[test]
fn fe_free_fall_matches_gravity_for_every_scheme() {
    for kind in IntegrationType::ALL {
        let mut config = SimConfig::default();
        config.integrator.kind = kind;
        let mut manager =
            Manager::with_generator(config, Box::new(SquareGrid::default()), SimType::FeC0)
                .unwrap();
        manager.update(0.01).unwrap();

        let expected = -9.81 * manager.integrator().elapsed() as f32;
        let nodes = manager.base().node_count;
        for v in &manager.integrator().dxdt()[..nodes] {
            assert!(
                (v.y - expected).abs() < 1e-2 * expected.abs(),
                "{kind:?}: {} vs {expected}",
                v.y
            );
        }
    }
}

#[test]
fn schemes_preserve_constant_velocity() {
    for kind in [
        IntegrationType::Explicit,
        IntegrationType::Rk2,
        IntegrationType::Rk4,
    ] {
        let (mut integrator, out) = integrator_with(ConstantAcceleration::new(Vec3::ZERO), kind);
        integrator.dxdt_mut().fill(Vec3::X);

        assert_eq!(integrator.update_simulation(1.0).unwrap(), 4);
        for (x, x0) in integrator.x().iter().zip(&out.positions) {
            assert!((x.x - (x0.x + 1.0)).abs() < 1e-5, "{kind:?}");
        }
        let per_step = if kind == IntegrationType::Rk4 { 3 } else { 1 };
        assert_eq!(integrator.solver_calls(), 4 * per_step);
        assert!((integrator.elapsed() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn integrator_carries_remainder() {
    let (mut integrator, _) =
        integrator_with(ConstantAcceleration::new(Vec3::ZERO), IntegrationType::Explicit);
    assert_eq!(integrator.update_simulation(0.375).unwrap(), 1);
    assert_eq!(integrator.update_simulation(0.125).unwrap(), 1);
    assert_eq!(integrator.update_simulation(0.0).unwrap(), 0);
}

#[test]
fn failed_sub_step_rolls_back() {
    let accel = Vec3::new(0.0, -8.0, 0.0);
    let mut sim = ConstantAcceleration::new(accel);
    sim.fail_on = Some(3);
    let (mut integrator, out) = integrator_with(sim, IntegrationType::Explicit);

    let err = integrator.update_simulation(1.0).unwrap_err();
    assert!(matches!(err, WeftError::DegenerateElement { .. }));

    // Two committed steps: v = −2, −4; x = x0 − 0.5 − 1.0.
    for (x, x0) in integrator.x().iter().zip(&out.positions) {
        assert!((x.y - (x0.y - 1.5)).abs() < 1e-5);
    }
    assert!(integrator.dxdt().iter().all(|v| (v.y + 4.0).abs() < 1e-5));

    // The remainder was dropped.
    assert_eq!(integrator.update_simulation(0.0).unwrap(), 0);
    assert_eq!(integrator.update_simulation(0.25).unwrap(), 1);
}

#[test]
fn actuators_run_before_each_sub_step() {
    let mut out = grid(1);
    out.actuators.push(Actuator::LinearDrive {
        node: 4,
        origin: Vec3::new(0.0, 0.0, 1.0),
        velocity: Vec3::new(0.0, 0.0, -1.0),
        duration: 10.0,
    });

    let mut integrator = Integrator::new();
    integrator.set_integration_type(IntegrationType::Explicit);
    integrator.set_sub_timestep(0.25).unwrap();
    integrator
        .initialize(Box::new(ConstantAcceleration::new(Vec3::ZERO)), &out)
        .unwrap();

    integrator.update_simulation(0.5).unwrap();
    assert!((integrator.x()[4] - Vec3::new(0.0, 0.0, 0.5)).length() < 1e-6);
}

#[test]
fn completion_callback_fires_once_per_update() {
    let (mut integrator, _) =
        integrator_with(ConstantAcceleration::new(Vec3::ZERO), IntegrationType::Explicit);
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    integrator.set_on_step_complete(Box::new(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    }));

    integrator.update_simulation(1.0).unwrap();
    integrator.update_simulation(0.1).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn completion_callback_fires_on_failed_update() {
    let mut sim = ConstantAcceleration::new(Vec3::ZERO);
    sim.fail_on = Some(2);
    let (mut integrator, _) = integrator_with(sim, IntegrationType::Explicit);
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    integrator.set_on_step_complete(Box::new(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    }));

    assert!(integrator.update_simulation(1.0).is_err());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

// ─── Manager Tests ───────────────────────────────────────────

#[test]
fn manager_defaults_to_fe_c1() {
    let manager = Manager::new(SimConfig::default()).unwrap();
    assert_eq!(manager.sim_type(), SimType::FeC1);
    assert_eq!(manager.simulation().map(|s| s.name()), Some("fe_c1"));
    assert_eq!(manager.integrator().x().len(), manager.base().dof_count());
}

#[test]
fn manager_gravity_drop() {
    let mut manager = Manager::new(SimConfig::default()).unwrap();
    let before: f32 = manager.integrator().x()[..9].iter().map(|p| p.y).sum();
    let report = manager.update(0.005).unwrap();
    assert!(report.sub_steps >= 9 && report.sub_steps <= 10);
    assert!(report.solve.is_some());

    let x = manager.integrator().x();
    assert!(x.iter().all(|p| p.is_finite()));
    let after: f32 = x[..9].iter().map(|p| p.y).sum();
    assert!(after < before);
}

#[test]
fn manager_hot_swaps_variants() {
    let mut manager = Manager::new(SimConfig::default()).unwrap();
    for sim_type in SimType::ALL {
        manager.set_sim_type(sim_type).unwrap();
        assert_eq!(manager.simulation().map(|s| s.name()), Some(sim_type.name()));
        manager.update(0.001).unwrap();
        assert!(manager.integrator().x().iter().all(|p| p.is_finite()));
    }

    manager.set_sim_type(SimType::None).unwrap();
    assert!(manager.simulation().is_none());
    assert_eq!(manager.update(0.01).unwrap().sub_steps, 0);
}

#[test]
fn sim_type_parses() {
    assert_eq!("fe-c1-alt".parse::<SimType>().unwrap(), SimType::FeC1Alt);
    assert_eq!("PBD".parse::<SimType>().unwrap(), SimType::Pbd);
    assert!("verlet".parse::<SimType>().is_err());
    assert_eq!(SimType::FeC0.to_string(), "fe_c0");

    assert_eq!("RK4".parse::<IntegrationType>().unwrap(), IntegrationType::Rk4);
    assert_eq!("midpoint".parse::<IntegrationType>().unwrap(), IntegrationType::Rk2);
    assert!("verlet".parse::<IntegrationType>().is_err());
}

#[test]
fn manager_set_transform_keeps_statics() {
    let mut manager = Manager::new(SimConfig::default()).unwrap();
    manager.set_is_static(0, true).unwrap();
    assert!(manager.set_is_static(100, true).is_err());

    manager
        .set_transform(Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)))
        .unwrap();
    assert!(manager.base().is_static(0));
    assert!(manager.simulation().is_some_and(|s| s.is_static(0)));
    assert!((manager.integrator().x()[4].y - 1.0).abs() < 1e-6);
}

#[test]
fn manager_generator_swap() {
    let mut manager = Manager::new(SimConfig::default()).unwrap();
    manager.set_generator(Box::new(SquareGrid::new(2))).unwrap();
    assert_eq!(manager.base().node_count, 25);
    assert_eq!(manager.integrator().x().len(), manager.base().dof_count());
}

#[test]
fn manager_bend_test_drives_centre() {
    let bend = BendTest::new(1);
    let centre = bend.centre() as usize;
    let mut manager =
        Manager::with_generator(SimConfig::default(), Box::new(bend), SimType::Pbd).unwrap();
    assert!(manager.base().is_static(centre));

    manager.update(0.01).unwrap();
    assert!(manager.integrator().x()[centre].z < 0.0);
}

#[test]
fn manager_pbd_bend_test_stays_finite_with_default_scheme() {
    let bend = BendTest::new(2);
    let side = bend.grid().subdivisions() as usize;
    let mut manager =
        Manager::with_generator(SimConfig::default(), Box::new(bend), SimType::Pbd).unwrap();
    assert_eq!(manager.integrator().integration_type(), IntegrationType::Rk2);

    let n = manager.base().node_count;
    let corners = [0, side - 1, n - side, n - 1];
    let rest: Vec<Vec3> = corners.iter().map(|&i| manager.integrator().x()[i]).collect();

    for _ in 0..60 {
        manager.update(1.0 / 60.0).unwrap();
    }
    let x = manager.integrator().x();
    assert!(x.iter().all(|p| p.is_finite()));
    for (&i, r) in corners.iter().zip(&rest) {
        assert!((x[i] - *r).length() < 1e-6, "corner {i} moved to {}", x[i]);
    }
}

#[test]
fn manager_publishes_events() {
    let mut manager = Manager::new(SimConfig::default()).unwrap();
    let sink = VecSink::new();
    let events = sink.events();
    manager.events_mut().add_sink(Box::new(sink));

    manager.reset().unwrap();
    manager.update(0.002).unwrap();

    let events = events.lock().unwrap();
    assert!(matches!(events[0].kind, EventKind::Reset { nodes: 9, .. }));
    assert!(events
        .iter()
        .any(|e| matches!(e.kind, EventKind::FrameCompleted { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e.kind, EventKind::Convergence { .. })));
}

#[test]
fn manager_reports_degenerate_elements() {
    let mut manager = Manager::new(SimConfig::default()).unwrap();
    let sink = VecSink::new();
    let events = sink.events();
    manager.events_mut().add_sink(Box::new(sink));

    // Collapse every current position onto the origin.
    manager.set_transform(Mat4::ZERO).unwrap();
    let err = manager.update(0.001).unwrap_err();
    assert!(matches!(err, WeftError::DegenerateElement { .. }));

    let events = events.lock().unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e.kind, EventKind::DegenerateElement { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e.kind, EventKind::StepFailed { .. })));
}
