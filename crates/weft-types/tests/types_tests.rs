//! Integration tests for weft-types.

use weft_types::WeftError;

// ─── Error Tests ──────────────────────────────────────────────

#[test]
fn error_display() {
    let err = WeftError::InvalidTopology("element 3 references node 99".into());
    assert!(err.to_string().contains("node 99"));
}

#[test]
fn degenerate_element_display() {
    let err = WeftError::DegenerateElement {
        element: 4,
        gauss_point: 11,
        area: -1.0e-3,
    };
    let msg = err.to_string();
    assert!(msg.contains("Element 4"));
    assert!(msg.contains("Gauss point 11"));
}

#[test]
fn solver_divergence_display() {
    let err = WeftError::SolverDivergence {
        iterations: 100,
        residual: 1.5e-2,
    };
    let msg = err.to_string();
    assert!(msg.contains("100"));
    assert!(msg.contains("1.50e-2") || msg.contains("1.5e-2"));
}

// ─── Profiling Tests ──────────────────────────────────────────

#[test]
fn additive_timer_accumulates() {
    use weft_types::ProfilingTimer;

    let mut timer = ProfilingTimer::new("Solver");
    timer.begin_timing();
    std::thread::sleep(std::time::Duration::from_millis(2));
    timer.end_timing_additive();
    let first = timer.total_ms();

    timer.begin_timing();
    std::thread::sleep(std::time::Duration::from_millis(2));
    timer.end_timing_additive();

    assert!(timer.total_ms() > first);
    assert_eq!(timer.alias(), "Solver");

    timer.reset_total();
    assert_eq!(timer.total_ms(), 0.0);
}

#[test]
fn end_without_begin_is_noop() {
    let mut timer = weft_types::ProfilingTimer::default();
    timer.end_timing();
    timer.end_timing_additive();
    assert_eq!(timer.total_ms(), 0.0);
}
