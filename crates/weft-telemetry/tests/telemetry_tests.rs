//! Integration tests for weft-telemetry.

use weft_telemetry::bus::EventBus;
use weft_telemetry::events::{EventKind, SimulationEvent};
use weft_telemetry::sinks::{TracingSink, VecSink};

fn frame_event(frame: u32) -> SimulationEvent {
    SimulationEvent::new(
        frame,
        EventKind::FrameCompleted {
            sub_steps: 33,
            sim_time: 0.0165,
            wall_time_ms: 1.2,
        },
    )
}

#[test]
fn emit_and_flush_reaches_sink() {
    let mut bus = EventBus::new();
    let sink = VecSink::new();
    let events = sink.events();
    bus.add_sink(Box::new(sink));

    bus.emit(frame_event(0));
    bus.emit(frame_event(1));
    assert!(events.lock().unwrap().is_empty());

    assert_eq!(bus.flush(), 2);
    let got = events.lock().unwrap();
    assert_eq!(got.len(), 2);
    assert_eq!(got[1].frame, 1);
}

#[test]
fn disabled_bus_drops_events() {
    let mut bus = EventBus::new();
    let sink = VecSink::new();
    let events = sink.events();
    bus.add_sink(Box::new(sink));

    bus.set_enabled(false);
    assert!(!bus.is_enabled());
    bus.emit(frame_event(0));
    assert_eq!(bus.flush(), 0);
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn every_sink_sees_every_event() {
    let mut bus = EventBus::new();
    let first = VecSink::new();
    let second = VecSink::new();
    let (a, b) = (first.events(), second.events());
    bus.add_sink(Box::new(first));
    bus.add_sink(Box::new(TracingSink::new()));
    bus.add_sink(Box::new(second));
    assert_eq!(bus.sink_count(), 3);
    assert_eq!(bus.sink_names(), vec!["vec_sink", "tracing_sink", "vec_sink"]);

    bus.emit(SimulationEvent::new(
        4,
        EventKind::DegenerateElement {
            element: 7,
            gauss_point: 2,
            area: -0.01,
        },
    ));
    bus.finalize();

    assert_eq!(a.lock().unwrap().len(), 1);
    assert_eq!(*a.lock().unwrap(), *b.lock().unwrap());
}

#[test]
fn convergence_event_json() {
    let event = SimulationEvent::new(
        10,
        EventKind::Convergence {
            iterations: 15,
            final_residual: 1e-8,
            converged: true,
        },
    );
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("converged"));
    let back: SimulationEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}
