//! Callback lifecycle: arming, firing, recurring versus one-shot, and
//! removal in every state.

use aion_gpi::{CallbackKind, CallbackState, Edge, GpiError};
use aion_gpi_conformance::{EventLog, Harness, CLOCKED};

#[test]
fn created_callbacks_are_free_until_armed() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let id = h.gpi.create_timed_callback(10, log.recorder("t"));
    assert_eq!(h.gpi.callback_state(id), Some(CallbackState::Free));
    assert_eq!(h.primary.registration_count(), 0);
    h.gpi.arm(id).unwrap();
    assert_eq!(h.gpi.callback_state(id), Some(CallbackState::Primed));
    assert_eq!(h.primary.registration_count(), 1);
}

#[test]
fn double_arm_is_rejected() {
    let h = Harness::new(CLOCKED);
    let id = h.gpi.create_readonly_callback(|_| {});
    h.gpi.arm(id).unwrap();
    assert!(matches!(h.gpi.arm(id), Err(GpiError::AlreadyArmed(x)) if x == id));
    assert_eq!(h.primary.registration_count(), 1);
}

#[test]
fn one_shot_fires_once_then_is_gone() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let id = h.gpi.register_timed_callback(5, log.recorder("timed")).unwrap();
    h.primary.run_until(100);
    assert_eq!(log.entries(), vec!["timed"]);
    assert_eq!(h.gpi.callback_state(id), None);
    assert_eq!(h.primary.registration_count(), 0);
}

#[test]
fn recurring_stays_primed() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let id = h.gpi.register_readonly_callback(log.recorder("ro")).unwrap();
    h.gpi.register_timed_callback(1, |_| {});
    h.gpi.register_timed_callback(2, |_| {});
    h.primary.run_until(10);
    assert_eq!(log.count("ro"), 2);
    assert_eq!(h.gpi.callback_state(id), Some(CallbackState::Primed));
}

#[test]
fn remove_primed_deregisters() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let id = h.gpi.register_timed_callback(5, log.recorder("timed")).unwrap();
    h.gpi.remove(id).unwrap();
    assert_eq!(h.gpi.callback_state(id), None);
    assert_eq!(h.primary.registration_count(), 0);
    h.primary.run_until(100);
    assert!(log.entries().is_empty());
}

#[test]
fn remove_free_needs_no_backend() {
    let h = Harness::new(CLOCKED);
    let id = h.gpi.create_nexttime_callback(|_| {});
    h.gpi.remove(id).unwrap();
    assert_eq!(h.gpi.callback_count(), 0);
}

#[test]
fn remove_unknown_is_an_error() {
    let h = Harness::new(CLOCKED);
    let id = h.gpi.create_readwrite_callback(|_| {});
    h.gpi.remove(id).unwrap();
    assert!(matches!(h.gpi.remove(id), Err(GpiError::UnknownCallback(_))));
}

#[test]
fn remove_inside_own_callback_is_deferred() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let clk = h.handle("tb.clk");
    let slot = std::rc::Rc::new(std::cell::Cell::new(None));
    let own = slot.clone();
    let l = log.clone();
    let id = h
        .gpi
        .register_value_change_callback(&clk, Edge::ValueChange, move |gpi| {
            let id = own.get().unwrap();
            l.push(format!("{:?}", gpi.callback_state(id)));
            gpi.remove(id).unwrap();
            l.push(format!("{:?}", gpi.callback_state(id)));
        })
        .unwrap();
    slot.set(Some(id));
    h.primary.poke("tb.clk", "1").unwrap();
    h.primary.poke("tb.clk", "0").unwrap();
    assert_eq!(log.entries(), vec!["Some(Call)", "Some(Delete)"]);
    assert_eq!(h.gpi.callback_state(id), None);
    assert_eq!(h.primary.registration_count(), 0);
}

#[test]
fn value_change_on_a_scope_is_rejected() {
    let h = Harness::new(CLOCKED);
    let dut = h.handle("tb.dut");
    let err = h
        .gpi
        .create_callback(
            CallbackKind::ValueChange {
                signal: dut.clone(),
                edge: Edge::ValueChange,
            },
            |_| {},
        )
        .unwrap_err();
    assert!(matches!(err, GpiError::NotASignal(_)));
    assert!(h
        .gpi
        .register_value_change_callback(&dut, Edge::Rising, |_| {})
        .is_none());
    assert_eq!(h.gpi.callback_count(), 0);
}

#[test]
fn edge_filter_skips_non_matching_changes() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let clk = h.handle("tb.clk");
    let id = h
        .gpi
        .register_value_change_callback(&clk, Edge::Falling, log.recorder("fall"))
        .unwrap();
    for v in ["1", "0", "x", "0", "1", "0"] {
        h.primary.poke("tb.clk", v).unwrap();
    }
    assert_eq!(log.count("fall"), 3);
    assert_eq!(h.gpi.callback_state(id), Some(CallbackState::Primed));
}

#[test]
fn startup_and_shutdown_are_one_shot() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    h.gpi.register_startup_callback(log.recorder("start")).unwrap();
    h.gpi.register_shutdown_callback(log.recorder("stop")).unwrap();
    h.primary.start();
    h.primary.start();
    h.primary.finish();
    h.primary.finish();
    assert_eq!(log.entries(), vec!["start", "stop"]);
    assert_eq!(h.gpi.callback_count(), 0);
}
