//! Host bootstrap, shutdown reporting, finalization, and the fatal path taken
//! when dispatch is corrupted.

use std::rc::Rc;

use aion_gpi::{CallbackId, EventLevel, SetAction, PREMATURE_SHUTDOWN};
use aion_gpi_conformance::{EventLog, Harness, ScriptedHost, CLOCKED};

fn args() -> Vec<String> {
    vec!["+seed=7".to_string(), "--quiet".to_string()]
}

#[test]
fn host_is_started_with_its_arguments() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    h.gpi
        .bootstrap(ScriptedHost::new(log.clone()).into_rc(), args())
        .unwrap();
    assert!(log.entries().is_empty());
    h.primary.start();
    assert_eq!(log.entries(), vec!["host:init +seed=7 --quiet"]);
}

#[test]
fn unrequested_shutdown_is_reported_as_premature() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    h.gpi
        .bootstrap(ScriptedHost::new(log.clone()).into_rc(), Vec::new())
        .unwrap();
    let finalized = log.clone();
    h.gpi
        .register_finalize_callback(move || finalized.push("finalize"));

    h.primary.start();
    h.primary.run_until(50);
    h.primary.finish();
    assert_eq!(
        log.entries(),
        vec![
            "host:init ".to_string(),
            format!("host:event {} {PREMATURE_SHUTDOWN}", EventLevel::Fail),
            "host:end".to_string(),
            "finalize".to_string(),
        ]
    );
    assert!(h.gpi.is_finalized());
}

#[test]
fn requested_end_is_not_an_error() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let host = ScriptedHost::new(log.clone()).with_script(|gpi| {
        let top = gpi.root_handle(None).unwrap();
        let clk = gpi.child_by_name(&top, "clk").unwrap();
        gpi.register_timed_callback(10, move |gpi| {
            clk.set_value_binstr("1", SetAction::Deposit).unwrap();
            gpi.sim_end().unwrap();
        });
    });
    h.gpi.bootstrap(host.into_rc(), Vec::new()).unwrap();

    h.primary.start();
    h.primary.run_until(100);
    assert!(h.primary.end_requested());
    assert_eq!(h.primary.value_of("tb.clk").unwrap(), "1");
    h.primary.finish();
    assert_eq!(log.entries(), vec!["host:init ", "host:end"]);
    assert!(h.gpi.is_finalized());
}

#[test]
fn refused_host_ends_the_simulation() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    h.gpi
        .bootstrap(ScriptedHost::new(log.clone()).refusing().into_rc(), args())
        .unwrap();
    h.primary.start();
    assert!(h.primary.end_requested());
    assert!(h.gpi.sim_end_requested());
}

#[test]
fn finalize_runs_callbacks_in_reverse_once() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    for label in ["first", "second", "third"] {
        let l = log.clone();
        h.gpi.register_finalize_callback(move || l.push(label));
    }
    let _clk = h.handle("tb.clk");
    h.gpi.finalize();
    h.gpi.finalize();
    assert_eq!(log.entries(), vec!["third", "second", "first"]);
    assert_eq!(h.gpi.cache_len(), 0);
}

#[test]
fn corrupted_dispatch_ends_the_session() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    h.gpi
        .bootstrap(ScriptedHost::new(log.clone()).into_rc(), Vec::new())
        .unwrap();
    h.primary.inject_trigger(CallbackId::from_raw(999));
    assert!(h.primary.end_requested());
    assert!(h.gpi.sim_end_requested());
    assert_eq!(
        log.entries(),
        vec![format!("host:event FAIL {PREMATURE_SHUTDOWN}")]
    );

    // The shutdown that follows is expected and not reported again.
    h.primary.finish();
    assert_eq!(log.count("host:end"), 1);
    assert_eq!(log.entries().len(), 2);
}

#[test]
fn trigger_for_a_free_callback_is_fatal() {
    let h = Harness::new(CLOCKED);
    let id = h.gpi.create_readonly_callback(|_| {});
    h.primary.inject_trigger(id);
    assert!(h.primary.end_requested());
}

#[test]
fn bootstrap_without_backend_fails() {
    let gpi = aion_gpi::Gpi::new();
    let host: Rc<dyn aion_gpi::HostEnvironment> = ScriptedHost::new(EventLog::new()).into_rc();
    assert!(gpi.bootstrap(host, Vec::new()).is_err());
    assert_eq!(gpi.callback_count(), 0);
}
