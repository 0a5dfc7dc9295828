//! Edge-count callbacks multiplexed onto one value-change subscription per
//! signal.

use aion_gpi::{CallbackState, Edge, Gpi, SetAction};
use aion_gpi_conformance::{drive_clock, EventLog, Harness, CLOCKED};

fn timestamped(log: &EventLog, label: &str) -> impl FnMut(&Gpi) + 'static {
    let log = log.clone();
    let label = label.to_string();
    move |gpi| log.push(format!("{label}@{}", gpi.sim_time().unwrap().ticks()))
}

#[test]
fn waits_for_the_nth_rising_edge() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let clk = h.handle("tb.clk");
    let id = h
        .gpi
        .register_edge_callback(&clk, Edge::Rising, 2, timestamped(&log, "second"))
        .unwrap();
    assert_eq!(h.gpi.callback_state(id), Some(CallbackState::Primed));
    assert_eq!(h.primary.registration_count(), 1);

    drive_clock(&h.gpi, &clk, 5, 8);
    h.primary.run_until(100);

    // Rising edges at 5, 15, 25, 35.
    assert_eq!(log.entries(), vec!["second@15"]);
    assert_eq!(h.gpi.callback_state(id), None);
    assert_eq!(h.gpi.edge_count(&clk, Edge::Rising), None);
    assert_eq!(h.primary.registration_count(), 0);
    assert_eq!(h.gpi.callback_count(), 0);
}

#[test]
fn one_subscription_serves_every_waiter() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let clk = h.handle("tb.clk");
    h.gpi
        .register_edge_callback(&clk, Edge::Rising, 1, timestamped(&log, "r1"))
        .unwrap();
    h.gpi
        .register_edge_callback(&clk, Edge::Rising, 3, timestamped(&log, "r3"))
        .unwrap();
    h.gpi
        .register_edge_callback(&clk, Edge::Falling, 1, timestamped(&log, "f1"))
        .unwrap();
    assert_eq!(h.primary.registration_count(), 1);

    drive_clock(&h.gpi, &clk, 5, 8);
    h.primary.run_until(100);
    assert_eq!(log.entries(), vec!["r1@5", "f1@10", "r3@25"]);
    assert_eq!(h.primary.registration_count(), 0);
}

#[test]
fn waiters_on_the_same_target_fire_together() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let clk = h.handle("tb.clk");
    for label in ["a", "b", "c"] {
        h.gpi
            .register_edge_callback(&clk, Edge::Rising, 2, timestamped(&log, label))
            .unwrap();
    }
    drive_clock(&h.gpi, &clk, 5, 4);
    h.primary.run_until(100);
    assert_eq!(log.entries(), vec!["a@15", "b@15", "c@15"]);
}

#[test]
fn counters_only_advance_while_waited_on() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let clk = h.handle("tb.clk");
    h.gpi
        .register_edge_callback(&clk, Edge::Falling, 3, timestamped(&log, "f3"))
        .unwrap();

    h.primary.poke("tb.clk", "1").unwrap();
    h.primary.poke("tb.clk", "0").unwrap();
    assert_eq!(h.gpi.edge_count(&clk, Edge::Falling), Some(1));
    // No rising waiter, so the rising counter has not moved.
    assert_eq!(h.gpi.edge_count(&clk, Edge::Rising), Some(0));

    // A late waiter counts from the current value of its class.
    h.gpi
        .register_edge_callback(&clk, Edge::Rising, 1, timestamped(&log, "r1"))
        .unwrap();
    h.primary.poke("tb.clk", "1").unwrap();
    assert_eq!(h.gpi.edge_count(&clk, Edge::Rising), Some(1));
    h.primary.poke("tb.clk", "0").unwrap();
    h.primary.poke("tb.clk", "1").unwrap();
    h.primary.poke("tb.clk", "0").unwrap();
    assert_eq!(log.entries(), vec!["r1@0", "f3@0"]);
}

#[test]
fn zero_count_waits_for_the_next_edge() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let clk = h.handle("tb.clk");
    h.gpi
        .register_edge_callback(&clk, Edge::Rising, 0, log.recorder("next"))
        .unwrap();
    h.primary.poke("tb.clk", "1").unwrap();
    assert_eq!(log.entries(), vec!["next"]);
}

#[test]
fn unknown_values_are_not_edges() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let clk = h.handle("tb.clk");
    h.gpi
        .register_edge_callback(&clk, Edge::Rising, 1, log.recorder("rise"))
        .unwrap();
    h.primary.poke("tb.clk", "x").unwrap();
    h.primary.poke("tb.clk", "z").unwrap();
    assert!(log.entries().is_empty());
    h.primary.poke("tb.clk", "1").unwrap();
    assert_eq!(log.entries(), vec!["rise"]);
}

#[test]
fn removing_the_last_waiter_drops_the_subscription() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let clk = h.handle("tb.clk");
    let a = h
        .gpi
        .register_edge_callback(&clk, Edge::Rising, 2, log.recorder("a"))
        .unwrap();
    let b = h
        .gpi
        .register_edge_callback(&clk, Edge::Falling, 2, log.recorder("b"))
        .unwrap();
    assert_eq!(h.primary.registration_count(), 1);

    h.gpi.remove(a).unwrap();
    assert_eq!(h.primary.registration_count(), 1);
    h.gpi.remove(b).unwrap();
    assert_eq!(h.primary.registration_count(), 0);
    assert_eq!(h.gpi.callback_count(), 0);

    h.primary.poke("tb.clk", "1").unwrap();
    h.primary.poke("tb.clk", "0").unwrap();
    assert!(log.entries().is_empty());
}

#[test]
fn edge_waiter_can_wait_again() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let clk = h.handle("tb.clk");

    fn wait_rising(gpi: &Gpi, clk: std::rc::Rc<aion_gpi::ObjectHandle>, log: EventLog, left: u32) {
        if left == 0 {
            return;
        }
        let again = clk.clone();
        gpi.register_edge_callback(&clk, Edge::Rising, 1, move |gpi| {
            log.push(format!("edge@{}", gpi.sim_time().unwrap().ticks()));
            wait_rising(gpi, again.clone(), log.clone(), left - 1);
        });
    }

    wait_rising(&h.gpi, clk.clone(), log.clone(), 3);
    drive_clock(&h.gpi, &clk, 5, 10);
    h.primary.run_until(100);
    assert_eq!(log.entries(), vec!["edge@5", "edge@15", "edge@25"]);
    assert_eq!(h.primary.registration_count(), 0);
}

#[test]
fn removing_a_sibling_waiter_then_driving_is_safe() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let clk = h.handle("tb.clk");

    let later = h
        .gpi
        .register_edge_callback(&clk, Edge::Rising, 5, log.recorder("later"))
        .unwrap();
    let l = log.clone();
    let driven = clk.clone();
    h.gpi
        .register_edge_callback(&clk, Edge::Rising, 1, move |gpi| {
            // Last other waiter: the shared subscription is released while
            // it is still running.
            gpi.remove(later).unwrap();
            driven.set_value_binstr("0", SetAction::Deposit).unwrap();
            l.push("first");
        })
        .unwrap();

    h.primary.poke("tb.clk", "1").unwrap();
    assert_eq!(log.entries(), vec!["first"]);
    assert!(!h.primary.end_requested());
    assert!(!h.gpi.sim_end_requested());
    assert_eq!(h.gpi.edge_count(&clk, Edge::Rising), None);
    assert_eq!(h.primary.registration_count(), 0);
    assert_eq!(h.gpi.callback_count(), 0);

    h.primary.poke("tb.clk", "1").unwrap();
    assert_eq!(log.entries(), vec!["first"]);
}

#[test]
fn tied_waiters_fire_together_and_later_counts_keep_waiting() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let clk = h.handle("tb.clk");
    for (label, count) in [("k2a", 2), ("k2b", 2), ("k5", 5)] {
        h.gpi
            .register_edge_callback(&clk, Edge::Rising, count, log.recorder(label))
            .unwrap();
    }
    let rise = |h: &Harness| {
        h.primary.poke("tb.clk", "0").unwrap();
        h.primary.poke("tb.clk", "1").unwrap();
    };

    rise(&h);
    assert!(log.entries().is_empty());
    rise(&h);
    assert_eq!(log.count("k2a"), 1);
    assert_eq!(log.count("k2b"), 1);
    assert_eq!(log.count("k5"), 0);
    rise(&h);
    rise(&h);
    assert_eq!(log.count("k5"), 0);
    rise(&h);
    assert_eq!(log.count("k5"), 1);
    assert_eq!(log.count("k2a"), 1);
    assert_eq!(log.count("k2b"), 1);
    assert_eq!(h.primary.registration_count(), 0);
}

#[test]
fn single_rising_edge_after_falling() {
    let h = Harness::new(CLOCKED);
    let log = EventLog::new();
    let clk = h.handle("tb.clk");
    h.primary.poke("tb.clk", "1").unwrap();
    let id = h
        .gpi
        .register_edge_callback(&clk, Edge::Rising, 1, log.recorder("rise"))
        .unwrap();

    h.primary.poke("tb.clk", "0").unwrap();
    assert!(log.entries().is_empty());
    h.primary.poke("tb.clk", "1").unwrap();
    assert_eq!(log.entries(), vec!["rise"]);
    assert_eq!(h.gpi.callback_state(id), None);
}
