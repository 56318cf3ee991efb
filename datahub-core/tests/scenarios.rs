//! Black-box scenarios and invariants against the public `datahub-core`
//! API (spec.md §8). Each test exercises the crate the way an embedder
//! would — through `ResourceTree`, `push`, and the `query` module —
//! never reaching into private fields.

use datahub_core::query;
use datahub_core::{push, DataKind, DataSample, HubError, ResourceTree};

fn tree() -> ResourceTree {
    ResourceTree::new(64, 255)
}

#[test]
fn invariant_find_entry_is_deterministic_and_idempotent() {
    let mut t = tree();
    let id = t.get_input(t.root(), "/sensor/temp", DataKind::Numeric, "degC").unwrap();
    assert_eq!(t.find_entry(t.root(), "/sensor/temp"), Some(id));
    assert_eq!(t.find_entry(t.root(), "/sensor/temp"), Some(id));
}

#[test]
fn invariant_repeated_get_input_is_idempotent() {
    let mut t = tree();
    let a = t.get_input(t.root(), "/x", DataKind::Numeric, "m").unwrap();
    let b = t.get_input(t.root(), "/x", DataKind::Numeric, "m").unwrap();
    assert_eq!(a, b);
}

#[test]
fn invariant_conflicting_recreation_is_duplicate_and_leaves_state() {
    let mut t = tree();
    t.get_input(t.root(), "/x", DataKind::Numeric, "m").unwrap();
    let err = t.get_input(t.root(), "/x", DataKind::Boolean, "m").unwrap_err();
    assert_eq!(err, HubError::Duplicate);
    assert_eq!(query::get_data_type(&t, "/x").unwrap(), DataKind::Numeric);
}

#[test]
fn invariant_default_does_not_change_once_set() {
    let mut t = tree();
    let entry = t.get_output(t.root(), "/y", DataKind::Numeric, "").unwrap();
    t.entry_mut(entry).resource_mut().unwrap().set_default(DataSample::numeric(0.0, 1.0));
    t.entry_mut(entry).resource_mut().unwrap().set_default(DataSample::numeric(0.0, 2.0));
    assert_eq!(query::get_numeric(&t, "/y").unwrap(), (0.0, 1.0));
}

#[test]
fn invariant_push_then_get_round_trip() {
    let mut t = tree();
    let entry = t.get_input(t.root(), "/sensor/temp", DataKind::Numeric, "degC").unwrap();
    push(&mut t, entry, DataKind::Numeric, DataSample::numeric(1700000000.0, 21.5), 0.0).unwrap();
    assert_eq!(query::get_numeric(&t, "/sensor/temp").unwrap(), (1700000000.0, 21.5));
}

#[test]
fn invariant_buffer_ordering_is_push_order_trimmed_by_start_after() {
    let mut t = tree();
    let obs = t.create_observation("/obs/o", DataKind::Numeric, "", 16, f64::INFINITY).unwrap();
    for (ts, v) in [(1.0, 10.0), (2.0, 20.0), (3.0, 30.0)] {
        push(&mut t, obs, DataKind::Numeric, DataSample::numeric(ts, v), 0.0).unwrap();
    }
    let json = query::read_buffer_json(&t, "/obs/o", 1.5, 3.5, None).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let arr = parsed.as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["t"], 2.0);
    assert_eq!(arr[1]["t"], 3.0);
}

#[test]
fn invariant_handler_fan_out_fires_exactly_once_and_removed_handler_is_silent() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut t = tree();
    let entry = t.get_output(t.root(), "/y", DataKind::Trigger, "").unwrap();

    let fired = Rc::new(RefCell::new(0));
    let fired2 = fired.clone();
    let id = t
        .entry_mut(entry)
        .resource_mut()
        .unwrap()
        .add_push_handler(DataKind::Trigger, move |_| *fired2.borrow_mut() += 1);

    let removed_fired = Rc::new(RefCell::new(0));
    let removed_fired2 = removed_fired.clone();
    let removed_id = t
        .entry_mut(entry)
        .resource_mut()
        .unwrap()
        .add_push_handler(DataKind::Trigger, move |_| *removed_fired2.borrow_mut() += 1);
    t.entry_mut(entry).resource_mut().unwrap().remove_push_handler(removed_id);

    push(&mut t, entry, DataKind::Trigger, DataSample::trigger(1.0), 0.0).unwrap();

    assert_eq!(*fired.borrow(), 1);
    assert_eq!(*removed_fired.borrow(), 0);
    let _ = id;
}

#[test]
fn invariant_readbufferjson_output_is_well_formed_json_array() {
    let mut t = tree();
    let obs = t.create_observation("/obs/o", DataKind::Trigger, "", 16, f64::INFINITY).unwrap();
    for ts in 1..=3 {
        push(&mut t, obs, DataKind::Trigger, DataSample::trigger(ts as f64), 0.0).unwrap();
    }
    let json = query::read_buffer_json(&t, "/obs/o", f64::NAN, 0.0, None).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("well-formed JSON");
    assert_eq!(parsed.as_array().unwrap().len(), 3);
}

#[test]
fn scenario_create_and_push_round_trip() {
    let mut t = tree();
    let entry = t.get_input(t.root(), "/sensor/temp", DataKind::Numeric, "degC").unwrap();
    push(&mut t, entry, DataKind::Numeric, DataSample::numeric(1700000000.0, 21.5), 0.0).unwrap();
    assert_eq!(query::get_numeric(&t, "/sensor/temp").unwrap(), (1700000000.0, 21.5));
}

#[test]
fn scenario_duplicate_conflict() {
    let mut t = tree();
    t.get_input(t.root(), "/x", DataKind::Numeric, "m").unwrap();
    let err = t.get_output(t.root(), "/x", DataKind::Numeric, "m").unwrap_err();
    assert_eq!(err, HubError::Duplicate);
    assert_eq!(query::get_data_type(&t, "/x").unwrap(), DataKind::Numeric);
}

#[test]
fn scenario_default_precedence() {
    let mut t = tree();
    let entry = t.get_output(t.root(), "/y", DataKind::Boolean, "").unwrap();
    t.entry_mut(entry).resource_mut().unwrap().set_default(DataSample::boolean(0.0, true));
    assert_eq!(query::get_boolean(&t, "/y").unwrap(), (0.0, true));
    push(&mut t, entry, DataKind::Boolean, DataSample::boolean(5.0, false), 0.0).unwrap();
    assert_eq!(query::get_boolean(&t, "/y").unwrap(), (5.0, false));
}

#[test]
fn scenario_buffer_window() {
    let mut t = tree();
    let obs = t.create_observation("/obs/o", DataKind::Numeric, "", 3, f64::INFINITY).unwrap();
    for ts in 1..=4 {
        push(&mut t, obs, DataKind::Numeric, DataSample::numeric(ts as f64, ts as f64), 0.0).unwrap();
    }
    let json = query::read_buffer_json(&t, "/obs/o", f64::NAN, 0.0, None).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let ts: Vec<f64> = parsed.as_array().unwrap().iter().map(|e| e["t"].as_f64().unwrap()).collect();
    assert_eq!(ts, vec![2.0, 3.0, 4.0]);
}

#[test]
fn scenario_aggregates_over_numeric_observation() {
    let mut t = tree();
    let obs = t.create_observation("/obs/o", DataKind::Numeric, "", 16, f64::INFINITY).unwrap();
    for (ts, v) in [(1.0, 10.0), (2.0, 20.0), (3.0, 30.0)] {
        push(&mut t, obs, DataKind::Numeric, DataSample::numeric(ts, v), 0.0).unwrap();
    }
    assert_eq!(query::get_min(&t, "/obs/o", f64::NAN, 0.0).unwrap(), 10.0);
    assert_eq!(query::get_max(&t, "/obs/o", f64::NAN, 0.0).unwrap(), 30.0);
    assert_eq!(query::get_mean(&t, "/obs/o", f64::NAN, 0.0).unwrap(), 20.0);
    assert!((query::get_stddev(&t, "/obs/o", f64::NAN, 0.0).unwrap() - 8.164965809).abs() < 1e-6);
}

#[test]
fn scenario_wrong_kind_read_via_query_facade_is_format_error() {
    let mut t = tree();
    let entry = t.get_input(t.root(), "/x", DataKind::Numeric, "").unwrap();
    push(&mut t, entry, DataKind::Numeric, DataSample::numeric(1.0, 1.0), 0.0).unwrap();
    assert_eq!(query::get_boolean(&t, "/x"), Err(HubError::FormatError));
}

#[test]
fn role_promotion_preserves_identity_and_children() {
    let mut t = tree();
    let placeholder = t.get_entry(t.root(), "/a/b").unwrap();
    t.get_entry(t.root(), "/a/b/c").unwrap();
    let promoted = t.get_input(t.root(), "/a/b", DataKind::Numeric, "").unwrap();
    assert_eq!(placeholder, promoted);
    assert!(t.find_entry(t.root(), "/a/b/c").is_some());
}

#[test]
fn negative_start_after_is_rejected_as_a_client_fault() {
    assert!(datahub_core::resolve_start_after(-1.0, 100.0).is_err());
    assert!(datahub_core::resolve_start_after(0.0, 100.0).is_err());
}
