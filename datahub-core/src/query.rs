//! Read-side query facade (spec.md §4.6, §6.1 Query API).
//!
//! Every operation here resolves an absolute path and returns a status
//! code — unlike the producer/consumer API (realized in the `datahub`
//! facade crate), a contract violation reaching this facade (wrong
//! kind, bad `startAfter`, …) is reported back to the caller rather
//! than terminating a session, matching spec.md §4.6 and the
//! wrong-kind-read scenario in §8 ("via the query facade → FormatError;
//! via the client IO facade → terminates the client session").

use crate::buffer::{resolve_start_after, StartFilter};
use crate::error::HubError;
use crate::sample::DataKind;
use crate::tree::{ResourceTree, Role};

fn resolve_resource<'a>(
    tree: &'a ResourceTree,
    path: &str,
) -> Result<&'a crate::resource::ResourceState, HubError> {
    let id = tree.find_at_absolute(path)?;
    match tree.entry(id).role() {
        Role::Namespace => Err(HubError::Unsupported),
        _ => tree.entry(id).resource().ok_or(HubError::Unsupported),
    }
}

pub fn get_data_type(tree: &ResourceTree, path: &str) -> Result<DataKind, HubError> {
    Ok(resolve_resource(tree, path)?.data_type())
}

pub fn get_units(tree: &ResourceTree, path: &str) -> Result<String, HubError> {
    Ok(resolve_resource(tree, path)?.units().to_string())
}

pub fn get_timestamp(tree: &ResourceTree, path: &str) -> Result<f64, HubError> {
    let res = resolve_resource(tree, path)?;
    res.effective_value().map(|s| s.timestamp()).ok_or(HubError::Unavailable)
}

fn check_kind(expected: DataKind, actual: DataKind) -> Result<(), HubError> {
    if expected == actual {
        Ok(())
    } else {
        Err(HubError::FormatError)
    }
}

/// Guard against a caller-supplied text buffer that's too small, the
/// way the original C API's fixed-size output buffers would (spec.md
/// §4.6, `Overflow`). `max_len == None` means "no cap" (the natural
/// choice for an owned `String` return value in Rust).
fn check_len(text: &str, max_len: Option<usize>) -> Result<(), HubError> {
    match max_len {
        Some(cap) if text.len() > cap => Err(HubError::Overflow),
        _ => Ok(()),
    }
}

pub fn get_boolean(tree: &ResourceTree, path: &str) -> Result<(f64, bool), HubError> {
    let res = resolve_resource(tree, path)?;
    check_kind(DataKind::Boolean, res.data_type())?;
    let sample = res.effective_value().ok_or(HubError::Unavailable)?;
    Ok((sample.timestamp(), sample.as_boolean().expect("kind checked above")))
}

pub fn get_numeric(tree: &ResourceTree, path: &str) -> Result<(f64, f64), HubError> {
    let res = resolve_resource(tree, path)?;
    check_kind(DataKind::Numeric, res.data_type())?;
    let sample = res.effective_value().ok_or(HubError::Unavailable)?;
    Ok((sample.timestamp(), sample.as_numeric().expect("kind checked above")))
}

pub fn get_string(
    tree: &ResourceTree,
    path: &str,
    max_len: Option<usize>,
) -> Result<(f64, String), HubError> {
    let res = resolve_resource(tree, path)?;
    check_kind(DataKind::String, res.data_type())?;
    let sample = res.effective_value().ok_or(HubError::Unavailable)?;
    let text = sample.as_string().expect("kind checked above").to_string();
    check_len(&text, max_len)?;
    Ok((sample.timestamp(), text))
}

/// Projects any kind to JSON (spec.md §4.2) — the one query operation
/// that doesn't format-error on a kind mismatch.
pub fn get_json(
    tree: &ResourceTree,
    path: &str,
    max_len: Option<usize>,
) -> Result<(f64, String), HubError> {
    let res = resolve_resource(tree, path)?;
    let sample = res.effective_value().ok_or(HubError::Unavailable)?;
    let text = sample.to_json_value();
    check_len(&text, max_len)?;
    Ok((sample.timestamp(), text))
}

/// `readBufferJson` (spec.md §4.4). Only meaningful for Observation
/// entries — any other resolvable entry reports `Unsupported` since it
/// has no buffer.
pub fn read_buffer_json(
    tree: &ResourceTree,
    path: &str,
    start_after: f64,
    now: f64,
    max_len: Option<usize>,
) -> Result<String, HubError> {
    let res = resolve_resource(tree, path)?;
    let buffer = res.buffer.as_ref().ok_or(HubError::Unsupported)?;
    let filter = resolve_start_after(start_after, now).map_err(|_| HubError::FormatError)?;
    let text = buffer.to_json_array(filter);
    check_len(&text, max_len)?;
    Ok(text)
}

fn with_buffer<T>(
    tree: &ResourceTree,
    path: &str,
    start_after: f64,
    now: f64,
    f: impl FnOnce(&crate::buffer::ObservationBuffer, StartFilter) -> T,
) -> Result<T, HubError> {
    let res = resolve_resource(tree, path)?;
    let buffer = res.buffer.as_ref().ok_or(HubError::Unsupported)?;
    let filter = resolve_start_after(start_after, now).map_err(|_| HubError::FormatError)?;
    Ok(f(buffer, filter))
}

pub fn get_min(tree: &ResourceTree, path: &str, start_after: f64, now: f64) -> Result<f64, HubError> {
    with_buffer(tree, path, start_after, now, |b, f| b.min(f))
}

pub fn get_max(tree: &ResourceTree, path: &str, start_after: f64, now: f64) -> Result<f64, HubError> {
    with_buffer(tree, path, start_after, now, |b, f| b.max(f))
}

pub fn get_mean(tree: &ResourceTree, path: &str, start_after: f64, now: f64) -> Result<f64, HubError> {
    with_buffer(tree, path, start_after, now, |b, f| b.mean(f))
}

pub fn get_stddev(tree: &ResourceTree, path: &str, start_after: f64, now: f64) -> Result<f64, HubError> {
    with_buffer(tree, path, start_after, now, |b, f| b.stddev(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::push;
    use crate::sample::DataSample;
    use crate::tree::ResourceTree;

    #[test]
    fn create_and_push_round_trip() {
        let mut t = ResourceTree::new(64, 255);
        let entry = t.get_input(t.root(), "/sensor/temp", DataKind::Numeric, "degC").unwrap();
        push(&mut t, entry, DataKind::Numeric, DataSample::numeric(1700000000.0, 21.5), 0.0).unwrap();
        assert_eq!(get_numeric(&t, "/app/_/sensor/temp"), Err(HubError::NotFound));
        assert_eq!(get_numeric(&t, "/sensor/temp").unwrap(), (1700000000.0, 21.5));
    }

    #[test]
    fn not_found_for_missing_path() {
        let t = ResourceTree::new(64, 255);
        assert_eq!(get_numeric(&t, "/nope"), Err(HubError::NotFound));
    }

    #[test]
    fn unsupported_for_namespace() {
        let mut t = ResourceTree::new(64, 255);
        t.get_entry(t.root(), "/a/b").unwrap();
        assert_eq!(get_numeric(&t, "/a"), Err(HubError::Unsupported));
    }

    #[test]
    fn unavailable_without_current_value_or_default() {
        let mut t = ResourceTree::new(64, 255);
        t.get_input(t.root(), "/x", DataKind::Numeric, "").unwrap();
        assert_eq!(get_numeric(&t, "/x"), Err(HubError::Unavailable));
    }

    #[test]
    fn default_precedence_scenario() {
        let mut t = ResourceTree::new(64, 255);
        let entry = t.get_output(t.root(), "/y", DataKind::Boolean, "").unwrap();
        t.entry_mut(entry).resource_mut().unwrap().set_default(DataSample::boolean(0.0, true));
        assert_eq!(get_boolean(&t, "/y").unwrap(), (0.0, true));
        push(&mut t, entry, DataKind::Boolean, DataSample::boolean(5.0, false), 0.0).unwrap();
        assert_eq!(get_boolean(&t, "/y").unwrap(), (5.0, false));
    }

    #[test]
    fn wrong_kind_read_is_format_error() {
        let mut t = ResourceTree::new(64, 255);
        let entry = t.get_input(t.root(), "/x", DataKind::Numeric, "").unwrap();
        push(&mut t, entry, DataKind::Numeric, DataSample::numeric(1.0, 1.0), 0.0).unwrap();
        assert_eq!(get_boolean(&t, "/x"), Err(HubError::FormatError));
    }

    #[test]
    fn get_json_projects_any_kind() {
        let mut t = ResourceTree::new(64, 255);
        let entry = t.get_input(t.root(), "/x", DataKind::Numeric, "").unwrap();
        push(&mut t, entry, DataKind::Numeric, DataSample::numeric(1.0, 2.5), 0.0).unwrap();
        assert_eq!(get_json(&t, "/x", None).unwrap(), (1.0, "2.5".to_string()));
    }

    #[test]
    fn buffer_window_scenario() {
        let mut t = ResourceTree::new(64, 255);
        let obs = t.create_observation("/obs/o", DataKind::Numeric, "", 3, f64::INFINITY).unwrap();
        for ts in 1..=4 {
            push(&mut t, obs, DataKind::Numeric, DataSample::numeric(ts as f64, ts as f64), 0.0).unwrap();
        }
        let json = read_buffer_json(&t, "/obs/o", f64::NAN, 0.0, None).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let arr = parsed.as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr[0]["t"], 2.0);
        assert_eq!(arr[2]["t"], 4.0);
    }

    #[test]
    fn aggregates_over_numeric_observation() {
        let mut t = ResourceTree::new(64, 255);
        let obs = t.create_observation("/obs/o", DataKind::Numeric, "", 16, f64::INFINITY).unwrap();
        push(&mut t, obs, DataKind::Numeric, DataSample::numeric(1.0, 10.0), 0.0).unwrap();
        push(&mut t, obs, DataKind::Numeric, DataSample::numeric(2.0, 20.0), 0.0).unwrap();
        push(&mut t, obs, DataKind::Numeric, DataSample::numeric(3.0, 30.0), 0.0).unwrap();
        assert_eq!(get_min(&t, "/obs/o", f64::NAN, 0.0).unwrap(), 10.0);
        assert_eq!(get_max(&t, "/obs/o", f64::NAN, 0.0).unwrap(), 30.0);
        assert_eq!(get_mean(&t, "/obs/o", f64::NAN, 0.0).unwrap(), 20.0);
        assert!((get_stddev(&t, "/obs/o", f64::NAN, 0.0).unwrap() - 8.164965809).abs() < 1e-6);
    }
}
