//! The push pipeline: timestamp normalisation, the type gate, commit,
//! fan-out and derived-observation forwarding (spec.md §4.3).

use crate::error::ClientFault;
use crate::resource::ObservationFilter;
use crate::sample::{DataKind, DataSample};
use crate::tree::{EntryId, ResourceTree, Role};

/// Push `sample` (already known to carry `incoming_kind`) into `entry`.
///
/// `now` supplies the wall-clock value used for timestamp normalisation
/// when `sample.timestamp() == 0.0` (spec.md §4.3 step 1) — the caller
/// provides it via the `WallClock` collaborator interface so this
/// module stays free of a system-clock dependency.
///
/// Returns a [`ClientFault`] when `entry` is an Input/Output and
/// `incoming_kind` doesn't match its `dataType` (spec.md §4.3 step 2) —
/// the tree is left untouched in that case.
pub fn push(
    tree: &mut ResourceTree,
    entry: EntryId,
    incoming_kind: DataKind,
    sample: DataSample,
    now: f64,
) -> Result<(), ClientFault> {
    push_inner(tree, entry, incoming_kind, sample, now, &crate::resource::PassThrough)
}

/// Same as [`push`], with an explicit filter hook for the Observation
/// admit/drop stage (spec.md §4.3 step 3). Only meaningful for
/// Observation entries; ignored otherwise.
pub fn push_with_filter(
    tree: &mut ResourceTree,
    entry: EntryId,
    incoming_kind: DataKind,
    sample: DataSample,
    now: f64,
    filter: &dyn ObservationFilter,
) -> Result<(), ClientFault> {
    push_inner(tree, entry, incoming_kind, sample, now, filter)
}

fn push_inner(
    tree: &mut ResourceTree,
    entry: EntryId,
    incoming_kind: DataKind,
    sample: DataSample,
    now: f64,
    filter: &dyn ObservationFilter,
) -> Result<(), ClientFault> {
    let role = tree.entry(entry).role();

    // Step 1: timestamp normalisation.
    let sample = if sample.needs_timestamp_stamp() {
        sample.with_timestamp(now)
    } else {
        sample
    };

    // Step 2: type gate.
    match role {
        Role::Input | Role::Output => {
            let expected = tree
                .entry(entry)
                .resource()
                .expect("Input/Output entry missing resource state")
                .data_type();
            if incoming_kind != expected {
                return Err(ClientFault::new(format!(
                    "push of kind {incoming_kind} rejected: resource at {:?} expects {expected}",
                    tree.path_of(entry)
                )));
            }
        }
        Role::Observation | Role::Placeholder => {
            tree.entry_mut(entry)
                .resource_mut()
                .expect("Observation/Placeholder entry missing resource state")
                .set_data_type(incoming_kind);
        }
        Role::Namespace => {
            return Err(ClientFault::new(format!(
                "push rejected: {:?} is a namespace, not a resource",
                tree.path_of(entry)
            )));
        }
    }

    // Step 3: filter hook (Observations only; reference policy passes
    // everything through).
    if role == Role::Observation {
        let previous = tree.entry(entry).resource().and_then(|r| r.current_value());
        if !filter.admit(previous, &sample) {
            tracing::debug!(path = %tree.path_of(entry), "push dropped by observation filter");
            return Ok(());
        }
    }

    // Step 4: commit (current value + buffer).
    let resource = tree
        .entry_mut(entry)
        .resource_mut()
        .expect("resource-role entry missing resource state");
    resource.commit(sample.clone());
    if let Some(buffer) = resource.buffer.as_mut() {
        buffer.push(sample.clone());
    }

    // Step 5: fan-out to this entry's own handlers.
    tree.entry_mut(entry)
        .resource_mut()
        .expect("resource-role entry missing resource state")
        .fan_out(incoming_kind, &sample);

    tracing::debug!(path = %tree.path_of(entry), kind = %incoming_kind, "push dispatched");

    // Step 6: forward to every observation bound to this entry.
    for observation in tree.observations_bound_to(entry) {
        push_inner(tree, observation, incoming_kind, sample.clone(), now, filter)?;
    }

    Ok(())
}
