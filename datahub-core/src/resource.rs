//! Per-entry resource state: current/default value, handlers, buffer
//! (spec.md §3.1, §4.3).

use crate::buffer::ObservationBuffer;
use crate::sample::{DataKind, DataSample};

/// Opaque handle returned by [`ResourceState::add_push_handler`]
/// (spec.md §4.3). Stable across handler-list compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Filter hook run before a push is committed (spec.md §4.3 step 3).
/// Only observations run this stage; the spec mandates the hook but
/// leaves the policy table as configuration. [`PassThrough`] is the
/// reference policy.
pub trait ObservationFilter {
    /// Return `true` to admit `incoming`, `false` to drop the push
    /// silently (no commit, no fan-out, no buffer append).
    fn admit(&self, previous: Option<&DataSample>, incoming: &DataSample) -> bool;
}

/// The reference filter policy: every push is admitted.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl ObservationFilter for PassThrough {
    fn admit(&self, _previous: Option<&DataSample>, _incoming: &DataSample) -> bool {
        true
    }
}

struct HandlerSlot {
    id: HandlerId,
    expected_kind: DataKind,
    callback: Box<dyn FnMut(&DataSample)>,
    tombstoned: bool,
}

/// Shared state backing an Input, Output, Observation or Placeholder
/// entry (spec.md §3.1). Namespaces never carry one of these.
pub struct ResourceState {
    data_type: DataKind,
    units: String,
    current_value: Option<DataSample>,
    default_value: Option<DataSample>,
    mandatory: bool,
    handlers: Vec<HandlerSlot>,
    next_handler_id: u64,
    /// `> 0` while a fan-out for this resource is in progress; handler
    /// removal during that window only tombstones (spec.md §5).
    dispatch_depth: u32,
    /// Present for Observation entries only (spec.md §3.1).
    pub buffer: Option<ObservationBuffer>,
}

impl ResourceState {
    /// A freshly materialised resource: no current value, no default,
    /// mandatory (matches spec.md §3.1 "Outputs default mandatory").
    pub fn new(data_type: DataKind, units: impl Into<String>) -> Self {
        Self {
            data_type,
            units: units.into(),
            current_value: None,
            default_value: None,
            mandatory: true,
            handlers: Vec::new(),
            next_handler_id: 0,
            dispatch_depth: 0,
            buffer: None,
        }
    }

    pub fn data_type(&self) -> DataKind {
        self.data_type
    }

    /// Observations (and placeholders, per §4.3) track their dynamic
    /// kind across pushes rather than being fixed at creation.
    pub(crate) fn set_data_type(&mut self, kind: DataKind) {
        self.data_type = kind;
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn mark_optional(&mut self) {
        self.mandatory = false;
    }

    pub fn current_value(&self) -> Option<&DataSample> {
        self.current_value.as_ref()
    }

    pub fn default_value(&self) -> Option<&DataSample> {
        self.default_value.as_ref()
    }

    /// Write-once: the second and subsequent calls are silent no-ops
    /// (spec.md §9, modeled as compare-and-set against `None`).
    pub fn set_default(&mut self, value: DataSample) {
        if self.default_value.is_none() {
            self.default_value = Some(value);
        }
    }

    /// `getCurrentValue` (spec.md §4.3): the current value if present,
    /// else the default (with its timestamp returned verbatim), else
    /// neither.
    pub fn effective_value(&self) -> Option<&DataSample> {
        self.current_value.as_ref().or(self.default_value.as_ref())
    }

    pub(crate) fn commit(&mut self, sample: DataSample) {
        self.current_value = Some(sample);
    }

    pub fn add_push_handler(
        &mut self,
        expected_kind: DataKind,
        callback: impl FnMut(&DataSample) + 'static,
    ) -> HandlerId {
        let id = HandlerId(self.next_handler_id);
        self.next_handler_id += 1;
        self.handlers.push(HandlerSlot {
            id,
            expected_kind,
            callback: Box::new(callback),
            tombstoned: false,
        });
        id
    }

    /// Unlink a handler. In-flight invocations complete; if called from
    /// inside that handler's own fan-out, the removal is deferred via
    /// tombstoning and compacted at the end of dispatch (spec.md §5).
    pub fn remove_push_handler(&mut self, id: HandlerId) {
        if let Some(slot) = self.handlers.iter_mut().find(|s| s.id == id) {
            slot.tombstoned = true;
        }
        if self.dispatch_depth == 0 {
            self.compact();
        }
    }

    fn compact(&mut self) {
        self.handlers.retain(|s| !s.tombstoned);
    }

    /// Invoke every matching, non-tombstoned handler in insertion order,
    /// one to completion before the next begins (spec.md §4.3 step 5).
    pub(crate) fn fan_out(&mut self, incoming_kind: DataKind, sample: &DataSample) {
        self.dispatch_depth += 1;
        let mut i = 0;
        while i < self.handlers.len() {
            let matches = {
                let slot = &self.handlers[i];
                !slot.tombstoned
                    && (slot.expected_kind == incoming_kind
                        || (slot.expected_kind == DataKind::Trigger
                            && incoming_kind == DataKind::Trigger))
            };
            if matches {
                (self.handlers[i].callback)(sample);
            }
            i += 1;
        }
        self.dispatch_depth -= 1;
        if self.dispatch_depth == 0 {
            self.compact();
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.iter().filter(|s| !s.tombstoned).count()
    }
}
