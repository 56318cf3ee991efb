//! The `DataHub` facade: wraps [`datahub_core`]'s tree and dispatch
//! engine with the client-facing producer/consumer API and the
//! operator-facing query API (spec.md §6.1), wired to the collaborator
//! interfaces realized in `datahub-collab` and the administrative
//! options in `datahub-config`.

use std::fmt;

use datahub_collab::{ClientIdentityProvider, ClientSink, LogLevel, SessionHandle, WallClock};
use datahub_config::HubConfig;
use datahub_core::{
    push, query, tree::Role, ClientFault, DataKind, DataSample, EntryId, HandlerId, HubError,
    NamespaceBinder, ResourceTree,
};

/// Error surface for the client-facing producer/consumer API. Unlike
/// the query facade (which only ever returns [`HubError`] status
/// codes), this API distinguishes a genuine contract violation from a
/// status the caller can legitimately act on — the distinction the
/// embedding transport needs to decide whether to kill the session
/// (spec.md §7).
#[derive(Debug, Clone, PartialEq)]
pub enum ClientApiError {
    /// Caller misbehaved: the tree is untouched, and the embedding
    /// transport should call [`ClientSink::kill_client`].
    Fault(ClientFault),
    /// A status the client can legitimately receive back (`NoMemory`,
    /// `Duplicate`, `Unavailable`, …).
    Status(HubError),
}

impl fmt::Display for ClientApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientApiError::Fault(e) => write!(f, "{e}"),
            ClientApiError::Status(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ClientApiError {}

impl From<ClientFault> for ClientApiError {
    fn from(e: ClientFault) -> Self {
        ClientApiError::Fault(e)
    }
}

impl From<HubError> for ClientApiError {
    fn from(e: HubError) -> Self {
        ClientApiError::Status(e)
    }
}

/// The hub: one resource tree plus the administrative configuration
/// that bounds it. Owns nothing about transport — sessions are opened
/// explicitly via [`DataHub::session`].
pub struct DataHub {
    tree: ResourceTree,
    binder: NamespaceBinder,
    config: HubConfig,
}

impl DataHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            tree: ResourceTree::new(config.max_path_depth, config.max_segment_len),
            binder: NamespaceBinder::new(),
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Resolve `session` to a client identity via `identity` and open a
    /// [`ClientSession`] rooted at `/app/<client-id>/`. A failed
    /// resolution is fatal for the session per spec.md §4.5 — the
    /// caller is expected to route it to [`ClientSink::kill_client`].
    pub fn session<'a>(
        &'a mut self,
        handle: SessionHandle,
        identity: &dyn ClientIdentityProvider,
        sink: &'a dyn ClientSink,
    ) -> Result<ClientSession<'a>, HubError> {
        let client_id = identity.identify(handle)?;
        let root = self.binder.bind(&mut self.tree, &client_id).map_err(|fault| {
            sink.kill_client(handle, &fault.to_string());
            HubError::NotFound
        })?;
        tracing::debug!(handle, client_id = %client_id, "session opened");
        Ok(ClientSession {
            hub: self,
            handle,
            root,
            sink,
        })
    }

    /// Drop the cached namespace binding for `client_id` on session end
    /// (spec.md §4.5) — the subtree itself is left intact.
    pub fn end_session(&mut self, client_id: &str) {
        tracing::debug!(client_id = %client_id, "session ended");
        self.binder.forget(client_id);
    }

    // ---- Query API (spec.md §4.6, §6.1) — absolute paths, read-only ----

    pub fn get_data_type(&self, path: &str) -> Result<DataKind, HubError> {
        query::get_data_type(&self.tree, path)
    }

    pub fn get_units(&self, path: &str) -> Result<String, HubError> {
        query::get_units(&self.tree, path)
    }

    pub fn get_timestamp(&self, path: &str) -> Result<f64, HubError> {
        query::get_timestamp(&self.tree, path)
    }

    pub fn get_boolean(&self, path: &str) -> Result<(f64, bool), HubError> {
        query::get_boolean(&self.tree, path)
    }

    pub fn get_numeric(&self, path: &str) -> Result<(f64, f64), HubError> {
        query::get_numeric(&self.tree, path)
    }

    pub fn get_string(&self, path: &str, max_len: Option<usize>) -> Result<(f64, String), HubError> {
        query::get_string(&self.tree, path, max_len)
    }

    pub fn get_json(&self, path: &str, max_len: Option<usize>) -> Result<(f64, String), HubError> {
        query::get_json(&self.tree, path, max_len)
    }

    pub fn read_buffer_json(
        &self,
        path: &str,
        start_after: f64,
        now: f64,
        max_len: Option<usize>,
    ) -> Result<String, HubError> {
        query::read_buffer_json(&self.tree, path, start_after, now, max_len)
    }

    pub fn get_min(&self, path: &str, start_after: f64, now: f64) -> Result<f64, HubError> {
        query::get_min(&self.tree, path, start_after, now)
    }

    pub fn get_max(&self, path: &str, start_after: f64, now: f64) -> Result<f64, HubError> {
        query::get_max(&self.tree, path, start_after, now)
    }

    pub fn get_mean(&self, path: &str, start_after: f64, now: f64) -> Result<f64, HubError> {
        query::get_mean(&self.tree, path, start_after, now)
    }

    pub fn get_stddev(&self, path: &str, start_after: f64, now: f64) -> Result<f64, HubError> {
        query::get_stddev(&self.tree, path, start_after, now)
    }

    /// Administrative observation creation — not exposed to clients
    /// (spec.md §3.3: "Observations persist independently of clients;
    /// they are created/deleted administratively").
    pub fn create_observation(
        &mut self,
        path: &str,
        data_type: DataKind,
        units: &str,
    ) -> Result<(), HubError> {
        self.tree.create_observation(
            path,
            data_type,
            units,
            self.config.observation_buffer_max_count,
            self.config.observation_buffer_max_window_sec,
        )?;
        Ok(())
    }

    /// Bind an observation to derive from pushes to a source resource
    /// (administrative; spec.md §4.3 step 6).
    pub fn bind_observation(&mut self, source_path: &str, observation_path: &str) -> Result<(), HubError> {
        let source = self.tree.find_at_absolute(source_path)?;
        let observation = self.tree.find_at_absolute(observation_path)?;
        self.tree.bind_observation(source, observation);
        Ok(())
    }
}

/// One client's view onto the hub, rooted at `/app/<client-id>/`
/// (spec.md §6.1). Every path below is relative to that root.
pub struct ClientSession<'a> {
    hub: &'a mut DataHub,
    handle: SessionHandle,
    root: EntryId,
    sink: &'a dyn ClientSink,
}

impl<'a> ClientSession<'a> {
    fn resolve(&self, path: &str) -> Result<EntryId, ClientFault> {
        self.hub
            .tree
            .find_entry(self.root, path)
            .ok_or_else(|| ClientFault::new(format!("no resource at {path:?}")))
    }

    fn fault(&self, fault: ClientFault) -> ClientApiError {
        self.sink.kill_client(self.handle, &fault.to_string());
        ClientApiError::Fault(fault)
    }

    /// True if `path` already resolves to an entry with role `role` —
    /// used to tell an idempotent re-creation from one that would
    /// actually allocate a new resource, so the per-client cap (below)
    /// only ever blocks the latter.
    fn already_exists_as(&self, path: &str, role: Role) -> bool {
        self.hub
            .tree
            .find_entry(self.root, path)
            .is_some_and(|id| self.hub.tree.entry(id).role() == role)
    }

    pub fn create_input(
        &mut self,
        path: &str,
        data_type: DataKind,
        units: &str,
    ) -> Result<(), ClientApiError> {
        if !self.already_exists_as(path, Role::Input)
            && self.hub.tree.resource_count_under(self.root) >= self.hub.config.max_resources_per_client
        {
            return Err(ClientApiError::Status(HubError::NoMemory));
        }
        self.hub.tree.get_input(self.root, path, data_type, units)?;
        Ok(())
    }

    pub fn create_output(
        &mut self,
        path: &str,
        data_type: DataKind,
        units: &str,
    ) -> Result<(), ClientApiError> {
        if !self.already_exists_as(path, Role::Output)
            && self.hub.tree.resource_count_under(self.root) >= self.hub.config.max_resources_per_client
        {
            return Err(ClientApiError::Status(HubError::NoMemory));
        }
        self.hub.tree.get_output(self.root, path, data_type, units)?;
        Ok(())
    }

    pub fn delete_resource(&mut self, path: &str) -> Result<(), ClientApiError> {
        let id = self.resolve(path).map_err(|f| self.fault(f))?;
        self.hub.tree.delete_io(id).map_err(|f| self.fault(f))?;
        Ok(())
    }

    fn push(&mut self, path: &str, kind: DataKind, sample: DataSample, now: f64) -> Result<(), ClientApiError> {
        let id = self.resolve(path).map_err(|f| self.fault(f))?;
        push(&mut self.hub.tree, id, kind, sample, now).map_err(|f| self.fault(f))
    }

    pub fn push_trigger(&mut self, path: &str, ts: f64, now: f64) -> Result<(), ClientApiError> {
        self.push(path, DataKind::Trigger, DataSample::trigger(ts), now)
    }

    pub fn push_boolean(&mut self, path: &str, ts: f64, value: bool, now: f64) -> Result<(), ClientApiError> {
        self.push(path, DataKind::Boolean, DataSample::boolean(ts, value), now)
    }

    pub fn push_numeric(&mut self, path: &str, ts: f64, value: f64, now: f64) -> Result<(), ClientApiError> {
        self.push(path, DataKind::Numeric, DataSample::numeric(ts, value), now)
    }

    pub fn push_string(
        &mut self,
        path: &str,
        ts: f64,
        value: impl Into<String>,
        now: f64,
    ) -> Result<(), ClientApiError> {
        self.push(path, DataKind::String, DataSample::string(ts, value), now)
    }

    pub fn push_json(
        &mut self,
        path: &str,
        ts: f64,
        value: impl Into<String>,
        now: f64,
    ) -> Result<(), ClientApiError> {
        let sample = DataSample::json(ts, value)
            .map_err(|e| self.fault(ClientFault::new(e.to_string())))?;
        self.push(path, DataKind::Json, sample, now)
    }

    /// Register a push handler on an Input or Output. Observations are
    /// not addressable here (spec.md §4.3: "handlers on observations
    /// are registered via the admin path, not here").
    pub fn add_push_handler(
        &mut self,
        path: &str,
        expected_kind: DataKind,
        callback: impl FnMut(&DataSample) + 'static,
    ) -> Result<HandlerId, ClientApiError> {
        let id = self.resolve(path).map_err(|f| self.fault(f))?;
        let role = self.hub.tree.entry(id).role();
        if !matches!(role, Role::Input | Role::Output) {
            return Err(self.fault(ClientFault::new(format!(
                "cannot register a push handler on {path:?}: role is {role:?}, expected Input or Output"
            ))));
        }
        Ok(self
            .hub
            .tree
            .entry_mut(id)
            .resource_mut()
            .expect("Input/Output entry missing resource state")
            .add_push_handler(expected_kind, callback))
    }

    pub fn remove_push_handler(&mut self, path: &str, handler: HandlerId) -> Result<(), ClientApiError> {
        let id = self.resolve(path).map_err(|f| self.fault(f))?;
        self.hub
            .tree
            .entry_mut(id)
            .resource_mut()
            .ok_or_else(|| self.fault(ClientFault::new(format!("{path:?} has no resource state"))))?
            .remove_push_handler(handler);
        Ok(())
    }

    /// Mark an Output optional. Marking anything else optional is a
    /// contract violation (spec.md §7).
    pub fn mark_optional(&mut self, path: &str) -> Result<(), ClientApiError> {
        let id = self.resolve(path).map_err(|f| self.fault(f))?;
        if self.hub.tree.entry(id).role() != Role::Output {
            return Err(self.fault(ClientFault::new(format!(
                "mark_optional called on {path:?}, which is not an Output"
            ))));
        }
        self.hub
            .tree
            .entry_mut(id)
            .resource_mut()
            .expect("Output entry missing resource state")
            .mark_optional();
        Ok(())
    }

    fn set_default(&mut self, path: &str, kind: DataKind, value: DataSample) -> Result<(), ClientApiError> {
        let id = self.resolve(path).map_err(|f| self.fault(f))?;
        let resource = self
            .hub
            .tree
            .entry_mut(id)
            .resource_mut()
            .ok_or_else(|| self.fault(ClientFault::new(format!("{path:?} has no resource state"))))?;
        if resource.data_type() != kind {
            return Err(self.fault(ClientFault::new(format!(
                "default-setting kind mismatch at {path:?}: resource is {}, default is {kind}",
                resource.data_type()
            ))));
        }
        resource.set_default(value);
        Ok(())
    }

    pub fn set_trigger_default(&mut self, path: &str) -> Result<(), ClientApiError> {
        self.set_default(path, DataKind::Trigger, DataSample::trigger(0.0))
    }

    pub fn set_boolean_default(&mut self, path: &str, value: bool) -> Result<(), ClientApiError> {
        self.set_default(path, DataKind::Boolean, DataSample::boolean(0.0, value))
    }

    pub fn set_numeric_default(&mut self, path: &str, value: f64) -> Result<(), ClientApiError> {
        self.set_default(path, DataKind::Numeric, DataSample::numeric(0.0, value))
    }

    pub fn set_string_default(&mut self, path: &str, value: impl Into<String>) -> Result<(), ClientApiError> {
        self.set_default(path, DataKind::String, DataSample::string(0.0, value))
    }

    pub fn set_json_default(&mut self, path: &str, value: impl Into<String>) -> Result<(), ClientApiError> {
        let sample =
            DataSample::json(0.0, value).map_err(|e| self.fault(ClientFault::new(e.to_string())))?;
        self.set_default(path, DataKind::Json, sample)
    }

    fn current(&self, path: &str) -> Result<&DataSample, ClientApiError> {
        let id = self.resolve(path).map_err(|f| self.fault(f))?;
        match self.hub.tree.entry(id).resource().and_then(|r| r.effective_value()) {
            Some(sample) => Ok(sample),
            None => Err(ClientApiError::Status(HubError::Unavailable)),
        }
    }

    pub fn get_timestamp(&mut self, path: &str) -> Result<f64, ClientApiError> {
        Ok(self.current(path)?.timestamp())
    }

    /// Kind-checked getters: a mismatch here is a client-contract
    /// violation and terminates the session (spec.md §8 scenario 6),
    /// unlike the same call through the read-only query facade.
    pub fn get_boolean(&mut self, path: &str) -> Result<(f64, bool), ClientApiError> {
        let sample = self.current(path)?.clone();
        match sample.as_boolean() {
            Some(v) => Ok((sample.timestamp(), v)),
            None => Err(self.fault(ClientFault::new(format!("{path:?} is not Boolean")))),
        }
    }

    pub fn get_numeric(&mut self, path: &str) -> Result<(f64, f64), ClientApiError> {
        let sample = self.current(path)?.clone();
        match sample.as_numeric() {
            Some(v) => Ok((sample.timestamp(), v)),
            None => Err(self.fault(ClientFault::new(format!("{path:?} is not Numeric")))),
        }
    }

    pub fn get_string(&mut self, path: &str) -> Result<(f64, String), ClientApiError> {
        let sample = self.current(path)?.clone();
        match sample.as_string() {
            Some(v) => Ok((sample.timestamp(), v.to_string())),
            None => Err(self.fault(ClientFault::new(format!("{path:?} is not String")))),
        }
    }

    pub fn get_json(&mut self, path: &str) -> Result<(f64, String), ClientApiError> {
        let sample = self.current(path)?.clone();
        Ok((sample.timestamp(), sample.to_json_value()))
    }

    /// Reserved in the external surface but not implemented (spec.md
    /// §9 "Polling handler"): returns a stable `Unsupported` rather than
    /// panicking, so the API surface doesn't change once it lands.
    pub fn add_poll_handler(&mut self, _path: &str, _expected_kind: DataKind) -> Result<(), ClientApiError> {
        self.sink.log(LogLevel::Warn, "add_poll_handler: not implemented");
        Err(ClientApiError::Status(HubError::Unsupported))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datahub_collab::{StaticIdentityProvider, TracingClientSink};

    fn hub() -> DataHub {
        DataHub::new(HubConfig::default())
    }

    #[test]
    fn create_and_push_round_trip_through_client_session() {
        let mut hub = hub();
        let identity = StaticIdentityProvider::new("device-1");
        let sink = TracingClientSink;
        let mut session = hub.session(0, &identity, &sink).unwrap();
        session.create_input("/sensor/temp", DataKind::Numeric, "degC").unwrap();
        session.push_numeric("/sensor/temp", 1700000000.0, 21.5, 0.0).unwrap();
        assert_eq!(session.get_numeric("/sensor/temp").unwrap(), (1700000000.0, 21.5));
        drop(session);
        assert_eq!(hub.get_numeric("/app/device-1/sensor/temp").unwrap(), (1700000000.0, 21.5));
    }

    #[test]
    fn duplicate_conflict_scenario() {
        let mut hub = hub();
        let identity = StaticIdentityProvider::new("device-1");
        let sink = TracingClientSink;
        let mut session = hub.session(0, &identity, &sink).unwrap();
        session.create_input("/x", DataKind::Numeric, "m").unwrap();
        let err = session.create_output("/x", DataKind::Numeric, "m").unwrap_err();
        assert_eq!(err, ClientApiError::Status(HubError::Duplicate));
        drop(session);
        assert_eq!(hub.get_data_type("/app/device-1/x").unwrap(), DataKind::Numeric);
    }

    #[test]
    fn default_precedence_scenario() {
        let mut hub = hub();
        let identity = StaticIdentityProvider::new("device-1");
        let sink = TracingClientSink;
        let mut session = hub.session(0, &identity, &sink).unwrap();
        session.create_output("/y", DataKind::Boolean, "").unwrap();
        session.set_boolean_default("/y", true).unwrap();
        assert_eq!(session.get_boolean("/y").unwrap(), (0.0, true));
        session.push_boolean("/y", 5.0, false, 0.0).unwrap();
        assert_eq!(session.get_boolean("/y").unwrap(), (5.0, false));
    }

    #[test]
    fn wrong_kind_read_terminates_session_via_client_facade() {
        let mut hub = hub();
        let identity = StaticIdentityProvider::new("device-1");
        let sink = TracingClientSink;
        let mut session = hub.session(0, &identity, &sink).unwrap();
        session.create_input("/x", DataKind::Numeric, "").unwrap();
        session.push_numeric("/x", 1.0, 1.0, 0.0).unwrap();
        let err = session.get_boolean("/x").unwrap_err();
        assert!(matches!(err, ClientApiError::Fault(_)));
    }

    #[test]
    fn wrong_kind_read_via_query_facade_is_format_error_not_a_fault() {
        let mut hub = hub();
        let identity = StaticIdentityProvider::new("device-1");
        let sink = TracingClientSink;
        let mut session = hub.session(0, &identity, &sink).unwrap();
        session.create_input("/x", DataKind::Numeric, "").unwrap();
        session.push_numeric("/x", 1.0, 1.0, 0.0).unwrap();
        drop(session);
        assert_eq!(hub.get_boolean("/app/device-1/x"), Err(HubError::FormatError));
    }

    #[test]
    fn mark_optional_on_non_output_is_a_fault() {
        let mut hub = hub();
        let identity = StaticIdentityProvider::new("device-1");
        let sink = TracingClientSink;
        let mut session = hub.session(0, &identity, &sink).unwrap();
        session.create_input("/x", DataKind::Numeric, "").unwrap();
        assert!(matches!(session.mark_optional("/x"), Err(ClientApiError::Fault(_))));
    }

    #[test]
    fn resource_cap_yields_no_memory_status_not_a_fault() {
        let mut config = HubConfig::default();
        config.max_resources_per_client = 1;
        let mut hub = DataHub::new(config);
        let identity = StaticIdentityProvider::new("device-1");
        let sink = TracingClientSink;
        let mut session = hub.session(0, &identity, &sink).unwrap();
        session.create_input("/a", DataKind::Trigger, "").unwrap();
        let err = session.create_input("/b", DataKind::Trigger, "").unwrap_err();
        assert_eq!(err, ClientApiError::Status(HubError::NoMemory));
    }

    #[test]
    fn pushing_to_the_fresh_session_root_itself_does_not_panic() {
        let mut hub = hub();
        let identity = StaticIdentityProvider::new("device-1");
        let sink = TracingClientSink;
        let mut session = hub.session(0, &identity, &sink).unwrap();
        // "" resolves to the session root, which `bind` materialises as a
        // bare Placeholder — it must accept a push like any other
        // Placeholder/Observation entry (spec.md §4.3 step 2) rather than
        // hitting a missing `ResourceState`.
        session.push_trigger("", 1.0, 0.0).unwrap();
    }

    #[test]
    fn resource_cap_does_not_block_idempotent_recreation() {
        let mut config = HubConfig::default();
        config.max_resources_per_client = 1;
        let mut hub = DataHub::new(config);
        let identity = StaticIdentityProvider::new("device-1");
        let sink = TracingClientSink;
        let mut session = hub.session(0, &identity, &sink).unwrap();
        session.create_input("/a", DataKind::Trigger, "").unwrap();
        session.create_input("/a", DataKind::Trigger, "").unwrap();
    }

    #[test]
    fn poll_handler_reports_not_implemented() {
        let mut hub = hub();
        let identity = StaticIdentityProvider::new("device-1");
        let sink = TracingClientSink;
        let mut session = hub.session(0, &identity, &sink).unwrap();
        session.create_input("/x", DataKind::Trigger, "").unwrap();
        assert_eq!(
            session.add_poll_handler("/x", DataKind::Trigger),
            Err(ClientApiError::Status(HubError::Unsupported))
        );
    }

    #[test]
    fn buffer_read_wire_format_parses_as_json_array() {
        let mut hub = hub();
        hub.create_observation("/obs/o", DataKind::Numeric, "degC").unwrap();
        let identity = StaticIdentityProvider::new("device-1");
        let sink = TracingClientSink;
        let mut session = hub.session(0, &identity, &sink).unwrap();
        session.create_input("/sensor/temp", DataKind::Numeric, "degC").unwrap();
        drop(session);
        hub.bind_observation("/app/device-1/sensor/temp", "/obs/o").unwrap();
        let mut session = hub.session(0, &identity, &sink).unwrap();
        session.push_numeric("/sensor/temp", 1.0, 21.5, 0.0).unwrap();
        drop(session);
        let json = hub.read_buffer_json("/obs/o", f64::NAN, 0.0, None).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let arr = parsed.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["v"], 21.5);
    }
}
