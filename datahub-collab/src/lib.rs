//! Collaborator interfaces consumed by the data hub (SPEC_FULL.md §6.4):
//! client identity, wall clock, session control/logging, and observation
//! persistence. Every trait here ships a default implementation suitable
//! for embedding or tests; a production transport or persistence layer
//! is out of scope and is meant to be supplied by the caller.

use datahub_core::{DataSample, HubError};

/// Opaque handle to a connected client session, supplied by the
/// embedding transport. This crate never interprets it — it's just a
/// key passed through to [`ClientIdentityProvider`] and [`ClientSink`].
pub type SessionHandle = u64;

/// A client's identity within the resource tree's `/app/<client-id>/`
/// namespace (spec.md §4.5).
pub type ClientId = String;

/// Severity passed to [`ClientSink::log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Resolves a transport-level session handle to the stable client
/// identity used to address `/app/<client-id>/` (spec.md §4.5).
pub trait ClientIdentityProvider {
    fn identify(&self, session: SessionHandle) -> Result<ClientId, HubError>;
}

/// Maps every session handle to a single preset id — meant for tests
/// and single-tenant embeddings, not a real multi-client transport.
pub struct StaticIdentityProvider(ClientId);

impl StaticIdentityProvider {
    pub fn new(id: impl Into<ClientId>) -> Self {
        Self(id.into())
    }
}

impl ClientIdentityProvider for StaticIdentityProvider {
    fn identify(&self, _session: SessionHandle) -> Result<ClientId, HubError> {
        Ok(self.0.clone())
    }
}

/// Supplies the wall-clock reading used for timestamp normalisation
/// (spec.md §4.2, §4.3 step 1) and for resolving `startAfter` (spec.md
/// §4.4). Kept as a trait so tests can pin the clock.
pub trait WallClock {
    fn now_seconds(&self) -> f64;
}

/// Reads the host's real-time clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_seconds(&self) -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// The embedding transport's hook for session control and diagnostics
/// (spec.md §7): a [`datahub_core::ClientFault`] surfaced by the core
/// is expected to reach `kill_client` here.
pub trait ClientSink {
    fn kill_client(&self, session: SessionHandle, reason: &str);
    fn log(&self, level: LogLevel, msg: &str);
}

/// Routes both calls through `tracing` — adequate for tests and for an
/// embedding that hasn't wired up a real transport yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingClientSink;

impl ClientSink for TracingClientSink {
    fn kill_client(&self, session: SessionHandle, reason: &str) {
        tracing::warn!(session, reason, "client session terminated");
    }

    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{msg}"),
            LogLevel::Info => tracing::info!("{msg}"),
            LogLevel::Warn => tracing::warn!("{msg}"),
            LogLevel::Error => tracing::error!("{msg}"),
        }
    }
}

/// Persists and restores an observation's buffer across restarts. A
/// real persistent store is explicitly out of scope (spec.md
/// Non-goals) — this trait exists so one can be plugged in later
/// without touching `datahub-core`.
pub trait ObservationStore {
    fn persist(&self, path: &str, buffer: &[DataSample]) -> Result<(), HubError>;
    fn load(&self, path: &str) -> Result<Vec<DataSample>, HubError>;
}

/// Does nothing. The reference store for an embedding that hasn't
/// plugged in persistence.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObservationStore;

impl ObservationStore for NullObservationStore {
    fn persist(&self, _path: &str, _buffer: &[DataSample]) -> Result<(), HubError> {
        Ok(())
    }

    fn load(&self, _path: &str) -> Result<Vec<DataSample>, HubError> {
        Ok(Vec::new())
    }
}
