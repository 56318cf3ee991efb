use std::fmt;

/// Status codes returned to well-behaved callers of the tree and query
/// facade (spec.md §7, "structural errors" / "transient read failures").
///
/// Contract violations (push to a non-existent resource, wrong-kind read
/// via the client-facing API, negative `startAfter`, …) are never
/// represented here — they surface as [`ClientFault`] instead, and the
/// embedding transport is expected to terminate the offending session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    NotFound,
    Duplicate,
    Unavailable,
    Unsupported,
    FormatError,
    Overflow,
    NoMemory,
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            HubError::NotFound => "not found",
            HubError::Duplicate => "duplicate",
            HubError::Unavailable => "unavailable",
            HubError::Unsupported => "unsupported",
            HubError::FormatError => "format error",
            HubError::Overflow => "overflow",
            HubError::NoMemory => "no memory",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for HubError {}

/// A client-contract violation (spec.md §7): the push pipeline or query
/// facade was called in a way that is only possible if the caller is
/// broken (fetching the wrong kind, pushing to a resource that was never
/// created, registering a handler on a resource that doesn't exist yet,
/// a negative `startAfter`, …).
///
/// `HubError` is never returned to the offender for these — the tree is
/// left untouched and this diagnostic is handed to the embedding
/// transport, whose job is to kill the client session
/// (`datahub_collab::ClientSink::kill_client`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFault(pub String);

impl fmt::Display for ClientFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client contract violation: {}", self.0)
    }
}

impl std::error::Error for ClientFault {}

impl ClientFault {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
