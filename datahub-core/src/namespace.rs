//! Client namespace binding: maps an opaque client identity to its
//! `/app/<client-id>/` subtree (spec.md §4.5).

use std::collections::HashMap;

use crate::error::ClientFault;
use crate::tree::{EntryId, ResourceTree};

/// Caches client-id → subtree-entry bindings for the lifetime of this
/// binder (typically one per session, or one shared by a short-lived
/// set of sessions — spec.md doesn't mandate the cache's scope beyond
/// "cached on the client session").
#[derive(Default)]
pub struct NamespaceBinder {
    bindings: HashMap<String, EntryId>,
}

impl NamespaceBinder {
    pub fn new() -> Self {
        Self { bindings: HashMap::new() }
    }

    /// Resolve `client_id` to its `/app/<client_id>/` entry, creating
    /// missing namespace nodes on first use and caching the result.
    ///
    /// Failure to resolve is fatal for that client's session (spec.md
    /// §4.5) but never corrupts the tree — `get_entry` only fails on a
    /// malformed path, which a well-behaved identity provider won't
    /// produce.
    pub fn bind(&mut self, tree: &mut ResourceTree, client_id: &str) -> Result<EntryId, ClientFault> {
        if let Some(&id) = self.bindings.get(client_id) {
            return Ok(id);
        }
        let root = tree.root();
        let path = format!("/app/{client_id}");
        let id = tree.get_entry(root, &path)?;
        self.bindings.insert(client_id.to_string(), id);
        Ok(id)
    }

    /// Discard the cached mapping for `client_id` on session end. The
    /// `/app/<client_id>/` subtree itself is left intact — clients may
    /// reconnect and resume where they left off (spec.md §4.5).
    pub fn forget(&mut self, client_id: &str) {
        self.bindings.remove(client_id);
    }

    pub fn is_cached(&self, client_id: &str) -> bool {
        self.bindings.contains_key(client_id)
    }
}
