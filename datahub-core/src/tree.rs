//! The Resource Tree: path-addressed namespace of Entries (spec.md §3,
//! §4.1, §4.7).
//!
//! Entries live in a [`slab::Slab`] arena and are addressed by
//! [`EntryId`], an arena index rather than a pointer (spec.md §9). This
//! is what makes role promotion-in-place (Namespace/Placeholder →
//! Input/Output/Observation) trivial: the slot's payload is replaced,
//! the id and every outstanding reference to it stay valid.

use std::collections::HashMap;

use slab::Slab;

use crate::error::{ClientFault, HubError};
use crate::resource::ResourceState;
use crate::sample::DataKind;

/// Arena index of an [`EntryNode`]. Cheap to copy, stable across
/// promotion, stable across sibling insertion/removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

/// The state-machine role of an Entry (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Namespace,
    Placeholder,
    Input,
    Output,
    Observation,
}

pub struct EntryNode {
    name: String,
    parent: Option<EntryId>,
    children: HashMap<String, EntryId>,
    role: Role,
    /// Present for every role except `Namespace` (spec.md §3.1 lists
    /// resource state as shared structure for Input/Output/Observation
    /// *and* Placeholder).
    resource: Option<ResourceState>,
}

impl EntryNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    pub fn resource(&self) -> Option<&ResourceState> {
        self.resource.as_ref()
    }

    pub fn resource_mut(&mut self) -> Option<&mut ResourceState> {
        self.resource.as_mut()
    }

    pub fn children(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.children.values().copied()
    }
}

/// An observation's derivation from a source resource (spec.md §4.3
/// step 6). Maintained administratively, scanned per-push — kept as a
/// flat `Vec` rather than a reverse index since the expected fan-out
/// from one source is small (spec.md §4.3 supplemental note).
struct ObservationBinding {
    source: EntryId,
    observation: EntryId,
}

pub struct ResourceTree {
    arena: Slab<EntryNode>,
    root: EntryId,
    bindings: Vec<ObservationBinding>,
    max_path_depth: usize,
    max_segment_len: usize,
}

impl ResourceTree {
    pub fn new(max_path_depth: usize, max_segment_len: usize) -> Self {
        let mut arena = Slab::new();
        let root_key = arena.insert(EntryNode {
            name: String::new(),
            parent: None,
            children: HashMap::new(),
            role: Role::Namespace,
            resource: None,
        });
        Self {
            arena,
            root: EntryId(root_key),
            bindings: Vec::new(),
            max_path_depth,
            max_segment_len,
        }
    }

    pub fn root(&self) -> EntryId {
        self.root
    }

    pub fn entry(&self, id: EntryId) -> &EntryNode {
        &self.arena[id.0]
    }

    pub fn entry_mut(&mut self, id: EntryId) -> &mut EntryNode {
        &mut self.arena[id.0]
    }

    /// Reconstruct the absolute path of `id` by walking parent links.
    pub fn path_of(&self, id: EntryId) -> String {
        let mut segments = Vec::new();
        let mut cur = id;
        while let Some(parent) = self.arena[cur.0].parent {
            segments.push(self.arena[cur.0].name.clone());
            cur = parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    fn split_path(path: &str) -> Option<Vec<&str>> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        if trimmed.is_empty() {
            return Some(Vec::new());
        }
        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(segments)
    }

    fn validate_segments(&self, segments: &[&str]) -> Result<(), ClientFault> {
        if segments.len() > self.max_path_depth {
            return Err(ClientFault::new(format!(
                "path depth {} exceeds maximum {}",
                segments.len(),
                self.max_path_depth
            )));
        }
        for s in segments {
            if s.len() > self.max_segment_len {
                return Err(ClientFault::new(format!(
                    "path segment {s:?} exceeds maximum length {}",
                    self.max_segment_len
                )));
            }
        }
        Ok(())
    }

    /// `findEntry` (spec.md §4.1): resolve a relative path without
    /// creating anything. A malformed path resolves to *not-found*,
    /// matching the spec rather than surfacing a parse error.
    pub fn find_entry(&self, base: EntryId, path: &str) -> Option<EntryId> {
        let segments = Self::split_path(path)?;
        let mut cur = base;
        for seg in segments {
            cur = *self.arena[cur.0].children.get(seg)?;
        }
        Some(cur)
    }

    /// `findAtAbsolute` (spec.md §4.1): non-absolute paths resolve to
    /// *not-found*.
    pub fn find_at_absolute(&self, path: &str) -> Result<EntryId, HubError> {
        if !path.starts_with('/') {
            return Err(HubError::NotFound);
        }
        self.find_entry(self.root, path).ok_or(HubError::NotFound)
    }

    /// `getEntry` (spec.md §4.1, §4.7): resolve a relative path,
    /// materialising missing intermediate nodes as Namespaces and the
    /// leaf as a Placeholder if it doesn't already exist.
    pub fn get_entry(&mut self, base: EntryId, path: &str) -> Result<EntryId, ClientFault> {
        let segments =
            Self::split_path(path).ok_or_else(|| ClientFault::new(format!("malformed path {path:?}")))?;
        self.validate_segments(&segments)?;
        let mut cur = base;
        let last = segments.len().saturating_sub(1);
        for (i, seg) in segments.iter().enumerate() {
            if let Some(&child) = self.arena[cur.0].children.get(*seg) {
                cur = child;
            } else if i == last {
                // A Placeholder still carries resource state (spec.md §3.1
                // lists it alongside Input/Output/Observation) so that a
                // push routed straight at it — e.g. a client's own session
                // root before it has created anything — hits the ordinary
                // Placeholder type-gate branch in the push pipeline instead
                // of a missing `ResourceState`.
                cur = self.insert_child(cur, seg, Role::Placeholder, Some(ResourceState::new(DataKind::Trigger, "")));
            } else {
                cur = self.insert_child(cur, seg, Role::Namespace, None);
            }
        }
        Ok(cur)
    }

    fn insert_child(
        &mut self,
        parent: EntryId,
        name: &str,
        role: Role,
        resource: Option<ResourceState>,
    ) -> EntryId {
        let key = self.arena.insert(EntryNode {
            name: name.to_string(),
            parent: Some(parent),
            children: HashMap::new(),
            role,
            resource,
        });
        let id = EntryId(key);
        self.arena[parent.0].children.insert(name.to_string(), id);
        id
    }

    /// Shared implementation of `getInput`/`getOutput` (spec.md §4.1).
    fn get_io(
        &mut self,
        base: EntryId,
        path: &str,
        data_type: DataKind,
        units: &str,
        role: Role,
    ) -> Result<EntryId, HubError> {
        debug_assert!(matches!(role, Role::Input | Role::Output));
        let segments = Self::split_path(path).ok_or(HubError::NotFound)?;
        if self.validate_segments(&segments).is_err() {
            return Err(HubError::NoMemory);
        }
        let (parent_segments, leaf) = match segments.split_last() {
            Some((leaf, rest)) => (rest, *leaf),
            None => return Err(HubError::NotFound),
        };
        let mut parent = base;
        for seg in parent_segments {
            parent = if let Some(&child) = self.arena[parent.0].children.get(*seg) {
                child
            } else {
                self.insert_child(parent, seg, Role::Namespace, None)
            };
        }

        if let Some(&existing) = self.arena[parent.0].children.get(leaf) {
            let existing_role = self.arena[existing.0].role;
            match existing_role {
                Role::Namespace | Role::Placeholder => {
                    let state = ResourceState::new(data_type, units);
                    let node = &mut self.arena[existing.0];
                    node.role = role;
                    node.resource = Some(state);
                    tracing::debug!(path, role = ?role, "entry promoted to resource");
                    Ok(existing)
                }
                r if r == role => {
                    let node = &self.arena[existing.0];
                    let res = node.resource.as_ref().expect("resource-role entry missing state");
                    if res.data_type() == data_type && res.units() == units {
                        Ok(existing)
                    } else {
                        Err(HubError::Duplicate)
                    }
                }
                _ => Err(HubError::Duplicate),
            }
        } else {
            Ok(self.insert_child(parent, leaf, role, Some(ResourceState::new(data_type, units))))
        }
    }

    pub fn get_input(
        &mut self,
        base: EntryId,
        path: &str,
        data_type: DataKind,
        units: &str,
    ) -> Result<EntryId, HubError> {
        self.get_io(base, path, data_type, units, Role::Input)
    }

    pub fn get_output(
        &mut self,
        base: EntryId,
        path: &str,
        data_type: DataKind,
        units: &str,
    ) -> Result<EntryId, HubError> {
        self.get_io(base, path, data_type, units, Role::Output)
    }

    /// Administrative observation creation (spec.md §4.1 analogue,
    /// §4.3): observations are created/deleted administratively, never
    /// through the client-facing producer API.
    pub fn create_observation(
        &mut self,
        path: &str,
        data_type: DataKind,
        units: &str,
        buffer_max_count: usize,
        buffer_max_window_sec: f64,
    ) -> Result<EntryId, HubError> {
        let id = self.get_io(self.root, path, data_type, units, Role::Observation)?;
        let node = self.entry_mut(id);
        if let Some(res) = node.resource_mut() {
            if res.buffer.is_none() {
                res.buffer = Some(crate::buffer::ObservationBuffer::new(
                    buffer_max_count,
                    buffer_max_window_sec,
                ));
            }
        }
        Ok(id)
    }

    /// Bind `observation` to derive from pushes to `source` (spec.md
    /// §4.3 step 6).
    pub fn bind_observation(&mut self, source: EntryId, observation: EntryId) {
        self.bindings.push(ObservationBinding { source, observation });
    }

    pub(crate) fn observations_bound_to(&self, source: EntryId) -> Vec<EntryId> {
        self.bindings
            .iter()
            .filter(|b| b.source == source)
            .map(|b| b.observation)
            .collect()
    }

    /// `deleteIO` (spec.md §4.1, §4.7): demotes to `Namespace` if the
    /// entry still has children, else removes it and any now-empty
    /// Namespace ancestors. Calling this on anything but an Input or
    /// Output is a client-contract violation, not a structural error.
    pub fn delete_io(&mut self, id: EntryId) -> Result<(), ClientFault> {
        let role = self.arena[id.0].role;
        if !matches!(role, Role::Input | Role::Output) {
            return Err(ClientFault::new(format!(
                "deleteIO called on an entry with role {role:?}, expected Input or Output"
            )));
        }
        if self.arena[id.0].children.is_empty() {
            self.remove_leaf_and_empty_ancestors(id);
        } else {
            let node = &mut self.arena[id.0];
            node.role = Role::Namespace;
            node.resource = None;
        }
        Ok(())
    }

    fn remove_leaf_and_empty_ancestors(&mut self, id: EntryId) {
        let mut cur = id;
        loop {
            let parent = self.arena[cur.0].parent;
            let name = self.arena[cur.0].name.clone();
            self.arena.remove(cur.0);
            match parent {
                Some(p) => {
                    self.arena[p.0].children.remove(&name);
                    let keep_going = self.arena[p.0].children.is_empty()
                        && self.arena[p.0].role == Role::Namespace
                        && self.arena[p.0].parent.is_some();
                    if keep_going {
                        cur = p;
                        continue;
                    }
                }
                None => {}
            }
            break;
        }
    }

    pub fn resource_count_under(&self, root: EntryId) -> usize {
        let mut count = 0;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &self.arena[id.0];
            if matches!(node.role, Role::Input | Role::Output | Role::Observation) {
                count += 1;
            }
            stack.extend(node.children());
        }
        count
    }
}
