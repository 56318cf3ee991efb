//! The resource tree and push-dispatch engine underneath the on-device
//! data hub: entries, samples, observations and the read-side query
//! facade. This crate has no notion of a client session or a wire
//! protocol — that's `datahub-collab`'s and `datahub`'s job.

pub mod buffer;
pub mod dispatch;
pub mod error;
pub mod namespace;
pub mod query;
pub mod resource;
pub mod sample;
pub mod tree;

pub use buffer::{resolve_start_after, ObservationBuffer, StartFilter, SECONDS_IN_30_YEARS};
pub use dispatch::{push, push_with_filter};
pub use error::{ClientFault, HubError};
pub use namespace::NamespaceBinder;
pub use resource::{HandlerId, ObservationFilter, PassThrough, ResourceState};
pub use sample::{DataKind, DataSample, EmbeddedNul};
pub use tree::{EntryId, EntryNode, ResourceTree, Role};
