//! # Folio Scene Graph
//!
//! Tree-shaped collaborative document core.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ SceneGraph trait: CRUD, traversal,          │
//! │ ascension, events, pluggable systems        │
//! └─────────────────────────────────────────────┘
//!        ↓                         ↓
//! ┌──────────────────┐   ┌──────────────────────┐
//! │ ReplicatedScene- │   │ LocalSceneGraph:     │
//! │ Graph: yrs CRDT  │   │ in-memory, offline   │
//! │ node table       │   │ and test scenarios   │
//! └──────────────────┘   └──────────────────────┘
//!        ↓
//! ┌─────────────────────────────────────────────┐
//! │ Synchronizer system: per-peer sync state,   │
//! │ delta exchange through a relay transport    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The CRDT document is the sole source of truth** for structure
//!    and properties; node metadata is derived, never replicated.
//! 2. **Referential races never abort**: a mutation against a node a
//!    remote merge already removed logs a warning and is dropped.
//! 3. **No-ops short-circuit** before any document change, event
//!    emission or network chatter.
//! 4. **Single-threaded, cooperative**: all mutation, event dispatch
//!    and system updates run synchronously inside the calling stack;
//!    `update()` once per host tick is the only scheduling boundary.

mod event;
mod graph;
mod ids;
mod local;
mod metadata;
mod property;
mod replicated;
mod sync;

#[cfg(test)]
mod tests_graph;
#[cfg(test)]
mod tests_convergence;

pub use event::{EventKind, EventListener, SceneGraphEvent};
pub use graph::{NodeRef, SceneGraph, SceneGraphSystem, TraversalControl};
pub use ids::NodeId;
pub use local::LocalSceneGraph;
pub use metadata::{MetadataTable, NodeMetadata};
pub use property::{NodeData, PropertyValue};
pub use replicated::ReplicatedSceneGraph;
pub use sync::{SyncError, SyncPayload, Synchronizer};

// Re-export the relay-addressing vocabulary for convenience
pub use folio_relay::{ActorId, DocumentId};
