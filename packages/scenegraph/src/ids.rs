//! Node identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use folio_relay::DocumentId;

/// Stable, opaque node identifier. Replicated graphs mint UUIDs so ids
/// never collide across replicas; the local graph uses sequential ids.
/// Identity is immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Document identity is derived from the root node's id.
    pub fn to_document_id(&self) -> DocumentId {
        DocumentId::new(self.0.clone())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
