//! Relay wire protocol.
//!
//! Messages travel as JSON text frames. The `type` tag and camelCase
//! field names are part of the wire contract.

use serde::{Deserialize, Serialize};

/// Replica identity used to address sync messages to and from a
/// specific process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Stable handle of a collaborative document, used to join an ongoing
/// session. Derived from the document's root node id at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The four client-originated message kinds plus the relay's peer-list
/// answer, all over one persistent bidirectional connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RelayMessage {
    /// Announce the sender's actor id; binds it to this connection.
    Auth { from: ActorId },

    /// Register interest in a document id.
    #[serde(rename = "haveSceneGraph")]
    HaveSceneGraph { from: ActorId, id: DocumentId },

    /// Request the peer list for a document id.
    #[serde(rename = "getPeers")]
    GetPeers { from: ActorId, id: DocumentId },

    /// Relay's answer to `getPeers`.
    #[serde(rename = "peerList")]
    PeerList { id: DocumentId, peers: Vec<ActorId> },

    /// Opaque CRDT sync payload, relayed verbatim to `to`.
    Sync {
        from: ActorId,
        to: ActorId,
        #[serde(rename = "syncMessage")]
        sync_message: Vec<u8>,
    },
}
