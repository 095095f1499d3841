//! Sans-io routing core.
//!
//! The router owns no sockets. A driver (WebSocket server, in-memory
//! network) allocates a [`ConnId`] per connection, feeds every inbound
//! message through [`RelayRouter::handle`] and delivers the returned
//! `(ConnId, RelayMessage)` pairs however it likes.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::message::{ActorId, DocumentId, RelayMessage};

/// Driver-scoped connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

/// Store-and-forward router keyed by actor id.
#[derive(Debug, Default)]
pub struct RelayRouter {
    next_conn: u64,
    /// Actor id -> connection it authenticated on (latest wins).
    actors: HashMap<ActorId, ConnId>,
    /// Document id -> actors that announced it.
    peers: HashMap<DocumentId, Vec<ActorId>>,
}

impl RelayRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle for a newly accepted connection.
    pub fn connect(&mut self) -> ConnId {
        let id = ConnId(self.next_conn);
        self.next_conn += 1;
        id
    }

    /// Drop all actor bindings of a closed connection. Document peer
    /// lists keep the actor; a reconnecting peer re-binds via `auth`.
    pub fn disconnect(&mut self, conn: ConnId) {
        self.actors.retain(|_, c| *c != conn);
    }

    /// Route one inbound message, returning the messages to deliver.
    pub fn handle(&mut self, conn: ConnId, message: RelayMessage) -> Vec<(ConnId, RelayMessage)> {
        match message {
            RelayMessage::Auth { from } => {
                debug!("[{from}] -> auth");
                self.actors.insert(from, conn);
                Vec::new()
            }

            RelayMessage::HaveSceneGraph { from, id } => {
                debug!("[{from}] -> haveSceneGraph ({id})");
                let peers = self.peers.entry(id).or_default();
                if !peers.contains(&from) {
                    peers.push(from);
                }
                Vec::new()
            }

            RelayMessage::GetPeers { from, id } => {
                debug!("[{from}] -> getPeers ({id})");
                let Some(peers) = self.peers.get(&id) else {
                    return Vec::new();
                };
                let Some(&recipient) = self.actors.get(&from) else {
                    warn!("getPeers from unauthenticated actor {from}");
                    return Vec::new();
                };
                vec![(
                    recipient,
                    RelayMessage::PeerList {
                        id,
                        peers: peers.clone(),
                    },
                )]
            }

            RelayMessage::Sync {
                from,
                to,
                sync_message,
            } => {
                debug!("[{from}] -> sync ({to})");
                let Some(&recipient) = self.actors.get(&to) else {
                    // Recipient gone or not yet authenticated; the
                    // sender retries on its next interval.
                    return Vec::new();
                };
                vec![(
                    recipient,
                    RelayMessage::Sync {
                        from,
                        to,
                        sync_message,
                    },
                )]
            }

            RelayMessage::PeerList { .. } => {
                warn!("relay received a peerList message; ignoring");
                Vec::new()
            }
        }
    }
}
