//! Peer synchronization system.
//!
//! A [`Synchronizer`] is registered onto a [`ReplicatedSceneGraph`] and
//! exchanges CRDT sync messages with peers over a relay. It keeps one
//! sync state per peer (the peer's last advertised state vector plus
//! the local document version at our last send) and only generates an
//! outgoing message when state has actually advanced for that peer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::StateVector;

use folio_relay::{ActorId, RelayMessage, RelayTransport};

use crate::graph::{SceneGraph, SceneGraphSystem};
use crate::replicated::ReplicatedSceneGraph;

/// Errors crossing the sync boundary. Unlike referential races, these
/// are not locally recoverable: the host decides whether to drop the
/// peer or re-request state.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to decode sync payload: {0}")]
    Payload(String),

    #[error("Failed to decode update: {0}")]
    Decode(String),

    #[error("Failed to apply update: {0}")]
    Apply(String),
}

/// Wire content of a `sync` relay message: the sender's state vector
/// (doubles as an ack) and the delta the recipient was missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPayload {
    pub state_vector: Vec<u8>,
    pub update: Vec<u8>,
}

/// Per-peer sync progress. Opaque and peer-scoped; never shared across
/// peers.
#[derive(Debug, Default)]
struct PeerSyncState {
    /// What the peer told us it has.
    remote_state_vector: StateVector,
    /// Local document version at our last send to this peer.
    last_sent_version: Option<u64>,
}

/// Scene graph system that keeps a replicated document converged with
/// its peers through a [`RelayTransport`].
pub struct Synchronizer<T: RelayTransport> {
    transport: T,
    peers: HashMap<ActorId, PeerSyncState>,
    discovery_interval: Duration,
    last_discovery: Option<Instant>,
    errors: Vec<(ActorId, SyncError)>,
}

impl<T: RelayTransport> Synchronizer<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            peers: HashMap::new(),
            discovery_interval: Duration::from_secs(1),
            last_discovery: None,
            errors: Vec::new(),
        }
    }

    /// Cadence of peer discovery and re-broadcast. The interval is the
    /// only throttle on outbound traffic; a silent peer is simply
    /// retried on the next tick.
    pub fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }

    /// Actors this synchronizer currently tracks sync state for.
    pub fn peer_ids(&self) -> Vec<ActorId> {
        self.peers.keys().cloned().collect()
    }

    /// Drain merge errors accumulated since the last call, with the
    /// peer each one came from.
    pub fn take_errors(&mut self) -> Vec<(ActorId, SyncError)> {
        std::mem::take(&mut self.errors)
    }

    fn send(&mut self, message: &RelayMessage) {
        if let Err(e) = self.transport.send(message) {
            warn!("Relay send failed: {e}");
        }
    }

    fn receive_sync(&mut self, graph: &mut ReplicatedSceneGraph, from: ActorId, payload: &[u8]) {
        // A peer seen for the first time gets fresh sync state.
        self.peers.entry(from.clone()).or_default();

        let payload: SyncPayload = match serde_json::from_slice(payload) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Undecodable sync payload from {from}: {e}");
                self.errors.push((from, SyncError::Payload(e.to_string())));
                return;
            }
        };

        match StateVector::decode_v1(&payload.state_vector) {
            Ok(state_vector) => {
                if let Some(state) = self.peers.get_mut(&from) {
                    state.remote_state_vector = state_vector;
                }
            }
            Err(e) => {
                error!("Undecodable state vector from {from}: {e}");
                self.errors
                    .push((from.clone(), SyncError::Decode(e.to_string())));
            }
        }

        match graph.apply_remote_update(&payload.update) {
            Ok(changed) => graph.notify_remote_changes(changed),
            Err(e) => {
                error!("Merge from {from} failed: {e}");
                self.errors.push((from, e));
            }
        }
    }

    fn send_sync(&mut self, graph: &ReplicatedSceneGraph, peer_id: &ActorId) {
        let version = graph.version();
        let our_state_vector = graph.state_vector();

        let Some(state) = self.peers.get(peer_id) else {
            return;
        };
        let advanced = state.last_sent_version != Some(version);
        let peer_behind = !covers(&state.remote_state_vector, &our_state_vector);
        if !advanced && !peer_behind {
            // Nothing new for this peer.
            return;
        }

        let payload = SyncPayload {
            state_vector: our_state_vector.encode_v1(),
            update: graph.encode_update_since(&state.remote_state_vector),
        };
        let sync_message = match serde_json::to_vec(&payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode sync payload: {e}");
                return;
            }
        };

        self.send(&RelayMessage::Sync {
            from: graph.actor_id(),
            to: peer_id.clone(),
            sync_message,
        });
        if let Some(state) = self.peers.get_mut(peer_id) {
            state.last_sent_version = Some(version);
        }
    }

    fn flush(&mut self, graph: &ReplicatedSceneGraph) {
        for peer_id in self.peer_ids() {
            self.send_sync(graph, &peer_id);
        }
    }

    fn discover(&mut self, graph: &ReplicatedSceneGraph) {
        let Some(document_id) = graph.document_id() else {
            return;
        };
        self.send(&RelayMessage::GetPeers {
            from: graph.actor_id(),
            id: document_id,
        });
        self.last_discovery = Some(Instant::now());
    }
}

impl<T: RelayTransport> SceneGraphSystem<ReplicatedSceneGraph> for Synchronizer<T> {
    fn initialize(&mut self, graph: &mut ReplicatedSceneGraph) {
        self.send(&RelayMessage::Auth {
            from: graph.actor_id(),
        });
        if let Some(document_id) = graph.document_id() {
            self.send(&RelayMessage::HaveSceneGraph {
                from: graph.actor_id(),
                id: document_id,
            });
        }
        self.discover(graph);
    }

    fn update(&mut self, graph: &mut ReplicatedSceneGraph) {
        let inbound = match self.transport.poll() {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Relay poll failed: {e}");
                Vec::new()
            }
        };

        let own_actor = graph.actor_id();
        for message in inbound {
            match message {
                RelayMessage::PeerList { peers, .. } => {
                    for peer in peers {
                        if peer != own_actor {
                            self.peers.entry(peer).or_default();
                        }
                    }
                }
                RelayMessage::Sync {
                    from, sync_message, ..
                } => self.receive_sync(graph, from, &sync_message),
                // Client-bound kinds only; anything else is relay-bound.
                other => warn!("Ignoring unexpected relay message: {other:?}"),
            }
        }

        // Flush once after any merge; the per-peer emptiness check
        // keeps this silent when nothing advanced.
        self.flush(graph);

        let due = self
            .last_discovery
            .map_or(true, |at| at.elapsed() >= self.discovery_interval);
        if due {
            self.discover(graph);
        }
    }
}

/// Whether `known` already accounts for everything in `ours`.
fn covers(known: &StateVector, ours: &StateVector) -> bool {
    ours.iter().all(|(client, clock)| known.get(client) >= *clock)
}
