//! # Folio Relay
//!
//! Store-and-forward message relay for collaborative documents.
//!
//! Peers editing the same document never talk to each other directly;
//! they address sync payloads to actor ids and the relay routes them.
//! The relay is deliberately dumb: it binds actor ids to connections,
//! remembers which actors announced interest in which document, answers
//! peer-list queries, and forwards sync payloads verbatim. It never
//! inspects payload contents.
//!
//! The crate ships three layers:
//!
//! - [`RelayMessage`] / [`RelayTransport`]: the wire vocabulary and the
//!   sync-message boundary a synchronizer programs against.
//! - [`RelayRouter`]: the sans-io routing core, usable from any driver.
//! - [`MemoryRelayNetwork`]: an in-process network for tests and
//!   single-process multi-replica setups.
//!
//! A WebSocket server binary (`folio-relay`) wires the router to real
//! connections.

mod error;
mod memory;
mod message;
mod router;

pub use error::RelayError;
pub use memory::{MemoryRelayConnection, MemoryRelayNetwork};
pub use message::{ActorId, DocumentId, RelayMessage};
pub use router::{ConnId, RelayRouter};

/// Transport used by a synchronizer to reach its relay.
///
/// Implementations are expected to be non-blocking: `poll` returns
/// whatever has arrived since the last call and never waits.
pub trait RelayTransport {
    fn send(&mut self, message: &RelayMessage) -> Result<(), RelayError>;
    fn poll(&mut self) -> Result<Vec<RelayMessage>, RelayError>;
}
