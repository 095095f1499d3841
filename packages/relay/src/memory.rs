//! In-process relay network.
//!
//! Runs the [`RelayRouter`] against per-connection inboxes inside one
//! process, so multiple replicas (and their synchronizers) can talk to
//! each other in tests and single-process demos without sockets.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::message::RelayMessage;
use crate::router::{ConnId, RelayRouter};
use crate::{RelayError, RelayTransport};

#[derive(Debug, Default)]
struct NetworkInner {
    router: RelayRouter,
    inboxes: HashMap<ConnId, VecDeque<RelayMessage>>,
    /// When set, `poll` hands messages out newest-first. Lets tests
    /// exercise convergence under hostile delivery order.
    reverse_delivery: bool,
}

/// Shared in-memory relay. Cloning yields another handle onto the same
/// network. Single-threaded by design, like the engine core.
#[derive(Debug, Clone, Default)]
pub struct MemoryRelayNetwork {
    inner: Rc<RefCell<NetworkInner>>,
}

impl MemoryRelayNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new connection to this relay.
    pub fn connect(&self) -> MemoryRelayConnection {
        let conn = self.inner.borrow_mut().router.connect();
        self.inner.borrow_mut().inboxes.insert(conn, VecDeque::new());
        MemoryRelayConnection {
            inner: Rc::clone(&self.inner),
            conn,
        }
    }

    /// Deliver queued messages newest-first from now on.
    pub fn set_reverse_delivery(&self, reverse: bool) {
        self.inner.borrow_mut().reverse_delivery = reverse;
    }

    /// Total number of undelivered messages across all inboxes.
    pub fn pending(&self) -> usize {
        self.inner.borrow().inboxes.values().map(VecDeque::len).sum()
    }
}

/// One peer's connection to a [`MemoryRelayNetwork`].
#[derive(Debug)]
pub struct MemoryRelayConnection {
    inner: Rc<RefCell<NetworkInner>>,
    conn: ConnId,
}

impl RelayTransport for MemoryRelayConnection {
    fn send(&mut self, message: &RelayMessage) -> Result<(), RelayError> {
        let mut inner = self.inner.borrow_mut();
        let outputs = inner.router.handle(self.conn, message.clone());
        for (target, out) in outputs {
            if let Some(inbox) = inner.inboxes.get_mut(&target) {
                inbox.push_back(out);
            }
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<RelayMessage>, RelayError> {
        let mut inner = self.inner.borrow_mut();
        let reverse = inner.reverse_delivery;
        let Some(inbox) = inner.inboxes.get_mut(&self.conn) else {
            return Err(RelayError::ConnectionClosed);
        };
        let mut messages: Vec<RelayMessage> = inbox.drain(..).collect();
        if reverse {
            messages.reverse();
        }
        Ok(messages)
    }
}

impl Drop for MemoryRelayConnection {
    fn drop(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.router.disconnect(self.conn);
        inner.inboxes.remove(&self.conn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ActorId, DocumentId};

    #[test]
    fn test_roundtrip_through_memory_network() {
        let network = MemoryRelayNetwork::new();
        let mut alice = network.connect();
        let mut bob = network.connect();

        alice
            .send(&RelayMessage::Auth {
                from: ActorId::from("alice"),
            })
            .unwrap();
        bob.send(&RelayMessage::Auth {
            from: ActorId::from("bob"),
        })
        .unwrap();

        alice
            .send(&RelayMessage::Sync {
                from: ActorId::from("alice"),
                to: ActorId::from("bob"),
                sync_message: vec![42],
            })
            .unwrap();

        let received = bob.poll().unwrap();
        assert_eq!(received.len(), 1);
        assert!(alice.poll().unwrap().is_empty());
    }

    #[test]
    fn test_peer_discovery_through_memory_network() {
        let network = MemoryRelayNetwork::new();
        let mut alice = network.connect();
        let mut bob = network.connect();

        for (conn, name) in [(&mut alice, "alice"), (&mut bob, "bob")] {
            conn.send(&RelayMessage::Auth {
                from: ActorId::from(name),
            })
            .unwrap();
            conn.send(&RelayMessage::HaveSceneGraph {
                from: ActorId::from(name),
                id: DocumentId::from("doc"),
            })
            .unwrap();
        }

        alice
            .send(&RelayMessage::GetPeers {
                from: ActorId::from("alice"),
                id: DocumentId::from("doc"),
            })
            .unwrap();

        match alice.poll().unwrap().pop() {
            Some(RelayMessage::PeerList { peers, .. }) => assert_eq!(peers.len(), 2),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_reverse_delivery_reorders_poll() {
        let network = MemoryRelayNetwork::new();
        let mut alice = network.connect();
        let mut bob = network.connect();

        alice
            .send(&RelayMessage::Auth {
                from: ActorId::from("alice"),
            })
            .unwrap();
        bob.send(&RelayMessage::Auth {
            from: ActorId::from("bob"),
        })
        .unwrap();

        network.set_reverse_delivery(true);
        for payload in [vec![1], vec![2]] {
            alice
                .send(&RelayMessage::Sync {
                    from: ActorId::from("alice"),
                    to: ActorId::from("bob"),
                    sync_message: payload,
                })
                .unwrap();
        }

        let received = bob.poll().unwrap();
        match &received[0] {
            RelayMessage::Sync { sync_message, .. } => assert_eq!(sync_message, &vec![2]),
            other => panic!("unexpected message {other:?}"),
        }
    }
}
