// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Live connection registry and broadcaster.
//!
//! Each connection registers an [`Outbound`] handle: the sending side of a
//! bounded channel drained by that connection's single writer task. Because every frame
//! for a connection, direct reply or broadcast, goes through that one writer,
//! frames are never interleaved on the socket.

use crate::base::ConnectionId;
use crate::protocol::Response;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};

/// Frames a connection may have queued before broadcasts to it are dropped.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Write handle for one connection.
#[derive(Debug, Clone)]
pub struct Outbound {
    sender: Sender<Response>,
}

impl Outbound {
    /// Creates a handle and the receiver its writer task drains.
    pub fn channel() -> (Self, Receiver<Response>) {
        Self::with_capacity(OUTBOUND_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Receiver<Response>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Queues a direct reply, waiting for room. Returns `false` once the writer is gone.
    pub async fn send(&self, response: Response) -> bool {
        self.sender.send(response).await.is_ok()
    }

    /// Queues `response` only if there is room right now.
    pub fn try_send(&self, response: Response) -> Result<(), TrySendError<Response>> {
        self.sender.try_send(response)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Tracks live connections for broadcast.
#[derive(Debug)]
pub struct Registry {
    connections: DashMap<ConnectionId, Outbound>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Assigns a fresh connection ID and registers its write handle.
    pub fn register(&self, outbound: Outbound) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.connections.insert(id, outbound);
        id
    }

    /// Removes a connection. Returns `false` if it was already gone.
    pub fn deregister(&self, id: ConnectionId) -> bool {
        self.connections.remove(&id).is_some()
    }

    /// Sends `response` to every registered connection except `except`.
    ///
    /// Handles are copied out before sending, so connects and disconnects can
    /// proceed concurrently. Never waits: a connection whose queue is full
    /// misses this frame, and one whose writer has gone is dropped from the
    /// registry. Returns the number of connections the frame was queued for.
    pub fn broadcast(&self, response: &Response, except: Option<ConnectionId>) -> usize {
        let targets: Vec<(ConnectionId, Outbound)> = self
            .connections
            .iter()
            .filter(|entry| Some(*entry.key()) != except)
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        for (id, outbound) in targets {
            match outbound.try_send(response.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(connection = %id, "outbound queue full, broadcast dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(connection = %id, "dropping stale connection");
                    self.connections.remove(&id);
                }
            }
        }
        tracing::debug!(delivered, "broadcast sent");
        delivered
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let registry = Registry::new();
        let (a, _ra) = Outbound::channel();
        let (b, _rb) = Outbound::channel();
        let first = registry.register(a);
        let second = registry.register(b);
        assert_ne!(first, second);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn broadcast_skips_sender() {
        let registry = Registry::new();
        let (a, mut ra) = Outbound::channel();
        let (b, mut rb) = Outbound::channel();
        let sender = registry.register(a);
        registry.register(b);

        let delivered = registry.broadcast(&Response::ok("alice: hi"), Some(sender));

        assert_eq!(delivered, 1);
        assert_eq!(rb.try_recv().unwrap(), Response::ok("alice: hi"));
        assert!(ra.try_recv().is_err());
    }

    #[test]
    fn broadcast_without_exclusion_reaches_everyone() {
        let registry = Registry::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (outbound, rx) = Outbound::channel();
            registry.register(outbound);
            receivers.push(rx);
        }
        assert_eq!(registry.broadcast(&Response::ok("all"), None), 3);
        for rx in &mut receivers {
            assert_eq!(rx.try_recv().unwrap().message, "all");
        }
    }

    #[test]
    fn deregistered_connections_stop_receiving() {
        let registry = Registry::new();
        let (a, mut ra) = Outbound::channel();
        let id = registry.register(a);
        assert!(registry.deregister(id));
        assert!(!registry.deregister(id));

        assert_eq!(registry.broadcast(&Response::ok("late"), None), 0);
        assert!(ra.try_recv().is_err());
    }

    #[test]
    fn closed_receivers_are_pruned() {
        let registry = Registry::new();
        let (a, ra) = Outbound::channel();
        let (b, _rb) = Outbound::channel();
        registry.register(a);
        registry.register(b);
        drop(ra);

        assert_eq!(registry.broadcast(&Response::ok("x"), None), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn full_queue_misses_broadcast_but_stays_registered() {
        let registry = Registry::new();
        let (slow, mut slow_rx) = Outbound::with_capacity(1);
        let (fast, mut fast_rx) = Outbound::channel();
        registry.register(slow);
        registry.register(fast);

        assert_eq!(registry.broadcast(&Response::ok("first"), None), 2);
        assert_eq!(registry.broadcast(&Response::ok("second"), None), 1);

        assert_eq!(registry.len(), 2);
        assert_eq!(slow_rx.try_recv().unwrap().message, "first");
        assert!(slow_rx.try_recv().is_err());
        assert_eq!(fast_rx.try_recv().unwrap().message, "first");
        assert_eq!(fast_rx.try_recv().unwrap().message, "second");
    }
}
