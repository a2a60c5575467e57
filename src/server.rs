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

//! TCP server.
//!
//! One tokio task runs the accept loop; every accepted connection gets a
//! reader task, which decodes a request, dispatches it and queues exactly one
//! reply before reading the next, and a writer task which owns the socket's
//! write half.
//!
//! A transport failure only ends the affected connection: it is deregistered
//! and its session dropped, other connections are untouched.

use crate::LedgerError;
use crate::base::ConnectionId;
use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::ledger::Ledger;
use crate::protocol::{FrameError, FrameReader, FrameWriter, Request, Response};
use crate::registry::{Outbound, Registry};
use crate::session::Session;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::Receiver;

/// Ledger service bound to a [`ServerConfig`].
pub struct Server {
    config: ServerConfig,
    dispatcher: Dispatcher,
    registry: Arc<Registry>,
}

impl Server {
    pub fn new(config: ServerConfig, ledger: Arc<Ledger>) -> Self {
        Self {
            config,
            dispatcher: Dispatcher::new(ledger),
            registry: Arc::new(Registry::new()),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        self.dispatcher.ledger()
    }

    /// Binds the configured address and serves until the listener fails.
    pub async fn run(self) -> io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener.
    ///
    /// Accept errors are logged and the loop continues.
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "ledger server listening");

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };
            tokio::spawn(handle_connection(
                stream,
                peer,
                self.dispatcher.clone(),
                Arc::clone(&self.registry),
                self.config.idle_timeout,
            ));
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Dispatcher,
    registry: Arc<Registry>,
    idle_timeout: Option<Duration>,
) {
    let (read_half, write_half) = stream.into_split();
    let (outbound, receiver) = Outbound::channel();
    let registration = Registration::new(Arc::clone(&registry), outbound.clone());
    let id = registration.id;
    tracing::info!(connection = %id, %peer, "client connected");

    let writer = tokio::spawn(write_frames(FrameWriter::new(write_half), receiver));
    let mut frames = FrameReader::new(BufReader::new(read_half));
    let mut session = Session::new();

    let reason = loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, frames.next_frame::<Request>()).await {
                Ok(next) => next,
                Err(_) => break "idle timeout",
            },
            None => frames.next_frame::<Request>().await,
        };

        let request = match next {
            Ok(Some(request)) => request,
            Ok(None) => break "closed by peer",
            Err(FrameError::Io(e)) => {
                tracing::warn!(connection = %id, error = %e, "{}", LedgerError::ConnectionLost);
                break "read failed";
            }
            Err(err @ FrameError::Malformed(_)) => {
                if !outbound.send(Response::error(&LedgerError::from(err))).await {
                    break "write failed";
                }
                continue;
            }
        };

        let outcome = dispatcher.dispatch(&mut session, &request);
        if let Some(message) = &outcome.broadcast {
            registry.broadcast(message, Some(id));
        }
        if !outbound.send(outcome.response).await {
            break "write failed";
        }
        if outcome.close {
            break "exit";
        }
    };

    drop(registration);
    drop(outbound);
    // The writer drains what is already queued, including a farewell.
    match writer.await {
        Ok(Err(e)) => tracing::debug!(connection = %id, error = %e, "writer stopped"),
        Err(e) => tracing::warn!(connection = %id, error = %e, "writer task panicked"),
        Ok(Ok(())) => {}
    }
    tracing::info!(connection = %id, reason, "client disconnected");
}

/// Keeps a connection in the registry until dropped, on every exit path
/// including a panicking dispatch.
struct Registration {
    registry: Arc<Registry>,
    id: ConnectionId,
}

impl Registration {
    fn new(registry: Arc<Registry>, outbound: Outbound) -> Self {
        let id = registry.register(outbound);
        Self { registry, id }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

async fn write_frames(
    mut writer: FrameWriter<OwnedWriteHalf>,
    mut receiver: Receiver<Response>,
) -> Result<(), FrameError> {
    while let Some(response) = receiver.recv().await {
        writer.send(&response).await?;
    }
    writer.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_deregisters_on_drop() {
        let registry = Arc::new(Registry::new());
        let (outbound, _receiver) = Outbound::channel();
        let registration = Registration::new(Arc::clone(&registry), outbound);
        assert_eq!(registry.len(), 1);

        drop(registration);
        assert!(registry.is_empty());
    }

    fn failing_dispatch() {
        panic!("dispatch blew up");
    }

    #[tokio::test]
    async fn panicking_worker_still_deregisters() {
        let registry = Arc::new(Registry::new());
        let (outbound, mut receiver) = Outbound::channel();

        let worker = tokio::spawn({
            let registry = Arc::clone(&registry);
            async move {
                let _registration = Registration::new(registry, outbound);
                failing_dispatch();
            }
        });

        assert!(worker.await.unwrap_err().is_panic());
        assert!(registry.is_empty());
        // Every sender is gone, so a writer draining this queue would finish.
        assert!(receiver.recv().await.is_none());
    }
}
