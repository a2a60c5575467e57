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

//! Remote client for the ledger server.
//!
//! Responses arrive in request order, but broadcasts from other connections
//! may be interleaved with them at any point.

use crate::protocol::{FrameError, FrameReader, FrameWriter, Request, Response};
use std::io;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

pub type RequestWriter = FrameWriter<OwnedWriteHalf>;
pub type ResponseReader = FrameReader<BufReader<OwnedReadHalf>>;

pub struct Client {
    writer: RequestWriter,
    reader: ResponseReader,
}

impl Client {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            writer: FrameWriter::new(write_half),
            reader: FrameReader::new(BufReader::new(read_half)),
        })
    }

    pub async fn send(&mut self, request: &Request) -> Result<(), FrameError> {
        self.writer.send(request).await
    }

    /// Next response or broadcast; `None` once the server closed the stream.
    pub async fn recv(&mut self) -> Result<Option<Response>, FrameError> {
        self.reader.next_frame().await
    }

    /// Sends a request and returns the next frame received.
    pub async fn call<I, S>(&mut self, action: &str, args: I) -> Result<Response, FrameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.send(&Request::new(action, args)).await?;
        self.recv()
            .await?
            .ok_or_else(|| FrameError::Io(io::ErrorKind::UnexpectedEof.into()))
    }

    /// Splits into halves so requests and responses can be handled by separate tasks.
    pub fn into_split(self) -> (RequestWriter, ResponseReader) {
        (self.writer, self.reader)
    }
}
