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

//! Wire records and framing.
//!
//! Requests and responses are JSON objects, one per line. Both directions of a
//! connection use the same framing for its whole lifetime.
//!
//! ```json
//! {"action":"deposit","args":["100","paycheck"]}
//! {"success":true,"message":"Deposit successful","data":null}
//! ```

use crate::LedgerError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// A command sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(alias = "Action")]
    pub action: String,
    #[serde(default, alias = "Args")]
    pub args: Vec<String>,
}

impl Request {
    pub fn new<I, S>(action: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action: action.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a typed line on whitespace into an action and its arguments.
    ///
    /// Returns `None` for blank lines.
    pub fn from_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let action = parts.next()?;
        Some(Self::new(action, parts))
    }
}

/// A reply, or an unsolicited broadcast, sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(alias = "Success")]
    pub success: bool,
    #[serde(alias = "Message")]
    pub message: String,
    #[serde(default, alias = "Data")]
    pub data: Option<Value>,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    /// Failed response carrying the error's message and code.
    pub fn error(err: &LedgerError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            data: Some(serde_json::json!({ "code": err.code() })),
        }
    }

    /// Error code of a failed response, if present.
    pub fn code(&self) -> Option<&str> {
        self.data.as_ref()?.get("code")?.as_str()
    }
}

/// Framing errors.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Transport read or write failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A complete line arrived but was not a valid record
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<FrameError> for LedgerError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(_) => LedgerError::ConnectionLost,
            FrameError::Malformed(e) => LedgerError::InvalidArgument(format!("malformed request: {e}")),
        }
    }
}

/// Reads newline-delimited JSON records.
pub struct FrameReader<R> {
    reader: R,
    line: String,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }

    /// Reads the next record, skipping blank lines.
    ///
    /// Returns `Ok(None)` on a clean end of stream. A malformed line is
    /// consumed, so the caller may keep reading after [`FrameError::Malformed`].
    pub async fn next_frame<T: DeserializeOwned>(&mut self) -> Result<Option<T>, FrameError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line).await? == 0 {
                return Ok(None);
            }
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(Some(serde_json::from_str(trimmed)?));
        }
    }
}

/// Writes newline-delimited JSON records, one whole frame per call.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn send<T: Serialize>(&mut self, frame: &T) -> Result<(), FrameError> {
        let mut bytes = serde_json::to_vec(frame)?;
        bytes.push(b'\n');
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), FrameError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
