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

//! # Bank Ledger
//!
//! This library provides a concurrent account ledger and the session-based
//! command protocol used to serve it to many remote clients at once.
//!
//! ## Core Components
//!
//! - [`Ledger`]: Account table with monotonically allocated IDs and atomic transfers
//! - [`Account`]: One balance plus its append-only transaction history
//! - [`Session`]: Per-connection login state
//! - [`Dispatcher`]: Maps a [`Request`] to a [`Response`] against the ledger
//! - [`Registry`]: Live connections and broadcast fan-out
//! - [`Server`]: TCP accept loop and per-connection workers
//!
//! ## Example
//!
//! ```
//! use bank_ledger_rs::Ledger;
//! use rust_decimal_macros::dec;
//!
//! let ledger = Ledger::new();
//! let alice = ledger.create_account("alice", "p1");
//! let bob = ledger.create_account("bob", "p2");
//!
//! alice.deposit(dec!(100.00), "paycheck").unwrap();
//! ledger.transfer(alice.id(), bob.id(), dec!(50.00), "rent").unwrap();
//!
//! assert_eq!(alice.balance(), dec!(50.00));
//! assert_eq!(bob.balance(), dec!(50.00));
//! ```
//!
//! ## Thread Safety
//!
//! Each account serializes its own mutations behind a mutex. Transfers lock
//! both accounts in ascending ID order and hold both locks across both legs,
//! so they are atomic and cannot deadlock against transfers in the opposite
//! direction.

pub mod account;
mod base;
pub mod client;
pub mod command;
pub mod config;
mod dispatcher;
pub mod error;
mod ledger;
pub mod protocol;
mod registry;
mod server;
mod session;
mod transaction;
mod transfer;

pub use account::{Account, AccountSnapshot};
pub use base::{AccountId, ConnectionId};
pub use client::Client;
pub use config::ServerConfig;
pub use dispatcher::{Dispatcher, Outcome};
pub use error::LedgerError;
pub use ledger::Ledger;
pub use protocol::{Request, Response};
pub use registry::{Outbound, Registry};
pub use server::Server;
pub use session::{Session, SessionState};
pub use transaction::{Transaction, TransactionKind};
