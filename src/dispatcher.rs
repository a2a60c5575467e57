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

//! Command dispatch.
//!
//! The [`Dispatcher`] maps one [`Request`] plus the caller's [`Session`] to an
//! [`Outcome`]: the direct reply, an optional broadcast, and whether the
//! connection should close. It never touches the network; the caller delivers
//! the outcome.
//!
//! # Errors
//!
//! All ledger, session and argument errors are turned into a failed
//! [`Response`] here, so a bad command never ends the connection.

use crate::command::{Action, Command, HELP_TEXT};
use crate::ledger::Ledger;
use crate::protocol::{Request, Response};
use crate::session::Session;
use crate::LedgerError;
use serde_json::json;
use std::fmt::Write as _;
use std::sync::Arc;

/// Result of dispatching one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Reply to the sender. Every request gets exactly one.
    pub response: Response,
    /// Message to fan out to the other live connections.
    pub broadcast: Option<Response>,
    /// Close the connection after sending `response`.
    pub close: bool,
}

impl Outcome {
    fn reply(response: Response) -> Self {
        Self {
            response,
            broadcast: None,
            close: false,
        }
    }
}

/// Routes commands to the ledger and session.
#[derive(Clone)]
pub struct Dispatcher {
    ledger: Arc<Ledger>,
}

impl Dispatcher {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Executes `request` on behalf of `session`.
    pub fn dispatch(&self, session: &mut Session, request: &Request) -> Outcome {
        match self.execute(session, request) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!(action = %request.action, error = %err, "command failed");
                Outcome::reply(Response::error(&err))
            }
        }
    }

    fn execute(&self, session: &mut Session, request: &Request) -> Result<Outcome, LedgerError> {
        let action: Action = request.action.parse()?;
        if action.requires_auth() && !session.is_authenticated() {
            return Err(LedgerError::NotAuthenticated);
        }

        let outcome = match Command::parse(action, &request.args)? {
            Command::Help => Outcome::reply(Response::ok(HELP_TEXT)),
            Command::Create { owner, credential } => {
                let account = self.ledger.create_account(&owner, &credential);
                Outcome::reply(Response::with_data(
                    format!("Account created with ID {}", account.id()),
                    json!(account.id()),
                ))
            }
            Command::Login { id, credential } => {
                let account = session.login(&self.ledger, id, &credential)?;
                Outcome::reply(Response::with_data(
                    format!("Logged in as {}", account.owner()),
                    to_value(&*account)?,
                ))
            }
            Command::Logout => {
                session.logout()?;
                Outcome::reply(Response::ok("Logged out successfully"))
            }
            Command::Deposit { amount, note } => {
                session.account()?.deposit(amount, &note)?;
                Outcome::reply(Response::ok("Deposit successful"))
            }
            Command::Withdraw { amount, note } => {
                session.account()?.withdraw(amount, &note)?;
                Outcome::reply(Response::ok("Withdrawal successful"))
            }
            Command::Transfer { to, amount, note } => {
                let from = session.account()?.id();
                self.ledger.transfer(from, to, amount, &note)?;
                Outcome::reply(Response::ok("Transfer successful"))
            }
            Command::Balance => {
                let balance = session.account()?.balance();
                Outcome::reply(Response::with_data(
                    format!("Your balance is {balance:.2}"),
                    to_value(&balance)?,
                ))
            }
            Command::Transactions => {
                let snapshot = session.account()?.snapshot();
                let mut message = format!("Transactions for {}:\n", snapshot.owner);
                for tx in &snapshot.transactions {
                    let _ = writeln!(message, " - {tx}");
                }
                let _ = write!(message, "Balance: {:.2}", snapshot.balance);
                Outcome::reply(Response::with_data(message, to_value(&snapshot.transactions)?))
            }
            Command::Message { text } => {
                let owner = session.account()?.owner().to_string();
                Outcome {
                    response: Response::ok("Message sent"),
                    broadcast: Some(Response::ok(format!("{owner}: {text}"))),
                    close: false,
                }
            }
            Command::Exit => Outcome {
                response: Response::ok("Goodbye!"),
                broadcast: None,
                close: true,
            },
        };
        Ok(outcome)
    }
}

fn to_value<T: serde::Serialize + ?Sized>(value: &T) -> Result<serde_json::Value, LedgerError> {
    serde_json::to_value(value)
        .map_err(|e| LedgerError::InvalidArgument(format!("unencodable response data: {e}")))
}
