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

//! Error types for ledger, session and dispatch failures.

use thiserror::Error;

/// Ledger and command processing errors.
///
/// Every variant except [`LedgerError::ConnectionLost`] is recovered at the
/// command boundary and reported to the client as a failed response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Wrong number or format of command arguments. Carries the usage hint.
    #[error("{0}")]
    InvalidArgument(String),

    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Withdrawal would exceed the balance
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Deposit would push the balance past the largest representable amount
    #[error("balance limit exceeded")]
    BalanceOverflow,

    /// Referenced account ID does not exist
    #[error("account not found")]
    AccountNotFound,

    /// Credential does not match the account
    #[error("invalid credential")]
    InvalidCredential,

    /// Command requires a logged-in session
    #[error("please login first")]
    NotAuthenticated,

    /// Action is not part of the command vocabulary
    #[error("unknown command")]
    UnknownCommand,

    /// Source and destination of a transfer are the same account
    #[error("cannot transfer to the same account")]
    SelfTransfer,

    /// Transport failed; terminates the connection worker
    #[error("connection lost")]
    ConnectionLost,
}

impl LedgerError {
    /// Stable machine-readable code sent alongside failed responses.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidArgument(_) => "INVALID_ARGUMENT",
            LedgerError::InvalidAmount => "INVALID_AMOUNT",
            LedgerError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            LedgerError::BalanceOverflow => "BALANCE_OVERFLOW",
            LedgerError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            LedgerError::InvalidCredential => "INVALID_CREDENTIAL",
            LedgerError::NotAuthenticated => "NOT_AUTHENTICATED",
            LedgerError::UnknownCommand => "UNKNOWN_COMMAND",
            LedgerError::SelfTransfer => "SELF_TRANSFER",
            LedgerError::ConnectionLost => "CONNECTION_LOST",
        }
    }
}
