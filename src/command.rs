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

//! Command vocabulary and argument decoding.
//!
//! Decoding happens in two steps so the dispatcher can check authorization
//! between them: [`Action`] names the command, [`Command::parse`] turns the
//! raw string arguments into typed values.

use crate::LedgerError;
use crate::base::AccountId;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const HELP_TEXT: &str = "Available commands:\n\
    \x20 help                            - Show available commands\n\
    \x20 create [Name] [Password]        - Create an account\n\
    \x20 login [AccountID] [Password]    - Login to your account\n\
    \x20 logout                          - Logout from your account\n\
    \x20 deposit [Amount] [Note]         - Deposit money\n\
    \x20 withdraw [Amount] [Note]        - Withdraw money\n\
    \x20 transfer [toID] [Amount] [Note] - Transfer money\n\
    \x20 balance                         - Show account balance\n\
    \x20 transactions                    - Show transaction history\n\
    \x20 message [Text]                  - Send a message to all clients\n\
    \x20 exit                            - Exit the application";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Help,
    Create,
    Login,
    Logout,
    Deposit,
    Withdraw,
    Transfer,
    Balance,
    Transactions,
    Message,
    Exit,
}

impl Action {
    /// Whether the action needs an authenticated session.
    pub fn requires_auth(self) -> bool {
        matches!(
            self,
            Action::Logout
                | Action::Deposit
                | Action::Withdraw
                | Action::Transfer
                | Action::Balance
                | Action::Transactions
                | Action::Message
        )
    }

    /// Minimum argument count and the usage line shown when it is not met.
    fn usage(self) -> (usize, &'static str) {
        match self {
            Action::Help => (0, "Usage: help"),
            Action::Create => (2, "Usage: create [Name] [Password]"),
            Action::Login => (2, "Usage: login [AccountID] [Password]"),
            Action::Logout => (0, "Usage: logout"),
            Action::Deposit => (2, "Usage: deposit [Amount] [Note]"),
            Action::Withdraw => (2, "Usage: withdraw [Amount] [Note]"),
            Action::Transfer => (3, "Usage: transfer [toID] [Amount] [Note]"),
            Action::Balance => (0, "Usage: balance"),
            Action::Transactions => (0, "Usage: transactions"),
            Action::Message => (1, "Usage: message [Text]"),
            Action::Exit => (0, "Usage: exit"),
        }
    }
}

impl FromStr for Action {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "help" => Ok(Action::Help),
            "create" => Ok(Action::Create),
            "login" => Ok(Action::Login),
            "logout" => Ok(Action::Logout),
            "deposit" => Ok(Action::Deposit),
            "withdraw" => Ok(Action::Withdraw),
            "transfer" => Ok(Action::Transfer),
            "balance" => Ok(Action::Balance),
            "transactions" => Ok(Action::Transactions),
            "message" => Ok(Action::Message),
            "exit" => Ok(Action::Exit),
            _ => Err(LedgerError::UnknownCommand),
        }
    }
}

/// A fully decoded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Create { owner: String, credential: String },
    Login { id: AccountId, credential: String },
    Logout,
    Deposit { amount: Decimal, note: String },
    Withdraw { amount: Decimal, note: String },
    Transfer { to: AccountId, amount: Decimal, note: String },
    Balance,
    Transactions,
    Message { text: String },
    Exit,
}

impl Command {
    /// Decodes `args` for `action`.
    ///
    /// Only the format of numbers and IDs is checked here; amount sign is
    /// validated by the account itself.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidArgument`] - too few arguments, or a malformed
    ///   ID or amount.
    pub fn parse(action: Action, args: &[String]) -> Result<Self, LedgerError> {
        let (required, usage) = action.usage();
        if args.len() < required {
            return Err(LedgerError::InvalidArgument(usage.to_string()));
        }

        let command = match action {
            Action::Help => Command::Help,
            Action::Create => Command::Create {
                owner: args[0].clone(),
                credential: args[1].clone(),
            },
            Action::Login => Command::Login {
                id: parse_id(&args[0])?,
                credential: args[1].clone(),
            },
            Action::Logout => Command::Logout,
            Action::Deposit => Command::Deposit {
                amount: parse_amount(&args[0])?,
                note: args[1..].join(" "),
            },
            Action::Withdraw => Command::Withdraw {
                amount: parse_amount(&args[0])?,
                note: args[1..].join(" "),
            },
            Action::Transfer => Command::Transfer {
                to: parse_id(&args[0])?,
                amount: parse_amount(&args[1])?,
                note: args[2..].join(" "),
            },
            Action::Balance => Command::Balance,
            Action::Transactions => Command::Transactions,
            Action::Message => Command::Message {
                text: args.join(" "),
            },
            Action::Exit => Command::Exit,
        };
        Ok(command)
    }
}

fn parse_id(raw: &str) -> Result<AccountId, LedgerError> {
    raw.parse()
        .map_err(|_| LedgerError::InvalidArgument("invalid account ID".to_string()))
}

fn parse_amount(raw: &str) -> Result<Decimal, LedgerError> {
    Decimal::from_str(raw.trim())
        .map_err(|_| LedgerError::InvalidArgument("invalid amount".to_string()))
}
