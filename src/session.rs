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

//! Per-connection authentication state.
//!
//! ```text
//!  Anonymous ──login(id, credential)──► Authenticated(account)
//!      ▲                                      │
//!      └──────────────logout──────────────────┘
//! ```
//!
//! A failed login leaves the state unchanged. Connection teardown simply drops
//! the session.

use crate::account::Account;
use crate::base::AccountId;
use crate::ledger::Ledger;
use crate::LedgerError;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(Arc<Account>),
}

/// Authentication context of one connection. Never shared between connections.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    /// Authenticates against `ledger`, replacing any current login on success.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] - no account with `id`.
    /// - [`LedgerError::InvalidCredential`] - credential does not match.
    pub fn login(
        &mut self,
        ledger: &Ledger,
        id: AccountId,
        credential: &str,
    ) -> Result<Arc<Account>, LedgerError> {
        let account = ledger.get_account(id).ok_or(LedgerError::AccountNotFound)?;
        if !account.verify_credential(credential) {
            return Err(LedgerError::InvalidCredential);
        }
        self.state = SessionState::Authenticated(Arc::clone(&account));
        Ok(account)
    }

    /// Returns to `Anonymous`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotAuthenticated`] - the session was not logged in.
    pub fn logout(&mut self) -> Result<(), LedgerError> {
        match std::mem::take(&mut self.state) {
            SessionState::Authenticated(_) => Ok(()),
            SessionState::Anonymous => Err(LedgerError::NotAuthenticated),
        }
    }

    /// The logged-in account, or [`LedgerError::NotAuthenticated`].
    pub fn account(&self) -> Result<&Arc<Account>, LedgerError> {
        match &self.state {
            SessionState::Authenticated(account) => Ok(account),
            SessionState::Anonymous => Err(LedgerError::NotAuthenticated),
        }
    }
}
