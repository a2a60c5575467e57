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

//! Ledger store.
//!
//! The [`Ledger`] owns the account table and the ID allocator. Accounts are
//! fully constructed before they are published to the table, and are never
//! removed, so a lookup either misses or returns a complete account.
//!
//! # Thread Safety
//!
//! Accounts live in a [`DashMap`] keyed by [`AccountId`]; creation takes a
//! shard write lock for the insert only, lookups take a shard read lock and
//! hand out an [`Arc`] so no table lock is held while an account is used.

use crate::account::Account;
use crate::base::AccountId;
use crate::{LedgerError, transfer};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared account table with monotonically allocated IDs.
///
/// # Invariants
///
/// - IDs start at 1 and are never reused.
/// - The ID -> account mapping is append-only.
pub struct Ledger {
    accounts: DashMap<AccountId, Arc<Account>>,
    next_id: AtomicU64,
}

impl Ledger {
    /// Creates an empty ledger whose first account will get ID 1.
    pub fn new() -> Self {
        Ledger {
            accounts: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a zero-balance account and returns it. Never fails.
    pub fn create_account(&self, owner: &str, credential: &str) -> Arc<Account> {
        let id = AccountId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let account = Arc::new(Account::new(id, owner, credential));
        self.accounts.insert(id, Arc::clone(&account));
        tracing::debug!(account = %id, owner, "account created");
        account
    }

    /// Retrieves an account by ID.
    ///
    /// Returns `None` if no account exists for the given ID.
    pub fn get_account(&self, id: AccountId) -> Option<Arc<Account>> {
        self.accounts.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Moves `amount` from one account to another atomically.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::SelfTransfer`] - `from == to`.
    /// - [`LedgerError::AccountNotFound`] - either ID is unknown.
    /// - [`LedgerError::InvalidAmount`] - `amount` is zero or negative.
    /// - [`LedgerError::InsufficientFunds`] - source balance is below `amount`.
    /// - [`LedgerError::BalanceOverflow`] - destination balance would overflow.
    ///
    /// On any error neither account is changed.
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        note: &str,
    ) -> Result<(), LedgerError> {
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }
        let source = self.get_account(from).ok_or(LedgerError::AccountNotFound)?;
        let destination = self.get_account(to).ok_or(LedgerError::AccountNotFound)?;
        transfer::transfer(&source, &destination, amount, note)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Returns all accounts ordered by ID.
    pub fn accounts(&self) -> Vec<Arc<Account>> {
        let mut accounts: Vec<_> = self
            .accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        accounts.sort_by_key(|account| account.id());
        accounts
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
