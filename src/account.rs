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

//! Account management.
//!
//! An [`Account`] owns one balance and its transaction history behind a single
//! mutex, so every deposit or withdrawal is applied as one critical section:
//! the funds check, the balance update and the history append cannot interleave
//! with any other operation on the same account.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use bank_ledger_rs::{Account, AccountId};
//!
//! let account = Account::new(AccountId(1), "alice", "secret");
//! account.deposit(dec!(100.00), "paycheck").unwrap();
//! assert_eq!(account.balance(), dec!(100.00));
//! ```

use crate::LedgerError;
use crate::base::AccountId;
use crate::transaction::{Transaction, TransactionKind};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};

/// Mutable state of an account, only reachable through the account's lock.
#[derive(Debug)]
pub(crate) struct AccountData {
    balance: Decimal,
    transactions: Vec<Transaction>,
}

impl AccountData {
    fn new() -> Self {
        Self {
            balance: Decimal::ZERO,
            transactions: Vec::new(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            self.balance
        );
    }

    /// Increases the balance and records a deposit.
    ///
    /// Fails with [`LedgerError::BalanceOverflow`] rather than panicking when
    /// the sum is not representable. This and [`AccountData::withdraw`] are the only places amounts are validated.
    pub(crate) fn deposit(&mut self, amount: Decimal, note: &str) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        self.transactions
            .push(Transaction::new(TransactionKind::Deposit, amount, note));
        self.assert_invariants();
        Ok(())
    }

    /// Decreases the balance and records a withdrawal.
    pub(crate) fn withdraw(&mut self, amount: Decimal, note: &str) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        self.balance -= amount;
        self.transactions
            .push(Transaction::new(TransactionKind::Withdraw, amount, note));
        self.assert_invariants();
        Ok(())
    }

    /// Undoes the most recent withdrawal of `amount`.
    ///
    /// Only valid while the lock that applied the withdrawal is still held, so
    /// no other caller has observed the intermediate state.
    pub(crate) fn revert_withdraw(&mut self, amount: Decimal) {
        let last = self.transactions.pop();
        debug_assert!(
            matches!(&last, Some(tx) if tx.kind == TransactionKind::Withdraw && tx.amount == amount),
            "revert_withdraw called without a matching withdrawal"
        );
        self.balance += amount;
        self.assert_invariants();
    }

    pub(crate) fn balance(&self) -> Decimal {
        self.balance
    }
}

/// Point-in-time copy of an account, taken under its lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub owner: String,
    pub balance: Decimal,
    pub transactions: Vec<Transaction>,
}

/// Ledger account.
///
/// Identity, owner and credential are fixed at creation; balance and history
/// live behind the mutex.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    owner: String,
    credential: String,
    inner: Mutex<AccountData>,
}

impl Account {
    pub fn new(id: AccountId, owner: &str, credential: &str) -> Self {
        Self {
            id,
            owner: owner.to_string(),
            credential: credential.to_string(),
            inner: Mutex::new(AccountData::new()),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Compares the supplied secret with the stored credential.
    pub fn verify_credential(&self, credential: &str) -> bool {
        self.credential == credential
    }

    pub fn balance(&self) -> Decimal {
        self.inner.lock().balance
    }

    /// Deposits `amount` into the account.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - `amount` is zero or negative.
    /// - [`LedgerError::BalanceOverflow`] - the new balance is not representable.
    pub fn deposit(&self, amount: Decimal, note: &str) -> Result<(), LedgerError> {
        self.inner.lock().deposit(amount, note)
    }

    /// Withdraws `amount` from the account.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - `amount` is zero or negative.
    /// - [`LedgerError::InsufficientFunds`] - `amount` exceeds the balance.
    pub fn withdraw(&self, amount: Decimal, note: &str) -> Result<(), LedgerError> {
        self.inner.lock().withdraw(amount, note)
    }

    /// Copies the balance and full history in one critical section.
    pub fn snapshot(&self) -> AccountSnapshot {
        let data = self.inner.lock();
        AccountSnapshot {
            id: self.id,
            owner: self.owner.clone(),
            balance: data.balance,
            transactions: data.transactions.clone(),
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.inner.lock().transactions.len()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, AccountData> {
        self.inner.lock()
    }
}

// Public summary with the exact balance; the credential is never serialized.
impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.inner.lock();
        let mut state = serializer.serialize_struct("Account", 3)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("owner", &self.owner)?;
        state.serialize_field("balance", &data.balance)?;
        state.end()
    }
}
