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

//! Transfer coordination between two accounts.
//!
//! Both account locks are taken in ascending [`AccountId`](crate::AccountId)
//! order and held across both legs, so concurrent A->B and B->A transfers
//! cannot wait on each other in a cycle. If the deposit leg fails after the
//! withdraw leg was applied, the withdrawal is reverted before the locks are
//! released; no caller can observe a half-applied transfer.

use crate::LedgerError;
use crate::account::{Account, AccountData};
use parking_lot::MutexGuard;
use rust_decimal::Decimal;

/// Moves `amount` from `source` to `destination` as one unit.
///
/// Appends exactly one withdraw record to `source` and one deposit record to
/// `destination` on success; changes nothing on failure.
pub(crate) fn transfer(
    source: &Account,
    destination: &Account,
    amount: Decimal,
    note: &str,
) -> Result<(), LedgerError> {
    if source.id() == destination.id() {
        return Err(LedgerError::SelfTransfer);
    }

    let (mut from, mut to) = lock_pair(source, destination);

    from.withdraw(amount, note)?;
    if let Err(err) = to.deposit(amount, note) {
        from.revert_withdraw(amount);
        return Err(err);
    }

    tracing::debug!(
        from = %source.id(),
        to = %destination.id(),
        %amount,
        from_balance = %from.balance(),
        "transfer applied"
    );
    Ok(())
}

/// Locks both accounts in global ID order, returning (source, destination) guards.
fn lock_pair<'a>(
    source: &'a Account,
    destination: &'a Account,
) -> (MutexGuard<'a, AccountData>, MutexGuard<'a, AccountData>) {
    if source.id() < destination.id() {
        let from = source.lock();
        let to = destination.lock();
        (from, to)
    } else {
        let to = destination.lock();
        let from = source.lock();
        (from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AccountId;
    use crate::transaction::TransactionKind;
    use rust_decimal_macros::dec;

    fn funded(id: u64, amount: Decimal) -> Account {
        let account = Account::new(AccountId(id), "owner", "pw");
        if amount > Decimal::ZERO {
            account.deposit(amount, "seed").unwrap();
        }
        account
    }

    #[test]
    fn moves_funds_and_records_both_legs() {
        let a = funded(1, dec!(100));
        let b = funded(2, Decimal::ZERO);

        transfer(&a, &b, dec!(40), "rent").unwrap();

        let a = a.snapshot();
        let b = b.snapshot();
        assert_eq!(a.balance, dec!(60));
        assert_eq!(b.balance, dec!(40));
        assert_eq!(a.transactions.last().unwrap().kind, TransactionKind::Withdraw);
        assert_eq!(b.transactions.len(), 1);
        assert_eq!(b.transactions[0].kind, TransactionKind::Deposit);
        assert_eq!(b.transactions[0].note, "rent");
    }

    #[test]
    fn works_when_source_has_higher_id() {
        let high = funded(9, dec!(10));
        let low = funded(3, dec!(0));
        transfer(&high, &low, dec!(10), "down").unwrap();
        assert_eq!(high.balance(), Decimal::ZERO);
        assert_eq!(low.balance(), dec!(10));
    }

    #[test]
    fn insufficient_funds_changes_nothing() {
        let a = funded(1, dec!(5));
        let b = funded(2, dec!(7));

        let result = transfer(&a, &b, dec!(6), "too much");

        assert_eq!(result, Err(LedgerError::InsufficientFunds));
        assert_eq!(a.balance(), dec!(5));
        assert_eq!(b.balance(), dec!(7));
        assert_eq!(a.transaction_count(), 1);
        assert_eq!(b.transaction_count(), 1);
    }

    #[test]
    fn invalid_amount_changes_nothing() {
        let a = funded(1, dec!(5));
        let b = funded(2, dec!(0));
        assert_eq!(transfer(&a, &b, dec!(0), "zero"), Err(LedgerError::InvalidAmount));
        assert_eq!(transfer(&a, &b, dec!(-3), "neg"), Err(LedgerError::InvalidAmount));
        assert_eq!(a.balance(), dec!(5));
        assert_eq!(b.transaction_count(), 0);
    }

    #[test]
    fn same_account_is_rejected_without_locking() {
        let a = funded(1, dec!(5));
        assert_eq!(transfer(&a, &a, dec!(1), "self"), Err(LedgerError::SelfTransfer));
        assert_eq!(a.balance(), dec!(5));
    }

    #[test]
    fn failed_deposit_leg_reverts_withdrawal() {
        let a = funded(1, dec!(50));
        let b = funded(2, Decimal::MAX);

        let result = transfer(&a, &b, dec!(10), "overflow");

        assert_eq!(result, Err(LedgerError::BalanceOverflow));
        assert_eq!(a.balance(), dec!(50));
        assert_eq!(b.balance(), Decimal::MAX);
        assert_eq!(a.transaction_count(), 1);
        assert_eq!(b.transaction_count(), 1);

        let replayed: Decimal = a.snapshot().transactions.iter().map(|tx| tx.signed_amount()).sum();
        assert_eq!(replayed, a.balance());
    }

    #[test]
    fn failed_deposit_leg_reverts_when_destination_locks_first() {
        let high = funded(8, dec!(50));
        let low = funded(3, Decimal::MAX);

        assert_eq!(
            transfer(&high, &low, dec!(1), "overflow"),
            Err(LedgerError::BalanceOverflow)
        );
        assert_eq!(high.balance(), dec!(50));
        assert_eq!(high.transaction_count(), 1);
        assert_eq!(low.transaction_count(), 1);
    }
}
