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

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! These tests drive the real ledger from many threads while a background
//! thread polls `parking_lot::deadlock::check_deadlock`. The account mutexes
//! are parking_lot mutexes, so any cycle in the lock graph (for example two
//! opposite-direction transfers each holding one account) is reported.
//!
//! The `deadlock_detection` feature is enabled through the dev-dependency.

use bank_ledger_rs::{AccountId, Ledger};
use parking_lot::deadlock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

// === Deadlock Detection Infrastructure ===

struct Detector {
    running: Arc<AtomicBool>,
    deadlocked: Arc<AtomicBool>,
}

/// Starts a background thread that checks for deadlocks.
fn start_deadlock_detector() -> Detector {
    let running = Arc::new(AtomicBool::new(true));
    let deadlocked = Arc::new(AtomicBool::new(false));
    let detector = Detector {
        running: Arc::clone(&running),
        deadlocked: Arc::clone(&deadlocked),
    };

    thread::spawn(move || {
        while running.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(50));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                deadlocked.store(true, Ordering::SeqCst);
                return;
            }
        }
    });

    detector
}

/// Waits for every worker, failing the test as soon as a deadlock is reported.
fn join_watched(detector: Detector, handles: Vec<JoinHandle<()>>) {
    while !handles.iter().all(JoinHandle::is_finished) {
        assert!(
            !detector.deadlocked.load(Ordering::SeqCst),
            "Deadlock detected! See output above for details."
        );
        thread::sleep(Duration::from_millis(10));
    }
    detector.running.store(false, Ordering::SeqCst);
    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    assert!(!detector.deadlocked.load(Ordering::SeqCst));
}

fn funded_accounts(ledger: &Ledger, count: usize, amount: Decimal) -> Vec<AccountId> {
    (0..count)
        .map(|i| {
            let account = ledger.create_account(&format!("acct-{i}"), "pw");
            account.deposit(amount, "seed").unwrap();
            account.id()
        })
        .collect()
}

fn total_balance(ledger: &Ledger, ids: &[AccountId]) -> Decimal {
    ids.iter()
        .map(|id| ledger.get_account(*id).unwrap().balance())
        .sum()
}

// === Tests ===

/// A->B and B->A transfers issued concurrently and repeatedly.
#[test]
fn no_deadlock_opposite_direction_transfers() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(Ledger::new());
    let ids = funded_accounts(&ledger, 2, dec!(1000.00));
    let (a, b) = (ids[0], ids[1]);

    const NUM_THREADS: usize = 16;
    const OPS_PER_THREAD: usize = 500;

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                let (from, to) = if t % 2 == 0 { (a, b) } else { (b, a) };
                for _ in 0..OPS_PER_THREAD {
                    let _ = ledger.transfer(from, to, dec!(1.00), "ping-pong");
                }
            })
        })
        .collect();

    join_watched(detector, handles);

    assert_eq!(total_balance(&ledger, &ids), dec!(2000.00));
}

/// Transfers around a ring of accounts, the classic cyclic-wait setup.
#[test]
fn no_deadlock_ring_of_transfers() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(Ledger::new());

    const NUM_ACCOUNTS: usize = 6;
    const OPS_PER_THREAD: usize = 300;

    let ids = Arc::new(funded_accounts(&ledger, NUM_ACCOUNTS, dec!(500.00)));

    let handles: Vec<_> = (0..NUM_ACCOUNTS)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            let ids = Arc::clone(&ids);
            thread::spawn(move || {
                let from = ids[t];
                let to = ids[(t + 1) % NUM_ACCOUNTS];
                for _ in 0..OPS_PER_THREAD {
                    let _ = ledger.transfer(from, to, dec!(0.50), "ring");
                }
            })
        })
        .collect();

    join_watched(detector, handles);

    assert_eq!(total_balance(&ledger, &ids), dec!(3000.00));
}

/// Transfers mixed with direct deposits, withdrawals and snapshots.
#[test]
fn no_deadlock_mixed_operations() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(Ledger::new());

    const NUM_THREADS: usize = 12;
    const NUM_ACCOUNTS: usize = 4;
    const OPS_PER_THREAD: usize = 200;

    let ids = Arc::new(funded_accounts(&ledger, NUM_ACCOUNTS, dec!(100.00)));

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            let ids = Arc::clone(&ids);
            thread::spawn(move || {
                for i in 0..OPS_PER_THREAD {
                    let id = ids[(t + i) % NUM_ACCOUNTS];
                    let other = ids[(t + i + 1) % NUM_ACCOUNTS];
                    let account = ledger.get_account(id).unwrap();
                    match i % 4 {
                        0 => account.deposit(dec!(2.00), "top-up").unwrap(),
                        1 => {
                            let _ = account.withdraw(dec!(1.00), "spend");
                        }
                        2 => {
                            let _ = ledger.transfer(id, other, dec!(3.00), "move");
                        }
                        _ => {
                            let snapshot = account.snapshot();
                            assert!(snapshot.balance >= Decimal::ZERO);
                        }
                    }
                }
            })
        })
        .collect();

    join_watched(detector, handles);

    for id in ids.iter() {
        let snapshot = ledger.get_account(*id).unwrap().snapshot();
        let replayed: Decimal = snapshot
            .transactions
            .iter()
            .map(|tx| tx.signed_amount())
            .sum();
        assert_eq!(snapshot.balance, replayed);
    }
}

/// Account creation racing with lookups and transfers.
#[test]
fn no_deadlock_creation_during_transfers() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(Ledger::new());
    let ids = funded_accounts(&ledger, 2, dec!(100.00));
    let (a, b) = (ids[0], ids[1]);

    let mut handles = Vec::new();
    for t in 0..4 {
        let ledger = Arc::clone(&ledger);
        handles.push(thread::spawn(move || {
            for i in 0..200 {
                if t % 2 == 0 {
                    ledger.create_account(&format!("late-{t}-{i}"), "pw");
                } else {
                    let _ = ledger.transfer(a, b, dec!(0.10), "x");
                    let _ = ledger.transfer(b, a, dec!(0.10), "y");
                }
            }
        }));
    }

    join_watched(detector, handles);

    assert_eq!(ledger.len(), 2 + 2 * 200);
    assert_eq!(total_balance(&ledger, &[a, b]), dec!(200.00));
}
