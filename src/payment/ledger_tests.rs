//! Tests for `Ledger`.

use super::{Balance, ChargeSpec, Ledger, PaymentError, Transaction, TransactionStatus};
use crate::store::{MemoryStore, RowKind, Store};
use crate::time::Clock;
use crate::time::mock::MockClock;
use std::sync::Arc;
use std::time::Duration;

type TestLedger = Ledger<MemoryStore, Arc<MockClock>>;

fn setup() -> (Arc<MemoryStore>, Arc<MockClock>, TestLedger) {
    let store = Arc::new(MemoryStore::new());
    let clock = MockClock::shared();
    let ledger = Ledger::new(Arc::clone(&store), Arc::clone(&clock));
    (store, clock, ledger)
}

fn usd(amount: i64) -> ChargeSpec {
    ChargeSpec::new(amount, "USD", "cus_42")
}

/// Inserts a transaction that never settled.
async fn insert_pending(store: &MemoryStore, ledger: &TestLedger) -> Transaction {
    let mut draft = ledger.draft(&usd(700));
    draft.status = TransactionStatus::Pending;
    store.create(draft).await.unwrap()
}

mod create {
    use super::*;

    #[tokio::test]
    async fn new_transaction_has_succeeded() {
        let (_store, clock, ledger) = setup();

        let txn = ledger.create(&usd(1000)).await.unwrap();

        assert!(txn.id.starts_with("txn_"));
        assert_eq!(txn.status, TransactionStatus::Succeeded);
        assert!(!txn.refunded);
        assert_eq!(txn.created_at, clock.now());
        assert_eq!(ledger.get(&txn.id).await.unwrap(), txn);
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let (_store, _clock, ledger) = setup();

        let a = ledger.create(&usd(1)).await.unwrap();
        let b = ledger.create(&usd(1)).await.unwrap();

        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn invalid_spec_writes_nothing() {
        let (store, _clock, ledger) = setup();

        let result = ledger.create(&usd(0)).await;

        assert!(matches!(result, Err(PaymentError::Validation { .. })));
        assert_eq!(store.count(RowKind::Transaction).unwrap(), 0);
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let (_store, _clock, ledger) = setup();

        let result = ledger.get("txn_missing").await;

        assert!(matches!(result, Err(PaymentError::NotFound { ref id }) if id == "txn_missing"));
    }
}

mod refund {
    use super::*;

    #[tokio::test]
    async fn refund_marks_transaction() {
        let (_store, clock, ledger) = setup();
        let txn = ledger.create(&usd(1000)).await.unwrap();
        clock.advance(Duration::from_secs(5));

        let refunded = ledger.refund(&txn.id).await.unwrap();

        assert_eq!(refunded.status, TransactionStatus::Refunded);
        assert!(refunded.refunded);
        assert_eq!(refunded.updated_at, clock.now());
        assert_eq!(refunded.created_at, txn.created_at);
    }

    #[tokio::test]
    async fn second_refund_is_rejected_without_change() {
        let (_store, clock, ledger) = setup();
        let txn = ledger.create(&usd(1000)).await.unwrap();
        let first = ledger.refund(&txn.id).await.unwrap();
        clock.advance(Duration::from_secs(5));

        let result = ledger.refund(&txn.id).await;

        assert!(matches!(result, Err(PaymentError::AlreadyRefunded { .. })));
        assert_eq!(ledger.get(&txn.id).await.unwrap(), first);
    }

    #[tokio::test]
    async fn unknown_transaction_is_not_found() {
        let (_store, _clock, ledger) = setup();

        let result = ledger.refund("txn_nope").await;

        assert!(matches!(result, Err(PaymentError::NotFound { .. })));
    }

    #[tokio::test]
    async fn pending_transaction_is_invalid_state() {
        let (store, _clock, ledger) = setup();
        let pending = insert_pending(&store, &ledger).await;

        let result = ledger.refund(&pending.id).await;

        assert!(matches!(
            result,
            Err(PaymentError::InvalidState {
                status: TransactionStatus::Pending,
                ..
            })
        ));
        assert_eq!(ledger.get(&pending.id).await.unwrap(), pending);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refunds_succeed_once() {
        let (_store, _clock, ledger) = setup();
        let txn = ledger.create(&usd(1000)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let ledger = ledger.clone();
            let id = txn.id.clone();
            handles.push(tokio::spawn(async move { ledger.refund(&id).await }));
        }

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(PaymentError::AlreadyRefunded { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(ledger.get(&txn.id).await.unwrap().version, 2);
    }
}

mod balance {
    use super::*;

    #[tokio::test]
    async fn empty_ledger_is_zero() {
        let (_store, _clock, ledger) = setup();

        assert_eq!(ledger.compute_balance().await.unwrap(), Balance::default());
    }

    #[tokio::test]
    async fn refunds_are_subtracted() {
        let (_store, _clock, ledger) = setup();
        ledger.create(&usd(1000)).await.unwrap();
        let refunded = ledger.create(&usd(500)).await.unwrap();
        ledger.refund(&refunded.id).await.unwrap();

        let balance = ledger.compute_balance().await.unwrap();

        assert_eq!(
            balance,
            Balance {
                successful_count: 1,
                refunded_count: 1,
                balance: 500,
            }
        );
    }

    #[tokio::test]
    async fn pending_transactions_are_ignored() {
        let (store, _clock, ledger) = setup();
        ledger.create(&usd(300)).await.unwrap();
        insert_pending(&store, &ledger).await;

        let balance = ledger.compute_balance().await.unwrap();

        assert_eq!(balance.successful_count, 1);
        assert_eq!(balance.balance, 300);
    }

    #[tokio::test]
    async fn overflowing_total_is_an_error() {
        let (_store, _clock, ledger) = setup();
        ledger.create(&usd(i64::MAX)).await.unwrap();
        ledger.create(&usd(1)).await.unwrap();

        let result = ledger.compute_balance().await;

        assert!(matches!(result, Err(PaymentError::BalanceOverflow)));
    }

    #[tokio::test]
    async fn large_refund_does_not_underflow() {
        let (_store, _clock, ledger) = setup();
        let big = ledger.create(&usd(i64::MAX)).await.unwrap();
        ledger.create(&usd(i64::MAX)).await.unwrap();
        ledger.refund(&big.id).await.unwrap();

        let balance = ledger.compute_balance().await.unwrap();

        assert_eq!(balance.balance, 0);
        assert_eq!(balance.refunded_count, 1);
    }
}
