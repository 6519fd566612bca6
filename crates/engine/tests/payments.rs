use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use engine::{
    CreatePaymentCmd, Engine, EngineError, EventType, LogNotifier, Notification, Notifier,
    NotifyError, PaymentStatus, SYSTEM_OWNER_ID, SplitRatio, WalletKind,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn migrated_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = migrated_db().await;
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn cmd(buyer: &str, receiver: &str, amount_minor: i64, created_at: DateTime<Utc>) -> CreatePaymentCmd {
    CreatePaymentCmd {
        code_id: "code-1".to_string(),
        buyer_id: buyer.to_string(),
        receiver_id: receiver.to_string(),
        item_id: "item-1".to_string(),
        amount_minor,
        created_at,
    }
}

/// A migrated SQLite file behind a pool of several connections, so
/// transactions really run side by side. Removed on drop.
struct FileDb {
    path: PathBuf,
}

impl FileDb {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("settlement-{}.db", Uuid::new_v4()));
        Self { path }
    }

    async fn engine(&self) -> Engine {
        let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", self.path.display()));
        options.max_connections(8).sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        Engine::builder().database(db).build().await.unwrap()
    }
}

impl Drop for FileDb {
    fn drop(&mut self) {
        for suffix in ["", "-journal", "-wal", "-shm"] {
            let mut path = self.path.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

async fn pending_payment(engine: &Engine, buyer: &str, receiver: &str, amount_minor: i64) -> Uuid {
    engine
        .create_payment(cmd(buyer, receiver, amount_minor, at(1, 10, 0)))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn approve_debits_buyer_and_splits_between_receiver_and_system() {
    let (engine, _db) = engine_with_db().await;
    engine.fund_wallet("alice", 100, at(1, 9, 0)).await.unwrap();
    let id = pending_payment(&engine, "alice", "bob", 50).await;

    let approval = engine.approve_payment(id, at(1, 11, 0)).await.unwrap();

    assert_eq!(approval.payment.status, PaymentStatus::Approved);
    assert_eq!(approval.buyer_wallet.balance_minor, 50);
    assert_eq!(approval.receiver_wallet.owner_id, "bob");
    assert_eq!(approval.receiver_wallet.balance_minor, 45);
    assert_eq!(approval.system_wallet.owner_id, SYSTEM_OWNER_ID);
    assert_eq!(approval.system_wallet.kind, WalletKind::System);
    assert_eq!(approval.system_wallet.balance_minor, 5);
    assert_eq!(approval.split.receiver_minor, 45);
    assert_eq!(approval.split.system_minor, 5);

    assert_eq!(engine.wallet("alice").await.unwrap().balance_minor, 50);
    assert_eq!(engine.wallet("bob").await.unwrap().balance_minor, 45);
    assert_eq!(engine.system_wallet().await.unwrap().balance_minor, 5);
    assert_eq!(
        engine.payment(id).await.unwrap().status,
        PaymentStatus::Approved
    );
}

#[tokio::test]
async fn approve_conserves_money_for_amounts_that_do_not_split_evenly() {
    let (engine, _db) = engine_with_db().await;
    engine.fund_wallet("alice", 10_000, at(1, 9, 0)).await.unwrap();

    let mut spent = 0;
    for amount in [1, 7, 99, 1_001] {
        let id = pending_payment(&engine, "alice", "bob", amount).await;
        let approval = engine.approve_payment(id, at(1, 11, 0)).await.unwrap();
        assert_eq!(
            approval.split.receiver_minor + approval.split.system_minor,
            amount
        );
        spent += amount;
    }

    let buyer = engine.wallet("alice").await.unwrap().balance_minor;
    let receiver = engine.wallet("bob").await.unwrap().balance_minor;
    let system = engine.system_wallet().await.unwrap().balance_minor;
    assert_eq!(buyer, 10_000 - spent);
    assert_eq!(receiver + system, spent);
    assert_eq!(buyer + receiver + system, 10_000);
}

#[tokio::test]
async fn configured_split_ratio_is_applied() {
    let db = migrated_db().await;
    let engine = Engine::builder()
        .database(db)
        .split_ratio(SplitRatio::new(8_000).unwrap())
        .build()
        .await
        .unwrap();
    engine.fund_wallet("alice", 1_000, at(1, 9, 0)).await.unwrap();
    let id = pending_payment(&engine, "alice", "bob", 1_000).await;

    let approval = engine.approve_payment(id, at(1, 11, 0)).await.unwrap();

    assert_eq!(approval.receiver_wallet.balance_minor, 800);
    assert_eq!(approval.system_wallet.balance_minor, 200);
}

#[tokio::test]
async fn insufficient_funds_leaves_everything_unchanged() {
    let (engine, _db) = engine_with_db().await;
    engine.fund_wallet("alice", 10, at(1, 9, 0)).await.unwrap();
    let id = pending_payment(&engine, "alice", "bob", 50).await;

    let err = engine.approve_payment(id, at(1, 11, 0)).await.unwrap_err();

    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert_eq!(engine.wallet("alice").await.unwrap().balance_minor, 10);
    assert!(matches!(
        engine.wallet("bob").await.unwrap_err(),
        EngineError::NotFound(_)
    ));
    assert!(matches!(
        engine.system_wallet().await.unwrap_err(),
        EngineError::NotFound(_)
    ));
    assert_eq!(
        engine.payment(id).await.unwrap().status,
        PaymentStatus::Pending
    );
}

#[tokio::test]
async fn approve_without_buyer_wallet_is_not_found() {
    let (engine, _db) = engine_with_db().await;
    let id = pending_payment(&engine, "alice", "bob", 50).await;

    let err = engine.approve_payment(id, at(1, 11, 0)).await.unwrap_err();

    assert_eq!(err, EngineError::NotFound("buyer wallet not found".to_string()));
    assert_eq!(
        engine.payment(id).await.unwrap().status,
        PaymentStatus::Pending
    );
}

#[tokio::test]
async fn unknown_payment_is_not_found() {
    let (engine, _db) = engine_with_db().await;
    let id = Uuid::new_v4();

    for err in [
        engine.approve_payment(id, at(1, 11, 0)).await.unwrap_err(),
        engine.reject_payment(id, at(1, 11, 0)).await.unwrap_err(),
        engine.delete_payment(id, at(1, 11, 0)).await.unwrap_err(),
        engine.payment(id).await.unwrap_err(),
    ] {
        assert!(matches!(err, EngineError::NotFound(_)), "{err:?}");
    }
}

#[tokio::test]
async fn create_payment_validates_input() {
    let (engine, _db) = engine_with_db().await;

    let same = engine
        .create_payment(cmd("alice", "alice", 50, at(1, 10, 0)))
        .await
        .unwrap_err();
    assert!(matches!(same, EngineError::Validation(_)));

    let zero = engine
        .create_payment(cmd("alice", "bob", 0, at(1, 10, 0)))
        .await
        .unwrap_err();
    assert!(matches!(zero, EngineError::Validation(_)));

    let blank = engine
        .create_payment(cmd("   ", "bob", 50, at(1, 10, 0)))
        .await
        .unwrap_err();
    assert!(matches!(blank, EngineError::Validation(_)));

    assert!(matches!(
        engine.list_payments().await.unwrap_err(),
        EngineError::NotFound(_)
    ));
}

#[tokio::test]
async fn create_payment_trims_identifiers() {
    let (engine, _db) = engine_with_db().await;

    let payment = engine
        .create_payment(cmd(" alice ", "bob\n", 50, at(1, 10, 0)))
        .await
        .unwrap();

    assert_eq!(payment.buyer_id, "alice");
    assert_eq!(payment.receiver_id, "bob");
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(engine.payment(payment.id).await.unwrap(), payment);
}

#[tokio::test]
async fn second_approve_conflicts_without_moving_money() {
    let (engine, _db) = engine_with_db().await;
    engine.fund_wallet("alice", 100, at(1, 9, 0)).await.unwrap();
    let id = pending_payment(&engine, "alice", "bob", 50).await;

    engine.approve_payment(id, at(1, 11, 0)).await.unwrap();
    let err = engine.approve_payment(id, at(1, 12, 0)).await.unwrap_err();

    assert!(matches!(err, EngineError::Conflict(_)));
    assert_eq!(engine.wallet("alice").await.unwrap().balance_minor, 50);
    assert_eq!(engine.wallet("bob").await.unwrap().balance_minor, 45);
    assert_eq!(engine.system_wallet().await.unwrap().balance_minor, 5);
}

#[tokio::test]
async fn terminal_states_reject_every_transition() {
    let (engine, _db) = engine_with_db().await;
    engine.fund_wallet("alice", 100, at(1, 9, 0)).await.unwrap();
    let id = pending_payment(&engine, "alice", "bob", 50).await;

    let rejected = engine.reject_payment(id, at(1, 11, 0)).await.unwrap();
    assert_eq!(rejected.status, PaymentStatus::Rejected);

    assert!(matches!(
        engine.reject_payment(id, at(1, 12, 0)).await.unwrap_err(),
        EngineError::Conflict(_)
    ));
    assert!(matches!(
        engine.approve_payment(id, at(1, 12, 0)).await.unwrap_err(),
        EngineError::Conflict(_)
    ));

    assert_eq!(engine.wallet("alice").await.unwrap().balance_minor, 100);
    assert!(engine.wallet("bob").await.is_err());
    assert_eq!(
        engine.payment(id).await.unwrap().status,
        PaymentStatus::Rejected
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_settle_exactly_once() {
    let file = FileDb::new();
    let engine = Arc::new(file.engine().await);
    engine.fund_wallet("alice", 1_000, at(1, 9, 0)).await.unwrap();
    let id = pending_payment(&engine, "alice", "bob", 50).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.approve_payment(id, at(1, 11, 0)).await })
        })
        .collect();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(EngineError::Conflict(_))))
        .count();
    assert_eq!((successes, conflicts), (1, 7), "{outcomes:?}");

    assert_eq!(engine.wallet("alice").await.unwrap().balance_minor, 950);
    assert_eq!(engine.wallet("bob").await.unwrap().balance_minor, 45);
    assert_eq!(engine.system_wallet().await.unwrap().balance_minor, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_approvals_queue_on_the_system_wallet() {
    let file = FileDb::new();
    let engine = Arc::new(file.engine().await);
    let mut ids = Vec::new();
    for n in 0..16 {
        let buyer = format!("buyer-{n}");
        engine.fund_wallet(&buyer, 100, at(1, 9, 0)).await.unwrap();
        ids.push(pending_payment(&engine, &buyer, &format!("seller-{n}"), 100).await);
    }

    let handles: Vec<_> = ids
        .into_iter()
        .map(|id| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.approve_payment(id, at(1, 11, 0)).await })
        })
        .collect();
    for handle in handles {
        let approval = handle.await.unwrap();
        assert!(approval.is_ok(), "{approval:?}");
    }

    assert_eq!(engine.system_wallet().await.unwrap().balance_minor, 160);
    for n in 0..16 {
        let buyer = engine.wallet(&format!("buyer-{n}")).await.unwrap();
        let seller = engine.wallet(&format!("seller-{n}")).await.unwrap();
        assert_eq!((buyer.balance_minor, seller.balance_minor), (0, 90));
    }
}

#[tokio::test]
async fn delete_keeps_settled_balances() {
    let (engine, _db) = engine_with_db().await;
    engine.fund_wallet("alice", 100, at(1, 9, 0)).await.unwrap();
    let id = pending_payment(&engine, "alice", "bob", 50).await;
    engine.approve_payment(id, at(1, 11, 0)).await.unwrap();

    let deleted = engine.delete_payment(id, at(1, 12, 0)).await.unwrap();

    assert_eq!(deleted.id, id);
    assert_eq!(deleted.status, PaymentStatus::Approved);
    assert!(matches!(
        engine.payment(id).await.unwrap_err(),
        EngineError::NotFound(_)
    ));
    assert_eq!(engine.wallet("alice").await.unwrap().balance_minor, 50);
    assert_eq!(engine.wallet("bob").await.unwrap().balance_minor, 45);
    assert_eq!(engine.system_wallet().await.unwrap().balance_minor, 5);
}

#[tokio::test]
async fn date_report_covers_whole_days_and_is_repeatable() {
    let (engine, _db) = engine_with_db().await;
    engine
        .create_payment(cmd("alice", "bob", 50, at(1, 0, 0)))
        .await
        .unwrap();
    engine
        .create_payment(cmd("carol", "bob", 30, at(1, 23, 59)))
        .await
        .unwrap();
    engine
        .create_payment(cmd("alice", "carol", 70, at(2, 0, 0)))
        .await
        .unwrap();

    let first = engine.payments_by_date_range(day(1), day(1)).await.unwrap();
    let second = engine.payments_by_date_range(day(1), day(1)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.payments.len(), 2);
    assert_eq!(first.total_amount_minor, 80);
    assert_eq!(
        first.total_amount_minor,
        first.payments.iter().map(|p| p.amount_minor).sum::<i64>()
    );
    // newest first
    assert_eq!(first.payments[0].buyer_id, "carol");

    let range = engine.payments_by_date_range(day(1), day(2)).await.unwrap();
    assert_eq!(range.total_amount_minor, 150);

    assert!(matches!(
        engine.payments_by_date_range(day(3), day(3)).await.unwrap_err(),
        EngineError::NotFound(_)
    ));
    assert!(matches!(
        engine.payments_by_date_range(day(2), day(1)).await.unwrap_err(),
        EngineError::Validation(_)
    ));
}

#[tokio::test]
async fn participant_queries_split_by_side() {
    let (engine, _db) = engine_with_db().await;
    engine
        .create_payment(cmd("alice", "bob", 50, at(1, 10, 0)))
        .await
        .unwrap();
    engine
        .create_payment(cmd("bob", "carol", 20, at(1, 11, 0)))
        .await
        .unwrap();
    engine
        .create_payment(cmd("carol", "bob", 10, at(1, 12, 0)))
        .await
        .unwrap();

    let as_buyer = engine.payments_by_buyer("bob").await.unwrap();
    assert_eq!(as_buyer.len(), 1);
    assert_eq!(as_buyer[0].receiver_id, "carol");

    let as_receiver = engine.payments_by_receiver("bob").await.unwrap();
    assert_eq!(
        as_receiver.iter().map(|p| p.amount_minor).collect::<Vec<_>>(),
        vec![10, 50]
    );

    let both = engine.payments_by_participant("bob").await.unwrap();
    assert_eq!(both.as_buyer, as_buyer);
    assert_eq!(both.as_receiver, as_receiver);

    let only_buyer = engine.payments_by_participant("alice").await.unwrap();
    assert_eq!(only_buyer.as_buyer.len(), 1);
    assert!(only_buyer.as_receiver.is_empty());

    assert!(matches!(
        engine.payments_by_buyer("dave").await.unwrap_err(),
        EngineError::NotFound(_)
    ));
    assert!(matches!(
        engine.payments_by_receiver("alice").await.unwrap_err(),
        EngineError::NotFound(_)
    ));
    assert!(matches!(
        engine.payments_by_participant("dave").await.unwrap_err(),
        EngineError::NotFound(_)
    ));
    assert!(matches!(
        engine.payments_by_participant("  ").await.unwrap_err(),
        EngineError::Validation(_)
    ));

    assert_eq!(engine.list_payments().await.unwrap().len(), 3);
}

#[tokio::test]
async fn fund_wallet_validates_and_accumulates() {
    let (engine, _db) = engine_with_db().await;

    assert!(matches!(
        engine.fund_wallet("alice", 0, at(1, 9, 0)).await.unwrap_err(),
        EngineError::Validation(_)
    ));
    assert!(matches!(
        engine
            .fund_wallet(SYSTEM_OWNER_ID, 10, at(1, 9, 0))
            .await
            .unwrap_err(),
        EngineError::Validation(_)
    ));
    assert!(matches!(
        engine.wallet("alice").await.unwrap_err(),
        EngineError::NotFound(_)
    ));

    engine.fund_wallet("alice", 10, at(1, 9, 0)).await.unwrap();
    let wallet = engine.fund_wallet("alice", 15, at(1, 9, 30)).await.unwrap();

    assert_eq!(wallet.balance_minor, 25);
    assert_eq!(wallet.kind, WalletKind::User);
    assert_eq!(wallet.updated_at, at(1, 9, 30));
}

#[tokio::test]
async fn state_changes_are_recorded_as_notifications() {
    let (engine, _db) = engine_with_db().await;
    engine.fund_wallet("alice", 100, at(1, 9, 0)).await.unwrap();
    let approved = pending_payment(&engine, "alice", "bob", 50).await;
    engine.approve_payment(approved, at(1, 11, 0)).await.unwrap();
    let rejected = pending_payment(&engine, "alice", "bob", 20).await;
    engine.reject_payment(rejected, at(1, 12, 0)).await.unwrap();
    engine.delete_payment(rejected, at(1, 13, 0)).await.unwrap();

    let notifications = engine.list_notifications(50).await.unwrap();
    let kinds: Vec<EventType> = notifications.iter().map(|n| n.event_type).collect();

    assert_eq!(
        kinds,
        vec![
            EventType::PaymentDeleted,
            EventType::PaymentRejected,
            EventType::PaymentApproved,
            EventType::PaymentCreated,
            EventType::PaymentCreated,
            EventType::WalletFunded,
        ]
    );
    assert_eq!(notifications[2].reference_id, approved.to_string());
    assert_eq!(engine.list_notifications(2).await.unwrap().len(), 2);
    assert!(matches!(
        engine.list_notifications(0).await.unwrap_err(),
        EngineError::Validation(_)
    ));
}

#[derive(Debug, Default)]
struct FailingNotifier {
    calls: AtomicUsize,
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Delivery("sink offline".to_string()))
    }
}

#[tokio::test]
async fn notifier_failures_do_not_fail_operations() {
    let db = migrated_db().await;
    let notifier = Arc::new(FailingNotifier::default());
    let engine = Engine::builder()
        .database(db)
        .notifier(notifier.clone())
        .build()
        .await
        .unwrap();

    engine.fund_wallet("alice", 100, at(1, 9, 0)).await.unwrap();
    let id = pending_payment(&engine, "alice", "bob", 50).await;
    let approval = engine.approve_payment(id, at(1, 11, 0)).await.unwrap();

    assert_eq!(approval.buyer_wallet.balance_minor, 50);
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 3);
    assert!(engine.list_notifications(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn log_notifier_keeps_the_inbox_empty() {
    let db = migrated_db().await;
    let engine = Engine::builder()
        .database(db)
        .notifier(Arc::new(LogNotifier))
        .build()
        .await
        .unwrap();

    pending_payment(&engine, "alice", "bob", 50).await;

    assert!(engine.list_notifications(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn builder_requires_a_database() {
    let err = Engine::builder().build().await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}
