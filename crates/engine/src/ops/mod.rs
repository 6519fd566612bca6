use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, TransactionTrait,
};

use crate::{
    EngineError, ResultEngine, SplitRatio,
    notifications::{DatabaseNotifier, EventType, Notification, Notifier},
};

mod notifications;
mod payments;
mod queries;
mod wallets;

pub use notifications::MAX_NOTIFICATIONS;
pub use payments::Approval;
pub use queries::{DateReport, ParticipantPayments};

/// Future returned by a unit of work run inside a store transaction.
pub(crate) type TxFuture<'c, T> = Pin<Box<dyn Future<Output = ResultEngine<T>> + Send + 'c>>;

/// How often a unit of work is re-run after a transient failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Never below 1.
    pub max_attempts: u32,
    /// Wait before attempt `n + 1` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

/// The settlement engine.
///
/// Holds the store handle explicitly; there is no global connection. Every
/// mutation runs in its own store transaction so a partial settlement is
/// never visible.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
    split: SplitRatio,
    retry: RetryPolicy,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Closes the underlying store handle.
    pub async fn close(self) -> ResultEngine<()> {
        self.database.close().await?;
        Ok(())
    }

    /// Runs `body` in a fresh transaction, committing on success and rolling
    /// back on error.
    ///
    /// Transient failures (store contention, stale versions) roll the attempt
    /// back and run `body` again from scratch, up to `max_attempts` times, so
    /// every precondition is re-read inside the transaction that commits.
    pub(crate) async fn with_retry<T, F>(&self, op: &'static str, mut body: F) -> ResultEngine<T>
    where
        T: Send,
        F: for<'c> FnMut(&'c DatabaseTransaction) -> TxFuture<'c, T> + Send,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(&mut body).await {
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    tracing::warn!(op, attempt, "retrying after transient failure: {err}");
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) if err.is_transient() => {
                    tracing::warn!(op, attempt, "giving up after transient failure: {err}");
                    return Err(err);
                }
                other => return other,
            }
        }
    }

    async fn attempt<T, F>(&self, body: &mut F) -> ResultEngine<T>
    where
        F: for<'c> FnMut(&'c DatabaseTransaction) -> TxFuture<'c, T>,
    {
        let db_tx = self.database.begin().await?;
        let outcome = match lock_for_write(&db_tx).await {
            Ok(()) => body(&db_tx).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(value) => {
                db_tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = db_tx.rollback().await {
                    tracing::error!("rollback failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }

    /// Hands a notification to the notifier; failures are only logged.
    async fn emit(
        &self,
        event_type: EventType,
        message: String,
        reference_id: String,
        at: DateTime<Utc>,
    ) {
        let notification = Notification::new(event_type, message, reference_id, at);
        if let Err(err) = self.notifier.notify(&notification).await {
            tracing::warn!(
                event = event_type.as_str(),
                reference_id = %notification.reference_id,
                "failed to deliver notification: {err}"
            );
        }
    }
}

/// SQLite opens `BEGIN` transactions as readers, and a reader that later
/// tries to write while another writer is active fails at once with
/// `SQLITE_BUSY`. Writing first takes the write lock while the transaction
/// holds no snapshot yet, so a concurrent writer waits on the busy timeout
/// and then reads the committed state.
async fn lock_for_write(db_tx: &DatabaseTransaction) -> ResultEngine<()> {
    if db_tx.get_database_backend() == DbBackend::Sqlite {
        db_tx
            .execute_unprepared("UPDATE wallets SET version = version WHERE 0")
            .await?;
    }
    Ok(())
}

fn require_id(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!("{label} is required")));
    }
    Ok(trimmed.to_string())
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    notifier: Option<Arc<dyn Notifier>>,
    split: SplitRatio,
    retry: RetryPolicy,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Where notifications go. Defaults to a [`DatabaseNotifier`] on the
    /// engine's own database.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> EngineBuilder {
        self.notifier = Some(notifier);
        self
    }

    pub fn split_ratio(mut self, split: SplitRatio) -> EngineBuilder {
        self.split = split;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> EngineBuilder {
        self.retry = retry;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        if matches!(self.database, DatabaseConnection::Disconnected) {
            return Err(EngineError::Validation(
                "engine requires a database connection".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(EngineError::Validation(
                "max_attempts must be >= 1".to_string(),
            ));
        }

        let notifier: Arc<dyn Notifier> = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(DatabaseNotifier::new(self.database.clone())),
        };

        Ok(Engine {
            database: self.database,
            notifier,
            split: self.split,
            retry: self.retry,
        })
    }
}
