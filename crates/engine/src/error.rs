//! The module contains the errors the engine can throw.
//!
//! The errors are:
//!
//! - [`Validation`] thrown when the caller sent malformed or missing input.
//! - [`NotFound`] thrown when a payment or a wallet does not exist.
//! - [`Conflict`] thrown when a payment is not in the expected state.
//! - [`InsufficientFunds`] thrown when a buyer cannot cover a payment.
//! - [`Transient`] thrown when the store timed out or a concurrent writer won;
//!   the whole operation can be retried from scratch.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`NotFound`]: EngineError::NotFound
//!  [`Conflict`]: EngineError::Conflict
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`Transient`]: EngineError::Transient
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Temporarily unavailable: {0}")]
    Transient(String),
    #[error(transparent)]
    Database(DbErr),
}

impl EngineError {
    /// Returns `true` if retrying the whole operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// SQLite reports writer contention with these messages (`SQLITE_BUSY` /
/// `SQLITE_LOCKED`).
const CONTENTION_MARKERS: [&str; 2] = ["database is locked", "database table is locked"];

impl From<DbErr> for EngineError {
    fn from(err: DbErr) -> Self {
        if let DbErr::ConnectionAcquire(acquire) = &err {
            return Self::Transient(format!("store connection unavailable: {acquire}"));
        }

        let message = err.to_string();
        let lowered = message.to_lowercase();
        if CONTENTION_MARKERS.iter().any(|m| lowered.contains(m)) {
            return Self::Transient(format!("store contention: {message}"));
        }

        Self::Database(err)
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::Transient(a), Self::Transient(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
