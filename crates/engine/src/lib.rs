//! Payment approval and wallet settlement engine.
//!
//! Buyers submit payment requests that stay `Pending` until an administrator
//! approves or rejects them. Approval settles the payment atomically: the
//! buyer wallet is debited by the full amount, the receiver and the platform
//! (system) wallet are credited with their shares of the configured
//! [`SplitRatio`]. Money is never created or lost and a payment is processed
//! at most once.
//!
//! The engine works on an explicit sea-orm [`DatabaseConnection`] passed to
//! [`Engine::builder`].
//!
//! [`DatabaseConnection`]: sea_orm::DatabaseConnection

pub use error::EngineError;
pub use money::MoneyCents;
pub use notifications::{
    DatabaseNotifier, EventType, LogNotifier, Notification, Notifier, NotifyError,
};
pub use ops::{
    Approval, DateReport, Engine, EngineBuilder, MAX_NOTIFICATIONS, ParticipantPayments,
    RetryPolicy,
};
pub use payments::{CreatePaymentCmd, Payment, PaymentStatus};
pub use settlement::{BPS_SCALE, Split, SplitRatio};
pub use wallets::{SYSTEM_OWNER_ID, Wallet, WalletKind};

mod error;
mod money;
mod notifications;
mod ops;
mod payments;
mod settlement;
mod wallets;

type ResultEngine<T> = Result<T, EngineError>;
