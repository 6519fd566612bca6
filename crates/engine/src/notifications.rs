//! Administrator notifications.
//!
//! The engine reports every committed state change to a [`Notifier`]. Delivery
//! is fire-and-forget: a failing notifier is logged and never fails the
//! operation that triggered it.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, QueryOrder, QuerySelect, entity::prelude::*};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PaymentCreated,
    PaymentApproved,
    PaymentRejected,
    PaymentDeleted,
    WalletFunded,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PaymentCreated => "payment_created",
            Self::PaymentApproved => "payment_approved",
            Self::PaymentRejected => "payment_rejected",
            Self::PaymentDeleted => "payment_deleted",
            Self::WalletFunded => "wallet_funded",
        }
    }
}

impl TryFrom<&str> for EventType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "payment_created" => Ok(Self::PaymentCreated),
            "payment_approved" => Ok(Self::PaymentApproved),
            "payment_rejected" => Ok(Self::PaymentRejected),
            "payment_deleted" => Ok(Self::PaymentDeleted),
            "wallet_funded" => Ok(Self::WalletFunded),
            other => Err(EngineError::Validation(format!(
                "invalid event type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub event_type: EventType,
    pub message: String,
    /// Id of the payment (or wallet owner) the event is about.
    pub reference_id: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        event_type: EventType,
        message: String,
        reference_id: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            message,
            reference_id,
            created_at,
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Sink for administrator notifications.
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Stores notifications in the `notifications` table so the admin UI can
/// list them.
#[derive(Clone, Debug)]
pub struct DatabaseNotifier {
    database: DatabaseConnection,
}

impl DatabaseNotifier {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl Notifier for DatabaseNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        Entity::insert(ActiveModel::from(notification))
            .exec_without_returning(&self.database)
            .await?;
        Ok(())
    }
}

/// Only writes notifications to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            event = notification.event_type.as_str(),
            reference_id = %notification.reference_id,
            "{}",
            notification.message
        );
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub event_type: String,
    pub message: String,
    pub reference_id: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Notification> for ActiveModel {
    fn from(value: &Notification) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            event_type: ActiveValue::Set(value.event_type.as_str().to_string()),
            message: ActiveValue::Set(value.message.clone()),
            reference_id: ActiveValue::Set(value.reference_id.clone()),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Notification {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::Validation("invalid notification id".to_string()))?,
            event_type: EventType::try_from(model.event_type.as_str())?,
            message: model.message,
            reference_id: model.reference_id,
            created_at: model.created_at,
        })
    }
}

/// Newest notifications first.
pub(crate) async fn latest<C: ConnectionTrait>(
    conn: &C,
    limit: u64,
) -> ResultEngine<Vec<Notification>> {
    Entity::find()
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id)
        .limit(limit)
        .all(conn)
        .await?
        .into_iter()
        .map(Notification::try_from)
        .collect()
}
