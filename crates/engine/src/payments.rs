//! Payment requests and their store.
//!
//! A `Payment` is a proposed transfer from a buyer to a receiver that waits
//! for an administrator. Its status only ever moves out of `Pending`, once.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, entity::prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, wallets::SYSTEM_OWNER_ID};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    /// `Approved` and `Rejected` never change again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(EngineError::Validation(format!(
                "invalid payment status: {other}"
            ))),
        }
    }
}

/// Input of `Engine::create_payment`.
#[derive(Clone, Debug)]
pub struct CreatePaymentCmd {
    /// Reference to the traded item's code.
    pub code_id: String,
    pub buyer_id: String,
    pub receiver_id: String,
    pub item_id: String,
    pub amount_minor: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub code_id: String,
    pub buyer_id: String,
    pub receiver_id: String,
    pub item_id: String,
    pub amount_minor: i64,
    pub status: PaymentStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn required(value: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(
            "all fields are required".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

impl Payment {
    /// Validates a request and builds a new `Pending` payment.
    pub fn new(cmd: CreatePaymentCmd) -> ResultEngine<Self> {
        let code_id = required(&cmd.code_id)?;
        let buyer_id = required(&cmd.buyer_id)?;
        let receiver_id = required(&cmd.receiver_id)?;
        let item_id = required(&cmd.item_id)?;

        if buyer_id == receiver_id {
            return Err(EngineError::Validation(
                "buyer and receiver cannot be the same".to_string(),
            ));
        }
        if buyer_id == SYSTEM_OWNER_ID || receiver_id == SYSTEM_OWNER_ID {
            return Err(EngineError::Validation(format!(
                "{SYSTEM_OWNER_ID} is reserved for the platform wallet"
            )));
        }
        if cmd.amount_minor <= 0 {
            return Err(EngineError::Validation(
                "amount_minor must be > 0".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            code_id,
            buyer_id,
            receiver_id,
            item_id,
            amount_minor: cmd.amount_minor,
            status: PaymentStatus::Pending,
            version: 0,
            created_at: cmd.created_at,
            updated_at: cmd.created_at,
        })
    }

    pub fn ensure_pending(&self) -> ResultEngine<()> {
        if self.status.is_terminal() {
            return Err(EngineError::Conflict(format!(
                "payment already processed ({})",
                self.status.as_str()
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub code_id: String,
    pub buyer_id: String,
    pub receiver_id: String,
    pub item_id: String,
    pub amount_minor: i64,
    pub status: String,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Payment {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::Validation("invalid payment id".to_string()))?,
            status: PaymentStatus::try_from(model.status.as_str())?,
            code_id: model.code_id,
            buyer_id: model.buyer_id,
            receiver_id: model.receiver_id,
            item_id: model.item_id,
            amount_minor: model.amount_minor,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl From<&Payment> for ActiveModel {
    fn from(value: &Payment) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            code_id: ActiveValue::Set(value.code_id.clone()),
            buyer_id: ActiveValue::Set(value.buyer_id.clone()),
            receiver_id: ActiveValue::Set(value.receiver_id.clone()),
            item_id: ActiveValue::Set(value.item_id.clone()),
            amount_minor: ActiveValue::Set(value.amount_minor),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            version: ActiveValue::Set(value.version),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

/// Filters for listing payments. `created_from`/`created_to` are both
/// inclusive.
#[derive(Clone, Debug, Default)]
pub(crate) struct PaymentFilter {
    pub buyer_id: Option<String>,
    pub receiver_id: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

pub(crate) struct PaymentStore<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> PaymentStore<'a, C> {
    pub(crate) fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub(crate) async fn insert(&self, payment: &Payment) -> ResultEngine<()> {
        Entity::insert(ActiveModel::from(payment))
            .exec_without_returning(self.conn)
            .await?;
        Ok(())
    }

    pub(crate) async fn find(&self, id: Uuid) -> ResultEngine<Option<Payment>> {
        Entity::find_by_id(id.to_string())
            .one(self.conn)
            .await?
            .map(Payment::try_from)
            .transpose()
    }

    /// Moves a pending payment to `to`.
    ///
    /// The update only applies if the row is still pending at the version
    /// `payment` was loaded with; otherwise the attempt is reported as
    /// transient so the caller re-reads and re-validates.
    pub(crate) async fn transition(
        &self,
        payment: &Payment,
        to: PaymentStatus,
        at: DateTime<Utc>,
    ) -> ResultEngine<Payment> {
        payment.ensure_pending()?;

        let next_version = payment.version + 1;
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(to.as_str()))
            .col_expr(Column::Version, Expr::value(next_version))
            .col_expr(Column::UpdatedAt, Expr::value(at))
            .filter(Column::Id.eq(payment.id.to_string()))
            .filter(Column::Status.eq(PaymentStatus::Pending.as_str()))
            .filter(Column::Version.eq(payment.version))
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(EngineError::Transient(format!(
                "payment {} was modified concurrently",
                payment.id
            )));
        }

        Ok(Payment {
            status: to,
            version: next_version,
            updated_at: at,
            ..payment.clone()
        })
    }

    /// Removes the record, returning what was deleted.
    pub(crate) async fn delete(&self, id: Uuid) -> ResultEngine<Option<Payment>> {
        let Some(payment) = self.find(id).await? else {
            return Ok(None);
        };
        let result = Entity::delete_by_id(id.to_string()).exec(self.conn).await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        Ok(Some(payment))
    }

    /// Newest first, ties broken by id.
    pub(crate) async fn list(&self, filter: &PaymentFilter) -> ResultEngine<Vec<Payment>> {
        let mut query = Entity::find();
        if let Some(buyer_id) = &filter.buyer_id {
            query = query.filter(Column::BuyerId.eq(buyer_id.as_str()));
        }
        if let Some(receiver_id) = &filter.receiver_id {
            query = query.filter(Column::ReceiverId.eq(receiver_id.as_str()));
        }
        if let Some(from) = filter.created_from {
            query = query.filter(Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.created_to {
            query = query.filter(Column::CreatedAt.lte(to));
        }

        query
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .all(self.conn)
            .await?
            .into_iter()
            .map(Payment::try_from)
            .collect()
    }
}
