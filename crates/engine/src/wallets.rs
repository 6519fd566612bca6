//! The module contains `Wallet`, its storage model and the wallet store.
//!
//! A wallet is identified by `(owner_id, kind)`. User wallets are created
//! lazily on their first credit; the single platform wallet is the `system`
//! wallet owned by [`SYSTEM_OWNER_ID`].

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter,
    entity::prelude::*,
    sea_query::{Expr, OnConflict},
};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Owner id of the platform wallet.
pub const SYSTEM_OWNER_ID: &str = "SYSTEM";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    User,
    System,
}

impl WalletKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
        }
    }
}

impl TryFrom<&str> for WalletKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Self::User),
            "system" => Ok(Self::System),
            other => Err(EngineError::Validation(format!(
                "invalid wallet kind: {other}"
            ))),
        }
    }
}

/// A balance record owned by a user or by the platform.
///
/// `balance_minor` is never negative. `version` is bumped by every persisted
/// mutation and is what concurrent writers are checked against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub owner_id: String,
    pub kind: WalletKind,
    pub balance_minor: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(owner_id: String, kind: WalletKind, created_at: DateTime<Utc>) -> Self {
        Self {
            owner_id,
            kind,
            balance_minor: 0,
            version: 0,
            created_at,
            updated_at: created_at,
        }
    }

    /// Adds `amount_minor` to the balance.
    ///
    /// # Panics
    ///
    /// Panics if `amount_minor` is negative: callers must never pass one.
    pub fn credit(&mut self, amount_minor: i64, at: DateTime<Utc>) -> ResultEngine<()> {
        assert!(amount_minor >= 0, "credit amount must be non-negative");
        self.balance_minor = self.balance_minor.checked_add(amount_minor).ok_or_else(|| {
            EngineError::Validation(format!("balance overflow for wallet {}", self.owner_id))
        })?;
        self.updated_at = at;
        Ok(())
    }

    /// Removes `amount_minor` from the balance, refusing to go below zero.
    ///
    /// # Panics
    ///
    /// Panics if `amount_minor` is negative: callers must never pass one.
    pub fn debit(&mut self, amount_minor: i64, at: DateTime<Utc>) -> ResultEngine<()> {
        assert!(amount_minor >= 0, "debit amount must be non-negative");
        if self.balance_minor < amount_minor {
            return Err(EngineError::InsufficientFunds(format!(
                "wallet {} holds {}, needs {}",
                self.owner_id,
                crate::MoneyCents::new(self.balance_minor),
                crate::MoneyCents::new(amount_minor),
            )));
        }
        self.balance_minor -= amount_minor;
        self.updated_at = at;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub owner_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub kind: String,
    pub balance_minor: i64,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Wallet {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: WalletKind::try_from(model.kind.as_str())?,
            owner_id: model.owner_id,
            balance_minor: model.balance_minor,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl From<&Wallet> for ActiveModel {
    fn from(value: &Wallet) -> Self {
        Self {
            owner_id: ActiveValue::Set(value.owner_id.clone()),
            kind: ActiveValue::Set(value.kind.as_str().to_string()),
            balance_minor: ActiveValue::Set(value.balance_minor),
            version: ActiveValue::Set(value.version),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

/// Wallet reads and version-checked writes over a connection or an open
/// transaction.
pub(crate) struct WalletStore<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> WalletStore<'a, C> {
    pub(crate) fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub(crate) async fn get(&self, owner_id: &str, kind: WalletKind) -> ResultEngine<Option<Wallet>> {
        Entity::find_by_id((owner_id.to_string(), kind.as_str().to_string()))
            .one(self.conn)
            .await?
            .map(Wallet::try_from)
            .transpose()
    }

    /// Returns the wallet, inserting an empty one first if it does not exist.
    pub(crate) async fn get_or_create(
        &self,
        owner_id: &str,
        kind: WalletKind,
        at: DateTime<Utc>,
    ) -> ResultEngine<Wallet> {
        if let Some(wallet) = self.get(owner_id, kind).await? {
            return Ok(wallet);
        }

        let wallet = Wallet::new(owner_id.to_string(), kind, at);
        Entity::insert(ActiveModel::from(&wallet))
            .on_conflict(
                OnConflict::columns([Column::OwnerId, Column::Kind])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await?;

        self.get(owner_id, kind).await?.ok_or_else(|| {
            EngineError::Transient(format!("{} wallet {owner_id} not visible after insert", kind.as_str()))
        })
    }

    /// Credits a wallet, creating it with a zero balance if absent.
    pub(crate) async fn credit(
        &self,
        owner_id: &str,
        kind: WalletKind,
        amount_minor: i64,
        at: DateTime<Utc>,
    ) -> ResultEngine<Wallet> {
        let mut wallet = self.get_or_create(owner_id, kind, at).await?;
        wallet.credit(amount_minor, at)?;
        self.persist(&wallet).await
    }

    /// Debits an existing wallet; fails with `InsufficientFunds` instead of
    /// going negative.
    pub(crate) async fn debit(
        &self,
        owner_id: &str,
        kind: WalletKind,
        amount_minor: i64,
        at: DateTime<Utc>,
    ) -> ResultEngine<Wallet> {
        let mut wallet = self.get(owner_id, kind).await?.ok_or_else(|| {
            EngineError::NotFound(format!("{} wallet {owner_id} not found", kind.as_str()))
        })?;
        wallet.debit(amount_minor, at)?;
        self.persist(&wallet).await
    }

    /// Writes `wallet` back if nobody else changed it since it was loaded.
    ///
    /// Returns the stored wallet with its new version.
    pub(crate) async fn persist(&self, wallet: &Wallet) -> ResultEngine<Wallet> {
        let next_version = wallet.version + 1;
        let result = Entity::update_many()
            .col_expr(Column::BalanceMinor, Expr::value(wallet.balance_minor))
            .col_expr(Column::Version, Expr::value(next_version))
            .col_expr(Column::UpdatedAt, Expr::value(wallet.updated_at))
            .filter(Column::OwnerId.eq(wallet.owner_id.as_str()))
            .filter(Column::Kind.eq(wallet.kind.as_str()))
            .filter(Column::Version.eq(wallet.version))
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(EngineError::Transient(format!(
                "{} wallet {} was modified concurrently",
                wallet.kind.as_str(),
                wallet.owner_id
            )));
        }

        Ok(Wallet {
            version: next_version,
            ..wallet.clone()
        })
    }
}
