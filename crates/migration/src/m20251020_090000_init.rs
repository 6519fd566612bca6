//! Initial schema migration.
//!
//! - `wallets`: one balance per `(owner_id, kind)`, `kind` is `user` or `system`
//! - `payments`: payment requests awaiting (or past) administrator review
//! - `notifications`: administrator notifications
//!
//! `wallets` and `payments` carry a `version` bumped on every update so
//! writers can detect concurrent changes.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Wallets {
    Table,
    OwnerId,
    Kind,
    BalanceMinor,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Payments {
    Table,
    Id,
    CodeId,
    BuyerId,
    ReceiverId,
    ItemId,
    AmountMinor,
    Status,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Notifications {
    Table,
    Id,
    EventType,
    Message,
    ReferenceId,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Wallets
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Wallets::OwnerId).string().not_null())
                    .col(ColumnDef::new(Wallets::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Wallets::BalanceMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Wallets::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Wallets::UpdatedAt).timestamp().not_null())
                    .primary_key(Index::create().col(Wallets::OwnerId).col(Wallets::Kind))
                    .check(Expr::col(Wallets::BalanceMinor).gte(0))
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Payments
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Payments::CodeId).string().not_null())
                    .col(ColumnDef::new(Payments::BuyerId).string().not_null())
                    .col(ColumnDef::new(Payments::ReceiverId).string().not_null())
                    .col(ColumnDef::new(Payments::ItemId).string().not_null())
                    .col(
                        ColumnDef::new(Payments::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Payments::Status)
                            .string()
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(
                        ColumnDef::new(Payments::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Payments::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Payments::UpdatedAt).timestamp().not_null())
                    .check(Expr::col(Payments::AmountMinor).gt(0))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payments-buyer_id")
                    .table(Payments::Table)
                    .col(Payments::BuyerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payments-receiver_id")
                    .table(Payments::Table)
                    .col(Payments::ReceiverId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payments-created_at")
                    .table(Payments::Table)
                    .col(Payments::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Notifications
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notifications::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Notifications::EventType).string().not_null())
                    .col(ColumnDef::new(Notifications::Message).string().not_null())
                    .col(
                        ColumnDef::new(Notifications::ReferenceId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Notifications::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-notifications-created_at")
                    .table(Notifications::Table)
                    .col(Notifications::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await?;
        Ok(())
    }
}
