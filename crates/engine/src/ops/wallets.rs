use chrono::{DateTime, Utc};

use crate::{
    EngineError, MoneyCents, ResultEngine, Wallet, WalletKind,
    notifications::EventType,
    wallets::{SYSTEM_OWNER_ID, WalletStore},
};

use super::{Engine, require_id};

impl Engine {
    /// Return a user wallet snapshot from DB.
    pub async fn wallet(&self, owner_id: &str) -> ResultEngine<Wallet> {
        let owner_id = require_id(owner_id, "owner id")?;
        WalletStore::new(&self.database)
            .get(&owner_id, WalletKind::User)
            .await?
            .ok_or_else(|| EngineError::NotFound("wallet not found".to_string()))
    }

    /// Return the platform wallet. It exists once the first payment has been
    /// approved.
    pub async fn system_wallet(&self) -> ResultEngine<Wallet> {
        WalletStore::new(&self.database)
            .get(SYSTEM_OWNER_ID, WalletKind::System)
            .await?
            .ok_or_else(|| EngineError::NotFound("system wallet not found".to_string()))
    }

    /// Adds funds to a user wallet, creating it on first deposit.
    ///
    /// This is how buyers get a balance before their payments can be
    /// approved.
    pub async fn fund_wallet(
        &self,
        owner_id: &str,
        amount_minor: i64,
        funded_at: DateTime<Utc>,
    ) -> ResultEngine<Wallet> {
        let owner_id = require_id(owner_id, "owner id")?;
        if owner_id == SYSTEM_OWNER_ID {
            return Err(EngineError::Validation(
                "the system wallet cannot be funded directly".to_string(),
            ));
        }
        if amount_minor <= 0 {
            return Err(EngineError::Validation(
                "amount_minor must be > 0".to_string(),
            ));
        }

        let owner = owner_id.clone();
        let wallet = self
            .with_retry("fund_wallet", move |db_tx| {
                let owner = owner.clone();
                Box::pin(async move {
                    WalletStore::new(db_tx)
                        .credit(&owner, WalletKind::User, amount_minor, funded_at)
                        .await
                })
            })
            .await?;

        tracing::info!(
            owner_id = %owner_id,
            balance = %MoneyCents::new(wallet.balance_minor),
            "wallet funded with {}",
            MoneyCents::new(amount_minor)
        );
        self.emit(
            EventType::WalletFunded,
            format!(
                "Wallet of {owner_id} funded with {}.",
                MoneyCents::new(amount_minor)
            ),
            owner_id.clone(),
            funded_at,
        )
        .await;

        Ok(wallet)
    }
}
