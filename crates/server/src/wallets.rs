//! Wallets API endpoints.

use api_types::{
    WalletKind as ApiKind,
    wallet::{WalletDeposit, WalletEnvelope, WalletView},
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use chrono::Utc;
use engine::{Wallet, WalletKind};

use crate::{ServerError, server::ServerState};

pub(crate) fn wallet_view(wallet: &Wallet) -> WalletView {
    WalletView {
        owner_id: wallet.owner_id.clone(),
        kind: match wallet.kind {
            WalletKind::User => ApiKind::User,
            WalletKind::System => ApiKind::System,
        },
        balance_minor: wallet.balance_minor,
        updated_at: wallet.updated_at,
    }
}

pub async fn get(
    State(state): State<ServerState>,
    Path(owner_id): Path<String>,
) -> Result<Json<WalletEnvelope>, ServerError> {
    let wallet = state.engine.wallet(&owner_id).await?;
    Ok(Json(WalletEnvelope {
        wallet: wallet_view(&wallet),
    }))
}

pub async fn system(State(state): State<ServerState>) -> Result<Json<WalletEnvelope>, ServerError> {
    let wallet = state.engine.system_wallet().await?;
    Ok(Json(WalletEnvelope {
        wallet: wallet_view(&wallet),
    }))
}

pub async fn deposit(
    State(state): State<ServerState>,
    Path(owner_id): Path<String>,
    payload: Result<Json<WalletDeposit>, JsonRejection>,
) -> Result<Json<WalletEnvelope>, ServerError> {
    let Json(payload) = payload?;
    let amount_minor = payload
        .amount_minor
        .ok_or_else(|| ServerError::Generic("amountMinor is required".to_string()))?;

    let wallet = state
        .engine
        .fund_wallet(&owner_id, amount_minor, Utc::now())
        .await?;

    Ok(Json(WalletEnvelope {
        wallet: wallet_view(&wallet),
    }))
}
