use chrono::{DateTime, Utc};
use sea_orm::DatabaseTransaction;
use uuid::Uuid;

use crate::{
    CreatePaymentCmd, EngineError, MoneyCents, Payment, PaymentStatus, ResultEngine, Split,
    SplitRatio, Wallet, WalletKind,
    notifications::EventType,
    payments::PaymentStore,
    wallets::{SYSTEM_OWNER_ID, WalletStore},
};

use super::Engine;

/// Outcome of a committed approval: the payment and the three wallets as
/// stored after the settlement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Approval {
    pub payment: Payment,
    pub buyer_wallet: Wallet,
    pub receiver_wallet: Wallet,
    pub system_wallet: Wallet,
    pub split: Split,
}

fn payment_not_found() -> EngineError {
    EngineError::NotFound("payment not found".to_string())
}

/// One approval attempt. Every read happens inside `db_tx`; writes go buyer,
/// receiver, system, payment.
async fn approve_in_tx(
    db_tx: &DatabaseTransaction,
    payment_id: Uuid,
    ratio: SplitRatio,
    at: DateTime<Utc>,
) -> ResultEngine<Approval> {
    let payments = PaymentStore::new(db_tx);
    let wallets = WalletStore::new(db_tx);

    let payment = payments.find(payment_id).await?.ok_or_else(payment_not_found)?;
    payment.ensure_pending()?;

    let split = ratio.split(payment.amount_minor);

    let buyer_wallet = wallets
        .debit(&payment.buyer_id, WalletKind::User, payment.amount_minor, at)
        .await
        .map_err(|err| match err {
            EngineError::NotFound(_) => {
                EngineError::NotFound("buyer wallet not found".to_string())
            }
            other => other,
        })?;
    let receiver_wallet = wallets
        .credit(&payment.receiver_id, WalletKind::User, split.receiver_minor, at)
        .await?;
    let system_wallet = wallets
        .credit(SYSTEM_OWNER_ID, WalletKind::System, split.system_minor, at)
        .await?;

    let payment = payments
        .transition(&payment, PaymentStatus::Approved, at)
        .await?;

    Ok(Approval {
        payment,
        buyer_wallet,
        receiver_wallet,
        system_wallet,
        split,
    })
}

async fn reject_in_tx(
    db_tx: &DatabaseTransaction,
    payment_id: Uuid,
    at: DateTime<Utc>,
) -> ResultEngine<Payment> {
    let payments = PaymentStore::new(db_tx);
    let payment = payments.find(payment_id).await?.ok_or_else(payment_not_found)?;
    payment.ensure_pending()?;
    payments
        .transition(&payment, PaymentStatus::Rejected, at)
        .await
}

impl Engine {
    /// Validates and stores a new `Pending` payment, then notifies the
    /// administrators. Wallets are not touched.
    pub async fn create_payment(&self, cmd: CreatePaymentCmd) -> ResultEngine<Payment> {
        let payment = Payment::new(cmd)?;

        let stored = payment.clone();
        self.with_retry("create_payment", move |db_tx| {
            let payment = stored.clone();
            Box::pin(async move { PaymentStore::new(db_tx).insert(&payment).await })
        })
        .await?;

        tracing::info!(
            payment_id = %payment.id,
            buyer_id = %payment.buyer_id,
            receiver_id = %payment.receiver_id,
            "payment created for {}",
            MoneyCents::new(payment.amount_minor)
        );
        self.emit(
            EventType::PaymentCreated,
            format!(
                "New payment submitted by buyer {}. Approve or reject it.",
                payment.buyer_id
            ),
            payment.id.to_string(),
            payment.created_at,
        )
        .await;

        Ok(payment)
    }

    /// Approves a pending payment and settles it.
    ///
    /// Atomically debits the buyer by the full amount and credits the
    /// receiver and the system wallet with their shares. Either all four
    /// records change or none does.
    ///
    /// Errors:
    /// - `NotFound` if the payment or the buyer wallet is missing
    /// - `Conflict` if the payment was already approved or rejected
    /// - `InsufficientFunds` if the buyer cannot cover the amount
    /// - `Transient` if concurrent writers kept winning
    pub async fn approve_payment(
        &self,
        payment_id: Uuid,
        approved_at: DateTime<Utc>,
    ) -> ResultEngine<Approval> {
        let ratio = self.split;
        let approval = self
            .with_retry("approve_payment", move |db_tx| {
                Box::pin(approve_in_tx(db_tx, payment_id, ratio, approved_at))
            })
            .await?;

        tracing::info!(
            payment_id = %payment_id,
            receiver_share = %MoneyCents::new(approval.split.receiver_minor),
            system_share = %MoneyCents::new(approval.split.system_minor),
            "payment approved"
        );
        self.emit(
            EventType::PaymentApproved,
            format!(
                "Payment of {} from {} to {} approved.",
                MoneyCents::new(approval.payment.amount_minor),
                approval.payment.buyer_id,
                approval.payment.receiver_id
            ),
            payment_id.to_string(),
            approved_at,
        )
        .await;

        Ok(approval)
    }

    /// Rejects a pending payment. No wallet is touched.
    pub async fn reject_payment(
        &self,
        payment_id: Uuid,
        rejected_at: DateTime<Utc>,
    ) -> ResultEngine<Payment> {
        let payment = self
            .with_retry("reject_payment", move |db_tx| {
                Box::pin(reject_in_tx(db_tx, payment_id, rejected_at))
            })
            .await?;

        tracing::info!(payment_id = %payment_id, "payment rejected");
        self.emit(
            EventType::PaymentRejected,
            format!("Payment from {} rejected.", payment.buyer_id),
            payment_id.to_string(),
            rejected_at,
        )
        .await;

        Ok(payment)
    }

    /// Deletes a payment whatever its status.
    ///
    /// Settled balances are left as they are: deleting an approved payment
    /// does not reverse its settlement.
    pub async fn delete_payment(
        &self,
        payment_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> ResultEngine<Payment> {
        let payment = self
            .with_retry("delete_payment", move |db_tx| {
                Box::pin(async move {
                    PaymentStore::new(db_tx)
                        .delete(payment_id)
                        .await?
                        .ok_or_else(payment_not_found)
                })
            })
            .await?;

        tracing::info!(
            payment_id = %payment_id,
            status = payment.status.as_str(),
            "payment deleted"
        );
        self.emit(
            EventType::PaymentDeleted,
            format!(
                "Payment from {} ({}) deleted.",
                payment.buyer_id,
                payment.status.as_str()
            ),
            payment_id.to_string(),
            deleted_at,
        )
        .await;

        Ok(payment)
    }
}
