//! Read-only payment views.
//!
//! Queries run straight on the connection without a transaction: a payment is
//! always observed `Pending` or in one of its terminal states, never half
//! settled, because settlement commits atomically.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    EngineError, Payment, ResultEngine,
    payments::{PaymentFilter, PaymentStore},
};

use super::{Engine, require_id};

/// Payments created within a day range and the sum of their amounts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateReport {
    pub payments: Vec<Payment>,
    pub total_amount_minor: i64,
}

/// Payments where a user is the buyer and where they are the receiver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParticipantPayments {
    pub as_buyer: Vec<Payment>,
    pub as_receiver: Vec<Payment>,
}

/// `[start 00:00:00.000, end 23:59:59.999]` in UTC.
fn day_bounds(start: NaiveDate, end: NaiveDate) -> ResultEngine<(DateTime<Utc>, DateTime<Utc>)> {
    if start > end {
        return Err(EngineError::Validation(
            "invalid range: start must be <= end".to_string(),
        ));
    }
    let from = start
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| EngineError::Validation("invalid start date".to_string()))?
        .and_utc();
    let to = end
        .and_hms_milli_opt(23, 59, 59, 999)
        .ok_or_else(|| EngineError::Validation("invalid end date".to_string()))?
        .and_utc();
    Ok((from, to))
}

fn non_empty(payments: Vec<Payment>, what: &str) -> ResultEngine<Vec<Payment>> {
    if payments.is_empty() {
        return Err(EngineError::NotFound(format!("no payments found{what}")));
    }
    Ok(payments)
}

impl Engine {
    /// Returns a single payment.
    pub async fn payment(&self, payment_id: Uuid) -> ResultEngine<Payment> {
        PaymentStore::new(&self.database)
            .find(payment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("payment not found".to_string()))
    }

    /// Every payment, newest first.
    pub async fn list_payments(&self) -> ResultEngine<Vec<Payment>> {
        let payments = PaymentStore::new(&self.database)
            .list(&PaymentFilter::default())
            .await?;
        non_empty(payments, "")
    }

    /// Payments created between `start` and `end` (both days included, UTC)
    /// with their total amount.
    pub async fn payments_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ResultEngine<DateReport> {
        let (created_from, created_to) = day_bounds(start, end)?;
        let filter = PaymentFilter {
            created_from: Some(created_from),
            created_to: Some(created_to),
            ..Default::default()
        };
        let payments = PaymentStore::new(&self.database).list(&filter).await?;
        let payments = non_empty(payments, " for this date")?;

        let total_amount_minor = payments
            .iter()
            .try_fold(0i64, |acc, p| acc.checked_add(p.amount_minor))
            .ok_or_else(|| EngineError::Validation("total amount overflows".to_string()))?;

        Ok(DateReport {
            payments,
            total_amount_minor,
        })
    }

    pub async fn payments_by_buyer(&self, buyer_id: &str) -> ResultEngine<Vec<Payment>> {
        let filter = PaymentFilter {
            buyer_id: Some(require_id(buyer_id, "buyer id")?),
            ..Default::default()
        };
        let payments = PaymentStore::new(&self.database).list(&filter).await?;
        non_empty(payments, " for this buyer")
    }

    pub async fn payments_by_receiver(&self, receiver_id: &str) -> ResultEngine<Vec<Payment>> {
        let filter = PaymentFilter {
            receiver_id: Some(require_id(receiver_id, "receiver id")?),
            ..Default::default()
        };
        let payments = PaymentStore::new(&self.database).list(&filter).await?;
        non_empty(payments, " for this receiver")
    }

    /// Both sides of a user's payments. `NotFound` only when the user appears
    /// on neither side.
    pub async fn payments_by_participant(&self, user_id: &str) -> ResultEngine<ParticipantPayments> {
        let user_id = require_id(user_id, "user id")?;
        let store = PaymentStore::new(&self.database);

        let as_buyer = store
            .list(&PaymentFilter {
                buyer_id: Some(user_id.clone()),
                ..Default::default()
            })
            .await?;
        let as_receiver = store
            .list(&PaymentFilter {
                receiver_id: Some(user_id),
                ..Default::default()
            })
            .await?;

        if as_buyer.is_empty() && as_receiver.is_empty() {
            return Err(EngineError::NotFound(
                "no payments found for this user".to_string(),
            ));
        }

        Ok(ParticipantPayments {
            as_buyer,
            as_receiver,
        })
    }
}
