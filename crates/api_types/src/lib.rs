use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a payment request as exposed on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

/// Kind of a wallet as exposed on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    User,
    System,
}

pub mod payment {
    use super::*;

    /// Body of `POST /payments`.
    ///
    /// Every field is optional at the JSON level so a missing one is reported
    /// as a validation error instead of a deserialization failure.
    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PaymentNew {
        pub code_id: Option<String>,
        pub buyer_id: Option<String>,
        pub receiver_id: Option<String>,
        pub item_id: Option<String>,
        /// Amount in minor units (cents).
        pub amount_minor: Option<i64>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PaymentView {
        pub id: Uuid,
        pub code_id: String,
        pub buyer_id: String,
        pub receiver_id: String,
        pub item_id: String,
        pub amount_minor: i64,
        pub status: PaymentStatus,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PaymentEnvelope {
        pub payment: PaymentView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PaymentList {
        pub payments: Vec<PaymentView>,
    }

    /// Payments created within a day range and the sum of their amounts.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PaymentReport {
        pub payments: Vec<PaymentView>,
        pub total_amount: i64,
    }

    /// Response of `PATCH /payments/{id}/approve`.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ApprovalResponse {
        pub payment: PaymentView,
        pub buyer_wallet: super::wallet::WalletView,
        pub receiver_wallet: super::wallet::WalletView,
        pub system_wallet: super::wallet::WalletView,
        /// Share credited to the receiver, in minor units.
        pub receiver_received: i64,
        /// Share credited to the system wallet, in minor units.
        pub system_received: i64,
    }

    /// Payments of a user, split by the side they are on.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ParticipantPayments {
        pub buyer_payments: Vec<PaymentView>,
        pub receiver_payments: Vec<PaymentView>,
    }

    /// Query string of `GET /payments`.
    ///
    /// - no parameter: every payment
    /// - `date`: a single day
    /// - `from` and `to`: an inclusive day range
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct PaymentQuery {
        pub date: Option<String>,
        pub from: Option<String>,
        pub to: Option<String>,
    }

    impl PaymentQuery {
        /// Resolves the query into an optional inclusive day range.
        pub fn day_range(&self) -> Result<Option<(NaiveDate, NaiveDate)>, String> {
            match (self.date.as_deref(), self.from.as_deref(), self.to.as_deref()) {
                (None, None, None) => Ok(None),
                (Some(date), None, None) => {
                    let day = parse_day(date, "date")?;
                    Ok(Some((day, day)))
                }
                (None, Some(from), Some(to)) => {
                    Ok(Some((parse_day(from, "from")?, parse_day(to, "to")?)))
                }
                (None, _, _) => Err("both from and to are required".to_string()),
                (Some(_), _, _) => Err("use either date or from/to".to_string()),
            }
        }
    }

    fn parse_day(value: &str, name: &str) -> Result<NaiveDate, String> {
        let value = value.trim();
        if value.is_empty() {
            return Err(format!("{name} is required"));
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| format!("{name} must be formatted as YYYY-MM-DD"))
    }
}

pub mod wallet {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct WalletView {
        pub owner_id: String,
        pub kind: WalletKind,
        pub balance_minor: i64,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WalletEnvelope {
        pub wallet: WalletView,
    }

    /// Body of `POST /wallets/{ownerId}/deposit`.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct WalletDeposit {
        pub amount_minor: Option<i64>,
    }
}

pub mod notification {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct NotificationView {
        pub id: Uuid,
        /// One of `payment_created`, `payment_approved`, `payment_rejected`,
        /// `payment_deleted`, `wallet_funded`.
        #[serde(rename = "type")]
        pub event_type: String,
        pub message: String,
        pub reference_id: String,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct NotificationList {
        pub notifications: Vec<NotificationView>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct NotificationQuery {
        pub limit: Option<u64>,
    }
}
