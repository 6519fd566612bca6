//! Payments API endpoints

use api_types::{
    PaymentStatus as ApiStatus,
    payment::{
        ApprovalResponse, ParticipantPayments, PaymentEnvelope, PaymentList, PaymentNew,
        PaymentQuery, PaymentReport, PaymentView,
    },
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use engine::{CreatePaymentCmd, Payment, PaymentStatus};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, wallets::wallet_view};

fn map_status(status: PaymentStatus) -> ApiStatus {
    match status {
        PaymentStatus::Pending => ApiStatus::Pending,
        PaymentStatus::Approved => ApiStatus::Approved,
        PaymentStatus::Rejected => ApiStatus::Rejected,
    }
}

pub(crate) fn payment_view(payment: &Payment) -> PaymentView {
    PaymentView {
        id: payment.id,
        code_id: payment.code_id.clone(),
        buyer_id: payment.buyer_id.clone(),
        receiver_id: payment.receiver_id.clone(),
        item_id: payment.item_id.clone(),
        amount_minor: payment.amount_minor,
        status: map_status(payment.status),
        created_at: payment.created_at,
        updated_at: payment.updated_at,
    }
}

fn payment_list(payments: &[Payment]) -> Vec<PaymentView> {
    payments.iter().map(payment_view).collect()
}

/// Handle requests for submitting a new payment.
pub async fn create(
    State(state): State<ServerState>,
    payload: Result<Json<PaymentNew>, JsonRejection>,
) -> Result<(StatusCode, Json<PaymentEnvelope>), ServerError> {
    let Json(payload) = payload?;
    let amount_minor = payload
        .amount_minor
        .ok_or_else(|| ServerError::Generic("all fields are required".to_string()))?;

    let payment = state
        .engine
        .create_payment(CreatePaymentCmd {
            code_id: payload.code_id.unwrap_or_default(),
            buyer_id: payload.buyer_id.unwrap_or_default(),
            receiver_id: payload.receiver_id.unwrap_or_default(),
            item_id: payload.item_id.unwrap_or_default(),
            amount_minor,
            created_at: Utc::now(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PaymentEnvelope {
            payment: payment_view(&payment),
        }),
    ))
}

/// Every payment, or a date report when `date` or `from`/`to` are given.
pub async fn list(
    State(state): State<ServerState>,
    query: Result<Query<PaymentQuery>, QueryRejection>,
) -> Result<Response, ServerError> {
    let Query(query) = query?;

    match query.day_range().map_err(ServerError::Generic)? {
        None => {
            let payments = state.engine.list_payments().await?;
            Ok(Json(PaymentList {
                payments: payment_list(&payments),
            })
            .into_response())
        }
        Some((start, end)) => {
            let report = state.engine.payments_by_date_range(start, end).await?;
            Ok(Json(PaymentReport {
                payments: payment_list(&report.payments),
                total_amount: report.total_amount_minor,
            })
            .into_response())
        }
    }
}

pub async fn approve(
    State(state): State<ServerState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ApprovalResponse>, ServerError> {
    let Path(id) = id?;
    let approval = state.engine.approve_payment(id, Utc::now()).await?;

    Ok(Json(ApprovalResponse {
        payment: payment_view(&approval.payment),
        buyer_wallet: wallet_view(&approval.buyer_wallet),
        receiver_wallet: wallet_view(&approval.receiver_wallet),
        system_wallet: wallet_view(&approval.system_wallet),
        receiver_received: approval.split.receiver_minor,
        system_received: approval.split.system_minor,
    }))
}

pub async fn reject(
    State(state): State<ServerState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<PaymentEnvelope>, ServerError> {
    let Path(id) = id?;
    let payment = state.engine.reject_payment(id, Utc::now()).await?;
    Ok(Json(PaymentEnvelope {
        payment: payment_view(&payment),
    }))
}

pub async fn delete(
    State(state): State<ServerState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<PaymentEnvelope>, ServerError> {
    let Path(id) = id?;
    let payment = state.engine.delete_payment(id, Utc::now()).await?;
    Ok(Json(PaymentEnvelope {
        payment: payment_view(&payment),
    }))
}

pub async fn by_buyer(
    State(state): State<ServerState>,
    Path(buyer_id): Path<String>,
) -> Result<Json<PaymentList>, ServerError> {
    let payments = state.engine.payments_by_buyer(&buyer_id).await?;
    Ok(Json(PaymentList {
        payments: payment_list(&payments),
    }))
}

pub async fn by_receiver(
    State(state): State<ServerState>,
    Path(receiver_id): Path<String>,
) -> Result<Json<PaymentList>, ServerError> {
    let payments = state.engine.payments_by_receiver(&receiver_id).await?;
    Ok(Json(PaymentList {
        payments: payment_list(&payments),
    }))
}

pub async fn by_participant(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
) -> Result<Json<ParticipantPayments>, ServerError> {
    let payments = state.engine.payments_by_participant(&user_id).await?;
    Ok(Json(ParticipantPayments {
        buyer_payments: payment_list(&payments.as_buyer),
        receiver_payments: payment_list(&payments.as_receiver),
    }))
}
