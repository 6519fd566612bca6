//! Notifications API endpoints.

use api_types::notification::{NotificationList, NotificationQuery, NotificationView};
use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};

use crate::{ServerError, server::ServerState};

const DEFAULT_LIMIT: u64 = 50;

pub async fn list(
    State(state): State<ServerState>,
    query: Result<Query<NotificationQuery>, QueryRejection>,
) -> Result<Json<NotificationList>, ServerError> {
    let Query(query) = query?;
    let notifications = state
        .engine
        .list_notifications(query.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;

    Ok(Json(NotificationList {
        notifications: notifications
            .into_iter()
            .map(|n| NotificationView {
                id: n.id,
                event_type: n.event_type.as_str().to_string(),
                message: n.message,
                reference_id: n.reference_id,
                created_at: n.created_at,
            })
            .collect(),
    }))
}
