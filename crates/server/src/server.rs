use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, patch, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use std::{future::Future, sync::Arc};

use crate::{notifications, payments, wallets};
use engine::Engine;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    /// Bearer token required on administrative routes. `None` leaves them
    /// open.
    pub admin_token: Option<String>,
}

impl ServerState {
    pub fn new(engine: Engine, admin_token: Option<String>) -> Self {
        Self {
            engine: Arc::new(engine),
            admin_token: admin_token.filter(|token| !token.trim().is_empty()),
        }
    }
}

async fn require_admin(
    State(state): State<ServerState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    match bearer {
        Some(header) if header.token() == expected => Ok(next.run(request).await),
        _ => {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                "admin request without a valid token"
            );
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

pub fn router(state: ServerState) -> Router {
    let admin = Router::new()
        .route("/payments/{id}/approve", patch(payments::approve))
        .route("/payments/{id}/reject", patch(payments::reject))
        .route("/payments/{id}", delete(payments::delete))
        .route("/wallets/{owner_id}/deposit", post(wallets::deposit))
        .route("/notifications", get(notifications::list))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/payments", post(payments::create).get(payments::list))
        .route("/payments/buyer/{id}", get(payments::by_buyer))
        .route("/payments/receiver/{id}", get(payments::by_receiver))
        .route("/payments/user/{id}", get(payments::by_participant))
        .route("/wallets/system", get(wallets::system))
        .route("/wallets/{owner_id}", get(wallets::get))
        .merge(admin)
        .with_state(state)
}

/// Serves the API on `listener` until `shutdown` resolves, then lets
/// in-flight requests finish.
pub async fn run_with_listener<F>(
    state: ServerState,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
