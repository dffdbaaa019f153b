use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::auth;
use crate::messages;
use crate::state::AppState;

/// Largest accepted request body; bounds video uploads.
pub const MAX_BODY_BYTES: usize = 200 * 1024 * 1024;

/// Every API route. Transport layers (CORS, tracing, static files) are
/// added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/add-user", post(auth::request_login_link))
        .route("/auth/magic/{token}", get(auth::redeem_login_link))
        .route("/messages", post(messages::create_message))
        .route("/messages/magic/{token}", get(messages::redeem_share_link))
        .route("/messages/{slug}/exists", get(messages::exists))
        .route("/messages/{slug}/open", post(messages::open))
        .route("/messages/{slug}/download", get(messages::download))
        .route("/messages/{slug}/reply", post(messages::reply))
        .route("/messages/{slug}/analytics", get(messages::analytics))
        .route("/messages/{slug}/magic", post(messages::create_share_link))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
