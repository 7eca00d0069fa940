//! fedgate web server.
//!
//! Serves the SSO redirect and callback routes on top of the
//! `fedgate-sso` flow types.

pub mod auth;
pub mod config;
pub mod error;

use axum::{Router, routing::get};
use fedgate_sso::callback::CALLBACK_PATH;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use auth::AppState;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/auth/sso", get(auth::sso_login_redirect))
        .route(CALLBACK_PATH, get(auth::sso_callback))
        // Compatibility-mode callbacks, one path per method.
        .route("/api/auth/get_sso_id", get(auth::sso_callback))
        .route("/api/auth/sso_get_token", get(auth::sso_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
