mod auth;
mod session;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::server::AppState;

pub fn account_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/invite", post(auth::accept_invite))
        .route("/auth/password", post(auth::set_password))
        .route("/auth/logout", post(auth::logout))
        .route("/session", get(session::current))
}
