mod notices;
mod overview;
mod profile;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, put},
};

use crate::server::AppState;

pub fn dashboard_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(overview::get_dashboard))
        // Profile
        .route("/profile", put(profile::update_profile))
        .route(
            "/profile/cpv",
            get(profile::list_codes).post(profile::add_code),
        )
        .route("/profile/cpv/search", get(profile::search_codes))
        .route("/profile/cpv/{code}", delete(profile::remove_code))
        // Notices
        .route("/notices/{id}", get(notices::get_notice))
}
