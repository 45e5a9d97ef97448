mod cpv;
mod forms;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Path,
    response::IntoResponse,
    routing::{get, post},
};

use crate::server::AppState;
use crate::server::pages;
use crate::server::response::{ApiError, ApiResponse};

pub fn public_router() -> Router<Arc<AppState>> {
    Router::new()
        // Site structure
        .route("/routes", get(list_routes))
        .route("/pages/{slug}", get(get_page))
        // Forms
        .route("/trial", get(forms::trial_options))
        .route("/trial", post(forms::submit_trial))
        .route("/contact", post(forms::submit_contact))
        // CPV catalog
        .route("/cpv", get(cpv::search))
        .route("/cpv/catalog", get(cpv::catalog))
}

async fn list_routes() -> impl IntoResponse {
    Json(ApiResponse::success(pages::route_table()))
}

async fn get_page(Path(slug): Path<String>) -> impl IntoResponse {
    let page = pages::find(&slug).ok_or_else(|| ApiError::not_found("Page not found"))?;
    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}
