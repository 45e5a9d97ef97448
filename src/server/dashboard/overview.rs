use axum::{
    Json,
    extract::Query,
    response::IntoResponse,
};

use crate::dashboard::{self, DashboardError, PROFILE_LOAD_FAILED};
use crate::server::dto::DashboardParams;
use crate::server::extract::RequireSession;
use crate::server::response::{ApiError, ApiResponse};

pub async fn get_dashboard(
    RequireSession(client): RequireSession,
    Query(params): Query<DashboardParams>,
) -> impl IntoResponse {
    let view = dashboard::load(&client.gateway, params.tab)
        .await
        .map_err(|e| match e {
            DashboardError::Unauthenticated(redirect) => {
                ApiError::unauthorized("Authentication required").with_redirect(redirect)
            }
            DashboardError::ProfileLoad => ApiError::internal(PROFILE_LOAD_FAILED),
        })?;

    Ok::<_, ApiError>(Json(ApiResponse::success(view)))
}
