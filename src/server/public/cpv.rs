use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::cpv::{self, CpvCatalog};
use crate::server::AppState;
use crate::server::dto::{CpvSearchParams, CpvSearchResponse, SearchParams};
use crate::server::response::{ApiError, ApiResponse, GatewayResultExt};
use crate::types::CpvCode;

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CpvSearchParams>,
) -> impl IntoResponse {
    let found = cpv::search_codes(&state.gateway, &params.q, params.preset.into())
        .await
        .api_err("Error searching CPV codes")?;

    let response = CpvSearchResponse {
        searched: found.is_some(),
        codes: found.unwrap_or_default(),
    };
    Ok::<_, ApiError>(Json(ApiResponse::success(response)))
}

/// Filters the cached catalog locally.
pub async fn catalog(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let catalog = state
        .catalog
        .get_or_try_init(|| CpvCatalog::load(&state.gateway))
        .await
        .api_err("Error fetching CPV codes")?;

    let codes: Vec<CpvCode> = catalog.filter(&params.q).into_iter().cloned().collect();
    Ok::<_, ApiError>(Json(ApiResponse::success(codes)))
}
