use axum::{
    Json,
    extract::{Path, Query},
    response::IntoResponse,
};

use crate::cpv::{self, SearchOutcome};
use crate::forms::EditProfileForm;
use crate::gateway::Gateway;
use crate::server::dto::{AddCodeRequest, SearchParams, SelectorCode, SelectorSearchResponse};
use crate::server::extract::RequireSession;
use crate::server::response::{ApiError, ApiResponse, GatewayResultExt};

async fn current_email(gateway: &Gateway) -> Result<String, ApiError> {
    gateway
        .get_user()
        .await
        .map(|user| user.email)
        .map_err(|_| ApiError::unauthorized("Authentication required"))
}

async fn current_profile_id(gateway: &Gateway) -> Result<i64, ApiError> {
    let email = current_email(gateway).await?;
    cpv::resolve_profile_id(gateway, &email)
        .await
        .api_err("Error fetching user profile")
}

pub async fn update_profile(
    RequireSession(client): RequireSession,
    Json(form): Json<EditProfileForm>,
) -> impl IntoResponse {
    let email = current_email(&client.gateway).await?;
    form.submit(&client.gateway, &email).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(form)))
}

pub async fn list_codes(RequireSession(client): RequireSession) -> impl IntoResponse {
    let profile_id = current_profile_id(&client.gateway).await?;
    let codes = cpv::list_profile_codes(&client.gateway, profile_id)
        .await
        .api_err("Error fetching CPV codes")?;
    Ok::<_, ApiError>(Json(ApiResponse::success(codes)))
}

pub async fn add_code(
    RequireSession(client): RequireSession,
    Json(req): Json<AddCodeRequest>,
) -> impl IntoResponse {
    let code = req.code.trim();
    if code.is_empty() {
        return Err(ApiError::bad_request("code is required"));
    }

    let profile_id = current_profile_id(&client.gateway).await?;
    let diff = cpv::add_code(&client.gateway, profile_id, code)
        .await
        .api_err("Error adding CPV code")?;
    Ok::<_, ApiError>(Json(ApiResponse::success(diff)))
}

pub async fn remove_code(
    RequireSession(client): RequireSession,
    Path(code): Path<String>,
) -> impl IntoResponse {
    let profile_id = current_profile_id(&client.gateway).await?;
    let diff = cpv::remove_code(&client.gateway, profile_id, &code)
        .await
        .api_err("Error removing CPV code")?;
    Ok::<_, ApiError>(Json(ApiResponse::success(diff)))
}

/// Debounced search for the code selector. Results are flagged when the
/// code is already associated with the profile.
pub async fn search_codes(
    RequireSession(client): RequireSession,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let outcome = client
        .search
        .input(&client.gateway, &params.q)
        .await
        .api_err("Error searching CPV codes")?;

    let response = match outcome {
        SearchOutcome::TooShort => SelectorSearchResponse::TooShort,
        SearchOutcome::Superseded => SelectorSearchResponse::Superseded,
        SearchOutcome::Results(codes) => {
            let profile_id = current_profile_id(&client.gateway).await?;
            let selected = cpv::selected_codes(&client.gateway, profile_id)
                .await
                .api_err("Error fetching CPV codes")?;
            SelectorSearchResponse::Results {
                codes: codes
                    .into_iter()
                    .map(|code| SelectorCode {
                        selected: selected.contains(&code.code),
                        code,
                    })
                    .collect(),
            }
        }
    };
    Ok::<_, ApiError>(Json(ApiResponse::success(response)))
}
