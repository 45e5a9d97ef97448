use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::forms::trial::{COUNTRIES, DEFAULT_COUNTRY};
use crate::forms::{ContactForm, TrialForm};
use crate::modal::{ModalKind, ModalState};
use crate::server::AppState;
use crate::server::dto::TrialOptionsResponse;
use crate::server::response::{ApiError, ApiResponse};

pub async fn trial_options() -> impl IntoResponse {
    Json(ApiResponse::success(TrialOptionsResponse {
        default_country: DEFAULT_COUNTRY,
        countries: COUNTRIES,
    }))
}

/// The dialog starts on the trial form and switches to the thank-you view
/// once the row is stored.
pub async fn submit_trial(
    State(state): State<Arc<AppState>>,
    Json(form): Json<TrialForm>,
) -> impl IntoResponse {
    let mut modal = ModalState::default();
    modal.open(ModalKind::TrialForm, None);

    form.submit(&state.gateway, || modal.open(ModalKind::ThankYou, None))
        .await?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(modal))))
}

pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    Json(form): Json<ContactForm>,
) -> impl IntoResponse {
    let outcome = form.submit(&state.gateway).await?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}
