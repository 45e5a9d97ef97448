use axum::{
    Json,
    extract::Path,
    response::IntoResponse,
};

use crate::dashboard;
use crate::modal::{ModalKind, ModalState};
use crate::server::extract::RequireSession;
use crate::server::response::{ApiError, ApiResponse};

/// Notice details, shaped as the open details dialog.
pub async fn get_notice(
    RequireSession(client): RequireSession,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let details = dashboard::notice_details(&client.gateway, &id)
        .await
        .map_err(|e| {
            if e.is_no_rows() {
                ApiError::not_found("Notice not found")
            } else {
                tracing::error!("Error fetching notice details: {e}");
                ApiError::from(e)
            }
        })?;

    let data = serde_json::to_value(&details)
        .map_err(|_| ApiError::internal("Failed to encode notice details"))?;

    let mut modal = ModalState::default();
    modal.open(ModalKind::NoticeDetails, Some(data));
    Ok::<_, ApiError>(Json(ApiResponse::success(modal)))
}
