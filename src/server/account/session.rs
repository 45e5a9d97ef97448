use axum::{Json, response::IntoResponse};

use crate::server::dto::SessionResponse;
use crate::server::extract::MaybeSession;
use crate::server::response::ApiResponse;
use crate::session::SessionState;

/// Header state and navigation entries for the caller.
pub async fn current(MaybeSession(client): MaybeSession) -> impl IntoResponse {
    let response = match client {
        Some(client) => {
            let state = client.controller.mount().await;
            SessionResponse {
                redirect: client.controller.take_redirect(),
                ..SessionResponse::new(state)
            }
        }
        None => SessionResponse::new(SessionState::Anonymous),
    };
    Json(ApiResponse::success(response))
}
