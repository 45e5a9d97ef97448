use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    response::IntoResponse,
};
use chrono::Utc;

use crate::dashboard;
use crate::forms::{PasswordForm, accept_invite as install_invite};
use crate::routes::{Redirect, Route};
use crate::server::AppState;
use crate::server::dto::{InviteRequest, LoginRequest, RedirectResponse, SessionResponse};
use crate::server::extract::{MaybeSession, RequireSession};
use crate::server::response::{ApiError, ApiResponse};
use crate::server::sessions::ClientSession;

/// Signs in with email and password. An expired trial is reported but does
/// not block access.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let client = ClientSession::new(Arc::clone(&state.backend));

    let session = client
        .gateway
        .sign_in_with_password(req.email.trim(), &req.password)
        .await
        .map_err(|e| {
            tracing::info!("Sign-in rejected: {e}");
            ApiError::unauthorized(e.message)
        })?;

    let trial_notice =
        dashboard::trial_notice(&client.gateway, &session.user.email, Utc::now().date_naive())
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Error checking trial subscription: {e}");
                None
            });

    let client_state = client.controller.mount().await;
    let client = state.sessions.insert(client);
    tracing::info!("User signed in");

    let response = SessionResponse {
        session_id: Some(client.id.clone()),
        trial_notice,
        redirect: Some(Redirect::now(Route::Dashboard)),
        ..SessionResponse::new(client_state)
    };
    Ok::<_, ApiError>(Json(ApiResponse::success(response)))
}

/// Installs the session carried by an invite link. A caller that already
/// holds a live session keeps it.
pub async fn accept_invite(
    State(state): State<Arc<AppState>>,
    MaybeSession(existing): MaybeSession,
    Json(req): Json<InviteRequest>,
) -> impl IntoResponse {
    let fail = |failure: crate::forms::InviteFailure| {
        ApiError::bad_request(failure.message).with_redirect(failure.redirect)
    };

    let client = match existing {
        Some(client) => {
            install_invite(&client.gateway, &req.link).await.map_err(fail)?;
            client
        }
        None => {
            let client = ClientSession::new(Arc::clone(&state.backend));
            install_invite(&client.gateway, &req.link).await.map_err(fail)?;
            state.sessions.insert(client)
        }
    };

    let client_state = client.controller.mount().await;
    let response = SessionResponse {
        session_id: Some(client.id.clone()),
        ..SessionResponse::new(client_state)
    };
    Ok::<_, ApiError>(Json(ApiResponse::success(response)))
}

pub async fn set_password(
    RequireSession(client): RequireSession,
    Json(form): Json<PasswordForm>,
) -> impl IntoResponse {
    let redirect = form
        .submit(&client.gateway)
        .await
        .map_err(ApiError::bad_request)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(RedirectResponse { redirect })))
}

/// Signs out and forgets the client session. A failed remote revocation is
/// logged; the client is signed out either way.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    RequireSession(client): RequireSession,
) -> impl IntoResponse {
    if let Err(e) = client.controller.log_out().await {
        tracing::warn!("Remote sign-out failed: {e}");
    }
    state.sessions.remove(&client.id);

    let response = SessionResponse {
        redirect: client.controller.take_redirect(),
        ..SessionResponse::new(client.controller.state())
    };
    Json(ApiResponse::success(response))
}
