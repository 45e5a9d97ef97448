use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{
        HeaderMap, HeaderValue, StatusCode, header::AUTHORIZATION, header::WWW_AUTHENTICATE,
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;
use super::response::ApiResponse;
use super::sessions::ClientSession;

/// Extractor that requires a live client session
pub struct RequireSession(pub Arc<ClientSession>);

/// The client session when one was presented and is still live
pub struct MaybeSession(pub Option<Arc<ClientSession>>);

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidSession,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingAuth => "Authentication required",
            AuthError::InvalidScheme => "Invalid authorization scheme",
            AuthError::InvalidSession => "Session expired or signed out",
        };

        let mut response =
            (StatusCode::UNAUTHORIZED, Json(ApiResponse::<()>::error(message))).into_response();
        response.headers_mut().insert(
            WWW_AUTHENTICATE,
            HeaderValue::from_static("Bearer realm=\"tendersync\""),
        );
        response
    }
}

fn bearer(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header.to_str().map_err(|_| AuthError::InvalidScheme)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidScheme)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidScheme);
    }
    Ok(Some(token))
}

/// Looks up the session; one whose gateway lost its session is dropped from
/// the registry.
fn live_session(state: &AppState, id: &str) -> Option<Arc<ClientSession>> {
    let session = state.sessions.get(id)?;
    if session.gateway.session().is_none() {
        tracing::debug!("Dropping signed-out client session");
        state.sessions.remove(id);
        return None;
    }
    session.touch();
    Some(session)
}

/// Forgets the presented client session when a protected handler answered
/// 401 for it, i.e. the gateway rejected its tokens.
pub async fn evict_rejected_session(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let id = bearer(request.headers()).ok().flatten().map(str::to_string);
    let response = next.run(request).await;

    if response.status() == StatusCode::UNAUTHORIZED {
        if let Some(client) = id.and_then(|id| state.sessions.remove(&id)) {
            tracing::info!("Client session rejected by the gateway, signing out");
            client.controller.clear_and_sign_out().await;
        }
    }
    response
}

impl FromRequestParts<Arc<AppState>> for RequireSession {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let id = bearer(&parts.headers)?.ok_or(AuthError::MissingAuth)?;
        let session = live_session(state, id).ok_or(AuthError::InvalidSession)?;
        Ok(RequireSession(session))
    }
}

impl FromRequestParts<Arc<AppState>> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = match bearer(&parts.headers) {
            Ok(Some(id)) => live_session(state, id),
            _ => None,
        };
        Ok(MaybeSession(session))
    }
}
