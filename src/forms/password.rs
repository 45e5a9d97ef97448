use serde::{Deserialize, Serialize};

use crate::gateway::Gateway;
use crate::routes::{Redirect, Route};
use crate::session::link::parse_invite_link;

pub const MIN_PASSWORD_LEN: usize = 8;

/// How long the invite error stays visible before the login redirect.
pub const INVITE_REDIRECT_DELAY_MS: u64 = 3000;

pub const MISMATCH: &str = "Passwords do not match";
pub const TOO_SHORT: &str = "Password must be at least 8 characters long";
pub const UPDATE_FAILED: &str = "Failed to update password";

/// The invite link could not be turned into a session.
#[derive(Debug, Clone, Serialize)]
pub struct InviteFailure {
    pub message: String,
    pub redirect: Redirect,
}

impl InviteFailure {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            redirect: Redirect::after(Route::Login, INVITE_REDIRECT_DELAY_MS),
        }
    }
}

/// Installs the session carried by an invite link, unless the gateway
/// already holds a valid one.
pub async fn accept_invite(gateway: &Gateway, link: &str) -> Result<(), InviteFailure> {
    let credentials = parse_invite_link(link).map_err(|e| {
        tracing::warn!("Invite link rejected: {e}");
        InviteFailure::new(e.to_string())
    })?;

    if gateway.get_user().await.is_ok() {
        tracing::debug!("Valid session already exists");
        return Ok(());
    }

    gateway
        .set_session(&credentials.access_token, &credentials.refresh_token)
        .await
        .map_err(|e| {
            tracing::warn!("Failed to establish invite session: {e}");
            InviteFailure::new(if e.message.is_empty() {
                "Invalid or expired invite link".to_string()
            } else {
                e.message
            })
        })?;

    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordForm {
    pub password: String,
    pub confirm_password: String,
}

impl PasswordForm {
    /// Checks run before any gateway call.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.password != self.confirm_password {
            return Err(MISMATCH);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(TOO_SHORT);
        }
        Ok(())
    }

    /// On success the caller navigates to the dashboard; on failure the form
    /// stays as it is with one error string.
    pub async fn submit(&self, gateway: &Gateway) -> Result<Redirect, String> {
        self.validate().map_err(str::to_string)?;

        match gateway.update_password(&self.password).await {
            Ok(_) => {
                tracing::info!("Password updated");
                Ok(Redirect::now(Route::Dashboard))
            }
            Err(e) => {
                tracing::error!("Password update error: {e}");
                Err(if e.message.is_empty() {
                    UPDATE_FAILED.to_string()
                } else {
                    e.message
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gateway::SqliteBackend;

    fn form(password: &str, confirm: &str) -> PasswordForm {
        PasswordForm {
            password: password.into(),
            confirm_password: confirm.into(),
        }
    }

    fn gateway() -> (Arc<SqliteBackend>, Gateway) {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        backend.initialize().unwrap();
        (backend.clone(), Gateway::new(backend))
    }

    #[test]
    fn test_local_validation() {
        assert_eq!(form("abcdefgh", "abcdefgi").validate(), Err(MISMATCH));
        assert_eq!(form("short", "short").validate(), Err(TOO_SHORT));
        assert_eq!(form("long enough", "long enough").validate(), Ok(()));
    }

    #[tokio::test]
    async fn test_mismatch_never_reaches_gateway() {
        // No session: any gateway call would fail with a different message.
        let (_, gateway) = gateway();
        let err = form("abcdefgh", "zzzzzzzz").submit(&gateway).await.unwrap_err();
        assert_eq!(err, MISMATCH);
    }

    #[tokio::test]
    async fn test_invite_then_set_password() {
        let (backend, gateway) = gateway();
        let invite = backend.invite_user("new@acme.test").unwrap();
        let link = format!(
            "https://app.test/set-password#access_token={}&refresh_token={}&type=invite",
            invite.access_token, invite.refresh_token
        );

        accept_invite(&gateway, &link).await.unwrap();
        assert_eq!(gateway.get_user().await.unwrap().email, "new@acme.test");

        let redirect = form("a new password", "a new password")
            .submit(&gateway)
            .await
            .unwrap();
        assert_eq!(redirect.to, Route::Dashboard);
    }

    #[tokio::test]
    async fn test_invite_without_token_redirects_to_login() {
        let (_, gateway) = gateway();
        let failure = accept_invite(&gateway, "https://app.test/set-password")
            .await
            .unwrap_err();
        assert_eq!(failure.message, "No access token found in URL");
        assert_eq!(failure.redirect.to, Route::Login);
        assert_eq!(failure.redirect.after_ms, Some(INVITE_REDIRECT_DELAY_MS));
    }
}
