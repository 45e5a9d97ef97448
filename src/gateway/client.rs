use std::sync::{Arc, RwLock};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::broadcast;

use super::{Backend, Filter, GatewayError, GatewayResult, Row, Select};
use crate::types::{Session, User};

const EVENT_CAPACITY: usize = 16;

/// Session change notification, published after the handle's session changed.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
    UserUpdated(Session),
}

impl AuthEvent {
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthEvent::SignedIn(s) | AuthEvent::TokenRefreshed(s) | AuthEvent::UserUpdated(s) => {
                Some(s)
            }
            AuthEvent::SignedOut => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn(_) => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed(_) => "TOKEN_REFRESHED",
            AuthEvent::UserUpdated(_) => "USER_UPDATED",
        }
    }
}

/// Configured client handle used for both auth and table operations.
pub struct Gateway {
    backend: Arc<dyn Backend>,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Gateway {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            session: RwLock::new(None),
            events,
        }
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Subscribes to session changes. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn store_session(&self, session: Option<Session>) -> Option<Session> {
        let mut guard = self.session.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, session)
    }

    fn emit(&self, event: AuthEvent) {
        tracing::debug!(event = event.name(), "auth state changed");
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn access_token(&self) -> Option<String> {
        self.session().map(|s| s.access_token)
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> GatewayResult<Session> {
        let session = self.backend.sign_in_with_password(email, password).await?;
        self.store_session(Some(session.clone()));
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// Resolves the user behind the current session, refreshing an expired
    /// access token once when a refresh token is available.
    pub async fn get_user(&self) -> GatewayResult<User> {
        let session = self.session().ok_or_else(GatewayError::missing_session)?;

        match self.backend.get_user(&session.access_token).await {
            Ok(user) => Ok(user),
            Err(err) if err.is_unauthorized() && !session.refresh_token.is_empty() => {
                let refreshed = self.backend.refresh_session(&session.refresh_token).await?;
                let user = refreshed.user.clone();
                self.store_session(Some(refreshed.clone()));
                self.emit(AuthEvent::TokenRefreshed(refreshed));
                Ok(user)
            }
            Err(err) => Err(err),
        }
    }

    /// Installs a session from an externally obtained token pair.
    pub async fn set_session(&self, access_token: &str, refresh_token: &str) -> GatewayResult<Session> {
        let (session, refreshed) = match self.backend.get_user(access_token).await {
            Ok(user) => (
                Session {
                    access_token: access_token.to_string(),
                    refresh_token: refresh_token.to_string(),
                    expires_at: None,
                    user,
                },
                false,
            ),
            Err(err) if err.is_unauthorized() && !refresh_token.is_empty() => {
                (self.backend.refresh_session(refresh_token).await?, true)
            }
            Err(err) => return Err(err),
        };

        self.store_session(Some(session.clone()));
        if refreshed {
            self.emit(AuthEvent::TokenRefreshed(session.clone()));
        } else {
            self.emit(AuthEvent::SignedIn(session.clone()));
        }
        Ok(session)
    }

    /// Clears the local session first, then revokes it remotely. The local
    /// session is gone even when the remote call fails.
    pub async fn sign_out(&self) -> GatewayResult<()> {
        let previous = self.store_session(None);
        self.emit(AuthEvent::SignedOut);

        match previous {
            Some(session) => self.backend.sign_out(&session.access_token).await,
            None => Ok(()),
        }
    }

    pub async fn update_password(&self, password: &str) -> GatewayResult<User> {
        let mut session = self.session().ok_or_else(GatewayError::missing_session)?;
        let user = self
            .backend
            .update_password(&session.access_token, password)
            .await?;

        session.user = user.clone();
        self.store_session(Some(session.clone()));
        self.emit(AuthEvent::UserUpdated(session));
        Ok(user)
    }

    // Table operations

    pub async fn select(&self, query: &Select) -> GatewayResult<Vec<Row>> {
        let token = self.access_token();
        self.backend.select(token.as_deref(), query).await
    }

    pub async fn fetch<T: DeserializeOwned>(&self, query: &Select) -> GatewayResult<Vec<T>> {
        self.select(query).await?.into_iter().map(from_row).collect()
    }

    /// Exactly one row, or a [`super::NO_ROWS_CODE`] error.
    pub async fn fetch_one<T: DeserializeOwned>(&self, query: &Select) -> GatewayResult<T> {
        let mut rows = self.select(query).await?;
        if rows.len() != 1 {
            return Err(GatewayError::no_rows());
        }
        from_row(rows.remove(0))
    }

    /// Zero or one row; more than one is an error.
    pub async fn fetch_optional<T: DeserializeOwned>(&self, query: &Select) -> GatewayResult<Option<T>> {
        let mut rows = self.select(query).await?;
        match rows.len() {
            0 => Ok(None),
            1 => from_row(rows.remove(0)).map(Some),
            _ => Err(GatewayError::no_rows()),
        }
    }

    pub async fn insert<T: Serialize>(&self, table: &str, rows: &[T]) -> GatewayResult<()> {
        let rows = rows.iter().map(to_row).collect::<GatewayResult<Vec<_>>>()?;
        let token = self.access_token();
        self.backend.insert(token.as_deref(), table, &rows).await
    }

    pub async fn update<T: Serialize>(
        &self,
        table: &str,
        values: &T,
        filters: &[Filter],
    ) -> GatewayResult<()> {
        let values = to_row(values)?;
        let token = self.access_token();
        self.backend
            .update(token.as_deref(), table, &values, filters)
            .await
    }

    pub async fn delete(&self, table: &str, filters: &[Filter]) -> GatewayResult<()> {
        let token = self.access_token();
        self.backend.delete(token.as_deref(), table, filters).await
    }
}

fn to_row<T: Serialize>(value: &T) -> GatewayResult<Row> {
    match serde_json::to_value(value).map_err(GatewayError::decode)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(GatewayError::new(format!("expected a JSON object, got {other}"))),
    }
}

fn from_row<T: DeserializeOwned>(row: Row) -> GatewayResult<T> {
    serde_json::from_value(serde_json::Value::Object(row)).map_err(GatewayError::decode)
}
