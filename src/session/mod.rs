//! Authenticated-user state shared by every view.
//!
//! A [`SessionController`] owns the one observable copy of the session state.
//! Views subscribe to it instead of querying the gateway themselves, and
//! auth events from the gateway drive its transitions.

pub mod link;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::gateway::{AuthEvent, Gateway, GatewayResult};
use crate::routes::{Redirect, Route};
use crate::types::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavAction {
    LogIn,
    StartTrial,
    Dashboard,
    LogOut,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated { user: User },
}

impl SessionState {
    /// Navigation entries offered in this state.
    #[must_use]
    pub fn nav_actions(&self) -> &'static [NavAction] {
        match self {
            SessionState::Anonymous => &[NavAction::LogIn, NavAction::StartTrial],
            SessionState::Authenticated { .. } => &[NavAction::Dashboard, NavAction::LogOut],
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated { user } => Some(user),
            SessionState::Anonymous => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }
}

pub struct SessionController {
    gateway: Arc<Gateway>,
    state: watch::Sender<SessionState>,
    redirect: watch::Sender<Option<Redirect>>,
}

impl SessionController {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            state: watch::Sender::new(SessionState::Anonymous),
            redirect: watch::Sender::new(None),
        }
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Takes the pending navigation, if any.
    pub fn take_redirect(&self) -> Option<Redirect> {
        self.redirect.send_replace(None)
    }

    /// Resolves the initial state. Without a stored session the state is
    /// anonymous and nothing is signed out. Unlike a failed resolution this
    /// deliberately does not navigate home, so public pages can mount it.
    pub async fn mount(&self) -> SessionState {
        if self.gateway.session().is_none() {
            self.state.send_replace(SessionState::Anonymous);
        } else {
            self.resolve().await;
        }
        self.state()
    }

    pub async fn handle_event(&self, event: &AuthEvent) {
        match event {
            AuthEvent::SignedOut => self.force_anonymous(),
            _ if self.gateway.session().is_none() => self.force_anonymous(),
            _ => self.resolve().await,
        }
    }

    /// Signs out. The state moves to anonymous even when the remote call
    /// fails; the failure is still returned.
    pub async fn log_out(&self) -> GatewayResult<()> {
        let result = self.gateway.sign_out().await;
        self.force_anonymous();
        result
    }

    async fn resolve(&self) {
        match self.gateway.get_user().await {
            Ok(user) => {
                self.state
                    .send_if_modified(|state| match state {
                        SessionState::Authenticated { user: current } if *current == user => false,
                        _ => {
                            *state = SessionState::Authenticated { user };
                            true
                        }
                    });
            }
            Err(e) => {
                tracing::warn!("Failed to resolve session user: {e}");
                self.clear_and_sign_out().await;
            }
        }
    }

    /// Drops a session the gateway no longer accepts: anonymous, navigate
    /// home, then a best-effort sign-out whose failure is ignored.
    pub async fn clear_and_sign_out(&self) {
        self.force_anonymous();
        if self.gateway.session().is_some() {
            if let Err(e) = self.gateway.sign_out().await {
                tracing::debug!("Sign-out after failed resolve: {e}");
            }
        }
    }

    fn force_anonymous(&self) {
        self.state.send_replace(SessionState::Anonymous);
        self.redirect.send_replace(Some(Redirect::now(Route::Home)));
    }

    /// Starts applying gateway auth events to this controller. Events stop
    /// being applied once the returned handle is dropped.
    pub fn listen(self: &Arc<Self>) -> Listener {
        let controller = Arc::clone(self);
        let mut events = controller.gateway.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => controller.handle_event(&event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auth events dropped, re-resolving session");
                        controller.resolve().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Listener { handle }
    }
}

/// Subscription to gateway auth events; aborts on drop.
pub struct Listener {
    handle: JoinHandle<()>,
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
