//! Access to the hosted database-and-auth backend.
//!
//! [`Backend`] is the raw request/response contract; [`Gateway`] is the
//! configured handle the rest of the crate talks to. It carries the current
//! session and broadcasts [`AuthEvent`]s when that session changes.

mod client;
pub mod local;
mod query;
mod remote;

pub use client::{AuthEvent, Gateway};
pub use local::SqliteBackend;
pub use query::{Filter, Order, Select};
pub use remote::SupabaseBackend;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Session, User};

/// One row as returned by, or sent to, a table.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Code returned when a single-row read matched nothing.
pub const NO_ROWS_CODE: &str = "PGRST116";
/// Postgres `unique_violation`.
pub const UNIQUE_VIOLATION_CODE: &str = "23505";

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
}

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn no_rows() -> Self {
        Self::new("JSON object requested, multiple (or no) rows returned")
            .with_status(406)
            .with_code(NO_ROWS_CODE)
    }

    pub fn unique_violation(detail: impl Into<String>) -> Self {
        Self::new(detail).with_status(409).with_code(UNIQUE_VIOLATION_CODE)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(message).with_status(401)
    }

    #[must_use]
    pub fn missing_session() -> Self {
        Self::unauthorized("Auth session missing!").with_code("session_not_found")
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::new(format!("failed to decode response: {err}"))
    }

    #[must_use]
    pub fn is_no_rows(&self) -> bool {
        self.code.as_deref() == Some(NO_ROWS_CODE)
    }

    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        self.code.as_deref() == Some(UNIQUE_VIOLATION_CODE)
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status, Some(401 | 403))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        let error = Self::new(err.to_string());
        match err.status() {
            Some(status) => error.with_status(status.as_u16()),
            None => error,
        }
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Request/response contract of the hosted backend.
///
/// Data operations take the caller's access token, or `None` to act with the
/// public key only.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Base URL public storage objects are served from.
    fn public_url(&self) -> &str;

    // Auth operations
    async fn sign_in_with_password(&self, email: &str, password: &str) -> GatewayResult<Session>;
    async fn get_user(&self, access_token: &str) -> GatewayResult<User>;
    async fn refresh_session(&self, refresh_token: &str) -> GatewayResult<Session>;
    async fn sign_out(&self, access_token: &str) -> GatewayResult<()>;
    async fn update_password(&self, access_token: &str, password: &str) -> GatewayResult<User>;

    // Table operations
    async fn select(&self, auth: Option<&str>, query: &Select) -> GatewayResult<Vec<Row>>;
    async fn insert(&self, auth: Option<&str>, table: &str, rows: &[Row]) -> GatewayResult<()>;
    async fn update(
        &self,
        auth: Option<&str>,
        table: &str,
        values: &Row,
        filters: &[Filter],
    ) -> GatewayResult<()>;
    async fn delete(&self, auth: Option<&str>, table: &str, filters: &[Filter])
    -> GatewayResult<()>;
}
