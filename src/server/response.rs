use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::forms::{FieldErrors, FormError};
use crate::gateway::GatewayError;
use crate::routes::Redirect;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            data: None,
            error: Some(message.into()),
        }
    }
}

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Per-field validation messages.
    pub fields: Option<FieldErrors>,
    /// Navigation the client should perform after showing the error.
    pub redirect: Option<Redirect>,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            fields: None,
            redirect: None,
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    #[must_use]
    pub fn with_redirect(mut self, redirect: Redirect) -> Self {
        self.redirect = Some(redirect);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "data": null, "error": self.message });
        if let Some(fields) = self.fields {
            body["fields"] = json!(fields);
        }
        if let Some(redirect) = self.redirect {
            body["redirect"] = json!(redirect);
        }
        (self.status, Json(body)).into_response()
    }
}

impl From<FormError> for ApiError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::Invalid(fields) => Self {
                fields: Some(fields),
                ..Self::new(StatusCode::UNPROCESSABLE_ENTITY, "Please correct the highlighted fields")
            },
            FormError::Message(message) => Self::bad_request(message),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        if err.is_no_rows() {
            Self::not_found(err.message)
        } else if err.is_unauthorized() {
            Self::unauthorized(err.message)
        } else if err.is_unique_violation() {
            Self::conflict(err.message)
        } else {
            Self::new(StatusCode::BAD_GATEWAY, err.message)
        }
    }
}

/// Extension trait for converting gateway results to API errors with a custom message.
pub trait GatewayResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> GatewayResultExt<T> for Result<T, GatewayError> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::error!("{message}: {e}");
            let status = ApiError::from(e).status;
            ApiError::new(status, message)
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;
    use crate::routes::Route;

    async fn body(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_field_errors_in_envelope() {
        let mut fields = FieldErrors::new();
        fields.insert("email", "Email is required".to_string());

        let (status, json) = body(FormError::Invalid(fields).into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["data"], Value::Null);
        assert_eq!(json["fields"]["email"], "Email is required");
    }

    #[tokio::test]
    async fn test_redirect_in_envelope() {
        let err = ApiError::bad_request("No access token found in URL")
            .with_redirect(Redirect::after(Route::Login, 3000));
        let (_, json) = body(err).await;
        assert_eq!(json["redirect"]["path"], "/login");
        assert_eq!(json["redirect"]["after_ms"], 3000);
    }

    #[test]
    fn test_gateway_status_mapping() {
        assert_eq!(ApiError::from(GatewayError::no_rows()).status, StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(GatewayError::unique_violation("dup")).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(GatewayError::new("boom")).status,
            StatusCode::BAD_GATEWAY
        );
    }
}
