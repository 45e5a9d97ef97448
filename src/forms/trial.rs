use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::validation::{is_valid_email, non_empty};
use super::{FieldErrors, FormError};
use crate::gateway::{Gateway, Select};
use crate::types::{
    NewTrialSubscription, SOURCE_APP, TRIAL_SUBSCRIPTIONS_TABLE, TrialSubscription,
};

pub const DEFAULT_COUNTRY: &str = "The Netherlands";
pub const COUNTRIES: &[&str] = &["The Netherlands", "Belgium", "Germany"];

pub const ALREADY_USED: &str = "This email has already been used for a trial subscription.";
pub const SUBMIT_FAILED: &str = "An error occurred while submitting the form. Please try again.";

fn default_country() -> String {
    DEFAULT_COUNTRY.to_string()
}

/// Request for a free trial.
#[derive(Debug, Clone, Deserialize)]
pub struct TrialForm {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub telephone: String,
    pub company_name: String,
    pub company_description: String,
    #[serde(default = "default_country")]
    pub country: String,
}

impl TrialForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        match non_empty(&self.email) {
            None => {
                errors.insert("email", "Email is required".to_string());
            }
            Some(email) if !is_valid_email(&email) => {
                errors.insert("email", "Email is invalid".to_string());
            }
            Some(_) => {}
        }
        if non_empty(&self.name).is_none() {
            errors.insert("name", "Name is required".to_string());
        }
        if non_empty(&self.company_name).is_none() {
            errors.insert("company_name", "Company name is required".to_string());
        }
        if non_empty(&self.company_description).is_none() {
            errors.insert(
                "company_description",
                "Company description is required".to_string(),
            );
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn to_row(&self) -> NewTrialSubscription {
        NewTrialSubscription {
            email: self.email.trim().to_string(),
            name: self.name.trim().to_string(),
            telephone: non_empty(&self.telephone),
            company_name: self.company_name.trim().to_string(),
            company_description: self.company_description.trim().to_string(),
            country: non_empty(&self.country).unwrap_or_else(default_country),
            source_app: SOURCE_APP.to_string(),
        }
    }

    /// Validates, checks for an earlier request, then inserts the trial row.
    ///
    /// The lookup is only a fast path for a friendlier message; the backend's
    /// unique constraint on `email` is what prevents duplicates.
    pub async fn submit<F: FnOnce()>(&self, gateway: &Gateway, on_success: F) -> Result<(), FormError> {
        self.validate().map_err(FormError::Invalid)?;
        let row = self.to_row();

        let existing = gateway
            .fetch_optional::<TrialSubscription>(
                &Select::from(TRIAL_SUBSCRIPTIONS_TABLE).eq("email", row.email.as_str()),
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to look up trial subscription: {e}");
                FormError::message(SUBMIT_FAILED)
            })?;

        if let Some(existing) = existing {
            return Err(FormError::Message(format!(
                "You have already requested a Trial subscription on {}",
                format_request_date(existing.created_at)
            )));
        }

        if let Err(e) = gateway.insert(TRIAL_SUBSCRIPTIONS_TABLE, &[row]).await {
            if e.is_unique_violation() {
                return Err(FormError::message(ALREADY_USED));
            }
            tracing::error!("Failed to insert trial subscription: {e}");
            return Err(FormError::message(SUBMIT_FAILED));
        }

        tracing::info!("Trial subscription requested");
        on_success();
        Ok(())
    }
}

/// `May 3, 2025, 2:05 PM`
#[must_use]
pub fn format_request_date(at: DateTime<Utc>) -> String {
    at.format("%b %-d, %Y, %-I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::{Value, json};

    use super::*;
    use crate::gateway::{Backend, Filter, GatewayResult, Row, SqliteBackend};
    use crate::types::{Session, User};

    /// Local backend whose reads never find anything, so a submit always
    /// gets past the lookup and only the insert can catch a duplicate.
    struct BlindReads(SqliteBackend);

    #[async_trait]
    impl Backend for BlindReads {
        fn public_url(&self) -> &str {
            self.0.public_url()
        }
        async fn sign_in_with_password(&self, email: &str, password: &str) -> GatewayResult<Session> {
            self.0.sign_in_with_password(email, password).await
        }
        async fn get_user(&self, access_token: &str) -> GatewayResult<User> {
            self.0.get_user(access_token).await
        }
        async fn refresh_session(&self, refresh_token: &str) -> GatewayResult<Session> {
            self.0.refresh_session(refresh_token).await
        }
        async fn sign_out(&self, access_token: &str) -> GatewayResult<()> {
            self.0.sign_out(access_token).await
        }
        async fn update_password(&self, access_token: &str, password: &str) -> GatewayResult<User> {
            self.0.update_password(access_token, password).await
        }
        async fn select(&self, _auth: Option<&str>, _query: &Select) -> GatewayResult<Vec<Row>> {
            Ok(Vec::new())
        }
        async fn insert(&self, auth: Option<&str>, table: &str, rows: &[Row]) -> GatewayResult<()> {
            self.0.insert(auth, table, rows).await
        }
        async fn update(
            &self,
            auth: Option<&str>,
            table: &str,
            values: &Row,
            filters: &[Filter],
        ) -> GatewayResult<()> {
            self.0.update(auth, table, values, filters).await
        }
        async fn delete(&self, auth: Option<&str>, table: &str, filters: &[Filter]) -> GatewayResult<()> {
            self.0.delete(auth, table, filters).await
        }
    }

    fn form() -> TrialForm {
        TrialForm {
            email: "a@b.com".into(),
            name: "Jane".into(),
            telephone: String::new(),
            company_name: "Acme".into(),
            company_description: "widgets".into(),
            country: DEFAULT_COUNTRY.into(),
        }
    }

    #[test]
    fn test_valid_form() {
        assert!(form().validate().is_ok());
    }

    #[test]
    fn test_field_errors() {
        let form = TrialForm {
            email: "not-an-email".into(),
            name: " ".into(),
            company_name: String::new(),
            ..form()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors["email"], "Email is invalid");
        assert_eq!(errors["name"], "Name is required");
        assert_eq!(errors["company_name"], "Company name is required");
        assert!(!errors.contains_key("company_description"));
    }

    #[test]
    fn test_missing_email() {
        let form = TrialForm {
            email: String::new(),
            ..form()
        };
        assert_eq!(form.validate().unwrap_err()["email"], "Email is required");
    }

    #[test]
    fn test_row_defaults() {
        let form = TrialForm {
            country: String::new(),
            telephone: "  ".into(),
            ..form()
        };
        let row = form.to_row();
        assert_eq!(row.country, DEFAULT_COUNTRY);
        assert_eq!(row.telephone, None);
        assert_eq!(row.source_app, "TenderSync");
    }

    #[test]
    fn test_format_request_date() {
        let at = Utc.with_ymd_and_hms(2025, 5, 3, 14, 5, 0).unwrap();
        assert_eq!(format_request_date(at), "May 3, 2025, 2:05 PM");
    }

    #[tokio::test]
    async fn test_unique_constraint_catches_missed_duplicate() {
        let local = SqliteBackend::open_in_memory().unwrap();
        local.initialize().unwrap();
        let Value::Object(existing) = json!({ "email": "a@b.com", "name": "Jane" }) else {
            unreachable!()
        };
        local
            .insert(None, TRIAL_SUBSCRIPTIONS_TABLE, &[existing])
            .await
            .unwrap();

        let gateway = Gateway::new(Arc::new(BlindReads(local)));
        let mut succeeded = false;
        let err = form()
            .submit(&gateway, || succeeded = true)
            .await
            .unwrap_err();

        assert!(matches!(err, FormError::Message(ref m) if m == ALREADY_USED));
        assert!(!succeeded);
    }
}
