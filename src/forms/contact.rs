use serde::{Deserialize, Serialize};

use super::validation::{is_valid_email, non_empty};
use super::{FieldErrors, FormError};
use crate::gateway::Gateway;
use crate::routes::{Redirect, Route};
use crate::types::{CONTACT_REQUESTS_TABLE, NewContactRequest};

pub const SENT: &str = "Thank you for your message! We'll get back to you soon.";
pub const SEND_FAILED: &str = "Failed to send message. Please try again.";

/// Delay before returning to the home page after a successful send.
pub const RETURN_HOME_DELAY_MS: u64 = 3000;

#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactOutcome {
    pub message: &'static str,
    pub redirect: Redirect,
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if non_empty(&self.name).is_none() {
            errors.insert("name", "Name is required".to_string());
        }
        match non_empty(&self.email) {
            None => {
                errors.insert("email", "Email is required".to_string());
            }
            Some(email) if !is_valid_email(&email) => {
                errors.insert("email", "Email is invalid".to_string());
            }
            Some(_) => {}
        }
        if non_empty(&self.message).is_none() {
            errors.insert("message", "Message is required".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    pub async fn submit(&self, gateway: &Gateway) -> Result<ContactOutcome, FormError> {
        self.validate().map_err(FormError::Invalid)?;

        let row = NewContactRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: non_empty(&self.phone),
            message: self.message.trim().to_string(),
        };

        gateway
            .insert(CONTACT_REQUESTS_TABLE, &[row])
            .await
            .map_err(|e| {
                tracing::error!("Failed to store contact request: {e}");
                FormError::message(SEND_FAILED)
            })?;

        Ok(ContactOutcome {
            message: SENT,
            redirect: Redirect::after(Route::Home, RETURN_HOME_DELAY_MS),
        })
    }
}
