//! Form components: local field state, presence/format validation and the
//! gateway writes issued on submit.

pub mod contact;
pub mod password;
pub mod profile;
pub mod trial;
mod validation;

use std::collections::BTreeMap;

use thiserror::Error;

pub use contact::{ContactForm, ContactOutcome};
pub use password::{InviteFailure, PasswordForm, accept_invite};
pub use profile::EditProfileForm;
pub use trial::TrialForm;
pub use validation::{is_valid_email, non_empty};

/// Field name to message, for fields that failed validation.
pub type FieldErrors = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// Submission was blocked before any gateway call.
    #[error("invalid fields: {}", .0.keys().copied().collect::<Vec<_>>().join(", "))]
    Invalid(FieldErrors),

    /// A single message for the whole form.
    #[error("{0}")]
    Message(String),
}

impl FormError {
    pub fn message(message: impl Into<String>) -> Self {
        FormError::Message(message.into())
    }
}
