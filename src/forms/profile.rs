use serde::{Deserialize, Serialize};

use super::FormError;
use super::validation::non_empty;
use crate::cpv::{self, Selection};
use crate::gateway::{Filter, Gateway, GatewayResult};
use crate::types::{CpvCode, PROFILES_TABLE, Profile, ProfileChanges};

pub const UPDATE_FAILED: &str = "Failed to update profile. Please try again.";

/// Editable copy of the signed-in user's profile. The email is the row key
/// and is not part of the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditProfileForm {
    pub name: String,
    pub telephone: String,
    pub company_name: String,
    pub company_description: String,
    pub source_app: String,
    pub country: String,
    pub cpv_codes: Selection,
}

impl EditProfileForm {
    #[must_use]
    pub fn from_profile(profile: &Profile, codes: &[CpvCode]) -> Self {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        Self {
            name: field(&profile.name),
            telephone: field(&profile.telephone),
            company_name: field(&profile.company_name),
            company_description: field(&profile.company_description),
            source_app: field(&profile.source_app),
            country: field(&profile.country),
            cpv_codes: codes.iter().map(|c| c.code.as_str()).collect(),
        }
    }

    fn changes(&self) -> ProfileChanges {
        ProfileChanges {
            name: non_empty(&self.name),
            telephone: non_empty(&self.telephone),
            company_name: non_empty(&self.company_name),
            company_description: non_empty(&self.company_description),
            source_app: non_empty(&self.source_app),
            country: non_empty(&self.country),
        }
    }

    /// Updates the profile row, then brings the CPV associations in line
    /// with the form's selection. The two writes are not atomic: if the
    /// second fails the first stays applied.
    pub async fn submit(&self, gateway: &Gateway, email: &str) -> Result<(), FormError> {
        self.save(gateway, email).await.map_err(|e| {
            tracing::error!("Profile update failed: {e}");
            FormError::message(UPDATE_FAILED)
        })
    }

    async fn save(&self, gateway: &Gateway, email: &str) -> GatewayResult<()> {
        gateway
            .update(PROFILES_TABLE, &self.changes(), &[Filter::eq("email", email)])
            .await?;

        let profile_id = cpv::resolve_profile_id(gateway, email).await?;
        cpv::reconcile(gateway, profile_id, &self.cpv_codes).await?;
        Ok(())
    }
}
