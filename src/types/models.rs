use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const PROFILES_TABLE: &str = "t_user_profiles";
pub const CPV_CODES_TABLE: &str = "t_cpv_codes";
pub const PROFILE_CPV_CODES_TABLE: &str = "t_user_profile_cpv_codes";
pub const TRIAL_SUBSCRIPTIONS_TABLE: &str = "t_trial_subscriptions";
pub const CONTACT_REQUESTS_TABLE: &str = "t_contact_requests";
pub const USER_NOTICES_TABLE: &str = "t_user_notices";
pub const NOTICE_SUMMARIES_TABLE: &str = "notice_summaries";
pub const NOTICE_MANIFEST_TABLE: &str = "ted_manifest";

/// Source tag written on every row this application creates.
pub const SOURCE_APP: &str = "TenderSync";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: User,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub telephone: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub company_description: Option<String>,
    #[serde(default)]
    pub source_app: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Row written when a signed-in user has no profile yet.
#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub email: String,
}

/// Columns the edit-profile form is allowed to change.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub telephone: Option<String>,
    pub company_name: Option<String>,
    pub company_description: Option<String>,
    pub source_app: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpvCode {
    #[serde(rename = "CODE")]
    pub code: String,
    #[serde(rename = "EN")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpvAssociation {
    pub user_profile_id: i64,
    pub cpv_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialSubscription {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub source_app: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl TrialSubscription {
    #[must_use]
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.end_date.is_some_and(|end| end < today)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTrialSubscription {
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telephone: Option<String>,
    pub company_name: String,
    pub company_description: String,
    pub country: String,
    pub source_app: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewContactRequest {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserNotice {
    pub email: String,
    pub notice_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeSummary {
    pub notice_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeManifest {
    pub notice_id: String,
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub pdf_path: Option<String>,
    #[serde(default)]
    pub cpv_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoticeDetails {
    pub notice_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpv_prefix: Option<String>,
    pub notice_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}
