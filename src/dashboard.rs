//! Data assembly for the signed-in dashboard.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpv;
use crate::forms::EditProfileForm;
use crate::gateway::{Gateway, GatewayResult, Select};
use crate::routes::{Redirect, Route};
use crate::types::{
    CpvCode, NOTICE_MANIFEST_TABLE, NOTICE_SUMMARIES_TABLE, NewProfile, NoticeDetails,
    NoticeManifest, NoticeSummary, PROFILES_TABLE, Profile, TRIAL_SUBSCRIPTIONS_TABLE,
    TrialSubscription, USER_NOTICES_TABLE, User, UserNotice,
};

pub const PROFILE_LOAD_FAILED: &str = "Failed to load user profile";
pub const TRIAL_EXPIRED: &str =
    "Your trial subscription has expired, please contact support for a subscription";
pub const NOT_SET: &str = "Not set";

const TED_NOTICE_URL: &str = "https://ted.europa.eu/en/notice/-/detail/";
const PDF_OBJECT_PATH: &str = "/storage/v1/object/public/ted-pdf";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Overview,
    Profile,
    Edit,
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("not signed in")]
    Unauthenticated(Redirect),

    #[error("Failed to load user profile")]
    ProfileLoad,
}

/// One labelled line of the read-only profile view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileField {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub user: User,
    pub tab: Tab,
    pub profile: Profile,
    pub profile_fields: Vec<ProfileField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_notice: Option<&'static str>,
    pub notices: Vec<NoticeSummary>,
    pub cpv_codes: Vec<CpvCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit: Option<EditProfileForm>,
}

/// Loads everything the dashboard shows for the signed-in user.
///
/// Only the user and the profile are required; trial status, notices and
/// CPV codes degrade to empty with a warning.
pub async fn load(gateway: &Gateway, tab: Tab) -> Result<Dashboard, DashboardError> {
    let user = gateway.get_user().await.map_err(|e| {
        tracing::debug!("Dashboard without user: {e}");
        DashboardError::Unauthenticated(Redirect::now(Route::Login))
    })?;

    let profile = load_profile(gateway, &user.email).await.map_err(|e| {
        tracing::error!("Error fetching user profile: {e}");
        DashboardError::ProfileLoad
    })?;

    let trial_notice = trial_notice(gateway, &user.email, Utc::now().date_naive())
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Error fetching trial subscription: {e}");
            None
        });

    let notices = load_notices(gateway, &user.email).await.unwrap_or_else(|e| {
        tracing::warn!("Error fetching notices: {e}");
        Vec::new()
    });

    let cpv_codes = match profile.id {
        Some(id) => cpv::list_profile_codes(gateway, id).await.unwrap_or_else(|e| {
            tracing::warn!("Error fetching CPV codes: {e}");
            Vec::new()
        }),
        None => Vec::new(),
    };

    let edit = (tab == Tab::Edit).then(|| EditProfileForm::from_profile(&profile, &cpv_codes));

    Ok(Dashboard {
        profile_fields: profile_fields(&profile),
        user,
        tab,
        profile,
        trial_notice,
        notices,
        cpv_codes,
        edit,
    })
}

/// Fetches the profile, creating a row holding only the email when the
/// user has none yet.
pub async fn load_profile(gateway: &Gateway, email: &str) -> GatewayResult<Profile> {
    let query = Select::from(PROFILES_TABLE).eq("email", email);

    match gateway.fetch_one(&query).await {
        Err(e) if e.is_no_rows() => {
            tracing::info!("Creating default profile");
            gateway
                .insert(
                    PROFILES_TABLE,
                    &[NewProfile {
                        email: email.to_string(),
                    }],
                )
                .await?;
            gateway.fetch_one(&query).await
        }
        other => other,
    }
}

/// The expiry message when the user's trial ended before `today`.
pub async fn trial_notice(
    gateway: &Gateway,
    email: &str,
    today: NaiveDate,
) -> GatewayResult<Option<&'static str>> {
    let trial: Option<TrialSubscription> = gateway
        .fetch_optional(&Select::from(TRIAL_SUBSCRIPTIONS_TABLE).eq("email", email))
        .await?;
    Ok(trial
        .filter(|t| t.is_expired(today))
        .map(|_| TRIAL_EXPIRED))
}

/// Summaries of the notices matched to `email`, newest first.
pub async fn load_notices(gateway: &Gateway, email: &str) -> GatewayResult<Vec<NoticeSummary>> {
    let matched: Vec<UserNotice> = gateway
        .fetch(
            &Select::from(USER_NOTICES_TABLE)
                .columns("email, notice_id")
                .eq("email", email),
        )
        .await?;
    if matched.is_empty() {
        return Ok(Vec::new());
    }

    gateway
        .fetch(
            &Select::from(NOTICE_SUMMARIES_TABLE)
                .columns("notice_id, created_at, summary")
                .in_list("notice_id", matched.iter().map(|n| n.notice_id.as_str()))
                .order("created_at", false),
        )
        .await
}

pub async fn notice_details(gateway: &Gateway, notice_id: &str) -> GatewayResult<NoticeDetails> {
    let summary: NoticeSummary = gateway
        .fetch_one(&Select::from(NOTICE_SUMMARIES_TABLE).eq("notice_id", notice_id))
        .await?;
    let manifest: Option<NoticeManifest> = gateway
        .fetch_optional(&Select::from(NOTICE_MANIFEST_TABLE).eq("notice_id", notice_id))
        .await?;
    let manifest = manifest.unwrap_or_else(|| NoticeManifest {
        notice_id: notice_id.to_string(),
        storage_path: None,
        pdf_path: None,
        cpv_prefix: None,
    });

    let pdf_url = manifest
        .pdf_path
        .as_deref()
        .map(|path| pdf_url(gateway.backend().public_url(), path));

    Ok(NoticeDetails {
        notice_url: format!("{TED_NOTICE_URL}{}", summary.notice_id),
        notice_id: summary.notice_id,
        created_at: summary.created_at,
        summary: summary.summary,
        storage_path: manifest.storage_path,
        pdf_path: manifest.pdf_path,
        cpv_prefix: manifest.cpv_prefix,
        pdf_url,
    })
}

fn pdf_url(public_url: &str, pdf_path: &str) -> String {
    let path = if pdf_path.starts_with('/') {
        pdf_path.to_string()
    } else {
        format!("/{pdf_path}")
    };
    format!("{}{PDF_OBJECT_PATH}{path}", public_url.trim_end_matches('/'))
}

/// Read-only profile lines; absent attributes read "Not set".
#[must_use]
pub fn profile_fields(profile: &Profile) -> Vec<ProfileField> {
    let field = |label, value: &Option<String>| ProfileField {
        label,
        value: value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(NOT_SET)
            .to_string(),
    };

    vec![
        ProfileField {
            label: "Email",
            value: profile.email.clone(),
        },
        field("Name", &profile.name),
        field("Telephone", &profile.telephone),
        field("Company", &profile.company_name),
        field("Company description", &profile.company_description),
        field("Source app", &profile.source_app),
        field("Country", &profile.country),
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::gateway::{Backend, Row, SqliteBackend};

    async fn signed_in() -> (Arc<SqliteBackend>, Gateway) {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        backend.initialize().unwrap();
        backend.create_user("jane@acme.test", Some("password1")).unwrap();
        let gateway = Gateway::new(backend.clone());
        gateway
            .sign_in_with_password("jane@acme.test", "password1")
            .await
            .unwrap();
        (backend, gateway)
    }

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn test_without_user_redirects_to_login() {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        backend.initialize().unwrap();
        let gateway = Gateway::new(backend);

        match load(&gateway, Tab::Overview).await {
            Err(DashboardError::Unauthenticated(redirect)) => {
                assert_eq!(redirect.to, Route::Login);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_default_profile_created() {
        let (_, gateway) = signed_in().await;
        let dashboard = load(&gateway, Tab::Profile).await.unwrap();

        assert_eq!(dashboard.profile.email, "jane@acme.test");
        assert!(dashboard.profile.id.is_some());
        assert_eq!(dashboard.profile_fields[0].value, "jane@acme.test");
        assert!(dashboard.profile_fields[1..].iter().all(|f| f.value == NOT_SET));
        assert!(dashboard.trial_notice.is_none());
        assert!(dashboard.notices.is_empty());
        assert!(dashboard.edit.is_none());

        // Loading again reuses the row.
        let again = load(&gateway, Tab::Edit).await.unwrap();
        assert_eq!(again.profile.id, dashboard.profile.id);
        assert!(again.edit.is_some());
    }

    #[tokio::test]
    async fn test_expired_trial_notice() {
        let (_, gateway) = signed_in().await;
        gateway
            .backend()
            .insert(
                None,
                TRIAL_SUBSCRIPTIONS_TABLE,
                &[row(json!({
                    "email": "jane@acme.test",
                    "name": "Jane",
                    "start_date": "2024-01-01",
                    "end_date": "2024-01-15",
                }))],
            )
            .await
            .unwrap();

        let today = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        let notice = trial_notice(&gateway, "jane@acme.test", today).await.unwrap();
        assert_eq!(notice, Some(TRIAL_EXPIRED));

        let last_day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(
            trial_notice(&gateway, "jane@acme.test", last_day).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_notices_newest_first_and_details() {
        let (backend, gateway) = signed_in().await;
        backend
            .insert(
                None,
                USER_NOTICES_TABLE,
                &[
                    row(json!({ "email": "jane@acme.test", "notice_id": "100-2024" })),
                    row(json!({ "email": "jane@acme.test", "notice_id": "200-2024" })),
                    row(json!({ "email": "other@acme.test", "notice_id": "300-2024" })),
                ],
            )
            .await
            .unwrap();
        backend
            .insert(
                None,
                NOTICE_SUMMARIES_TABLE,
                &[
                    row(json!({ "notice_id": "100-2024", "created_at": "2024-03-01T10:00:00Z", "summary": "Old" })),
                    row(json!({ "notice_id": "200-2024", "created_at": "2024-04-01T10:00:00Z", "summary": "New" })),
                    row(json!({ "notice_id": "300-2024", "created_at": "2024-05-01T10:00:00Z" })),
                ],
            )
            .await
            .unwrap();
        backend
            .insert(
                None,
                NOTICE_MANIFEST_TABLE,
                &[row(json!({
                    "notice_id": "200-2024",
                    "storage_path": "2024/04/200-2024.xml",
                    "pdf_path": "/2024/04/200-2024.pdf",
                    "cpv_prefix": "45",
                }))],
            )
            .await
            .unwrap();

        let notices = load_notices(&gateway, "jane@acme.test").await.unwrap();
        let ids: Vec<_> = notices.iter().map(|n| n.notice_id.as_str()).collect();
        assert_eq!(ids, vec!["200-2024", "100-2024"]);

        let details = notice_details(&gateway, "200-2024").await.unwrap();
        assert_eq!(details.summary.as_deref(), Some("New"));
        assert_eq!(
            details.notice_url,
            "https://ted.europa.eu/en/notice/-/detail/200-2024"
        );
        assert_eq!(
            details.pdf_url.as_deref(),
            Some("http://localhost:54321/storage/v1/object/public/ted-pdf/2024/04/200-2024.pdf")
        );

        let bare = notice_details(&gateway, "100-2024").await.unwrap();
        assert_eq!(bare.pdf_url, None);
        assert!(notice_details(&gateway, "999-2024").await.unwrap_err().is_no_rows());
    }

    #[test]
    fn test_tab_names() {
        assert_eq!(serde_json::to_value(Tab::Edit).unwrap(), "edit");
        assert_eq!(Tab::default(), Tab::Overview);
    }
}
