use serde::{Deserialize, Serialize};

use crate::cpv::SearchPreset;
use crate::dashboard::Tab;
use crate::routes::Redirect;
use crate::session::{NavAction, SessionState};
use crate::types::CpvCode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    #[default]
    Browser,
    Preview,
}

impl From<PresetName> for SearchPreset {
    fn from(name: PresetName) -> Self {
        match name {
            PresetName::Browser => SearchPreset::BROWSER,
            PresetName::Preview => SearchPreset::PREVIEW,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CpvSearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub preset: PresetName,
}

#[derive(Debug, Serialize)]
pub struct CpvSearchResponse {
    /// `false` when the term was too short and no search ran.
    pub searched: bool,
    pub codes: Vec<CpvCode>,
}

/// Result of a keystroke in the debounced selector search.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SelectorSearchResponse {
    TooShort,
    Superseded,
    Results { codes: Vec<SelectorCode> },
}

#[derive(Debug, Serialize)]
pub struct SelectorCode {
    #[serde(flatten)]
    pub code: CpvCode,
    pub selected: bool,
}

#[derive(Debug, Serialize)]
pub struct TrialOptionsResponse {
    pub default_country: &'static str,
    pub countries: &'static [&'static str],
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub link: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub state: SessionState,
    pub nav_actions: &'static [NavAction],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_notice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Redirect>,
}

impl SessionResponse {
    #[must_use]
    pub fn new(state: SessionState) -> Self {
        Self {
            session_id: None,
            nav_actions: state.nav_actions(),
            state,
            trial_notice: None,
            redirect: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    pub redirect: Redirect,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    #[serde(default)]
    pub tab: Tab,
}

#[derive(Debug, Deserialize)]
pub struct AddCodeRequest {
    pub code: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}
