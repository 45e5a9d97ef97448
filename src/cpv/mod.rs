//! CPV code lookup and the profile-to-code association.

mod association;
mod debounce;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use association::{
    CodeDiff, add_code, list_profile_codes, reconcile, remove_code, resolve_profile_id,
    selected_codes,
};
pub use debounce::Debouncer;

use crate::gateway::{Gateway, GatewayResult, Select};
use crate::types::{CPV_CODES_TABLE, CpvCode};

/// Quiet period after the last keystroke before a search is sent.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Limits for server-side catalog searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPreset {
    pub min_chars: usize,
    pub limit: usize,
}

impl SearchPreset {
    /// Full code browser page.
    pub const BROWSER: SearchPreset = SearchPreset {
        min_chars: 3,
        limit: 100,
    };

    /// Short list on the landing page.
    pub const PREVIEW: SearchPreset = SearchPreset {
        min_chars: 0,
        limit: 10,
    };

    #[must_use]
    pub fn accepts(&self, term: &str) -> bool {
        term.trim().chars().count() >= self.min_chars
    }
}

/// Searches descriptions on the server, ordered by code. Returns `None`
/// without issuing a request when the term is below the preset's minimum.
pub async fn search_codes(
    gateway: &Gateway,
    term: &str,
    preset: SearchPreset,
) -> GatewayResult<Option<Vec<CpvCode>>> {
    if !preset.accepts(term) {
        return Ok(None);
    }

    let query = Select::from(CPV_CODES_TABLE)
        .columns("CODE, EN")
        .contains("EN", term.trim())
        .order("CODE", true)
        .limit(preset.limit);

    gateway.fetch(&query).await.map(Some)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    TooShort,
    /// A newer input arrived during the quiet period.
    Superseded,
    Results(Vec<CpvCode>),
}

/// Debounced search-as-you-type.
pub struct CpvSearch {
    debouncer: Debouncer,
    preset: SearchPreset,
}

impl CpvSearch {
    #[must_use]
    pub fn new(preset: SearchPreset) -> Self {
        Self {
            debouncer: Debouncer::new(SEARCH_DEBOUNCE),
            preset,
        }
    }

    pub async fn input(&self, gateway: &Gateway, term: &str) -> GatewayResult<SearchOutcome> {
        if !self.debouncer.settle().await {
            return Ok(SearchOutcome::Superseded);
        }
        Ok(match search_codes(gateway, term, self.preset).await? {
            Some(codes) => SearchOutcome::Results(codes),
            None => SearchOutcome::TooShort,
        })
    }
}

/// The whole catalog, fetched once and filtered locally.
#[derive(Debug, Clone, Default)]
pub struct CpvCatalog {
    codes: Vec<CpvCode>,
}

impl CpvCatalog {
    pub async fn load(gateway: &Gateway) -> GatewayResult<Self> {
        let codes = gateway
            .fetch(&Select::from(CPV_CODES_TABLE).columns("CODE, EN"))
            .await?;
        Ok(Self { codes })
    }

    #[must_use]
    pub fn from_codes(codes: Vec<CpvCode>) -> Self {
        Self { codes }
    }

    /// Case-insensitive substring match over code and description, in
    /// catalog order.
    #[must_use]
    pub fn filter(&self, term: &str) -> Vec<&CpvCode> {
        let needle = term.trim().to_lowercase();
        self.codes
            .iter()
            .filter(|c| {
                needle.is_empty()
                    || c.code.to_lowercase().contains(&needle)
                    || c.description.to_lowercase().contains(&needle)
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Ordered codes picked by the user; a code appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Selection(Vec<String>);

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `code` unless already present. Returns whether it was added.
    pub fn add(&mut self, code: &str) -> bool {
        let code = code.trim();
        if code.is_empty() || self.contains(code) {
            return false;
        }
        self.0.push(code.to_string());
        true
    }

    pub fn remove(&mut self, code: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|c| c != code);
        self.0.len() != before
    }

    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|c| c == code)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Selection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut selection = Selection::new();
        for code in iter {
            selection.add(code.as_ref());
        }
        selection
    }
}

impl From<Vec<String>> for Selection {
    fn from(codes: Vec<String>) -> Self {
        codes.into_iter().collect()
    }
}

impl From<Selection> for Vec<String> {
    fn from(selection: Selection) -> Self {
        selection.0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gateway::SqliteBackend;

    fn code(code: &str, description: &str) -> CpvCode {
        CpvCode {
            code: code.into(),
            description: description.into(),
        }
    }

    fn catalog() -> Vec<CpvCode> {
        vec![
            code("45000000-7", "Construction work"),
            code("03000000-1", "Agricultural, farming, fishing, forestry and related products"),
            code("44000000-0", "Construction structures and materials"),
            code("72000000-5", "IT services: consulting, software development"),
        ]
    }

    fn gateway() -> Gateway {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        backend.initialize().unwrap();
        backend.import_cpv_codes(&catalog()).unwrap();
        Gateway::new(backend)
    }

    #[test]
    fn test_catalog_filter_keeps_catalog_order() {
        let catalog = CpvCatalog::from_codes(catalog());
        let found: Vec<_> = catalog
            .filter("CONSTRUCTION")
            .into_iter()
            .map(|c| c.code.as_str())
            .collect();
        assert_eq!(found, vec!["45000000-7", "44000000-0"]);

        assert_eq!(catalog.filter("7200").len(), 1);
        assert_eq!(catalog.filter("").len(), 4);
    }

    #[tokio::test]
    async fn test_server_search_orders_by_code() {
        let gateway = gateway();
        let found = search_codes(&gateway, "construction", SearchPreset::BROWSER)
            .await
            .unwrap()
            .unwrap();
        let codes: Vec<_> = found.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["44000000-0", "45000000-7"]);
    }

    #[tokio::test]
    async fn test_short_term_skips_request() {
        // A gateway whose backend rejects everything: a request would error.
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        let gateway = Gateway::new(backend);

        let result = search_codes(&gateway, "co", SearchPreset::BROWSER).await.unwrap();
        assert_eq!(result, None);
        assert!(search_codes(&gateway, "con", SearchPreset::BROWSER).await.is_err());
    }

    #[tokio::test]
    async fn test_preview_limit() {
        let gateway = gateway();
        let found = search_codes(&gateway, "", SearchPreset::PREVIEW)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_search_supersedes_earlier_input() {
        let gateway = gateway();
        let search = CpvSearch::new(SearchPreset::BROWSER);

        let (first, second) = tokio::join!(search.input(&gateway, "cons"), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            search.input(&gateway, "construction").await
        });

        assert_eq!(first.unwrap(), SearchOutcome::Superseded);
        match second.unwrap() {
            SearchOutcome::Results(codes) => assert_eq!(codes.len(), 2),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_selection_rejects_duplicates() {
        let mut selection = Selection::new();
        assert!(selection.add("45000000-7"));
        assert!(!selection.add("45000000-7"));
        assert!(selection.add("03000000-1"));
        assert_eq!(selection.as_slice(), &["45000000-7", "03000000-1"]);

        assert!(selection.remove("45000000-7"));
        assert!(!selection.remove("45000000-7"));

        let from_dupes: Selection = ["a", "b", "a"].into_iter().collect();
        assert_eq!(from_dupes.len(), 2);
    }
}
