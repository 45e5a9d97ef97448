use serde::Serialize;

/// Client-side routes. Each maps to exactly one top-level view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    Home,
    Login,
    Dashboard,
    SetPassword,
    CpvCodes,
    Terms,
    Privacy,
    CookiePolicy,
    Gdpr,
}

impl Route {
    pub const ALL: [Route; 9] = [
        Route::Home,
        Route::Login,
        Route::Dashboard,
        Route::SetPassword,
        Route::CpvCodes,
        Route::Terms,
        Route::Privacy,
        Route::CookiePolicy,
        Route::Gdpr,
    ];

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
            Route::SetPassword => "/set-password",
            Route::CpvCodes => "/cpv",
            Route::Terms => "/terms",
            Route::Privacy => "/privacy",
            Route::CookiePolicy => "/cookies",
            Route::Gdpr => "/gdpr",
        }
    }

    #[must_use]
    pub fn from_path(path: &str) -> Option<Route> {
        let path = match path.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        Route::ALL.into_iter().find(|r| r.path() == path)
    }

    /// Views that render without any backend data.
    #[must_use]
    pub fn is_static(self) -> bool {
        matches!(
            self,
            Route::Terms | Route::Privacy | Route::CookiePolicy | Route::Gdpr
        )
    }
}

/// A navigation the caller should perform, optionally after a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub to: Route,
    pub path: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_ms: Option<u64>,
}

impl Redirect {
    #[must_use]
    pub fn now(to: Route) -> Self {
        Self {
            to,
            path: to.path(),
            after_ms: None,
        }
    }

    #[must_use]
    pub fn after(to: Route, delay_ms: u64) -> Self {
        Self {
            to,
            path: to.path(),
            after_ms: Some(delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_round_trip() {
        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
        assert_eq!(Route::from_path("/dashboard/"), Some(Route::Dashboard));
        assert_eq!(Route::from_path(""), Some(Route::Home));
        assert_eq!(Route::from_path("/admin"), None);
    }

    #[test]
    fn test_static_pages() {
        let statics: Vec<_> = Route::ALL.into_iter().filter(|r| r.is_static()).collect();
        assert_eq!(
            statics,
            vec![Route::Terms, Route::Privacy, Route::CookiePolicy, Route::Gdpr]
        );
    }
}
