//! Legal pages. They carry no data, only a title and their route.

use serde::Serialize;

use crate::routes::Route;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StaticPage {
    pub route: Route,
    pub path: &'static str,
    pub title: &'static str,
}

fn title(route: Route) -> Option<&'static str> {
    match route {
        Route::Terms => Some("Terms of Service"),
        Route::Privacy => Some("Privacy Policy"),
        Route::CookiePolicy => Some("Cookie Policy"),
        Route::Gdpr => Some("GDPR"),
        _ => None,
    }
}

/// Looks up a static page by its path without the leading slash.
#[must_use]
pub fn find(slug: &str) -> Option<StaticPage> {
    let route = Route::from_path(&format!("/{slug}")).filter(|r| r.is_static())?;
    Some(StaticPage {
        route,
        path: route.path(),
        title: title(route)?,
    })
}

/// Route table entry as exposed to clients.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RouteEntry {
    pub route: Route,
    pub path: &'static str,
    #[serde(rename = "static")]
    pub is_static: bool,
}

#[must_use]
pub fn route_table() -> Vec<RouteEntry> {
    Route::ALL
        .into_iter()
        .map(|route| RouteEntry {
            route,
            path: route.path(),
            is_static: route.is_static(),
        })
        .collect()
}
