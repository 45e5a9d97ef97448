//! # TenderSync
//!
//! Application core and HTTP backend for the TenderSync tender-intelligence
//! site: trial and contact forms, CPV code search, the signed-in dashboard and
//! the invite/password flow. All data lives behind a hosted
//! database-and-auth service reached through [`gateway::Gateway`]; a SQLite
//! implementation of the same contract serves offline development and tests.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tendersync::gateway::SqliteBackend;
//! use tendersync::server::{AppState, create_router};
//!
//! let backend = SqliteBackend::new("./data/tendersync.db").unwrap();
//! backend.initialize().unwrap();
//!
//! let router = create_router(Arc::new(AppState::new(Arc::new(backend))));
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `tendersync` binary. Disable with `default-features = false`.

pub mod config;
pub mod cpv;
pub mod dashboard;
pub mod error;
pub mod forms;
pub mod gateway;
pub mod modal;
pub mod routes;
pub mod server;
pub mod session;
pub mod types;
