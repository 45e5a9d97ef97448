mod account;
mod dashboard;
pub mod dto;
pub mod extract;
pub mod pages;
mod public;
pub mod response;
mod router;
pub mod sessions;

pub use account::account_router;
pub use dashboard::dashboard_router;
pub use public::public_router;
pub use router::{AppState, create_router};
