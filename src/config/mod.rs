mod server;

pub use server::{BackendConfig, GatewayConfig, ServerConfig, db_path};
