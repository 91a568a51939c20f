pub mod config;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod server;

pub use config::AppConfig;
pub use server::{AppState, ServerBuilder, TenantForgeServer, build_app, build_state};
