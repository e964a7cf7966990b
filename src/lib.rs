use anyhow::Result;
use dotenvy::dotenv;

pub mod api;
pub mod chat;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod interface;
pub mod logger;
pub mod utils;

/// Run the application: load `.env`, load config, and start the terminal host
/// for the chat widget and the dashboard.
pub async fn run() -> Result<()> {
    // Load environment variables from .env (AGRO_SESSION_COOKIE)
    dotenv().ok();

    let config = config::AppConfig::load();
    interface::start_repl(&config).await
}

// Re-exports for library consumers: common useful types
pub use api::{ApiClient, ChatBackend, DataBackend};
pub use chat::{ChatSession, ChatView, HistoryStore};
pub use config::AppConfig;
pub use dashboard::{Dashboard, RefreshMode, RefreshTimer};
pub use error::ApiError;
