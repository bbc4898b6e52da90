pub mod activity;
pub mod app;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod history;
pub mod models;
pub mod reminders;
pub mod state;
pub mod storage;
pub mod streak;
pub mod tasks;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use storage::{JsonFileStore, MemoryStore, Store};
