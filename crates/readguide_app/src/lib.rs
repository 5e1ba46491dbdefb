//! Readguide application: HTTP batch server, terminal watcher and their configuration.
pub mod cli;
pub mod config;
pub mod server;
pub mod watch;

pub use config::{load_config, AppConfig, ConfigError, DEFAULT_CONFIG_FILE};
pub use server::{router, serve, shutdown_signal, ApiError, AppState, EXPERTS_PATH};
pub use watch::{watch_batch, WatchArgs, WatchExit};
