//! # relay-config
//!
//! Configuration for the relay server and its command-line client. Reads
//! `relay.toml`, then applies environment variable overrides.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{DEFAULT_AUTH_TOKEN, MAX_TIMING_SECS, RelayConfig};
pub use schema::{ClientConfig, ConfigWarning, LoggingConfig, MailboxConfig, ServerConfig, WarningSeverity};
