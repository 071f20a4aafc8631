//! # relay-core
//!
//! Shared vocabulary for the agent relay: identifiers, queued envelopes, the
//! Telegram-shaped chat payloads agents exchange, the HTTP wire types, and the
//! unified error type used by every other crate in the workspace.

pub mod api;
pub mod error;
pub mod types;

pub use error::{RelayError, Result};
pub use types::*;
