use thiserror::Error;

/// Unified error type for the relay workspace.
#[derive(Error, Debug)]
pub enum RelayError {
    // ── Request errors ─────────────────────────────────────────
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid request: {0}")]
    InvalidBody(String),

    #[error("agent not registered: {0}")]
    UnknownAgent(String),

    #[error("unauthorized")]
    Unauthorized,

    /// A non-success response the client could not map to a specific variant.
    #[error("relay rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    // ── Transport / server errors ──────────────────────────────
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server error: {0}")]
    Server(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl RelayError {
    /// Whether the error was caused by the caller (bad input, unknown agent,
    /// bad credentials) rather than by the relay or the network.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelayError::MissingField(_)
                | RelayError::InvalidBody(_)
                | RelayError::UnknownAgent(_)
                | RelayError::Unauthorized
        )
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
