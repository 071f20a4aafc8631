use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Token agents must present when no other token is configured.
pub const DEFAULT_AUTH_TOKEN: &str = "elizaos-secure-relay-key";

/// Upper bound for the mailbox timing settings (one year).
pub const MAX_TIMING_SECS: u64 = 365 * 24 * 60 * 60;

/// Root configuration: maps to `relay.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub relay: MailboxConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub listen: String,
    /// Shared secret every agent must present (bearer header, body or query `token`).
    pub auth_token: String,
    /// Enable permissive CORS.
    pub cors: bool,
    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:4000".into(),
            auth_token: DEFAULT_AUTH_TOKEN.into(),
            cors: false,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Replace the port of `listen`, keeping the host.
    pub fn set_port(&mut self, port: u16) {
        let host = match self.listen.rsplit_once(':') {
            Some((host, _)) if !host.is_empty() => host.to_string(),
            _ => "127.0.0.1".to_string(),
        };
        self.listen = format!("{host}:{port}");
    }
}

// ── Mailbox ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// Agents silent for longer than this are evicted.
    pub agent_timeout_secs: u64,
    /// How often the inactivity sweep runs.
    pub sweep_interval_secs: u64,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            agent_timeout_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

// ── Client ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the relay, e.g. "http://127.0.0.1:4000".
    pub url: String,
    /// Default agent identity for CLI commands.
    pub agent_id: Option<String>,
    /// Delay between `getUpdates` polls.
    pub poll_interval_ms: u64,
    /// Delay between heartbeats while joined.
    pub heartbeat_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:4000".into(),
            agent_id: None,
            poll_interval_ms: 1000,
            heartbeat_interval_secs: 30,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl RelayConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Listen address ───
        if self.server.listen.is_empty() {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "listen address is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '127.0.0.1:4000'".into()),
            });
        } else if self.server.listen.parse::<SocketAddr>().is_err() {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: format!("'{}' is not a socket address", self.server.listen),
                severity: WarningSeverity::Error,
                hint: Some("Use 'host:port' with an IP host, e.g. '0.0.0.0:4000'".into()),
            });
        }

        // ── Auth token ───
        if self.server.auth_token.is_empty() {
            warnings.push(ConfigWarning {
                field: "server.auth_token".into(),
                message: "auth token is empty: every agent request would be rejected".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set server.auth_token or RELAY_AUTH_TOKEN".into()),
            });
        } else if self.server.auth_token == DEFAULT_AUTH_TOKEN
            && self.server.listen.starts_with("0.0.0.0")
        {
            warnings.push(ConfigWarning {
                field: "server.auth_token".into(),
                message: "default auth token while the relay is network-accessible".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set a private token with RELAY_AUTH_TOKEN".into()),
            });
        }

        if self.server.max_body_bytes == 0 {
            warnings.push(ConfigWarning {
                field: "server.max_body_bytes".into(),
                message: "max_body_bytes is 0: no request body would fit".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 1048576".into()),
            });
        }

        // ── Mailbox timing ───
        if self.relay.agent_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "relay.agent_timeout_secs".into(),
                message: "timeout is 0: agents would be evicted on every sweep".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 300".into()),
            });
        }
        if self.relay.agent_timeout_secs > MAX_TIMING_SECS {
            warnings.push(ConfigWarning {
                field: "relay.agent_timeout_secs".into(),
                message: format!(
                    "timeout of {}s exceeds the maximum of {MAX_TIMING_SECS}s",
                    self.relay.agent_timeout_secs
                ),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 300".into()),
            });
        }
        if self.relay.sweep_interval_secs > MAX_TIMING_SECS {
            warnings.push(ConfigWarning {
                field: "relay.sweep_interval_secs".into(),
                message: format!(
                    "sweep interval of {}s exceeds the maximum of {MAX_TIMING_SECS}s",
                    self.relay.sweep_interval_secs
                ),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 60".into()),
            });
        }
        if self.relay.sweep_interval_secs == 0 {
            warnings.push(ConfigWarning {
                field: "relay.sweep_interval_secs".into(),
                message: "sweep interval is 0".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 60".into()),
            });
        } else if self.relay.sweep_interval_secs > self.relay.agent_timeout_secs {
            warnings.push(ConfigWarning {
                field: "relay.sweep_interval_secs".into(),
                message: format!(
                    "sweep runs every {}s but agents time out after {}s",
                    self.relay.sweep_interval_secs, self.relay.agent_timeout_secs
                ),
                severity: WarningSeverity::Warning,
                hint: Some("Idle agents will linger past their timeout".into()),
            });
        }

        // ── Client ───
        if self.client.url.is_empty() {
            warnings.push(ConfigWarning {
                field: "client.url".into(),
                message: "relay URL is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'http://127.0.0.1:4000'".into()),
            });
        } else if !self.client.url.starts_with("http://") && !self.client.url.starts_with("https://") {
            warnings.push(ConfigWarning {
                field: "client.url".into(),
                message: format!("'{}' has no http(s) scheme", self.client.url),
                severity: WarningSeverity::Warning,
                hint: Some("Prefix with 'http://'".into()),
            });
        }
        if self.client.heartbeat_interval_secs >= self.relay.agent_timeout_secs {
            warnings.push(ConfigWarning {
                field: "client.heartbeat_interval_secs".into(),
                message: "heartbeats are not more frequent than the agent timeout".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Joined agents may be evicted between heartbeats".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
