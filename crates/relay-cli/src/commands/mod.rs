use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use console::style;
use std::path::PathBuf;

use relay_client::RelayClient;
use relay_config::{ConfigLoader, RelayConfig};
use relay_core::{AgentId, RelayError};

mod agent;
mod serve;

/// Relay: in-memory mailbox that lets independent agents talk to each other
#[derive(Parser)]
#[command(name = "relay", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to relay.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve {
        /// Address to listen on (overrides server.listen)
        #[arg(short = 'L', long)]
        listen: Option<String>,
    },
    /// Show relay health and connected agents
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that the relay is reachable
    Ping,
    /// Connect as an agent and print incoming messages until Ctrl-C
    Join {
        /// Agent ID (defaults to client.agent_id)
        #[arg(short, long)]
        agent: Option<String>,
    },
    /// Post a message to every other connected agent
    Send {
        /// Chat ID the message belongs to (number or name)
        #[arg(allow_negative_numbers = true)]
        chat_id: String,
        /// Message text
        text: String,
        /// Agent ID to send as (defaults to client.agent_id)
        #[arg(short, long)]
        agent: Option<String>,
    },
    /// Fetch and drain an agent's pending updates once
    Poll {
        /// Agent ID (defaults to client.agent_id)
        #[arg(short, long)]
        agent: Option<String>,
        /// Acknowledge every update below this ID
        #[arg(short, long, default_value = "0")]
        offset: u64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    pub async fn run(self) -> relay_core::Result<()> {
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };

        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
        if config.logging.format == "json" {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_target(true)
                .init();
        } else if config.logging.format == "compact" {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .compact()
                .with_target(false)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
        }

        match self.command {
            Commands::Serve { listen } => serve::cmd_serve(config, listen).await,
            Commands::Status { json } => Self::cmd_status(config, json).await,
            Commands::Ping => Self::cmd_ping(config).await,
            Commands::Join { agent } => {
                let agent_id = resolve_agent(&config, agent)?;
                agent::cmd_join(config, agent_id).await
            }
            Commands::Send {
                chat_id,
                text,
                agent,
            } => {
                let agent_id = resolve_agent(&config, agent)?;
                agent::cmd_send(config, agent_id, chat_id, text).await
            }
            Commands::Poll {
                agent,
                offset,
                json,
            } => {
                let agent_id = resolve_agent(&config, agent)?;
                agent::cmd_poll(config, agent_id, offset, json).await
            }
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Completions { shell } => Self::cmd_completions(shell),
        }
    }

    async fn cmd_status(config: RelayConfig, json: bool) -> relay_core::Result<()> {
        let client = client_for(&config);
        let health = match client.health().await {
            Ok(health) => health,
            Err(RelayError::Transport(e)) => {
                println!(
                    "{} Relay is not running at {} ({e})",
                    style("✗").red(),
                    client.base_url()
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&health)?);
            return Ok(());
        }

        println!(
            "{} Relay {} at {}",
            style("●").green(),
            health.version,
            client.base_url()
        );
        println!("   Uptime:  {}s", health.uptime);
        println!("   Agents:  {}", health.agents);
        for agent in &health.agents_details {
            println!(
                "   - {:<24} queued {:>4}  offset {:>6}  last seen {}",
                style(&agent.agent_id).bold(),
                agent.queue_length,
                agent.offset,
                agent.last_seen.format("%H:%M:%S")
            );
        }
        Ok(())
    }

    async fn cmd_ping(config: RelayConfig) -> relay_core::Result<()> {
        let client = client_for(&config);
        let reply = client.ping().await?;
        println!("{} {} from {}", style("✓").green(), reply, client.base_url());
        Ok(())
    }

    fn cmd_config(config: RelayConfig, json: bool) -> relay_core::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| RelayError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> relay_core::Result<()> {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "relay", &mut std::io::stdout());
        Ok(())
    }
}

/// Client for the configured relay, authenticating with the shared token.
fn client_for(config: &RelayConfig) -> RelayClient {
    RelayClient::new(&config.client.url, &config.server.auth_token)
}

/// `--agent` wins over `client.agent_id`.
fn resolve_agent(config: &RelayConfig, flag: Option<String>) -> relay_core::Result<AgentId> {
    flag.or_else(|| config.client.agent_id.clone())
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            RelayError::Config(
                "no agent id: pass --agent or set client.agent_id / RELAY_AGENT_ID".into(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send_with_agent() {
        let cli = Cli::try_parse_from(["relay", "send", "--agent", "alice", "-100", "hello"])
            .unwrap();
        match cli.command {
            Commands::Send {
                chat_id,
                text,
                agent,
            } => {
                assert_eq!(chat_id, "-100");
                assert_eq!(text, "hello");
                assert_eq!(agent.as_deref(), Some("alice"));
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["relay", "-v", "-q", "ping"]).is_err());
    }

    #[test]
    fn test_resolve_agent_prefers_flag() {
        let mut config = RelayConfig::default();
        config.client.agent_id = Some("from-config".into());

        assert_eq!(
            resolve_agent(&config, Some("from-flag".into())).unwrap(),
            "from-flag"
        );
        assert_eq!(resolve_agent(&config, None).unwrap(), "from-config");
    }

    #[test]
    fn test_resolve_agent_requires_some_id() {
        let config = RelayConfig::default();
        assert!(matches!(
            resolve_agent(&config, None),
            Err(RelayError::Config(_))
        ));
        assert!(resolve_agent(&config, Some("  ".into())).is_err());
    }
}
