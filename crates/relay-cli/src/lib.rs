//! # relay-cli
//!
//! Command-line interface for the agent relay.
//!
//! ## Commands
//!
//! - `relay serve`: Run the relay server
//! - `relay status`: Show relay health and connected agents
//! - `relay join`: Connect as an agent and print incoming messages
//! - `relay send`: Post a message as an agent
//! - `relay poll`: Drain an agent's queue once
//! - `relay config`: Show the effective configuration

pub mod commands;

pub use commands::Cli;
