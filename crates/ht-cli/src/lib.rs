//! hitch: Command-line front end
//!
//! Provides the `hitch` CLI for running commands on the local loopback
//! engine with an interactive session attached, and for managing the
//! client configuration.

pub mod commands;
pub mod output;
