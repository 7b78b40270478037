//! Command-line interface definitions for the `blackbsd` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `blackbsd` binary.
#[derive(Debug, Parser)]
#[command(
    name = "blackbsd",
    about = "Build NetBSD-based BlackBSD images on ephemeral Hetzner Cloud servers",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Configuration file to load instead of the discovered `blackbsd.toml`.
    #[arg(short, long, global = true, value_name = "PATH")]
    pub(crate) config: Option<String>,
    /// Command to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands of the `blackbsd` binary.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List builder-owned servers.
    #[command(name = "status", about = "Show BlackBSD build servers")]
    Status,
    /// Delete every builder-owned server.
    #[command(name = "destroy", about = "Destroy all BlackBSD build servers")]
    Destroy,
    /// Run the full build pipeline.
    #[command(name = "build", about = "Build a BlackBSD image on a fresh server")]
    Build(BuildCommand),
    /// Print the version.
    #[command(name = "version", about = "Print version information")]
    Version,
}

/// Arguments for the `blackbsd build` subcommand.
#[derive(Debug, Args)]
pub(crate) struct BuildCommand {
    /// Leave the server running after a successful build.
    ///
    /// Failed builds always keep their server for inspection; remove it with
    /// `blackbsd destroy`.
    #[arg(long)]
    pub(crate) keep_server: bool,
}
