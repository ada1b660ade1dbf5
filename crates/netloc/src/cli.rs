//! Clap derive structures for the `netloc` CLI.
//!
//! Also compiled by `build.rs` for man page generation, so this file may
//! depend only on clap and clap_complete.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// netloc -- location-aware network settings for macOS
#[derive(Debug, Parser)]
#[command(
    name = "netloc",
    version,
    about = "Apply per-location network settings as the network changes",
    long_about = "Watches the network attachment, picks the configured location that \
        matches it (by Wi-Fi SSID or DNS search domain), and applies that location's \
        DNS servers, search domains, proxy, default printer, and NTP server.\n\n\
        Proxy settings are also exported to shell rc files so terminal tools follow along.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the configuration file
    #[arg(long, short = 'c', env = "NETLOC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", global = true)]
    pub no_color: bool,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch the network and settle after every change (daemon)
    Run(RunArgs),

    /// Show which location and proxy apply right now, without changing anything
    Check(CheckArgs),

    /// Apply the current location's settings once
    Apply(ApplyArgs),

    /// Manage the proxy block in shell rc files
    Shell(ShellArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── run / check / apply ──────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Log file (default: ~/Library/Logs/netloc.log)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Print the decision as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Print the settle outcome as JSON
    #[arg(long)]
    pub json: bool,
}

// ── shell ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ShellArgs {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Debug, Subcommand)]
pub enum ShellCommand {
    /// Print the proxy block for a static proxy
    Render {
        /// Proxy address (host:port, http://host:port, socks5://host:port)
        #[arg(long)]
        proxy: String,

        /// Shell syntax to emit
        #[arg(long, value_enum, default_value = "posix")]
        dialect: DialectArg,

        /// Extra no_proxy entries
        #[arg(long = "bypass", value_name = "HOST")]
        bypass: Vec<String>,
    },

    /// Write the block for the current proxy into rc files
    Install {
        /// Shells to update (default: configured or detected shells)
        #[arg(long = "shell", value_enum, value_name = "SHELL")]
        shells: Vec<ShellArg>,
    },

    /// Remove the block from rc files
    Remove {
        /// Shells to update (default: configured or detected shells)
        #[arg(long = "shell", value_enum, value_name = "SHELL")]
        shells: Vec<ShellArg>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DialectArg {
    /// bash, zsh, sh
    Posix,
    /// csh, tcsh
    Csh,
    /// fish
    Fish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShellArg {
    Bash,
    Zsh,
    Tcsh,
    Csh,
    Fish,
}

// ── config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration file path
    Path,

    /// Print the effective configuration (file plus environment)
    Show,

    /// Write a starter configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check the configuration for errors
    Validate,
}

// ── completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
