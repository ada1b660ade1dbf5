//! CLI error types with miette diagnostics.
//!
//! Maps config, system, and core failures into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use netloc_config::ConfigError;
use netloc_core::CoreError;
use netloc_system::SystemError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const APPLY_FAILED: i32 = 4;
    pub const SYSTEM: i32 = 5;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(netloc::validation),
        help("Fix the value in the configuration file, then run: netloc config validate")
    )]
    Validation { field: String, reason: String },

    #[error("Could not load configuration")]
    #[diagnostic(
        code(netloc::config),
        help("Run `netloc config path` to locate the file, or `netloc config init --force` to start over.")
    )]
    Config(#[source] ConfigError),

    #[error("Could not determine the home directory")]
    #[diagnostic(
        code(netloc::no_home),
        help("Set HOME so shell rc files and the default config can be located.")
    )]
    NoHome,

    // ── Proxy ────────────────────────────────────────────────────────
    #[error("'{value}' is not a static proxy")]
    #[diagnostic(
        code(netloc::invalid_proxy),
        help("Use host:port, http://host:port, https://host:port, or socks5://host:port.")
    )]
    InvalidProxy { value: String },

    #[error("Proxy for location '{location}' could not be resolved: {reason}")]
    #[diagnostic(
        code(netloc::proxy_unresolved),
        help("Check that the auto-discovery URL is reachable, then retry. Run `netloc check -v` for details.")
    )]
    ProxyUnresolved { location: String, reason: String },

    // ── Applying ─────────────────────────────────────────────────────
    #[error("{count} setting(s) could not be applied")]
    #[diagnostic(
        code(netloc::apply_failed),
        help(
            "Run with -v for details. Network and time settings need a NOPASSWD sudoers rule \
             for networksetup, systemsetup, and sntp (or set use_sudo = false when running as root)."
        )
    )]
    ApplyFailed { count: usize },

    // ── System / core ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(netloc::system))]
    System(#[from] SystemError),

    #[error(transparent)]
    #[diagnostic(code(netloc::core))]
    Core(#[from] CoreError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(netloc::json))]
    Json(#[from] serde_json::Error),

    #[error("Could not render TOML: {0}")]
    #[diagnostic(code(netloc::toml))]
    Toml(#[from] toml::ser::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::Config(_) | Self::NoHome => exit_code::CONFIG,
            Self::InvalidProxy { .. } => exit_code::USAGE,
            Self::ApplyFailed { .. } | Self::ProxyUnresolved { .. } => exit_code::APPLY_FAILED,
            Self::System(_) => exit_code::SYSTEM,
            Self::Core(_) | Self::Io(_) | Self::Json(_) | Self::Toml(_) => exit_code::GENERAL,
        }
    }
}
