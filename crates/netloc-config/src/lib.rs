//! Configuration file for netloc.
//!
//! One TOML file holds global `[settings]` and an ordered list of
//! `[[locations]]`. This crate loads it (file, then `NETLOC_*`
//! environment overrides), writes a starter file when none exists, and
//! translates the result into `netloc_core` runtime types. Translation is
//! where validation happens: a `Config` that translates is a `Config`
//! the daemon can run with.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use netloc_core::{
    LocationProfile, LocationSet, ProxySpec, ShellKind, ShellSettings, ShellTarget, WatcherConfig,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn validation(field: impl Into<String>, reason: impl ToString) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,

    /// Ordered location profiles. Order is match precedence.
    #[serde(default)]
    pub locations: Vec<LocationConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            locations: vec![LocationConfig::named(DEFAULT_LOCATION)],
        }
    }
}

const DEFAULT_LOCATION: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Raise the log floor to `debug`.
    pub debug: bool,

    pub debounce_seconds: u64,
    pub query_timeout_seconds: u64,
    pub discovery_timeout_seconds: u64,

    /// URL the auto-discovery routing function is asked about.
    pub probe_url: String,

    pub shell_proxy_enabled: bool,

    /// Shells to maintain. Empty means detect.
    pub shell_proxy_shells: Vec<String>,

    /// Extra `no_proxy` entries.
    pub proxy_bypass: Vec<String>,

    pub default_location: String,

    /// Run networksetup and systemsetup through `sudo -n`.
    pub use_sudo: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            debounce_seconds: 5,
            query_timeout_seconds: 5,
            discovery_timeout_seconds: 10,
            probe_url: "http://example.com/".into(),
            shell_proxy_enabled: true,
            shell_proxy_shells: Vec::new(),
            proxy_bypass: Vec::new(),
            default_location: DEFAULT_LOCATION.into(),
            use_sudo: true,
        }
    }
}

/// A named location profile as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LocationConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssids: Vec<String>,

    #[serde(default, alias = "domains", skip_serializing_if = "Vec::is_empty")]
    pub dns_search_domains: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_servers: Vec<String>,

    /// Static proxy (`host:port`, `socks5://h:1080`) or the URL of an
    /// auto-discovery script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ntp_server: Option<String>,
}

impl LocationConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.into(),
            ssids: Vec::new(),
            dns_search_domains: Vec::new(),
            dns_servers: Vec::new(),
            proxy_url: None,
            printer: None,
            ntp_server: None,
        }
    }

    /// Translate into a core profile, parsing addresses and the proxy.
    pub fn to_profile(&self) -> Result<LocationProfile, ConfigError> {
        let field = |key: &str| format!("locations.{}.{key}", self.name);

        let dns_servers = self
            .dns_servers
            .iter()
            .map(|s| {
                s.trim()
                    .parse::<IpAddr>()
                    .map_err(|e| ConfigError::validation(field("dns_servers"), format!("'{s}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let proxy_spec = match &self.proxy_url {
            Some(raw) => raw
                .parse::<ProxySpec>()
                .map_err(|e| ConfigError::validation(field("proxy_url"), e))?,
            None => ProxySpec::Empty,
        };

        Ok(LocationProfile::new(&self.name)
            .with_ssids(self.ssids.iter().map(String::as_str))
            .with_domains(self.dns_search_domains.iter().map(String::as_str))
            .with_dns_servers(dns_servers)
            .with_proxy(proxy_spec)
            .with_printer(non_blank(self.printer.as_deref()))
            .with_ntp_server(non_blank(self.ntp_server.as_deref())))
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "netloc").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("netloc");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config at `path`, layered under `NETLOC_*` environment
/// overrides (`NETLOC_SETTINGS__DEBUG=true`).
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("NETLOC_").ignore(&["config"]).split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), locations = config.locations.len(), "config loaded");
    Ok(config)
}

/// Load `path`, first writing the starter file if it does not exist.
pub fn load_or_init(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        write_default_config(path, false)?;
        info!(path = %path.display(), "wrote default configuration");
    }
    load_config(path)
}

// ── Config saving ───────────────────────────────────────────────────

/// Starter file: one default location and every setting spelled out.
pub const DEFAULT_CONFIG: &str = r#"# netloc configuration
#
# Locations are tried top to bottom. The first one whose SSID or DNS
# search domain matches the current network wins; the default location
# applies when nothing else does.

[settings]
debug = false
debounce_seconds = 5
query_timeout_seconds = 5
discovery_timeout_seconds = 10
probe_url = "http://example.com/"
shell_proxy_enabled = true
# Empty: the login shell plus any shell whose rc file already exists.
shell_proxy_shells = []
# Extra no_proxy entries beyond loopback and every location's domains.
proxy_bypass = []
default_location = "default"
# Privileged commands go through `sudo -n`; needs a NOPASSWD sudoers rule
# for networksetup, systemsetup, and sntp. Turn off when running as root.
use_sudo = true

# [[locations]]
# name = "work"
# ssids = ["Corp"]
# dns_search_domains = ["corp.example.com"]
# dns_servers = ["10.0.0.53"]
# proxy_url = "http://wpad.corp.example.com/wpad.dat"
# printer = "Office_Laser"
# ntp_server = "ntp.corp.example.com"

[[locations]]
name = "default"
"#;

/// Write [`DEFAULT_CONFIG`] to `path`. Returns `false` without touching
/// an existing file unless `force` is set.
pub fn write_default_config(path: &Path, force: bool) -> Result<bool, ConfigError> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG)?;
    Ok(true)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation to runtime types ────────────────────────────────────

/// Everything the daemon needs, validated.
#[derive(Debug, Clone)]
pub struct Runtime {
    pub watcher: WatcherConfig,
    pub locations: Arc<LocationSet>,
}

impl Config {
    /// Build the ordered location set.
    pub fn location_set(&self) -> Result<LocationSet, ConfigError> {
        let profiles = self
            .locations
            .iter()
            .map(LocationConfig::to_profile)
            .collect::<Result<Vec<_>, _>>()?;

        LocationSet::new(profiles, &self.settings.default_location)
            .map_err(|e| ConfigError::validation("locations", e))
    }

    /// Build the watcher tuning. `home` and `login_shell` drive shell
    /// target detection when no shells are listed.
    pub fn watcher_config(&self, home: &Path, login_shell: Option<&str>) -> Result<WatcherConfig, ConfigError> {
        let s = &self.settings;

        let probe_url = Url::parse(&s.probe_url)
            .map_err(|e| ConfigError::validation("settings.probe_url", e))?;
        if !matches!(probe_url.scheme(), "http" | "https") {
            return Err(ConfigError::validation(
                "settings.probe_url",
                format!("scheme '{}' is not http or https", probe_url.scheme()),
            ));
        }

        let mut watcher = WatcherConfig::new(probe_url);
        watcher.debounce = seconds("settings.debounce_seconds", s.debounce_seconds)?;
        watcher.query_timeout = seconds("settings.query_timeout_seconds", s.query_timeout_seconds)?;
        watcher.discovery_timeout =
            seconds("settings.discovery_timeout_seconds", s.discovery_timeout_seconds)?;
        watcher.proxy_bypass = s
            .proxy_bypass
            .iter()
            .map(|e| e.trim().to_owned())
            .filter(|e| !e.is_empty())
            .collect();
        watcher.shell = ShellSettings {
            enabled: s.shell_proxy_enabled,
            targets: self
                .shell_kinds(home, login_shell)?
                .into_iter()
                .map(|kind| ShellTarget::new(kind, home))
                .collect(),
        };

        Ok(watcher)
    }

    /// Listed shells in order, or the detected ones when none are listed.
    pub fn shell_kinds(&self, home: &Path, login_shell: Option<&str>) -> Result<Vec<ShellKind>, ConfigError> {
        if self.settings.shell_proxy_shells.is_empty() {
            return Ok(ShellKind::detect(home, login_shell));
        }

        let mut kinds = Vec::new();
        for name in &self.settings.shell_proxy_shells {
            let kind = name.trim().parse::<ShellKind>().map_err(|_| {
                ConfigError::validation(
                    "settings.shell_proxy_shells",
                    format!("unknown shell '{name}' (expected bash, zsh, tcsh, csh, or fish)"),
                )
            })?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }

    /// Validate and translate the whole file.
    pub fn to_runtime(&self, home: &Path, login_shell: Option<&str>) -> Result<Runtime, ConfigError> {
        Ok(Runtime {
            watcher: self.watcher_config(home, login_shell)?,
            locations: Arc::new(self.location_set()?),
        })
    }
}

fn seconds(field: &str, value: u64) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::validation(field, "must be at least 1 second"));
    }
    Ok(Duration::from_secs(value))
}
