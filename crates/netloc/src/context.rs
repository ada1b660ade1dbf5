//! Loaded configuration plus the host facts it is interpreted against.

use std::path::PathBuf;
use std::sync::Arc;

use directories::BaseDirs;
use netloc_config::{Config, Runtime};
use netloc_core::{Collaborators, Settler};
use netloc_system::{COMMAND_TIMEOUT, Exec, ProcessRunner};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(netloc_config::config_path)
}

pub fn home_dir() -> Result<PathBuf, CliError> {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or(CliError::NoHome)
}

pub struct Context {
    pub config: Config,
    pub runtime: Runtime,
    pub home: PathBuf,
    pub exec: Arc<dyn Exec>,
}

impl Context {
    /// Load (creating the starter file if needed) and validate.
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let path = config_path(global);
        let config = netloc_config::load_or_init(&path)?;
        let home = home_dir()?;
        let login_shell = std::env::var("SHELL").ok();
        let runtime = config.to_runtime(&home, login_shell.as_deref())?;

        Ok(Self {
            config,
            runtime,
            home,
            exec: Arc::new(ProcessRunner::new(COMMAND_TIMEOUT)),
        })
    }

    pub fn collaborators(&self) -> Result<Collaborators, CliError> {
        Ok(netloc_system::collaborators(
            Arc::clone(&self.exec),
            self.config.settings.use_sudo,
            self.runtime.watcher.discovery_timeout,
        )?)
    }

    pub fn settler(&self) -> Result<Settler, CliError> {
        Ok(Settler::new(
            self.collaborators()?,
            Arc::clone(&self.runtime.locations),
            &self.runtime.watcher,
        ))
    }
}
