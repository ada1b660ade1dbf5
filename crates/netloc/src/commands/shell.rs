//! `netloc shell`: render, install, or remove the rc-file proxy block.

use indexmap::IndexSet;
use netloc_core::resolver::LOOPBACK_BYPASS;
use netloc_core::{ProxyOutcome, ProxySpec, ResolvedProxy, ShellDialect, ShellKind, ShellTarget, shell};
use tracing::{info, warn};

use crate::cli::{DialectArg, ShellArg, ShellArgs, ShellCommand};
use crate::context::Context;
use crate::error::CliError;
use crate::output;

impl From<DialectArg> for ShellDialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Posix => Self::Posix,
            DialectArg::Csh => Self::Csh,
            DialectArg::Fish => Self::Fish,
        }
    }
}

impl From<ShellArg> for ShellKind {
    fn from(arg: ShellArg) -> Self {
        match arg {
            ShellArg::Bash => Self::Bash,
            ShellArg::Zsh => Self::Zsh,
            ShellArg::Tcsh => Self::Tcsh,
            ShellArg::Csh => Self::Csh,
            ShellArg::Fish => Self::Fish,
        }
    }
}

/// `render` needs no configuration, so it is handled before loading one.
pub fn render(proxy: &str, dialect: DialectArg, bypass: &[String]) -> Result<(), CliError> {
    let invalid = || CliError::InvalidProxy {
        value: proxy.to_owned(),
    };
    let endpoint = match proxy.parse::<ProxySpec>() {
        Ok(ProxySpec::Static(endpoint)) => endpoint,
        _ => return Err(invalid()),
    };

    let no_proxy: IndexSet<String> = LOOPBACK_BYPASS
        .iter()
        .map(|s| (*s).to_owned())
        .chain(bypass.iter().map(|s| s.trim().to_ascii_lowercase()).filter(|s| !s.is_empty()))
        .collect();
    let resolved = ResolvedProxy::from_endpoint(endpoint, no_proxy);

    let block = shell::render(&resolved, dialect.into()).ok_or_else(invalid)?;
    output::print_output(block.trim_end());
    Ok(())
}

fn targets(shells: &[ShellArg], ctx: &Context) -> Vec<ShellTarget> {
    if shells.is_empty() {
        return ctx.runtime.watcher.shell.targets.clone();
    }
    let mut kinds: Vec<ShellKind> = Vec::new();
    for kind in shells.iter().copied().map(ShellKind::from) {
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds.into_iter().map(|kind| ShellTarget::new(kind, &ctx.home)).collect()
}

pub async fn handle(args: ShellArgs, ctx: &Context) -> Result<(), CliError> {
    match args.command {
        ShellCommand::Render { proxy, dialect, bypass } => render(&proxy, dialect, &bypass),

        ShellCommand::Install { shells } => {
            let targets = targets(&shells, ctx);
            if targets.is_empty() {
                warn!("no shells configured or detected, nothing to do");
                return Ok(());
            }

            let mut settler = ctx.settler()?;
            let evaluation = settler.evaluate().await;
            let Some(resolved) = evaluation.proxy.effective() else {
                let reason = match &evaluation.proxy {
                    ProxyOutcome::Unresolved { reason } => reason.clone(),
                    _ => String::new(),
                };
                return Err(CliError::ProxyUnresolved {
                    location: evaluation.location.name.clone(),
                    reason,
                });
            };

            for target in &targets {
                let change = shell::apply(&target.rc_file, resolved, target.kind.dialect())?;
                info!(path = %target.rc_file.display(), %change, "shell rc file");
                output::print_output(&format!("{}: {change}", target.rc_file.display()));
            }
            Ok(())
        }

        ShellCommand::Remove { shells } => {
            for target in targets(&shells, ctx) {
                let change = shell::remove(&target.rc_file)?;
                output::print_output(&format!("{}: {change}", target.rc_file.display()));
            }
            Ok(())
        }
    }
}
