mod cli;
mod commands;
mod context;
mod error;
mod logging;
mod output;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Command, ShellArgs, ShellCommand};
use crate::context::Context;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let global = cli.global;

    match cli.command {
        Command::Completions(args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "netloc", &mut std::io::stdout());
            Ok(())
        }

        // Config and rendering commands work without a valid config
        Command::Config(args) => {
            let _guard = logging::init(global.verbose, false, None)?;
            commands::config_cmd::handle(args, &global)
        }
        Command::Shell(ShellArgs {
            command: ShellCommand::Render { proxy, dialect, bypass },
        }) => {
            let _guard = logging::init(global.verbose, false, None)?;
            commands::shell::render(&proxy, dialect, &bypass)
        }

        cmd => {
            let ctx = Context::load(&global)?;
            let log_file = match &cmd {
                Command::Run(args) => args.log_file.clone().or_else(logging::default_log_file),
                _ => None,
            };
            let _guard = logging::init(global.verbose, ctx.config.settings.debug, log_file.as_deref())?;

            tracing::debug!(command = ?cmd, "dispatching command");
            match cmd {
                Command::Run(_) => commands::run::handle(&ctx).await,
                Command::Check(args) => commands::check::handle(args, &global, &ctx).await,
                Command::Apply(args) => commands::apply::handle(args, &global, &ctx).await,
                Command::Shell(args) => commands::shell::handle(args, &ctx).await,
                Command::Config(_) | Command::Completions(_) => Ok(()),
            }
        }
    }
}
