//! Config subcommand handlers.

use owo_colors::OwoColorize;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::context::{config_path, home_dir};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config_path(global);

    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string());
            Ok(())
        }

        ConfigCommand::Show => {
            let config = netloc_config::load_config(&path)?;
            output::print_output(toml::to_string_pretty(&config)?.trim_end());
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if netloc_config::write_default_config(&path, force)? {
                eprintln!("Wrote {}", path.display());
            } else {
                eprintln!(
                    "{} already exists; pass --force to overwrite it",
                    path.display()
                );
            }
            Ok(())
        }

        // ── Validate: full translation, then a summary ──────────────
        ConfigCommand::Validate => {
            if !path.exists() {
                eprintln!("{} not found, checking built-in defaults", path.display());
            }
            let config = netloc_config::load_config(&path)?;
            let home = home_dir()?;
            let login_shell = std::env::var("SHELL").ok();
            let runtime = config.to_runtime(&home, login_shell.as_deref())?;

            let color = output::should_color(global.no_color);
            let ok = if color { "✓".green().to_string() } else { "ok".into() };
            output::print_output(&format!(
                "{ok} {} location(s), default '{}'",
                runtime.locations.len(),
                runtime.locations.default_profile().name
            ));

            let shells: Vec<String> = runtime
                .watcher
                .shell
                .targets
                .iter()
                .map(|t| t.kind.to_string())
                .collect();
            if runtime.watcher.shell.enabled && !shells.is_empty() {
                output::print_output(&format!("  shell proxy: {}", shells.join(", ")));
            }

            for ambiguity in runtime.locations.ambiguities() {
                let line = format!("warning: {ambiguity}");
                eprintln!("{}", if color { line.yellow().to_string() } else { line });
            }
            Ok(())
        }
    }
}
