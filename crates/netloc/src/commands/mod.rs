//! Subcommand handlers.

pub mod apply;
pub mod check;
pub mod config_cmd;
pub mod run;
pub mod shell;
