//! `netloc check`: capture, match, and resolve without touching the host.

use crate::cli::{CheckArgs, GlobalOpts};
use crate::context::Context;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: CheckArgs, global: &GlobalOpts, ctx: &Context) -> Result<(), CliError> {
    let mut settler = ctx.settler()?;
    let evaluation = settler.evaluate().await;
    let is_default = settler.locations().is_default(&evaluation.location);

    let rendered = if args.json {
        output::render_json(&evaluation)?
    } else {
        output::render_evaluation(&evaluation, is_default, output::should_color(global.no_color))
    };
    output::print_output(&rendered);
    Ok(())
}
