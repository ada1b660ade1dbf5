//! `netloc apply`: one manual settle through the coordinator.

use netloc_core::Coordinator;

use crate::cli::{ApplyArgs, GlobalOpts};
use crate::context::Context;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: ApplyArgs, global: &GlobalOpts, ctx: &Context) -> Result<(), CliError> {
    let coordinator = Coordinator::spawn(ctx.settler()?, ctx.runtime.watcher.debounce);
    let result = coordinator.settle_now().await;
    coordinator.shutdown().await;
    let outcome = result?;

    let rendered = if args.json {
        output::render_json(outcome.as_ref())?
    } else {
        let is_default = ctx.runtime.locations.is_default(&outcome.evaluation.location);
        output::render_outcome(&outcome, is_default, output::should_color(global.no_color))
    };
    output::print_output(&rendered);

    let failed = outcome.failure_count();
    if failed > 0 {
        return Err(CliError::ApplyFailed { count: failed });
    }
    Ok(())
}
