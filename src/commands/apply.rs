use anyhow::{Result, bail};

use super::Session;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::engine::{ExecuteOptions, Plan, execute};
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let mut session = Session::load(ctx)?;
    session.refresh(ctx)?;

    let plan = Plan::build(&session.config, &session.state).filter(args.target.as_deref());
    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        yes: args.yes,
        quiet: ctx.quiet,
    };

    let Session {
        config,
        state,
        client,
        ..
    } = &mut session;
    let summary = execute(client, config, state, &plan, &opts);

    // Applied changes are recorded even when a later one failed
    if !args.dry_run {
        session.save()?;
    }

    let summary = summary?;
    if !summary.is_success() {
        bail!("Apply failed for {} resource(s)", summary.failed);
    }
    if summary.total_changes() > 0 {
        ui::dim(&format!("State saved to {}", session.state_path.display()));
    }
    Ok(())
}
