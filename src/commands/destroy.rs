use anyhow::{Result, bail};

use super::Session;
use crate::Context;
use crate::cli::DestroyArgs;
use crate::config::FlyformConfig;
use crate::engine::{ExecuteOptions, Plan, execute};
use crate::ui;

pub fn run(ctx: &Context, args: &DestroyArgs) -> Result<()> {
    let mut session = Session::load(ctx)?;
    session.refresh(ctx)?;

    if session.state.is_empty() {
        ui::info("Nothing tracked, nothing to destroy");
        return Ok(());
    }

    let plan = Plan::destroy(&session.state).filter(args.target.as_deref());
    let opts = ExecuteOptions {
        dry_run: false,
        yes: args.yes,
        quiet: ctx.quiet,
    };

    let Session { state, client, .. } = &mut session;
    let summary = execute(client, &FlyformConfig::default(), state, &plan, &opts);
    session.save()?;

    let summary = summary?;
    if !summary.is_success() {
        bail!("Destroy failed for {} resource(s)", summary.failed);
    }
    Ok(())
}
