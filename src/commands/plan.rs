use anyhow::Result;

use super::Session;
use crate::Context;
use crate::engine::{Plan, display_plan};

pub fn run(ctx: &Context, target: Option<&str>) -> Result<()> {
    let mut session = Session::load(ctx)?;
    session.refresh(ctx)?;

    let plan = Plan::build(&session.config, &session.state).filter(target);
    display_plan(&plan);
    Ok(())
}
