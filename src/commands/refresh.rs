use anyhow::Result;

use super::Session;
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let mut session = Session::load(ctx)?;
    let result = session.refresh(ctx);
    // Removals are persisted even when another read failed
    session.save()?;
    let report = result?;

    for address in session.state.addresses() {
        log::debug!("Tracking {}", address);
    }

    ui::success(&format!(
        "Refreshed {} resource(s), {} removed",
        session.state.len(),
        report.removed.len()
    ));
    Ok(())
}
