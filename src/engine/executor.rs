//! Execution engine - applies a plan with UI integration
//!
//! Changes run one at a time in plan order. The run is cancelled only by a
//! failed change: the change in flight always finishes, and every change
//! after it is skipped. There is no interrupt handling; Ctrl-C terminates
//! the process and state is saved only for changes already recorded.

use anyhow::Result;
use colored::Colorize;
use std::collections::BTreeMap;

use crate::config::FlyformConfig;
use crate::progress::{self, BatchProgress};
use crate::resource::{
    Address, AppResource, AppSecretResource, CertResource, Describe, IpResource, ResourceKind,
    VolumeResource,
};
use crate::state::FlyformState;
use declarative::{ApplyContext, Cancellation, Diagnostics, Error, Instance};
use flyapi::Client;

use super::differ::display_plan;
use super::planner::{Action, Plan, PlannedChange};

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Hide progress output
    pub quiet: bool,
}

/// Summary of execution results
#[derive(Debug, Default)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Changes not attempted after a failure or a declined confirmation
    pub skipped: usize,
    pub diagnostics: Diagnostics,
    pub errors: Vec<(Address, Error)>,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Show the plan, confirm, then apply it
pub fn execute(
    client: &Client,
    config: &FlyformConfig,
    state: &mut FlyformState,
    plan: &Plan,
    opts: &ExecuteOptions,
) -> Result<ExecuteSummary> {
    display_plan(plan);

    if plan.is_empty() {
        return Ok(ExecuteSummary::default());
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(ExecuteSummary::default());
    }

    if !opts.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(ExecuteSummary {
            skipped: plan.changes.len(),
            ..Default::default()
        });
    }

    println!();
    let summary = apply_plan(client, config, state, plan, opts.quiet);
    print_summary(&summary);
    Ok(summary)
}

/// Apply every change in order
///
/// The first failure cancels the run; the changes after it are skipped.
/// Cancellation is never raised while a change is in flight, so a change
/// either completes or fails on its own terms. `state` reflects everything
/// that was applied, including partial progress of the failed change.
pub fn apply_plan(
    client: &Client,
    config: &FlyformConfig,
    state: &mut FlyformState,
    plan: &Plan,
    quiet: bool,
) -> ExecuteSummary {
    let pb = progress::spinner("Applying", quiet);
    let cancellation = Cancellation::new();
    let mut ctx = ApplyContext::new(client)
        .with_cancellation(cancellation.clone())
        .with_progress(BatchProgress::new(pb.clone()));
    let mut summary = ExecuteSummary::default();

    for change in &plan.changes {
        if cancellation.is_cancelled() {
            summary.skipped += 1;
            continue;
        }

        pb.set_message(format!("{} {}", verb(change.action), change.address));
        log::debug!("Applying {} of {}", change.action, change.address);

        match apply_one(&mut ctx, config, state, change) {
            Ok(()) => {
                match change.action {
                    Action::Create => summary.created += 1,
                    Action::Update => summary.updated += 1,
                    Action::Delete => summary.deleted += 1,
                }
                pb.println(format!("    {} {}", "✓".green(), change.address));
            }
            Err(err) => {
                pb.println(format!("    {} {}", "✗".red(), change.address));
                log::debug!("{} failed: {}", change.address, err);
                summary.failed += 1;
                summary.errors.push((change.address.clone(), err));
                cancellation.cancel();
            }
        }
    }

    pb.finish_and_clear();
    summary.diagnostics = ctx.take_diagnostics();
    summary
}

fn apply_one(
    ctx: &mut ApplyContext<'_, Client>,
    config: &FlyformConfig,
    state: &mut FlyformState,
    change: &PlannedChange,
) -> declarative::Result<()> {
    let key = change.address.key.as_str();
    match change.address.kind {
        ResourceKind::App => {
            apply_change::<AppResource>(ctx, change.action, key, &config.apps, &mut state.apps)
        }
        ResourceKind::Secret => apply_change::<AppSecretResource>(
            ctx,
            change.action,
            key,
            &config.secrets,
            &mut state.secrets,
        ),
        ResourceKind::Volume => apply_change::<VolumeResource>(
            ctx,
            change.action,
            key,
            &config.volumes,
            &mut state.volumes,
        ),
        ResourceKind::Ip => {
            apply_change::<IpResource>(ctx, change.action, key, &config.ips, &mut state.ips)
        }
        ResourceKind::Cert => {
            apply_change::<CertResource>(ctx, change.action, key, &config.certs, &mut state.certs)
        }
    }
}

fn apply_change<L: Describe>(
    ctx: &mut ApplyContext<'_, Client>,
    action: Action,
    key: &str,
    configs: &[L::Config],
    tracked: &mut BTreeMap<String, L::State>,
) -> declarative::Result<()> {
    match action {
        Action::Create => {
            let config = declared::<L>(configs, key)?;
            let mut instance = Instance::new(L::default());
            let result = instance.create(ctx, config);
            if let Some(state) = instance.into_state() {
                tracked.insert(key.to_string(), state);
            }
            result
        }
        Action::Update => {
            let config = declared::<L>(configs, key)?;
            let state = tracked.get(key).cloned().ok_or_else(|| {
                Error::validation(
                    format!("Can't update {}.{}", L::KIND, key),
                    "Resource is not tracked in state",
                )
            })?;
            let mut instance = Instance::tracked(L::default(), state);
            let result = instance.update(ctx, config);
            if let Some(state) = instance.into_state() {
                tracked.insert(key.to_string(), state);
            }
            result
        }
        Action::Delete => {
            let Some(state) = tracked.get(key).cloned() else {
                return Ok(());
            };
            Instance::tracked(L::default(), state).delete(ctx)?;
            tracked.remove(key);
            Ok(())
        }
    }
}

fn declared<'c, L: Describe>(
    configs: &'c [L::Config],
    key: &str,
) -> declarative::Result<&'c L::Config> {
    configs.iter().find(|c| L::key(c) == key).ok_or_else(|| {
        Error::validation(
            format!("Can't apply {}.{}", L::KIND, key),
            "Resource is not declared in the configuration",
        )
    })
}

fn verb(action: Action) -> &'static str {
    match action {
        Action::Create => "Creating",
        Action::Update => "Updating",
        Action::Delete => "Deleting",
    }
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(false)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Apply complete!", "✓".green().bold());
    } else {
        println!("  {} Apply finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }

    crate::ui::diagnostics(&summary.diagnostics);
    for (address, err) in &summary.errors {
        crate::ui::resource_error(address, err);
    }
}
