pub mod apply;
pub mod destroy;
pub mod import;
pub mod plan;
pub mod refresh;
pub mod show;

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use std::path::PathBuf;

use crate::Context;
use crate::config::FlyformConfig;
use crate::engine::{RefreshReport, refresh_all};
use crate::progress;
use crate::state::FlyformState;
use crate::ui;
use flyapi::Client;

/// Config, state and client for one command run
pub struct Session {
    pub config: FlyformConfig,
    pub state_path: PathBuf,
    pub state: FlyformState,
    pub client: Client,
}

impl Session {
    /// Load the declaration file, its state and an API client
    pub fn load(ctx: &Context) -> Result<Self> {
        let config = FlyformConfig::load(&ctx.config)?;
        Self::with_config(ctx, config)
    }

    fn with_config(ctx: &Context, config: FlyformConfig) -> Result<Self> {
        let state_path = FlyformState::path_for(&ctx.config);
        let state = FlyformState::load(&state_path)?;
        let client = Client::new(
            config
                .client_config()
                .context("Failed to configure the Fly.io API client")?,
        );
        Ok(Self {
            config,
            state_path,
            state,
            client,
        })
    }

    /// Refresh tracked state; fails if any resource could not be read
    pub fn refresh(&mut self, ctx: &Context) -> Result<RefreshReport> {
        if self.state.is_empty() {
            return Ok(RefreshReport::default());
        }

        let pb = progress::spinner(
            format!("Refreshing {} resource(s)...", self.state.len()),
            ctx.quiet,
        );
        let report = refresh_all(&self.client, &mut self.state);
        pb.finish_and_clear();

        if !ctx.quiet {
            for address in &report.removed {
                ui::warn(&format!(
                    "{} no longer exists and was removed from state",
                    address.to_string().bold()
                ));
            }
            ui::diagnostics(&report.diagnostics);
        }

        if !report.is_success() {
            for (address, err) in &report.failed {
                ui::resource_error(address, err);
            }
            bail!("Refresh failed for {} resource(s)", report.failed.len());
        }
        Ok(report)
    }

    /// Persist state
    pub fn save(&mut self) -> Result<()> {
        self.state.touch(&self.state_path)
    }
}
