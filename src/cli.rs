use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;

#[derive(Parser)]
#[command(name = "flyform")]
#[command(version)]
#[command(about = "Declarative management of Fly.io apps, secrets, volumes, IPs and certificates", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Declaration file
    #[arg(short, long, global = true, env = "FLYFORM_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Refresh state and show what apply would change
    Plan(TargetArgs),

    /// Converge Fly.io resources to the declared configuration
    Apply(ApplyArgs),

    /// Fold out-of-band changes into tracked state
    Refresh,

    /// Start tracking an existing resource
    ///
    /// Identifier formats: app `<name>`, secret `<app>,<name>`,
    /// volume `<app>,<internal_id>`, ip `<app>,<address>`,
    /// cert `<app>,<hostname>`.
    Import {
        /// Address to bind, e.g. `app.web` or `volume.web.data`
        address: String,

        /// Remote identifier of the resource
        id: String,
    },

    /// Delete every tracked resource
    Destroy(DestroyArgs),

    /// Look up a remote resource
    #[command(subcommand)]
    Show(ShowCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Plan / Apply / Destroy
// ============================================================================

#[derive(Parser)]
pub struct TargetArgs {
    /// Only consider matching resources: a kind, an address, or `app.<name>`
    #[arg(short, long)]
    pub target: Option<String>,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Show the plan without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Only consider matching resources: a kind, an address, or `app.<name>`
    #[arg(short, long)]
    pub target: Option<String>,
}

#[derive(Parser)]
pub struct DestroyArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Only destroy matching resources
    #[arg(short, long)]
    pub target: Option<String>,
}

// ============================================================================
// Show
// ============================================================================

#[derive(Subcommand)]
pub enum ShowCommand {
    /// Show an app
    App {
        /// App name
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a certificate
    Cert {
        /// App name
        app: String,

        /// Certificate hostname
        hostname: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show an IP address
    Ip {
        /// App name
        app: String,

        /// IP address
        address: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a volume
    Volume {
        /// App name
        app: String,

        /// Volume internal ID
        internal_id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
