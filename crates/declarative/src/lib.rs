//! # Declarative
//!
//! A reconciliation engine for remotely managed resources.
//!
//! This crate compares declared configuration against tracked state,
//! converges a remote control plane toward it in batches, and folds
//! out-of-band changes back into tracked state without touching entries it
//! does not own.
//!
//! ## Core Concepts
//!
//! - **Tracked**: a value that is either known locally or unresolved. Secret
//!   values are write-only remotely, so drift turns them unresolved.
//! - **Differ** ([`diff`]): add/remove/change sets between declared and last
//!   declared values.
//! - **Drift** ([`drift`]): folds a remote snapshot into tracked state.
//! - **Freeze** ([`freeze`]): keeps computed attributes stable when their
//!   write-only input is unchanged.
//! - **Reconciler** ([`SecretReconciler`]): unset batch, then set batch, with
//!   a compensating read when the store reports no effective change.
//! - **Lifecycle** ([`Lifecycle`], [`Instance`]): Create, Read, Update,
//!   Delete and Import for one resource kind.
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ApplyContext, SecretReconciler};
//!
//! let mut ctx = ApplyContext::new(&client);
//! let summary = SecretReconciler::new("my-app")
//!     .reconcile(&mut ctx, &desired, &mut observed)?;
//!
//! for warning in ctx.diagnostics.warnings() {
//!     eprintln!("warning: {warning}");
//! }
//! ```
//!
//! ## Provider Traits
//!
//! - [`SecretStore`]: the remote secret store
//! - [`ProgressCallback`]: receives batch progress updates
//!
//! The crate has no dependency on a particular HTTP client or UI.

pub mod context;
pub mod diff;
pub mod drift;
pub mod error;
pub mod freeze;
pub mod lifecycle;
pub mod reconciler;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{
    ApplyContext, BatchOp, BatchOutcome, Cancellation, Diagnostic, Diagnostics, NoProgress,
    ProgressCallback, Severity,
};
pub use diff::{DiffSummary, SecretDiff, diff};
pub use drift::{Refresh, refresh, refresh_entry};
pub use error::{Error, ErrorCategory, RemoteErrorEntry, Result};
pub use freeze::{PlannedSecret, freeze, plan_secrets};
pub use lifecycle::{Instance, Phase};
pub use reconciler::{ReconcileSummary, SecretReconciler, SecretStore, SetOutcome};
pub use resource::{Lifecycle, ensure_unchanged};
pub use types::{
    DesiredSecrets, ObservedSecrets, RemoteSecret, SecretEntry, SecretInput, Tracked,
};
