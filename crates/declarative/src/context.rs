//! Apply context and provider traits
//!
//! These traits allow the declarative crate to be used without
//! depending on a specific UI or remote client.

use crate::error::{Error, Result};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Severity of a user-visible diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A user-visible diagnostic collected during an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.summary)
        } else {
            write!(f, "{}: {}", self.summary, self.detail)
        }
    }
}

/// Diagnostics accumulated over one operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a warning
    pub fn add_warning(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.0.push(Diagnostic {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
        });
    }

    /// Add an error
    pub fn add_error(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.0.push(Diagnostic {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
        });
    }

    /// All warnings
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.severity == Severity::Warning)
    }

    /// Check if any error was recorded
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    /// Append every diagnostic from another collection
    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Shared cancellation flag
///
/// Cancelling does not interrupt a blocking remote call; it prevents the
/// results of the in-flight batch from being committed to observed state.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Kind of mutation batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp {
    Set,
    Unset,
}

impl fmt::Display for BatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set => write!(f, "set"),
            Self::Unset => write!(f, "unset"),
        }
    }
}

/// How a batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Applied,
    NoOp,
    Failed,
}

/// Progress callback for reconciliation
///
/// Implement this trait to receive progress updates during batches.
pub trait ProgressCallback: Send {
    /// Called before a batch is sent
    fn on_batch_start(&mut self, op: BatchOp, entity: &str, names: &[String]);

    /// Called after a batch finished
    fn on_batch_complete(&mut self, op: BatchOp, entity: &str, outcome: BatchOutcome);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _op: BatchOp, _entity: &str, _names: &[String]) {}
    fn on_batch_complete(&mut self, _op: BatchOp, _entity: &str, _outcome: BatchOutcome) {}
}

/// Context passed to every lifecycle operation
///
/// Carries the immutable client handle explicitly; nothing is read from
/// global state.
pub struct ApplyContext<'a, C: ?Sized> {
    /// Remote client handle
    pub client: &'a C,
    /// Warnings collected during the operation
    pub diagnostics: Diagnostics,
    cancellation: Cancellation,
    progress: Box<dyn ProgressCallback + 'a>,
}

impl<'a, C: ?Sized> ApplyContext<'a, C> {
    /// Create a new apply context
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            diagnostics: Diagnostics::new(),
            cancellation: Cancellation::new(),
            progress: Box::new(NoProgress),
        }
    }

    /// Use a shared cancellation flag
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Use a progress callback
    pub fn with_progress(mut self, progress: impl ProgressCallback + 'a) -> Self {
        self.progress = Box::new(progress);
        self
    }

    /// Record a user-visible warning
    pub fn warn(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        let summary = summary.into();
        let detail = detail.into();
        log::warn!("{}: {}", summary, detail);
        self.diagnostics.add_warning(summary, detail);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fail with [`Error::Cancelled`] if cancellation was requested
    pub fn ensure_not_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Progress callback
    pub fn progress(&mut self) -> &mut (dyn ProgressCallback + 'a) {
        self.progress.as_mut()
    }

    /// Take the collected diagnostics, leaving an empty collection
    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics() {
        let mut diags = Diagnostics::new();
        assert!(diags.is_empty());
        diags.add_warning("SetSecrets was no-op", "detail");
        assert_eq!(diags.warnings().count(), 1);
        assert!(!diags.has_errors());

        let mut other = Diagnostics::new();
        other.add_error("boom", "");
        diags.extend(other);
        assert_eq!(diags.len(), 2);
        assert!(diags.has_errors());
        assert_eq!(diags.iter().nth(1).map(ToString::to_string), Some("boom".to_string()));
    }

    #[test]
    fn test_cancellation_is_shared() {
        let cancel = Cancellation::new();
        let clone = cancel.clone();
        assert!(!clone.is_cancelled());
        cancel.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_context_warn_and_take() {
        let client = ();
        let mut ctx = ApplyContext::new(&client);
        ctx.warn("State may have drifted", "detail");
        assert_eq!(ctx.diagnostics.len(), 1);

        let taken = ctx.take_diagnostics();
        assert_eq!(taken.len(), 1);
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn test_context_cancellation() {
        let client = ();
        let cancel = Cancellation::new();
        let ctx = ApplyContext::new(&client).with_cancellation(cancel.clone());
        assert!(ctx.ensure_not_cancelled().is_ok());

        cancel.cancel();
        assert!(matches!(ctx.ensure_not_cancelled(), Err(Error::Cancelled)));
    }
}
