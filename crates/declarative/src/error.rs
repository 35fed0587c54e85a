//! Error types for reconciliation.
//!
//! Every failure is classified into an [`ErrorCategory`] so callers can tell
//! fatal failures apart from outcomes the engine recovers from on its own.

use std::fmt;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Locally detected contract violation, raised before any remote call.
    Validation,
    /// Remote entity is missing.
    NotFound,
    /// A mutation batch had no effective change.
    NoOp,
    /// Structured failure reported by the remote API.
    Remote,
    /// Network or timeout failure.
    Transport,
    /// Operation was cancelled before its results were applied.
    Cancelled,
}

impl ErrorCategory {
    /// Whether the engine recovers from this category without failing the operation.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound | Self::NoOp)
    }

    /// Whether this category aborts the operation.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid configuration",
            Self::NotFound => "Remote resource not found",
            Self::NoOp => "No effective change",
            Self::Remote => "Remote API error",
            Self::Transport => "Network connectivity issue",
            Self::Cancelled => "Operation cancelled",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Validation => "Fix the configuration; immutable attributes require delete and re-create",
            Self::NotFound => "The resource will be removed from state and re-created on next apply",
            Self::NoOp => "State may have drifted; re-run apply to converge",
            Self::Remote => "Check the error details reported by the API",
            Self::Transport => "Check your network connection and try again",
            Self::Cancelled => "Re-run the operation; no partial results were recorded",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// One entry of a structured remote error list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteErrorEntry {
    /// Error message, surfaced verbatim.
    pub message: String,
    /// Path of the failing field in the remote request.
    pub path: Vec<String>,
    /// Optional machine-readable code.
    pub code: Option<String>,
}

impl RemoteErrorEntry {
    /// Create an entry with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
            code: None,
        }
    }

    /// Set the path.
    pub fn with_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    /// Set the machine-readable code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Path rendered as a dotted string.
    pub fn path_string(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for RemoteErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (at {})", self.message, self.path_string())
        }
    }
}

fn join_entries(entries: &[RemoteErrorEntry]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Local contract violation.
    #[error("{summary}: {detail}")]
    Validation {
        /// Short summary.
        summary: String,
        /// Details for the user.
        detail: String,
    },

    /// Remote entity is missing.
    #[error("not found: {entity}")]
    NotFound {
        /// What was looked up.
        entity: String,
    },

    /// Mutation batch reported no effective change.
    #[error("no effective change: {message}")]
    NoOp {
        /// Message reported by the store.
        message: String,
    },

    /// Structured remote failure.
    #[error("remote error: {}", join_entries(.errors))]
    Remote {
        /// Every entry reported by the remote.
        errors: Vec<RemoteErrorEntry>,
    },

    /// The store accepted a batch but did not report a requested secret.
    #[error("secret {name:?} was not found in the store response")]
    MissingSecret {
        /// Requested secret name.
        name: String,
    },

    /// Network or timeout failure.
    #[error("transport error: {message}")]
    Transport {
        /// Underlying cause.
        message: String,
    },

    /// Operation cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a validation error.
    pub fn validation(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Validation {
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    /// Create a remote error with a single message.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            errors: vec![RemoteErrorEntry::new(message)],
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation { .. } => ErrorCategory::Validation,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::NoOp { .. } => ErrorCategory::NoOp,
            Error::Remote { .. } => ErrorCategory::Remote,
            Error::MissingSecret { .. } => ErrorCategory::Remote,
            Error::Transport { .. } => ErrorCategory::Transport,
            Error::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Whether this is a not-found outcome.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// Whether this is a no-op outcome.
    #[must_use]
    pub fn is_no_op(&self) -> bool {
        self.category() == ErrorCategory::NoOp
    }

    /// Whether this error aborts the operation.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }
}
