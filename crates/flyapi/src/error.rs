//! Error types for Fly API operations.
//!
//! GraphQL failures keep the full list of error entries reported by the API.
//! Two of them get special treatment: a missing entity ("not found") and a
//! mutation that changed nothing ("no change"). Both are classified here,
//! preferring the machine-readable `extensions.code` and only falling back to
//! the message text when the API sends no code.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type alias for Fly API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Codes the API uses for a missing entity.
const NOT_FOUND_CODES: &[&str] = &["NOT_FOUND"];

/// Codes the API uses for a mutation without effect.
const NO_CHANGE_CODES: &[&str] = &["NO_CHANGE", "UNCHANGED"];

/// Message fallback for a mutation without effect.
const NO_CHANGE_MESSAGE: &str = "No change detected";

/// Message prefix fallback for a missing entity.
const NOT_FOUND_PREFIX: &str = "Could not resolve";

/// Categories of API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network or timeout failure, with no HTTP response.
    Network,
    /// Entity does not exist.
    NotFound,
    /// Mutation had no effect.
    NoChange,
    /// Any other error reported by the API.
    Api,
    /// Response could not be decoded.
    Format,
    /// Client configuration problem.
    Config,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::NotFound => "Resource not found",
            Self::NoChange => "No change detected",
            Self::Api => "Fly API error",
            Self::Format => "Invalid API response",
            Self::Config => "Client configuration error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and try again",
            Self::NotFound => "Verify the app, volume or certificate exists",
            Self::NoChange => "Nothing to do; the remote already matches",
            Self::Api => "Check the error details for more information",
            Self::Format => "The API returned an unexpected payload, try again",
            Self::Config => "Set FLY_API_TOKEN or provide a token in the provider config",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Extensions attached to a GraphQL error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorExtensions {
    /// Machine-readable error code.
    #[serde(default)]
    pub code: Option<String>,
}

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlError {
    /// Error message.
    pub message: String,
    /// Path of the failing field; segments are strings or list indices.
    #[serde(default)]
    pub path: Option<Vec<serde_json::Value>>,
    /// Error extensions.
    #[serde(default)]
    pub extensions: Option<ErrorExtensions>,
}

impl GraphqlError {
    /// Create an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            extensions: None,
        }
    }

    /// Create a not-found error for the given entity description.
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::new(format!("{} {}", NOT_FOUND_PREFIX, what)).with_code("NOT_FOUND")
    }

    /// Set the error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.extensions = Some(ErrorExtensions {
            code: Some(code.into()),
        });
        self
    }

    /// Set the path.
    pub fn with_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = Some(
            path.into_iter()
                .map(|s| serde_json::Value::String(s.into()))
                .collect(),
        );
        self
    }

    /// Machine-readable error code, if any.
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.code.as_deref()
    }

    /// Path segments rendered as strings.
    pub fn path_segments(&self) -> Vec<String> {
        self.path
            .iter()
            .flatten()
            .map(|segment| match segment {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }

    /// Whether this entry reports a missing entity.
    pub fn is_not_found(&self) -> bool {
        match self.code() {
            Some(code) => NOT_FOUND_CODES.contains(&code),
            None => self.message.starts_with(NOT_FOUND_PREFIX),
        }
    }

    /// Whether this entry reports a mutation without effect.
    pub fn is_no_change(&self) -> bool {
        match self.code() {
            Some(code) => NO_CHANGE_CODES.contains(&code),
            None => self.message.contains(NO_CHANGE_MESSAGE),
        }
    }
}

impl fmt::Display for GraphqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path_segments();
        if path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (at {})", self.message, path.join("."))
        }
    }
}

fn join_errors(errors: &[GraphqlError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during Fly API operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The API answered with GraphQL errors.
    #[error("GraphQL error: {}", join_errors(.0))]
    Graphql(Vec<GraphqlError>),

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// No API token configured.
    #[error("no API token: set FLY_API_TOKEN or provide one in the provider config")]
    MissingToken,

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Create a single-entry not-found error.
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::Graphql(vec![GraphqlError::not_found(what)])
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http { status: None, .. } => ErrorCategory::Network,
            Error::Http { status: Some(_), .. } => ErrorCategory::Api,
            Error::Graphql(errors) => {
                if !errors.is_empty() && errors.iter().all(GraphqlError::is_not_found) {
                    ErrorCategory::NotFound
                } else if !errors.is_empty() && errors.iter().all(GraphqlError::is_no_change) {
                    ErrorCategory::NoChange
                } else {
                    ErrorCategory::Api
                }
            }
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::MissingToken => ErrorCategory::Config,
            Error::Other(_) => ErrorCategory::Api,
        }
    }

    /// Whether the error reports a missing entity.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// Whether the error reports a mutation without effect.
    #[must_use]
    pub fn is_no_change(&self) -> bool {
        self.category() == ErrorCategory::NoChange
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<Error> for declarative::Error {
    fn from(err: Error) -> Self {
        match err.category() {
            ErrorCategory::NotFound => declarative::Error::NotFound {
                entity: err.to_string(),
            },
            ErrorCategory::NoChange => declarative::Error::NoOp {
                message: err.to_string(),
            },
            ErrorCategory::Network => declarative::Error::Transport {
                message: err.to_string(),
            },
            ErrorCategory::Config => {
                declarative::Error::validation("Missing API token", err.to_string())
            }
            ErrorCategory::Api | ErrorCategory::Format => match err {
                Error::Graphql(errors) => declarative::Error::Remote {
                    errors: errors
                        .into_iter()
                        .map(|e| {
                            let mut entry = declarative::RemoteErrorEntry::new(e.message.as_str())
                                .with_path(e.path_segments());
                            if let Some(code) = e.code() {
                                entry = entry.with_code(code);
                            }
                            entry
                        })
                        .collect(),
                },
                other => declarative::Error::remote(other.to_string()),
            },
        }
    }
}
