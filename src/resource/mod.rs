//! Fly resource kinds
//!
//! Every declared object is modeled as a [`Lifecycle`] implementation with:
//! - A declared configuration (from `flyform.toml`)
//! - A tracked state (persisted in `.flyform/state.toml`)
//! - An address `<kind>.<key>` naming it in plans and on the command line

use declarative::{Error, Lifecycle};
use std::fmt;
use std::str::FromStr;
use thiserror::Error as ThisError;

pub mod app;
pub mod app_secret;
pub mod cert;
pub mod ip;
pub mod volume;

pub use app::AppResource;
pub use app_secret::AppSecretResource;
pub use cert::CertResource;
pub use ip::IpResource;
pub use volume::VolumeResource;

/// Shown for computed attributes whose value is only known once applied
pub const KNOWN_AFTER_APPLY: &str = "(known after apply)";

// ============================================================================
// Addresses
// ============================================================================

/// Kind of resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    App,
    Secret,
    Volume,
    Ip,
    Cert,
}

impl ResourceKind {
    pub const ALL: [Self; 5] = [Self::App, Self::Secret, Self::Volume, Self::Ip, Self::Cert];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Secret => "secret",
            Self::Volume => "volume",
            Self::Ip => "ip",
            Self::Cert => "cert",
        }
    }

    /// Expected import identifier format
    pub fn import_format(&self) -> &'static str {
        match self {
            Self::App => "<app_name>",
            Self::Secret => "<app_name>,<secret_name>",
            Self::Volume => "<app_name>,<internal_id>",
            Self::Ip => "<app_name>,<address>",
            Self::Cert => "<app_name>,<hostname>",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AddressError::UnknownKind(s.to_string()))
    }
}

/// Errors parsing a resource address
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum AddressError {
    #[error("unknown resource kind '{0}', expected one of: app, secret, volume, ip, cert")]
    UnknownKind(String),

    #[error("invalid address '{0}', expected <kind>.<key>")]
    Malformed(String),
}

/// Address of a resource: `<kind>.<key>`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    pub kind: ResourceKind,
    pub key: String,
}

impl Address {
    pub fn new(kind: ResourceKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    /// Whether this address is selected by a `--target` filter
    ///
    /// A bare kind (`secret`) selects every resource of that kind; a full
    /// address selects itself; `app.<name>` also selects everything
    /// attached to that app.
    pub fn matches_target(&self, target: &str) -> bool {
        let (kind, key) = match target.split_once('.') {
            Some((kind, key)) => (kind, Some(key)),
            None => (target, None),
        };
        let Some(key) = key else {
            return self.kind.as_str() == kind;
        };
        if self.kind.as_str() == kind && self.key == key {
            return true;
        }
        kind == ResourceKind::App.as_str()
            && self.kind != ResourceKind::App
            && self.key.split('.').next() == Some(key)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.key)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, key) = s
            .split_once('.')
            .filter(|(_, key)| !key.is_empty())
            .ok_or_else(|| AddressError::Malformed(s.to_string()))?;
        Ok(Self::new(kind.parse()?, key))
    }
}

// ============================================================================
// Plan Description
// ============================================================================

/// A resource kind the host knows how to key and describe
pub trait Describe: Lifecycle<Client = flyapi::Client> + Copy + Default + 'static {
    const KIND: ResourceKind;

    /// Address key of a declared configuration
    fn key(config: &Self::Config) -> String;

    /// Address key of tracked state
    fn tracked_key(state: &Self::State) -> String;

    /// Attribute lines shown in a plan
    ///
    /// `state` is `None` for resources that will be created.
    fn describe(config: &Self::Config, state: Option<&Self::State>) -> Vec<String>;

    /// Attribute lines shown for a tracked resource
    fn summarize(state: &Self::State) -> Vec<String>;
}

/// Split an import identifier into exactly `parts` comma separated fields
pub fn parse_import_id(
    kind: ResourceKind,
    id: &str,
    parts: usize,
) -> declarative::Result<Vec<String>> {
    let fields: Vec<String> = id.split(',').map(|f| f.trim().to_string()).collect();
    if fields.len() != parts || fields.iter().any(String::is_empty) {
        return Err(Error::validation(
            "Unexpected Import Identifier",
            format!(
                "Expected import identifier with format: {}. Got: {}",
                kind.import_format(),
                id
            ),
        ));
    }
    Ok(fields)
}

/// Turn a not-found lookup into `None`
pub fn found<T>(result: flyapi::Result<T>) -> declarative::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Treat deleting an already missing entity as success
pub fn ignore_missing(result: flyapi::Result<()>) -> declarative::Result<()> {
    match result {
        Err(err) if err.is_not_found() => {
            log::debug!("Entity already gone: {}", err);
            Ok(())
        }
        other => other.map_err(Into::into),
    }
}
