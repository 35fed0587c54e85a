//! Core types for declarative reconciliation

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A locally tracked value that is either known or can no longer be trusted
///
/// Write-only inputs (secret values) are never returned by the remote store,
/// so once drift is detected the local copy becomes `Unresolved` and every
/// consumer has to deal with that case explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tracked<T> {
    /// Value is known locally
    Known(T),
    /// Value cannot be determined locally
    Unresolved,
}

impl<T> Tracked<T> {
    /// Check if the value is known
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Check if the value is unresolved
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved)
    }

    /// Borrow the known value, if any
    pub fn as_known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unresolved => None,
        }
    }

    /// Take the known value, if any
    pub fn into_known(self) -> Option<T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unresolved => None,
        }
    }

    /// Map the known value
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Tracked<U> {
        match self {
            Self::Known(value) => Tracked::Known(f(value)),
            Self::Unresolved => Tracked::Unresolved,
        }
    }
}

impl<T> Default for Tracked<T> {
    fn default() -> Self {
        Self::Unresolved
    }
}

impl<T> From<Option<T>> for Tracked<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Known(v),
            None => Self::Unresolved,
        }
    }
}

// Serialized as an optional value so state files stay flat.
impl<T: Serialize> Serialize for Tracked<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_known().serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Tracked<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.into())
    }
}

/// A secret as last observed by the engine
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretEntry {
    /// Last user-supplied value, unresolved after drift
    #[serde(default, skip_serializing_if = "Tracked::is_unresolved")]
    pub value: Tracked<String>,
    /// Opaque fingerprint assigned by the store on write
    pub digest: String,
    /// Creation timestamp assigned by the store
    pub created_at: String,
}

impl SecretEntry {
    /// Build an entry from a declared value and the store's view of it
    pub fn from_remote(value: impl Into<String>, remote: &RemoteSecret) -> Self {
        Self {
            value: Tracked::Known(value.into()),
            digest: remote.digest.clone(),
            created_at: remote.created_at.clone(),
        }
    }

    /// Whether the store still reports the same digest and timestamp
    pub fn matches(&self, remote: &RemoteSecret) -> bool {
        self.digest == remote.digest && self.created_at == remote.created_at
    }
}

impl fmt::Debug for SecretEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self.value {
            Tracked::Known(_) => "<sensitive>",
            Tracked::Unresolved => "<unresolved>",
        };
        f.debug_struct("SecretEntry")
            .field("value", &value)
            .field("digest", &self.digest)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// A secret as reported by the remote store (never carries a value)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSecret {
    pub id: String,
    pub name: String,
    pub digest: String,
    pub created_at: String,
}

/// A name/value pair submitted in a set batch
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SecretInput {
    #[serde(rename = "key")]
    pub name: String,
    pub value: String,
}

impl SecretInput {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for SecretInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretInput")
            .field("name", &self.name)
            .field("value", &"<sensitive>")
            .finish()
    }
}

/// User-declared secrets: name → value
pub type DesiredSecrets = BTreeMap<String, String>;

/// Secrets tracked by the engine: name → entry
///
/// The key set of this map is the managed set. Remote secrets outside it
/// are unmanaged and never touched.
pub type ObservedSecrets = BTreeMap<String, SecretEntry>;
