//! Drift detection
//!
//! Folds a freshly fetched remote snapshot into observed state. Only the
//! managed key set (the keys of the observed map) is considered; anything
//! else in the snapshot is unmanaged and passes through untouched.

use crate::types::{ObservedSecrets, RemoteSecret, SecretEntry, Tracked};
use std::collections::HashMap;

/// Result of folding a snapshot into observed state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Refresh {
    /// Updated observed state
    pub observed: ObservedSecrets,
    /// Managed names whose digest or timestamp changed out of band
    pub drifted: Vec<String>,
    /// Managed names no longer present remotely
    pub removed: Vec<String>,
}

impl Refresh {
    /// Whether anything changed out of band
    pub fn has_drift(&self) -> bool {
        !self.drifted.is_empty() || !self.removed.is_empty()
    }
}

/// Refresh one tracked entry against its remote counterpart
///
/// Returns `None` when the secret disappeared remotely.
pub fn refresh_entry(entry: &SecretEntry, remote: Option<&RemoteSecret>) -> Option<SecretEntry> {
    let remote = remote?;
    if entry.matches(remote) {
        return Some(entry.clone());
    }
    Some(SecretEntry {
        value: Tracked::Unresolved,
        digest: remote.digest.clone(),
        created_at: remote.created_at.clone(),
    })
}

/// Fold a remote snapshot into observed state
pub fn refresh(observed: &ObservedSecrets, snapshot: &[RemoteSecret]) -> Refresh {
    let by_name: HashMap<&str, &RemoteSecret> =
        snapshot.iter().map(|s| (s.name.as_str(), s)).collect();

    let mut result = Refresh::default();
    for (name, entry) in observed {
        match refresh_entry(entry, by_name.get(name.as_str()).copied()) {
            None => {
                log::debug!("Secret {} no longer present remotely", name);
                result.removed.push(name.clone());
            }
            Some(refreshed) => {
                if refreshed != *entry {
                    log::debug!("Secret {} changed out of band", name);
                    result.drifted.push(name.clone());
                }
                result.observed.insert(name.clone(), refreshed);
            }
        }
    }
    result
}
