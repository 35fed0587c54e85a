//! Diff computation for secrets
//!
//! Compares declared values against the last declared values tracked in
//! observed state. The remote digest is never consulted here; digest
//! mismatches surface only through [`crate::drift`].

use crate::types::{DesiredSecrets, ObservedSecrets};
use std::collections::BTreeSet;

/// Minimal mutation sets between desired and observed secrets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretDiff {
    /// Declared but not tracked
    pub to_add: BTreeSet<String>,
    /// Tracked but no longer declared
    pub to_remove: BTreeSet<String>,
    /// Declared and tracked with a different declared value
    pub to_change: BTreeSet<String>,
}

impl SecretDiff {
    /// Check if nothing needs to happen
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty() && self.to_change.is_empty()
    }

    /// Names that go into the set batch (`to_add ∪ to_change`), with their declared values
    pub fn set_batch(&self, desired: &DesiredSecrets) -> DesiredSecrets {
        self.to_add
            .iter()
            .chain(self.to_change.iter())
            .filter_map(|name| desired.get(name).map(|value| (name.clone(), value.clone())))
            .collect()
    }

    /// Summary counts
    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            additions: self.to_add.len(),
            removals: self.to_remove.len(),
            modifications: self.to_change.len(),
        }
    }
}

/// Compute the diff between desired and observed secrets
///
/// An `Unresolved` observed value always counts as changed, since the
/// declared value can no longer be confirmed.
pub fn diff(desired: &DesiredSecrets, observed: &ObservedSecrets) -> SecretDiff {
    let mut result = SecretDiff::default();

    for (name, value) in desired {
        match observed.get(name) {
            None => {
                result.to_add.insert(name.clone());
            }
            Some(entry) if entry.value.as_known() != Some(value) => {
                result.to_change.insert(name.clone());
            }
            Some(_) => {}
        }
    }

    result.to_remove = observed
        .keys()
        .filter(|name| !desired.contains_key(*name))
        .cloned()
        .collect();

    result
}

/// Diff summary statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of secrets to add
    pub additions: usize,
    /// Number of secrets to remove
    pub removals: usize,
    /// Number of secrets to modify
    pub modifications: usize,
}

impl DiffSummary {
    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}
