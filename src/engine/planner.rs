//! Execution planner
//!
//! Compares declarations against refreshed state. Creations and updates are
//! ordered apps first; deletions run in reverse so apps go last.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::FlyformConfig;
use crate::resource::{
    Address, AppResource, AppSecretResource, CertResource, Describe, IpResource, VolumeResource,
};
use crate::state::FlyformState;

/// What will happen to one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// One planned change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    pub address: Address,
    pub action: Action,
    /// Attribute lines shown to the user
    pub details: Vec<String>,
}

/// Ordered list of changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub changes: Vec<PlannedChange>,
    /// Declared resources already up to date
    pub unchanged: usize,
}

impl Plan {
    /// Plan convergence of `state` towards `config`
    pub fn build(config: &FlyformConfig, state: &FlyformState) -> Self {
        let mut plan = Self::default();
        let mut deletes = Vec::new();

        plan.add_kind::<AppResource>(&config.apps, &state.apps, &mut deletes);
        plan.add_kind::<AppSecretResource>(&config.secrets, &state.secrets, &mut deletes);
        plan.add_kind::<VolumeResource>(&config.volumes, &state.volumes, &mut deletes);
        plan.add_kind::<IpResource>(&config.ips, &state.ips, &mut deletes);
        plan.add_kind::<CertResource>(&config.certs, &state.certs, &mut deletes);

        deletes.reverse();
        plan.changes.extend(deletes);
        plan
    }

    /// Plan deletion of everything tracked
    pub fn destroy(state: &FlyformState) -> Self {
        let mut deletes = Vec::new();
        deletes.extend(delete_all::<AppResource>(&state.apps));
        deletes.extend(delete_all::<AppSecretResource>(&state.secrets));
        deletes.extend(delete_all::<VolumeResource>(&state.volumes));
        deletes.extend(delete_all::<IpResource>(&state.ips));
        deletes.extend(delete_all::<CertResource>(&state.certs));
        deletes.reverse();
        Self {
            changes: deletes,
            unchanged: 0,
        }
    }

    fn add_kind<L: Describe>(
        &mut self,
        configs: &[L::Config],
        tracked: &BTreeMap<String, L::State>,
        deletes: &mut Vec<PlannedChange>,
    ) {
        let resource = L::default();
        let mut declared = BTreeSet::new();

        for config in configs {
            let key = L::key(config);
            let address = Address::new(L::KIND, key.as_str());
            match tracked.get(&key) {
                None => self.changes.push(PlannedChange {
                    address,
                    action: Action::Create,
                    details: L::describe(config, None),
                }),
                Some(state) if resource.needs_update(config, state) => {
                    self.changes.push(PlannedChange {
                        address,
                        action: Action::Update,
                        details: L::describe(config, Some(state)),
                    });
                }
                Some(_) => self.unchanged += 1,
            }
            declared.insert(key);
        }

        deletes.extend(
            delete_all::<L>(tracked)
                .into_iter()
                .filter(|change| !declared.contains(&change.address.key)),
        );
    }

    /// Keep only changes selected by a `--target` filter
    pub fn filter(mut self, target: Option<&str>) -> Self {
        if let Some(target) = target {
            self.changes
                .retain(|change| change.address.matches_target(target));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes with the given action
    pub fn count(&self, action: Action) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }
}

fn delete_all<L: Describe>(tracked: &BTreeMap<String, L::State>) -> Vec<PlannedChange> {
    tracked
        .iter()
        .map(|(key, state)| PlannedChange {
            address: Address::new(L::KIND, key.as_str()),
            action: Action::Delete,
            details: L::summarize(state),
        })
        .collect()
}
