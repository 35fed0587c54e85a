//! Parallel refresh of tracked state
//!
//! Every tracked instance is read independently; the client handle is the
//! only thing shared between threads. Apps are refreshed before the
//! resources attached to them.

use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::resource::{
    Address, AppResource, AppSecretResource, CertResource, Describe, IpResource, VolumeResource,
};
use crate::state::FlyformState;
use declarative::{ApplyContext, Diagnostics, Instance};
use flyapi::Client;

/// Outcome of refreshing every tracked resource
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Warnings raised while reading
    pub diagnostics: Diagnostics,
    /// Resources found missing and dropped from state
    pub removed: Vec<Address>,
    /// Resources whose read failed; their state is left as it was
    pub failed: Vec<(Address, declarative::Error)>,
}

impl RefreshReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Read every tracked resource and fold the results into `state`
pub fn refresh_all(client: &Client, state: &mut FlyformState) -> RefreshReport {
    let mut report = RefreshReport::default();
    refresh_kind::<AppResource>(client, &mut state.apps, &mut report);
    refresh_kind::<AppSecretResource>(client, &mut state.secrets, &mut report);
    refresh_kind::<VolumeResource>(client, &mut state.volumes, &mut report);
    refresh_kind::<IpResource>(client, &mut state.ips, &mut report);
    refresh_kind::<CertResource>(client, &mut state.certs, &mut report);
    report
}

type Refreshed<S> = (String, Diagnostics, declarative::Result<Option<S>>);

fn refresh_kind<L: Describe>(
    client: &Client,
    tracked: &mut BTreeMap<String, L::State>,
    report: &mut RefreshReport,
) {
    let results: Vec<Refreshed<L::State>> = tracked
        .par_iter()
        .map(|(key, state)| {
            let mut ctx = ApplyContext::new(client);
            let mut instance = Instance::tracked(L::default(), state.clone());
            let result = instance.refresh(&mut ctx).map(|()| instance.into_state());
            (key.clone(), ctx.take_diagnostics(), result)
        })
        .collect();

    for (key, diagnostics, result) in results {
        report.diagnostics.extend(diagnostics);
        match result {
            Ok(Some(state)) => {
                tracked.insert(key, state);
            }
            Ok(None) => {
                tracked.remove(&key);
                report.removed.push(Address::new(L::KIND, key));
            }
            Err(err) => {
                log::debug!("Refresh of {}.{} failed: {}", L::KIND, key, err);
                report.failed.push((Address::new(L::KIND, key), err));
            }
        }
    }
}
