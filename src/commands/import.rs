use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use std::collections::BTreeMap;

use super::Session;
use crate::Context;
use crate::resource::{
    Address, AppResource, AppSecretResource, CertResource, Describe, IpResource, ResourceKind,
    VolumeResource,
};
use crate::state::FlyformState;
use crate::ui;
use declarative::{ApplyContext, Diagnostics, Instance};
use flyapi::Client;

pub fn run(ctx: &Context, address: &str, id: &str) -> Result<()> {
    let address: Address = address.parse()?;
    let mut session = Session::load(ctx)?;

    if session.state.contains(&address) {
        bail!(
            "{} is already tracked; remove it from state before importing again",
            address
        );
    }

    let Session { state, client, .. } = &mut session;
    let diagnostics = import_into(client, state, &address, id)
        .with_context(|| format!("Failed to import {}", address))?;
    session.save()?;

    ui::diagnostics(&diagnostics);
    ui::success(&format!("Imported {}", address.to_string().bold()));
    Ok(())
}

/// Hydrate one resource from the remote and track it under `address`
pub fn import_into(
    client: &Client,
    state: &mut FlyformState,
    address: &Address,
    id: &str,
) -> Result<Diagnostics> {
    match address.kind {
        ResourceKind::App => import_kind::<AppResource>(client, &mut state.apps, address, id),
        ResourceKind::Secret => {
            import_kind::<AppSecretResource>(client, &mut state.secrets, address, id)
        }
        ResourceKind::Volume => {
            import_kind::<VolumeResource>(client, &mut state.volumes, address, id)
        }
        ResourceKind::Ip => import_kind::<IpResource>(client, &mut state.ips, address, id),
        ResourceKind::Cert => import_kind::<CertResource>(client, &mut state.certs, address, id),
    }
}

fn import_kind<L: Describe>(
    client: &Client,
    tracked: &mut BTreeMap<String, L::State>,
    address: &Address,
    id: &str,
) -> Result<Diagnostics> {
    let mut ctx = ApplyContext::new(client);
    let mut instance = Instance::new(L::default());
    instance.import(&mut ctx, id)?;

    let Some(imported) = instance.into_state() else {
        bail!("Import of {} returned no state", address);
    };
    let key = L::tracked_key(&imported);
    if key != address.key {
        bail!(
            "Identifier {} resolves to {}.{}, not {}",
            id,
            L::KIND,
            key,
            address
        );
    }

    tracked.insert(key, imported);
    Ok(ctx.take_diagnostics())
}
