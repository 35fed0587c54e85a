//! IP address allocated to an app

use super::{Describe, KNOWN_AFTER_APPLY, ResourceKind, found, ignore_missing, parse_import_id};
use declarative::{ApplyContext, Lifecycle, Result, ensure_unchanged};
use flyapi::{AllocateIpInput, Client, IpAddress, IpAddressType};
use serde::{Deserialize, Serialize};

fn default_region() -> String {
    "global".to_string()
}

/// Declared IP allocation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IpConfig {
    pub app: String,
    #[serde(rename = "type")]
    pub address_type: IpAddressType,
    #[serde(default = "default_region")]
    pub region: String,
}

/// Tracked IP allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpState {
    pub id: String,
    pub app: String,
    pub address: String,
    #[serde(rename = "type")]
    pub address_type: IpAddressType,
    pub region: String,
}

impl IpState {
    fn from_remote(app: &str, ip: IpAddress) -> Self {
        Self {
            id: ip.id,
            app: app.to_string(),
            address: ip.address,
            address_type: ip.address_type,
            region: ip.region,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IpResource;

impl Lifecycle for IpResource {
    type Client = Client;
    type Config = IpConfig;
    type State = IpState;

    fn type_name(&self) -> &'static str {
        "ip"
    }

    fn create(&self, ctx: &mut ApplyContext<'_, Client>, config: &IpConfig) -> Result<IpState> {
        let ip = ctx.client.allocate_ip(&AllocateIpInput {
            app_id: config.app.clone(),
            address_type: config.address_type,
            region: config.region.clone(),
        })?;
        Ok(IpState::from_remote(&config.app, ip))
    }

    fn read(&self, ctx: &mut ApplyContext<'_, Client>, state: &IpState) -> Result<Option<IpState>> {
        let ip = found(ctx.client.get_ip(&state.app, &state.address))?;
        Ok(ip.map(|ip| IpState::from_remote(&state.app, ip)))
    }

    fn update(
        &self,
        _ctx: &mut ApplyContext<'_, Client>,
        config: &IpConfig,
        state: &mut IpState,
    ) -> Result<()> {
        ensure_unchanged("app", state.app.as_str(), config.app.as_str())?;
        ensure_unchanged("type", &state.address_type, &config.address_type)?;
        ensure_unchanged("region", state.region.as_str(), config.region.as_str())
    }

    fn delete(&self, ctx: &mut ApplyContext<'_, Client>, state: &IpState) -> Result<()> {
        ignore_missing(ctx.client.release_ip(&state.id))
    }

    fn bind_import(&self, id: &str) -> Result<IpState> {
        let mut fields = parse_import_id(ResourceKind::Ip, id, 2)?;
        let address = fields.remove(1);
        Ok(IpState {
            id: String::new(),
            app: fields.remove(0),
            address,
            address_type: IpAddressType::V4,
            region: default_region(),
        })
    }

    fn needs_update(&self, config: &IpConfig, state: &IpState) -> bool {
        config.app != state.app
            || config.address_type != state.address_type
            || config.region != state.region
    }
}

impl Describe for IpResource {
    const KIND: ResourceKind = ResourceKind::Ip;

    fn key(config: &IpConfig) -> String {
        format!("{}.{}.{}", config.app, config.address_type, config.region)
    }

    fn tracked_key(state: &IpState) -> String {
        format!("{}.{}.{}", state.app, state.address_type, state.region)
    }

    fn describe(config: &IpConfig, state: Option<&IpState>) -> Vec<String> {
        let Some(state) = state else {
            return vec![
                format!("app = {}", config.app),
                format!("type = {}", config.address_type),
                format!("region = {}", config.region),
                format!("address = {}", KNOWN_AFTER_APPLY),
            ];
        };

        let mut lines = Vec::new();
        if state.app != config.app {
            lines.push(format!("app: {} -> {} (immutable)", state.app, config.app));
        }
        if state.address_type != config.address_type {
            lines.push(format!(
                "type: {} -> {} (immutable)",
                state.address_type, config.address_type
            ));
        }
        if state.region != config.region {
            lines.push(format!(
                "region: {} -> {} (immutable)",
                state.region, config.region
            ));
        }
        lines
    }

    fn summarize(state: &IpState) -> Vec<String> {
        vec![
            format!("id = {}", state.id),
            format!("address = {}", state.address),
            format!("type = {}", state.address_type),
            format!("region = {}", state.region),
        ]
    }
}
