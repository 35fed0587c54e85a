//! TLS certificate for a custom hostname

use super::{Describe, KNOWN_AFTER_APPLY, ResourceKind, found, ignore_missing, parse_import_id};
use declarative::{ApplyContext, Lifecycle, Result, ensure_unchanged};
use flyapi::{Certificate, Client};
use serde::{Deserialize, Serialize};

/// Declared certificate
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertConfig {
    pub app: String,
    pub hostname: String,
}

/// Tracked certificate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertState {
    pub id: String,
    pub app: String,
    pub hostname: String,
    #[serde(default)]
    pub check: bool,
    #[serde(default)]
    pub dns_validation_instructions: String,
    #[serde(default)]
    pub dns_validation_hostname: String,
    #[serde(default)]
    pub dns_validation_target: String,
}

impl CertState {
    fn from_remote(app: &str, cert: Certificate) -> Self {
        Self {
            id: cert.id,
            app: app.to_string(),
            hostname: cert.hostname,
            check: cert.check,
            dns_validation_instructions: cert.dns_validation_instructions,
            dns_validation_hostname: cert.dns_validation_hostname,
            dns_validation_target: cert.dns_validation_target,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CertResource;

impl Lifecycle for CertResource {
    type Client = Client;
    type Config = CertConfig;
    type State = CertState;

    fn type_name(&self) -> &'static str {
        "cert"
    }

    fn create(&self, ctx: &mut ApplyContext<'_, Client>, config: &CertConfig) -> Result<CertState> {
        let cert = ctx.client.add_certificate(&config.app, &config.hostname)?;
        Ok(CertState::from_remote(&config.app, cert))
    }

    fn read(
        &self,
        ctx: &mut ApplyContext<'_, Client>,
        state: &CertState,
    ) -> Result<Option<CertState>> {
        let cert = found(ctx.client.get_certificate(&state.app, &state.hostname))?;
        Ok(cert.map(|c| CertState::from_remote(&state.app, c)))
    }

    fn update(
        &self,
        _ctx: &mut ApplyContext<'_, Client>,
        config: &CertConfig,
        state: &mut CertState,
    ) -> Result<()> {
        ensure_unchanged("app", state.app.as_str(), config.app.as_str())?;
        ensure_unchanged("hostname", state.hostname.as_str(), config.hostname.as_str())
    }

    fn delete(&self, ctx: &mut ApplyContext<'_, Client>, state: &CertState) -> Result<()> {
        ignore_missing(ctx.client.delete_certificate(&state.app, &state.hostname))
    }

    fn bind_import(&self, id: &str) -> Result<CertState> {
        let mut fields = parse_import_id(ResourceKind::Cert, id, 2)?;
        let hostname = fields.remove(1);
        Ok(CertState {
            app: fields.remove(0),
            hostname,
            ..CertState::default()
        })
    }

    fn needs_update(&self, config: &CertConfig, state: &CertState) -> bool {
        config.app != state.app || config.hostname != state.hostname
    }
}

impl Describe for CertResource {
    const KIND: ResourceKind = ResourceKind::Cert;

    fn key(config: &CertConfig) -> String {
        format!("{}.{}", config.app, config.hostname)
    }

    fn tracked_key(state: &CertState) -> String {
        format!("{}.{}", state.app, state.hostname)
    }

    fn describe(config: &CertConfig, state: Option<&CertState>) -> Vec<String> {
        let Some(state) = state else {
            return vec![
                format!("app = {}", config.app),
                format!("hostname = {}", config.hostname),
                format!("dns_validation_target = {}", KNOWN_AFTER_APPLY),
            ];
        };

        let mut lines = Vec::new();
        if state.app != config.app {
            lines.push(format!("app: {} -> {} (immutable)", state.app, config.app));
        }
        if state.hostname != config.hostname {
            lines.push(format!(
                "hostname: {} -> {} (immutable)",
                state.hostname, config.hostname
            ));
        }
        lines
    }

    fn summarize(state: &CertState) -> Vec<String> {
        vec![
            format!("id = {}", state.id),
            format!("check = {}", state.check),
            format!("dns_validation_hostname = {}", state.dns_validation_hostname),
            format!("dns_validation_target = {}", state.dns_validation_target),
        ]
    }
}
