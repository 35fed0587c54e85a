//! Declaration file (`flyform.toml`)
//!
//! ```toml
//! [provider]
//! org = "acme"
//!
//! [[app]]
//! name = "web"
//! [app.secrets]
//! DATABASE_URL = "${DATABASE_URL}"
//!
//! [[volume]]
//! app = "web"
//! name = "data"
//! region = "ams"
//! size_gb = 10
//! ```

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::resource::app::AppConfig;
use crate::resource::app_secret::SecretConfig;
use crate::resource::cert::CertConfig;
use crate::resource::ip::IpConfig;
use crate::resource::volume::VolumeConfig;
use crate::resource::{
    AppResource, AppSecretResource, CertResource, Describe, IpResource, VolumeResource,
};

/// Default declaration file name
pub const DEFAULT_CONFIG_FILE: &str = "flyform.toml";

// ============================================================================
// Config Structures
// ============================================================================

/// Provider settings
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API token; `FLY_API_TOKEN` when omitted
    #[serde(default)]
    pub token: Option<String>,
    /// GraphQL endpoint override
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Organization slug used by apps that don't name one
    #[serde(default)]
    pub org: Option<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("org", &self.org)
            .finish()
    }
}

/// Everything declared in `flyform.toml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlyformConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default, rename = "app")]
    pub apps: Vec<AppConfig>,
    #[serde(default, rename = "secret")]
    pub secrets: Vec<SecretConfig>,
    #[serde(default, rename = "volume")]
    pub volumes: Vec<VolumeConfig>,
    #[serde(default, rename = "ip")]
    pub ips: Vec<IpConfig>,
    #[serde(default, rename = "cert")]
    pub certs: Vec<CertConfig>,
}

impl FlyformConfig {
    /// Load, expand and validate a declaration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse, expand and validate declaration text
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.expand()?;
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Build the API client configuration
    pub fn client_config(&self) -> Result<flyapi::ClientConfig> {
        let mut client = flyapi::ClientConfig::from_env(self.provider.token.clone())?;
        if let Some(endpoint) = &self.provider.endpoint {
            client = client.with_endpoint(endpoint.as_str());
        }
        Ok(client)
    }

    /// Expand `~` and `${VAR}` in tokens and secret values
    fn expand(&mut self) -> Result<()> {
        if let Some(token) = self.provider.token.as_mut() {
            *token = expand_value(token).context("Failed to expand provider token")?;
        }
        for app in &mut self.apps {
            for (name, value) in &mut app.secrets {
                *value = expand_value(value)
                    .with_context(|| format!("Failed to expand secret {} of app {}", name, app.name))?;
            }
        }
        for secret in &mut self.secrets {
            secret.value = expand_value(&secret.value).with_context(|| {
                format!("Failed to expand secret {} of app {}", secret.name, secret.app)
            })?;
        }
        Ok(())
    }

    fn apply_defaults(&mut self) {
        let Some(org) = &self.provider.org else {
            return;
        };
        for app in &mut self.apps {
            if app.org.is_none() {
                app.org = Some(org.clone());
            }
        }
    }

    fn validate(&self) -> Result<()> {
        for app in &self.apps {
            require("app name", &app.name)?;
            for name in app.secrets.keys() {
                require("secret name", name)?;
            }
        }
        for secret in &self.secrets {
            require("secret app", &secret.app)?;
            require("secret name", &secret.name)?;
            let shadowed = self
                .apps
                .iter()
                .any(|app| app.name == secret.app && app.secrets.contains_key(&secret.name));
            if shadowed {
                bail!(
                    "Secret {} of app {} is declared both in [[app]] and [[secret]]",
                    secret.name,
                    secret.app
                );
            }
        }
        for volume in &self.volumes {
            require("volume app", &volume.app)?;
            require("volume name", &volume.name)?;
            require("volume region", &volume.region)?;
            if volume.size_gb == 0 {
                bail!("Volume {} must have a positive size_gb", volume.name);
            }
        }
        for ip in &self.ips {
            require("ip app", &ip.app)?;
        }
        for cert in &self.certs {
            require("cert app", &cert.app)?;
            require("cert hostname", &cert.hostname)?;
        }

        unique_keys::<AppResource>(&self.apps)?;
        unique_keys::<AppSecretResource>(&self.secrets)?;
        unique_keys::<VolumeResource>(&self.volumes)?;
        unique_keys::<IpResource>(&self.ips)?;
        unique_keys::<CertResource>(&self.certs)?;
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn expand_value(value: &str) -> Result<String> {
    Ok(shellexpand::full(value)?.into_owned())
}

fn require(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{} must not be empty", what);
    }
    Ok(())
}

fn unique_keys<L: Describe>(configs: &[L::Config]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for config in configs {
        let key = L::key(config);
        if !seen.insert(key.clone()) {
            bail!("Duplicate declaration of {}.{}", L::KIND, key);
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
