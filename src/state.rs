use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::resource::app::AppState;
use crate::resource::app_secret::AppSecretState;
use crate::resource::cert::CertState;
use crate::resource::ip::IpState;
use crate::resource::volume::VolumeState;
use crate::resource::{Address, ResourceKind};

/// Directory holding the state file, next to the config
pub const STATE_DIR: &str = ".flyform";

// ============================================================================
// State Structures
// ============================================================================

/// Tracked state of every managed resource, keyed by address key
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FlyformState {
    #[serde(default)]
    pub apps: BTreeMap<String, AppState>,

    #[serde(default)]
    pub secrets: BTreeMap<String, AppSecretState>,

    #[serde(default)]
    pub volumes: BTreeMap<String, VolumeState>,

    #[serde(default)]
    pub ips: BTreeMap<String, IpState>,

    #[serde(default)]
    pub certs: BTreeMap<String, CertState>,

    /// Last time the state was written
    pub last_updated: DateTime<Utc>,
}

impl Default for FlyformState {
    fn default() -> Self {
        Self {
            apps: BTreeMap::new(),
            secrets: BTreeMap::new(),
            volumes: BTreeMap::new(),
            ips: BTreeMap::new(),
            certs: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// FlyformState Implementation
// ============================================================================

impl FlyformState {
    /// State file path for a config file: `<config dir>/.flyform/state.toml`
    pub fn path_for(config_path: &Path) -> PathBuf {
        config_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(STATE_DIR)
            .join("state.toml")
    }

    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Update the last_updated timestamp and save
    pub fn touch(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now();
        self.save(path)
    }

    // ========================================================================
    // Address Helpers
    // ========================================================================

    /// Every tracked address, in kind order
    pub fn addresses(&self) -> Vec<Address> {
        let mut out: Vec<Address> = keys_of(ResourceKind::App, &self.apps).collect();
        out.extend(keys_of(ResourceKind::Secret, &self.secrets));
        out.extend(keys_of(ResourceKind::Volume, &self.volumes));
        out.extend(keys_of(ResourceKind::Ip, &self.ips));
        out.extend(keys_of(ResourceKind::Cert, &self.certs));
        out
    }

    /// Whether an address is tracked
    pub fn contains(&self, address: &Address) -> bool {
        let key = &address.key;
        match address.kind {
            ResourceKind::App => self.apps.contains_key(key),
            ResourceKind::Secret => self.secrets.contains_key(key),
            ResourceKind::Volume => self.volumes.contains_key(key),
            ResourceKind::Ip => self.ips.contains_key(key),
            ResourceKind::Cert => self.certs.contains_key(key),
        }
    }

    pub fn len(&self) -> usize {
        self.apps.len() + self.secrets.len() + self.volumes.len() + self.ips.len() + self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn keys_of<V>(kind: ResourceKind, map: &BTreeMap<String, V>) -> impl Iterator<Item = Address> + '_ {
    map.keys().map(move |key| Address::new(kind, key.as_str()))
}

// ============================================================================
// Tests
// ============================================================================
