//! Backend traits and implementations for talking to Fly.
//!
//! This module provides the [`Backend`] trait and two implementations:
//! [`graphql::GraphqlBackend`] for the real API and [`MockBackend`] for
//! tests.
//!
//! # Testing
//!
//! Use [`MockBackend`] for testing without network access:
//!
//! ```
//! use flyapi::backend::{Backend, Call, MockBackend};
//!
//! let mock = MockBackend::new();
//! let org = mock.default_org().unwrap();
//! mock.create_app("web", &org.id).unwrap();
//!
//! assert_eq!(mock.calls().len(), 2);
//! assert!(matches!(mock.calls()[1], Call::CreateApp { .. }));
//! ```

pub mod graphql;
pub mod queries;

use crate::error::{Error, GraphqlError, Result};
use crate::types::{
    AllocateIpInput, App, AppDetails, Certificate, CreateVolumeInput, IpAddress, IpAddressType,
    Organization, Secret, Volume,
};
use chrono::{DateTime, Utc};
use declarative::SecretInput;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Backend trait for Fly API operations.
///
/// This abstraction allows swapping the real GraphQL API for an in-memory
/// implementation in tests.
pub trait Backend: Send + Sync {
    /// Look up an organization by slug.
    fn resolve_org(&self, slug: &str) -> Result<Organization>;

    /// The caller's personal organization.
    fn default_org(&self) -> Result<Organization>;

    /// Create an app.
    fn create_app(&self, name: &str, org_id: &str) -> Result<App>;

    /// Fetch an app with its secret metadata.
    fn get_app(&self, name: &str) -> Result<App>;

    /// Fetch detailed app information.
    fn get_app_details(&self, name: &str) -> Result<AppDetails>;

    /// Delete an app and everything attached to it.
    fn delete_app(&self, name: &str) -> Result<()>;

    /// Set a batch of secrets; returns the app's complete secret set.
    fn set_secrets(&self, app: &str, secrets: &[SecretInput]) -> Result<Vec<Secret>>;

    /// Unset a batch of secrets.
    fn unset_secrets(&self, app: &str, keys: &[String]) -> Result<()>;

    /// Fetch the app's complete secret set.
    fn get_secrets(&self, app: &str) -> Result<Vec<Secret>>;

    /// Create a volume.
    fn create_volume(&self, input: &CreateVolumeInput) -> Result<Volume>;

    /// Fetch a volume by its internal ID.
    fn get_volume(&self, app: &str, internal_id: &str) -> Result<Volume>;

    /// Delete a volume by ID.
    fn delete_volume(&self, id: &str) -> Result<()>;

    /// Allocate an IP address.
    fn allocate_ip(&self, input: &AllocateIpInput) -> Result<IpAddress>;

    /// Fetch an allocated IP address.
    fn get_ip(&self, app: &str, address: &str) -> Result<IpAddress>;

    /// Release an IP address by allocation ID.
    fn release_ip(&self, id: &str) -> Result<()>;

    /// Add a certificate for a hostname.
    fn add_certificate(&self, app: &str, hostname: &str) -> Result<Certificate>;

    /// Fetch a certificate.
    fn get_certificate(&self, app: &str, hostname: &str) -> Result<Certificate>;

    /// Delete a certificate.
    fn delete_certificate(&self, app: &str, hostname: &str) -> Result<()>;
}

/// A call recorded by [`MockBackend`].
///
/// Secret values are recorded so tests can assert batch contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ResolveOrg(String),
    DefaultOrg,
    CreateApp { name: String, org_id: String },
    GetApp(String),
    GetAppDetails(String),
    DeleteApp(String),
    SetSecrets { app: String, secrets: Vec<(String, String)> },
    UnsetSecrets { app: String, keys: Vec<String> },
    GetSecrets(String),
    CreateVolume(String),
    GetVolume(String),
    DeleteVolume(String),
    AllocateIp(IpAddressType),
    GetIp(String),
    ReleaseIp(String),
    AddCertificate(String),
    GetCertificate(String),
    DeleteCertificate(String),
}

impl Call {
    /// Whether this call mutates remote state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::ResolveOrg(_)
                | Self::DefaultOrg
                | Self::GetApp(_)
                | Self::GetAppDetails(_)
                | Self::GetSecrets(_)
                | Self::GetVolume(_)
                | Self::GetIp(_)
                | Self::GetCertificate(_)
        )
    }
}

#[derive(Debug, Clone)]
struct StoredSecret {
    value: String,
    secret: Secret,
}

#[derive(Debug, Clone)]
struct MockApp {
    id: String,
    organization: Organization,
    secrets: BTreeMap<String, StoredSecret>,
}

#[derive(Debug, Default)]
struct MockState {
    orgs: Vec<Organization>,
    apps: BTreeMap<String, MockApp>,
    volumes: Vec<(String, Volume)>,
    ips: Vec<(String, IpAddress)>,
    certs: Vec<(String, Certificate)>,
    calls: Vec<Call>,
    fail_next: Option<Error>,
    clock: i64,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_{}", prefix, self.next_id)
    }

    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        DateTime::from_timestamp(1_700_000_000 + self.clock, 0).unwrap_or_default()
    }

    fn app(&self, name: &str) -> Result<&MockApp> {
        self.apps
            .get(name)
            .ok_or_else(|| Error::not_found(format!("App {}", name)))
    }

    fn app_mut(&mut self, name: &str) -> Result<&mut MockApp> {
        self.apps
            .get_mut(name)
            .ok_or_else(|| Error::not_found(format!("App {}", name)))
    }

    fn to_app(&self, name: &str) -> Result<App> {
        let app = self.app(name)?;
        Ok(App {
            id: app.id.clone(),
            name: name.to_string(),
            app_url: Some(format!("https://{}.fly.dev", name)),
            organization: app.organization.clone(),
            secrets: app.secrets.values().map(|s| s.secret.clone()).collect(),
        })
    }

    fn write_secret(&mut self, app: &str, name: &str, value: &str) -> Result<()> {
        let id = self.next_id("sec");
        let created_at = self.tick();
        let app = self.app_mut(app)?;
        app.secrets.insert(
            name.to_string(),
            StoredSecret {
                value: value.to_string(),
                secret: Secret {
                    id,
                    name: name.to_string(),
                    digest: mock_digest(value),
                    created_at,
                },
            },
        );
        Ok(())
    }
}

/// Digest the mock assigns to a value.
pub fn mock_digest(value: &str) -> String {
    blake3::hash(value.as_bytes()).to_hex()[..16].to_string()
}

/// Mock backend for testing without network access.
///
/// Behaves like the API where it matters for reconciliation: every secret
/// write gets a fresh digest and timestamp, a set batch whose values all
/// match the stored content fails with "No change detected", and lookups of
/// missing entities fail with a `NOT_FOUND` error.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a new mock backend with a personal organization.
    #[must_use]
    pub fn new() -> Self {
        let mock = Self::default();
        mock.add_org(Organization {
            id: "org_personal".to_string(),
            slug: "personal".to_string(),
            name: "Personal".to_string(),
        });
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an organization; the first one added is the personal organization.
    pub fn add_org(&self, org: Organization) {
        self.state().orgs.push(org);
    }

    /// Create an app directly, without recording a call.
    pub fn seed_app(&self, name: &str) {
        let mut state = self.state();
        let id = state.next_id("app");
        let organization = state.orgs.first().cloned().unwrap_or(Organization {
            id: "org_personal".to_string(),
            slug: "personal".to_string(),
            name: String::new(),
        });
        state.apps.insert(
            name.to_string(),
            MockApp {
                id,
                organization,
                secrets: BTreeMap::new(),
            },
        );
    }

    /// Write a secret out of band, without recording a call.
    pub fn seed_secret(&self, app: &str, name: &str, value: &str) -> Result<()> {
        self.state().write_secret(app, name, value)
    }

    /// Remove a secret out of band.
    pub fn remove_secret(&self, app: &str, name: &str) {
        if let Some(app) = self.state().apps.get_mut(app) {
            app.secrets.remove(name);
        }
    }

    /// Delete an app out of band.
    pub fn remove_app(&self, name: &str) {
        self.state().apps.remove(name);
    }

    /// Names of the secrets currently stored for an app.
    pub fn secret_names(&self, app: &str) -> Vec<String> {
        self.state()
            .apps
            .get(app)
            .map(|a| a.secrets.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Make the next call fail with the given error.
    pub fn fail_next(&self, err: Error) {
        self.state().fail_next = Some(err);
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Recorded calls that mutate remote state.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Record a call and return the state, or the injected failure.
    fn begin(&self, call: Call) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.state();
        state.calls.push(call);
        match state.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

impl Backend for MockBackend {
    fn resolve_org(&self, slug: &str) -> Result<Organization> {
        let state = self.begin(Call::ResolveOrg(slug.to_string()))?;
        state
            .orgs
            .iter()
            .find(|o| o.slug == slug)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("Organization {}", slug)))
    }

    fn default_org(&self) -> Result<Organization> {
        let state = self.begin(Call::DefaultOrg)?;
        state
            .orgs
            .first()
            .cloned()
            .ok_or_else(|| Error::not_found("personal organization"))
    }

    fn create_app(&self, name: &str, org_id: &str) -> Result<App> {
        let mut state = self.begin(Call::CreateApp {
            name: name.to_string(),
            org_id: org_id.to_string(),
        })?;
        if state.apps.contains_key(name) {
            return Err(Error::Graphql(vec![
                GraphqlError::new("Name has already been taken").with_path(["createApp"]),
            ]));
        }
        let organization = state
            .orgs
            .iter()
            .find(|o| o.id == org_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("Organization {}", org_id)))?;
        let id = state.next_id("app");
        state.apps.insert(
            name.to_string(),
            MockApp {
                id,
                organization,
                secrets: BTreeMap::new(),
            },
        );
        state.to_app(name)
    }

    fn get_app(&self, name: &str) -> Result<App> {
        let state = self.begin(Call::GetApp(name.to_string()))?;
        state.to_app(name)
    }

    fn get_app_details(&self, name: &str) -> Result<AppDetails> {
        let state = self.begin(Call::GetAppDetails(name.to_string()))?;
        let app = state.to_app(name)?;
        Ok(AppDetails {
            id: app.id,
            name: app.name,
            app_url: app.app_url,
            hostname: Some(format!("{}.fly.dev", name)),
            status: "pending".to_string(),
            deployed: false,
            current_release: None,
            health_checks: Vec::new(),
            ip_addresses: state
                .ips
                .iter()
                .filter(|(owner, _)| owner == name)
                .map(|(_, ip)| ip.address.clone())
                .collect(),
        })
    }

    fn delete_app(&self, name: &str) -> Result<()> {
        let mut state = self.begin(Call::DeleteApp(name.to_string()))?;
        state
            .apps
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("App {}", name)))?;
        state.volumes.retain(|(owner, _)| owner != name);
        state.ips.retain(|(owner, _)| owner != name);
        state.certs.retain(|(owner, _)| owner != name);
        Ok(())
    }

    fn set_secrets(&self, app: &str, secrets: &[SecretInput]) -> Result<Vec<Secret>> {
        let mut state = self.begin(Call::SetSecrets {
            app: app.to_string(),
            secrets: secrets
                .iter()
                .map(|s| (s.name.clone(), s.value.clone()))
                .collect(),
        })?;

        let stored = &state.app(app)?.secrets;
        let changed: Vec<&SecretInput> = secrets
            .iter()
            .filter(|s| stored.get(&s.name).is_none_or(|cur| cur.value != s.value))
            .collect();
        if changed.is_empty() {
            return Err(Error::Graphql(vec![
                GraphqlError::new("No change detected to secrets").with_path(["setSecrets"]),
            ]));
        }

        let changed: Vec<(String, String)> = changed
            .into_iter()
            .map(|s| (s.name.clone(), s.value.clone()))
            .collect();
        for (name, value) in &changed {
            state.write_secret(app, name, value)?;
        }
        Ok(state.to_app(app)?.secrets)
    }

    fn unset_secrets(&self, app: &str, keys: &[String]) -> Result<()> {
        let mut state = self.begin(Call::UnsetSecrets {
            app: app.to_string(),
            keys: keys.to_vec(),
        })?;
        let stored = &mut state.app_mut(app)?.secrets;
        let removed = keys.iter().filter(|k| stored.remove(*k).is_some()).count();
        if removed == 0 {
            return Err(Error::Graphql(vec![
                GraphqlError::new("No change detected to secrets").with_path(["unsetSecrets"]),
            ]));
        }
        Ok(())
    }

    fn get_secrets(&self, app: &str) -> Result<Vec<Secret>> {
        let state = self.begin(Call::GetSecrets(app.to_string()))?;
        Ok(state.to_app(app)?.secrets)
    }

    fn create_volume(&self, input: &CreateVolumeInput) -> Result<Volume> {
        let mut state = self.begin(Call::CreateVolume(input.name.clone()))?;
        state.app(&input.app_id)?;
        let id = state.next_id("vol");
        let volume = Volume {
            internal_id: id.replace("vol_", "int_"),
            id,
            name: input.name.clone(),
            size_gb: input.size_gb,
            region: input.region.clone(),
        };
        state.volumes.push((input.app_id.clone(), volume.clone()));
        Ok(volume)
    }

    fn get_volume(&self, app: &str, internal_id: &str) -> Result<Volume> {
        let state = self.begin(Call::GetVolume(internal_id.to_string()))?;
        state.app(app)?;
        state
            .volumes
            .iter()
            .find(|(owner, v)| owner == app && v.internal_id == internal_id)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| Error::not_found(format!("Volume {}", internal_id)))
    }

    fn delete_volume(&self, id: &str) -> Result<()> {
        let mut state = self.begin(Call::DeleteVolume(id.to_string()))?;
        let before = state.volumes.len();
        state.volumes.retain(|(_, v)| v.id != id);
        if state.volumes.len() == before {
            return Err(Error::not_found(format!("Volume {}", id)));
        }
        Ok(())
    }

    fn allocate_ip(&self, input: &AllocateIpInput) -> Result<IpAddress> {
        let mut state = self.begin(Call::AllocateIp(input.address_type))?;
        state.app(&input.app_id)?;
        let id = state.next_id("ip");
        let n = state.next_id;
        let address = match input.address_type {
            IpAddressType::V4 => format!("137.66.0.{}", n % 255),
            IpAddressType::V6 => format!("2a09:8280:1::{:x}", n),
            IpAddressType::PrivateV6 => format!("fdaa:0:1::{:x}", n),
        };
        let ip = IpAddress {
            id,
            address,
            address_type: input.address_type,
            region: input.region.clone(),
        };
        state.ips.push((input.app_id.clone(), ip.clone()));
        Ok(ip)
    }

    fn get_ip(&self, app: &str, address: &str) -> Result<IpAddress> {
        let state = self.begin(Call::GetIp(address.to_string()))?;
        state.app(app)?;
        state
            .ips
            .iter()
            .find(|(owner, ip)| owner == app && ip.address == address)
            .map(|(_, ip)| ip.clone())
            .ok_or_else(|| Error::not_found(format!("IPAddress {}", address)))
    }

    fn release_ip(&self, id: &str) -> Result<()> {
        let mut state = self.begin(Call::ReleaseIp(id.to_string()))?;
        let before = state.ips.len();
        state.ips.retain(|(_, ip)| ip.id != id);
        if state.ips.len() == before {
            return Err(Error::not_found(format!("IPAddress {}", id)));
        }
        Ok(())
    }

    fn add_certificate(&self, app: &str, hostname: &str) -> Result<Certificate> {
        let mut state = self.begin(Call::AddCertificate(hostname.to_string()))?;
        state.app(app)?;
        let id = state.next_id("cert");
        let cert = Certificate {
            id,
            hostname: hostname.to_string(),
            check: false,
            dns_validation_instructions: format!(
                "CNAME _acme-challenge.{} => {}.{}.flydns.net.",
                hostname, hostname, app
            ),
            dns_validation_hostname: format!("_acme-challenge.{}", hostname),
            dns_validation_target: format!("{}.{}.flydns.net", hostname, app),
        };
        state.certs.push((app.to_string(), cert.clone()));
        Ok(cert)
    }

    fn get_certificate(&self, app: &str, hostname: &str) -> Result<Certificate> {
        let state = self.begin(Call::GetCertificate(hostname.to_string()))?;
        state.app(app)?;
        state
            .certs
            .iter()
            .find(|(owner, c)| owner == app && c.hostname == hostname)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| Error::not_found(format!("Certificate {}", hostname)))
    }

    fn delete_certificate(&self, app: &str, hostname: &str) -> Result<()> {
        let mut state = self.begin(Call::DeleteCertificate(hostname.to_string()))?;
        let before = state.certs.len();
        state
            .certs
            .retain(|(owner, c)| !(owner == app && c.hostname == hostname));
        if state.certs.len() == before {
            return Err(Error::not_found(format!("Certificate {}", hostname)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_with_app(name: &str) -> MockBackend {
        let mock = MockBackend::new();
        mock.seed_app(name);
        mock
    }

    #[test]
    fn test_mock_backend_new() {
        let mock = MockBackend::new();
        assert_eq!(mock.default_org().unwrap().slug, "personal");
        assert!(mock.resolve_org("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_create_and_get_app() {
        let mock = MockBackend::new();
        let org = mock.default_org().unwrap();
        let app = mock.create_app("web", &org.id).unwrap();
        assert_eq!(app.organization.slug, "personal");

        let fetched = mock.get_app("web").unwrap();
        assert_eq!(fetched.id, app.id);
        assert!(mock.get_app("api").unwrap_err().is_not_found());
        assert!(mock.create_app("web", &org.id).is_err());
    }

    #[test]
    fn test_set_secrets_assigns_fresh_metadata() {
        let mock = mock_with_app("web");
        let first = mock
            .set_secrets("web", &[SecretInput::new("A", "1")])
            .unwrap();
        let second = mock
            .set_secrets("web", &[SecretInput::new("A", "2")])
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_ne!(first[0].digest, second[0].digest);
        assert_ne!(first[0].created_at, second[0].created_at);
        assert_eq!(second[0].digest, mock_digest("2"));
    }

    #[test]
    fn test_set_unchanged_is_no_change() {
        let mock = mock_with_app("web");
        mock.seed_secret("web", "A", "1").unwrap();

        let err = mock
            .set_secrets("web", &[SecretInput::new("A", "1")])
            .unwrap_err();
        assert!(err.is_no_change());
    }

    #[test]
    fn test_set_returns_complete_set() {
        let mock = mock_with_app("web");
        mock.seed_secret("web", "UNMANAGED", "x").unwrap();

        let secrets = mock
            .set_secrets("web", &[SecretInput::new("A", "1")])
            .unwrap();
        let names: Vec<_> = secrets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "UNMANAGED"]);
    }

    #[test]
    fn test_unset_secrets() {
        let mock = mock_with_app("web");
        mock.seed_secret("web", "A", "1").unwrap();

        mock.unset_secrets("web", &["A".to_string()]).unwrap();
        assert!(mock.secret_names("web").is_empty());
        assert!(mock.unset_secrets("web", &["A".to_string()]).unwrap_err().is_no_change());
    }

    #[test]
    fn test_fail_next_and_calls() {
        let mock = mock_with_app("web");
        mock.fail_next(Error::http("connection reset", None));

        assert!(mock.get_secrets("web").unwrap_err().is_retryable());
        assert!(mock.get_secrets("web").is_ok());
        assert_eq!(
            mock.calls(),
            vec![Call::GetSecrets("web".into()), Call::GetSecrets("web".into())]
        );
        assert!(mock.mutations().is_empty());

        mock.clear_calls();
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_volume_lifecycle() {
        let mock = mock_with_app("web");
        let volume = mock
            .create_volume(&CreateVolumeInput {
                app_id: "web".into(),
                name: "data".into(),
                region: "ams".into(),
                size_gb: 3,
            })
            .unwrap();

        let fetched = mock.get_volume("web", &volume.internal_id).unwrap();
        assert_eq!(fetched, volume);

        mock.delete_volume(&volume.id).unwrap();
        assert!(mock.get_volume("web", &volume.internal_id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_ip_lifecycle() {
        let mock = mock_with_app("web");
        let ip = mock
            .allocate_ip(&AllocateIpInput {
                app_id: "web".into(),
                address_type: IpAddressType::V6,
                region: "global".into(),
            })
            .unwrap();

        assert_eq!(mock.get_ip("web", &ip.address).unwrap(), ip);
        assert_eq!(mock.get_app_details("web").unwrap().ip_addresses, vec![ip.address.clone()]);

        mock.release_ip(&ip.id).unwrap();
        assert!(mock.release_ip(&ip.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_certificate_lifecycle() {
        let mock = mock_with_app("web");
        let cert = mock.add_certificate("web", "example.com").unwrap();
        assert_eq!(cert.dns_validation_hostname, "_acme-challenge.example.com");

        assert_eq!(mock.get_certificate("web", "example.com").unwrap(), cert);
        mock.delete_certificate("web", "example.com").unwrap();
        assert!(mock.get_certificate("web", "example.com").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_app_discards_children() {
        let mock = mock_with_app("web");
        mock.add_certificate("web", "example.com").unwrap();
        mock.delete_app("web").unwrap();

        assert!(mock.get_app("web").unwrap_err().is_not_found());
        assert!(mock.delete_app("web").unwrap_err().is_not_found());
    }
}
