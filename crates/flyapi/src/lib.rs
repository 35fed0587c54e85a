//! # flyapi
//!
//! Blocking client for the Fly.io GraphQL API.
//!
//! This crate provides:
//! - Typed payloads for apps, secrets, volumes, IP addresses and certificates
//! - Error classification for missing entities and no-op mutations
//! - A [`Client`] that implements [`declarative::SecretStore`]
//! - An in-memory [`MockBackend`] for tests
//!
//! ## Example
//!
//! ```no_run
//! use flyapi::{Client, ClientConfig};
//!
//! let client = Client::new(ClientConfig::from_env(None).expect("FLY_API_TOKEN not set"));
//! let app = client.get_app("my-app").expect("lookup failed");
//! println!("{} has {} secrets", app.name, app.secrets.len());
//! ```

#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod error;
pub mod types;

pub use config::ClientConfig;
pub use error::{Error, ErrorCategory, GraphqlError, Result};
pub use types::{
    AllocateIpInput, App, AppDetails, Certificate, CreateVolumeInput, HealthCheck, IpAddress,
    IpAddressType, Organization, Secret, Volume,
};

use backend::Backend;
pub use backend::MockBackend;
use backend::graphql::GraphqlBackend;
use declarative::{RemoteSecret, SecretInput, SecretStore};

/// High-level client for Fly API operations.
///
/// Wraps a [`Backend`]; the client itself holds no mutable state and can be
/// shared across threads.
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Create a client talking to the GraphQL API.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            backend: Box::new(GraphqlBackend::new(config)),
        }
    }

    /// Create a client with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    // =========================================================================
    // Organizations
    // =========================================================================

    /// Resolve an organization by slug, or the personal organization if none is given.
    pub fn resolve_org(&self, slug: Option<&str>) -> Result<Organization> {
        match slug {
            Some(slug) => self.backend.resolve_org(slug),
            None => self.backend.default_org(),
        }
    }

    // =========================================================================
    // Apps
    // =========================================================================

    /// Create an app.
    pub fn create_app(&self, name: &str, org_id: &str) -> Result<App> {
        self.backend.create_app(name, org_id)
    }

    /// Fetch an app with its secret metadata.
    pub fn get_app(&self, name: &str) -> Result<App> {
        self.backend.get_app(name)
    }

    /// Fetch detailed app information.
    pub fn get_app_details(&self, name: &str) -> Result<AppDetails> {
        self.backend.get_app_details(name)
    }

    /// Delete an app.
    pub fn delete_app(&self, name: &str) -> Result<()> {
        self.backend.delete_app(name)
    }

    // =========================================================================
    // Volumes
    // =========================================================================

    /// Create a volume.
    pub fn create_volume(&self, input: &CreateVolumeInput) -> Result<Volume> {
        self.backend.create_volume(input)
    }

    /// Fetch a volume by internal ID.
    pub fn get_volume(&self, app: &str, internal_id: &str) -> Result<Volume> {
        self.backend.get_volume(app, internal_id)
    }

    /// Delete a volume.
    pub fn delete_volume(&self, id: &str) -> Result<()> {
        self.backend.delete_volume(id)
    }

    // =========================================================================
    // IP addresses
    // =========================================================================

    /// Allocate an IP address.
    pub fn allocate_ip(&self, input: &AllocateIpInput) -> Result<IpAddress> {
        self.backend.allocate_ip(input)
    }

    /// Fetch an IP address.
    pub fn get_ip(&self, app: &str, address: &str) -> Result<IpAddress> {
        self.backend.get_ip(app, address)
    }

    /// Release an IP address.
    pub fn release_ip(&self, id: &str) -> Result<()> {
        self.backend.release_ip(id)
    }

    // =========================================================================
    // Certificates
    // =========================================================================

    /// Add a certificate.
    pub fn add_certificate(&self, app: &str, hostname: &str) -> Result<Certificate> {
        self.backend.add_certificate(app, hostname)
    }

    /// Fetch a certificate.
    pub fn get_certificate(&self, app: &str, hostname: &str) -> Result<Certificate> {
        self.backend.get_certificate(app, hostname)
    }

    /// Delete a certificate.
    pub fn delete_certificate(&self, app: &str, hostname: &str) -> Result<()> {
        self.backend.delete_certificate(app, hostname)
    }
}

fn to_remote(secrets: &[Secret]) -> Vec<RemoteSecret> {
    secrets.iter().map(RemoteSecret::from).collect()
}

impl SecretStore for Client {
    fn set_secrets(
        &self,
        entity: &str,
        secrets: &[SecretInput],
    ) -> declarative::Result<Vec<RemoteSecret>> {
        Ok(to_remote(&self.backend.set_secrets(entity, secrets)?))
    }

    fn unset_secrets(&self, entity: &str, names: &[String]) -> declarative::Result<()> {
        self.backend
            .unset_secrets(entity, names)
            .map_err(Into::into)
    }

    fn get_secrets(&self, entity: &str) -> declarative::Result<Vec<RemoteSecret>> {
        Ok(to_remote(&self.backend.get_secrets(entity)?))
    }
}
