//! GraphQL backend.
//!
//! This module provides the [`GraphqlBackend`] implementation that talks to
//! the Fly GraphQL API over HTTPS.
//!
//! Every request is a blocking POST bounded by the configured timeout. The
//! backend performs no retries; transport failures surface to the caller.

use crate::backend::Backend;
use crate::backend::queries::{self, operation_name};
use crate::config::ClientConfig;
use crate::error::{Error, GraphqlError, Result};
use crate::types::{
    AllocateIpInput, App, AppDetails, Certificate, CreateVolumeInput, HealthCheck, IpAddress,
    Organization, Secret, Volume,
};
use declarative::SecretInput;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

/// GraphQL backend.
///
/// # Example
///
/// ```no_run
/// use flyapi::backend::Backend;
/// use flyapi::backend::graphql::GraphqlBackend;
/// use flyapi::ClientConfig;
///
/// let backend = GraphqlBackend::new(ClientConfig::from_env(None).unwrap());
/// let org = backend.default_org().unwrap();
/// println!("Personal organization: {}", org.slug);
/// ```
pub struct GraphqlBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Immutable client configuration.
    config: ClientConfig,
}

impl GraphqlBackend {
    /// Create a new backend from a client configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            config,
        }
    }

    /// Get the endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Build the request body for a document.
    fn request_body(document: &str, variables: Value) -> Value {
        json!({
            "query": document,
            "variables": variables,
        })
    }

    /// Run a document and decode its `data`.
    fn execute<T: DeserializeOwned>(&self, document: &str, variables: Value) -> Result<T> {
        let operation = operation_name(document);
        log::debug!("GraphQL {} -> {}", operation, self.config.endpoint);

        let mut request = self
            .agent
            .post(&self.config.endpoint)
            .header("Authorization", &format!("Bearer {}", self.config.token))
            .header("User-Agent", &self.config.user_agent);
        if self.config.force_trace {
            request = request.header("Fly-Force-Trace", "true");
        }

        let mut response = request.send_json(Self::request_body(document, variables))?;
        let status = response.status().as_u16();
        let text = response.body_mut().read_to_string()?;
        log::trace!("GraphQL {} response ({}): {}", operation, status, text);

        decode_http(status, &text)
    }
}

/// Decode a raw HTTP response.
///
/// A non-success status still carries a GraphQL envelope when the API
/// rejected the request itself (bad token, malformed query). Those errors
/// are kept; a bare status is reported as an HTTP error with that status.
fn decode_http<T: DeserializeOwned>(status: u16, text: &str) -> Result<T> {
    if (200..300).contains(&status) {
        return decode_response(serde_json::from_str(text)?);
    }

    if let Ok(envelope) = serde_json::from_str::<Envelope<Value>>(text) {
        if !envelope.errors.is_empty() {
            return Err(Error::Graphql(envelope.errors));
        }
    }

    let snippet: String = text.trim().chars().take(200).collect();
    let message = if snippet.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, snippet)
    };
    Err(Error::http(message, Some(status)))
}

/// Decode a GraphQL response envelope.
///
/// Errors take precedence over partial data.
fn decode_response<T: DeserializeOwned>(body: Value) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_value(body)?;
    if !envelope.errors.is_empty() {
        return Err(Error::Graphql(envelope.errors));
    }
    envelope
        .data
        .ok_or_else(|| Error::InvalidResponse("response has neither data nor errors".to_string()))
}

/// Turn a null field into a not-found error.
fn required<T>(value: Option<T>, what: impl std::fmt::Display) -> Result<T> {
    value.ok_or_else(|| Error::Graphql(vec![GraphqlError::not_found(what)]))
}

impl Backend for GraphqlBackend {
    fn resolve_org(&self, slug: &str) -> Result<Organization> {
        let data: OrganizationData =
            self.execute(queries::ORGANIZATION, json!({ "slug": slug }))?;
        required(data.organization, format!("Organization {}", slug))
    }

    fn default_org(&self) -> Result<Organization> {
        let data: PersonalOrganizationData =
            self.execute(queries::PERSONAL_ORGANIZATION, json!({}))?;
        required(data.personal_organization, "personal organization")
    }

    fn create_app(&self, name: &str, org_id: &str) -> Result<App> {
        let data: CreateAppData = self.execute(
            queries::CREATE_APP,
            json!({ "name": name, "organizationId": org_id }),
        )?;
        Ok(data.create_app.app)
    }

    fn get_app(&self, name: &str) -> Result<App> {
        let data: AppData<App> = self.execute(queries::GET_APP, json!({ "name": name }))?;
        required(data.app, format!("App {}", name))
    }

    fn get_app_details(&self, name: &str) -> Result<AppDetails> {
        let data: AppData<FullApp> =
            self.execute(queries::GET_FULL_APP, json!({ "name": name }))?;
        required(data.app, format!("App {}", name)).map(Into::into)
    }

    fn delete_app(&self, name: &str) -> Result<()> {
        let _: Value = self.execute(queries::DELETE_APP, json!({ "appId": name }))?;
        Ok(())
    }

    fn set_secrets(&self, app: &str, secrets: &[SecretInput]) -> Result<Vec<Secret>> {
        let input = json!({
            "appId": app,
            "secrets": secrets,
            "replaceAll": false,
        });
        let data: SetSecretsData = self.execute(queries::SET_SECRETS, json!({ "input": input }))?;
        Ok(data.set_secrets.app.secrets)
    }

    fn unset_secrets(&self, app: &str, keys: &[String]) -> Result<()> {
        let _: Value = self.execute(
            queries::UNSET_SECRETS,
            json!({ "appId": app, "keys": keys }),
        )?;
        Ok(())
    }

    fn get_secrets(&self, app: &str) -> Result<Vec<Secret>> {
        let data: AppData<SecretsOnly> =
            self.execute(queries::GET_SECRETS, json!({ "name": app }))?;
        required(data.app, format!("App {}", app)).map(|a| a.secrets)
    }

    fn create_volume(&self, input: &CreateVolumeInput) -> Result<Volume> {
        let data: CreateVolumeData =
            self.execute(queries::CREATE_VOLUME, json!({ "input": input }))?;
        Ok(data.create_volume.volume)
    }

    fn get_volume(&self, app: &str, internal_id: &str) -> Result<Volume> {
        let data: AppData<VolumeOnly> = self.execute(
            queries::GET_VOLUME,
            json!({ "app": app, "internalId": internal_id }),
        )?;
        let app_data = required(data.app, format!("App {}", app))?;
        required(app_data.volume, format!("Volume {}", internal_id))
    }

    fn delete_volume(&self, id: &str) -> Result<()> {
        let _: Value = self.execute(queries::DELETE_VOLUME, json!({ "volumeId": id }))?;
        Ok(())
    }

    fn allocate_ip(&self, input: &AllocateIpInput) -> Result<IpAddress> {
        let data: AllocateIpData =
            self.execute(queries::ALLOCATE_IP, json!({ "input": input }))?;
        Ok(data.allocate_ip_address.ip_address)
    }

    fn get_ip(&self, app: &str, address: &str) -> Result<IpAddress> {
        let data: AppData<IpOnly> = self.execute(
            queries::GET_IP,
            json!({ "app": app, "address": address }),
        )?;
        let app_data = required(data.app, format!("App {}", app))?;
        required(app_data.ip_address, format!("IPAddress {}", address))
    }

    fn release_ip(&self, id: &str) -> Result<()> {
        let _: Value = self.execute(queries::RELEASE_IP, json!({ "ipAddressId": id }))?;
        Ok(())
    }

    fn add_certificate(&self, app: &str, hostname: &str) -> Result<Certificate> {
        let data: AddCertificateData = self.execute(
            queries::ADD_CERTIFICATE,
            json!({ "appId": app, "hostname": hostname }),
        )?;
        Ok(data.add_certificate.certificate)
    }

    fn get_certificate(&self, app: &str, hostname: &str) -> Result<Certificate> {
        let data: AppData<CertificateOnly> = self.execute(
            queries::GET_CERTIFICATE,
            json!({ "app": app, "hostname": hostname }),
        )?;
        let app_data = required(data.app, format!("App {}", app))?;
        required(app_data.certificate, format!("Certificate {}", hostname))
    }

    fn delete_certificate(&self, app: &str, hostname: &str) -> Result<()> {
        let _: Value = self.execute(
            queries::DELETE_CERTIFICATE,
            json!({ "appId": app, "hostname": hostname }),
        )?;
        Ok(())
    }
}

// =============================================================================
// GraphQL response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct OrganizationData {
    organization: Option<Organization>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonalOrganizationData {
    personal_organization: Option<Organization>,
}

#[derive(Debug, Deserialize)]
struct AppData<T> {
    app: Option<T>,
}

#[derive(Debug, Deserialize)]
struct AppPayload {
    app: App,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAppData {
    create_app: AppPayload,
}

#[derive(Debug, Deserialize)]
struct SecretsOnly {
    #[serde(default)]
    secrets: Vec<Secret>,
}

#[derive(Debug, Deserialize)]
struct SecretsPayload {
    app: SecretsOnly,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetSecretsData {
    set_secrets: SecretsPayload,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Nodes<T> {
    #[serde(default)]
    nodes: Vec<T>,
}

impl<T> Default for Nodes<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AddressRef {
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullApp {
    id: String,
    name: String,
    app_url: Option<String>,
    hostname: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    deployed: bool,
    current_release: Option<ReleaseRef>,
    #[serde(default)]
    health_checks: Nodes<HealthCheck>,
    #[serde(default)]
    ip_addresses: Nodes<AddressRef>,
}

impl From<FullApp> for AppDetails {
    fn from(app: FullApp) -> Self {
        Self {
            id: app.id,
            name: app.name,
            app_url: app.app_url,
            hostname: app.hostname,
            status: app.status,
            deployed: app.deployed,
            current_release: app.current_release.map(|r| r.id),
            health_checks: app.health_checks.nodes,
            ip_addresses: app.ip_addresses.nodes.into_iter().map(|a| a.address).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VolumePayload {
    volume: Volume,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateVolumeData {
    create_volume: VolumePayload,
}

#[derive(Debug, Deserialize)]
struct VolumeOnly {
    volume: Option<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpPayload {
    ip_address: IpAddress,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllocateIpData {
    allocate_ip_address: IpPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpOnly {
    ip_address: Option<IpAddress>,
}

#[derive(Debug, Deserialize)]
struct CertificatePayload {
    certificate: Certificate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddCertificateData {
    add_certificate: CertificatePayload,
}

#[derive(Debug, Deserialize)]
struct CertificateOnly {
    certificate: Option<Certificate>,
}
