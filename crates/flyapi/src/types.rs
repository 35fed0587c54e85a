//! Core types for Fly API payloads.

use chrono::{DateTime, SecondsFormat, Utc};
use declarative::RemoteSecret;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization ID.
    pub id: String,
    /// URL slug.
    pub slug: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// An app with its secret metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    /// App ID.
    pub id: String,
    /// App name.
    pub name: String,
    /// Public URL.
    #[serde(default)]
    pub app_url: Option<String>,
    /// Owning organization.
    pub organization: Organization,
    /// Secret metadata; values are never returned.
    #[serde(default)]
    pub secrets: Vec<Secret>,
}

/// Secret metadata as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    /// Secret ID.
    pub id: String,
    /// Secret name.
    pub name: String,
    /// Content digest assigned by the API.
    pub digest: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<&Secret> for RemoteSecret {
    fn from(secret: &Secret) -> Self {
        Self {
            id: secret.id.clone(),
            name: secret.name.clone(),
            digest: secret.digest.clone(),
            created_at: secret.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// A health check status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Check name.
    pub name: String,
    /// Check status.
    pub status: String,
}

impl fmt::Display for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.status)
    }
}

/// Detailed app information for read-only lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDetails {
    /// App ID.
    pub id: String,
    /// App name.
    pub name: String,
    /// Public URL.
    pub app_url: Option<String>,
    /// Hostname.
    pub hostname: Option<String>,
    /// Status string.
    pub status: String,
    /// Whether the app is deployed.
    pub deployed: bool,
    /// Current release ID.
    pub current_release: Option<String>,
    /// Health checks.
    pub health_checks: Vec<HealthCheck>,
    /// Allocated IP addresses.
    pub ip_addresses: Vec<String>,
}

/// A volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume ID.
    pub id: String,
    /// Volume name.
    pub name: String,
    /// Size in GB.
    pub size_gb: u32,
    /// Region code.
    pub region: String,
    /// Internal ID used for lookups within an app.
    pub internal_id: String,
}

/// Input for creating a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeInput {
    /// Owning app.
    pub app_id: String,
    /// Volume name.
    pub name: String,
    /// Region code.
    pub region: String,
    /// Size in GB.
    pub size_gb: u32,
}

/// Kind of IP address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpAddressType {
    /// Public IPv4.
    #[serde(rename = "v4")]
    V4,
    /// Public IPv6.
    #[serde(rename = "v6")]
    V6,
    /// Private IPv6.
    #[serde(rename = "private_v6")]
    PrivateV6,
}

impl IpAddressType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V4 => "v4",
            Self::V6 => "v6",
            Self::PrivateV6 => "private_v6",
        }
    }
}

impl fmt::Display for IpAddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IpAddressType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v4" => Ok(Self::V4),
            "v6" => Ok(Self::V6),
            "private_v6" => Ok(Self::PrivateV6),
            other => Err(format!(
                "invalid IP address type '{}', expected v4, v6 or private_v6",
                other
            )),
        }
    }
}

/// An allocated IP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddress {
    /// Allocation ID.
    pub id: String,
    /// The address itself.
    pub address: String,
    /// Address type.
    #[serde(rename = "type")]
    pub address_type: IpAddressType,
    /// Region code, `global` for anycast.
    pub region: String,
}

/// Input for allocating an IP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocateIpInput {
    /// Owning app.
    pub app_id: String,
    /// Address type.
    #[serde(rename = "type")]
    pub address_type: IpAddressType,
    /// Region code.
    pub region: String,
}

/// A TLS certificate for a custom hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Certificate ID.
    pub id: String,
    /// Hostname.
    pub hostname: String,
    /// Whether DNS is configured correctly.
    #[serde(default)]
    pub check: bool,
    /// Human-readable DNS validation instructions.
    #[serde(default)]
    pub dns_validation_instructions: String,
    /// DNS validation record name.
    #[serde(default)]
    pub dns_validation_hostname: String,
    /// DNS validation record target.
    #[serde(default)]
    pub dns_validation_target: String,
}
