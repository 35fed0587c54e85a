//! GraphQL documents sent by [`GraphqlBackend`](super::graphql::GraphqlBackend).

// =============================================================================
// Organizations
// =============================================================================

pub const ORGANIZATION: &str = r"
query Organization($slug: String!) {
  organization(slug: $slug) { id slug name }
}";

pub const PERSONAL_ORGANIZATION: &str = r"
query PersonalOrganization {
  personalOrganization { id slug name }
}";

// =============================================================================
// Apps
// =============================================================================

pub const CREATE_APP: &str = r"
mutation CreateApp($name: String!, $organizationId: ID!) {
  createApp(input: {name: $name, organizationId: $organizationId}) {
    app {
      id name appUrl
      organization { id slug name }
      secrets { id name digest createdAt }
    }
  }
}";

pub const GET_APP: &str = r"
query GetApp($name: String!) {
  app(name: $name) {
    id name appUrl
    organization { id slug name }
    secrets { id name digest createdAt }
  }
}";

pub const GET_FULL_APP: &str = r"
query GetFullApp($name: String!) {
  app(name: $name) {
    id name appUrl hostname status deployed
    currentRelease { id }
    healthChecks { nodes { name status } }
    ipAddresses { nodes { address } }
  }
}";

pub const DELETE_APP: &str = r"
mutation DeleteApp($appId: ID!) {
  deleteApp(appId: $appId) { organization { id } }
}";

// =============================================================================
// Secrets
// =============================================================================

pub const SET_SECRETS: &str = r"
mutation SetSecrets($input: SetSecretsInput!) {
  setSecrets(input: $input) {
    app { secrets { id name digest createdAt } }
  }
}";

pub const UNSET_SECRETS: &str = r"
mutation UnsetSecrets($appId: ID!, $keys: [String!]!) {
  unsetSecrets(input: {appId: $appId, keys: $keys}) { release { id } }
}";

pub const GET_SECRETS: &str = r"
query GetSecrets($name: String!) {
  app(name: $name) { secrets { id name digest createdAt } }
}";

// =============================================================================
// Volumes
// =============================================================================

pub const CREATE_VOLUME: &str = r"
mutation CreateVolume($input: CreateVolumeInput!) {
  createVolume(input: $input) {
    volume { id name sizeGb region internalId }
  }
}";

pub const GET_VOLUME: &str = r"
query Volume($app: String!, $internalId: String!) {
  app(name: $app) {
    volume(internalId: $internalId) { id name sizeGb region internalId }
  }
}";

pub const DELETE_VOLUME: &str = r"
mutation DeleteVolume($volumeId: ID!) {
  deleteVolume(input: {volumeId: $volumeId}) { app { name } }
}";

// =============================================================================
// IP addresses
// =============================================================================

pub const ALLOCATE_IP: &str = r"
mutation AllocateIpAddress($input: AllocateIPAddressInput!) {
  allocateIpAddress(input: $input) {
    ipAddress { id address type region }
  }
}";

pub const GET_IP: &str = r"
query IpAddress($app: String!, $address: String!) {
  app(name: $app) {
    ipAddress(address: $address) { id address type region }
  }
}";

pub const RELEASE_IP: &str = r"
mutation ReleaseIpAddress($ipAddressId: ID!) {
  releaseIpAddress(input: {ipAddressId: $ipAddressId}) { app { name } }
}";

// =============================================================================
// Certificates
// =============================================================================

pub const ADD_CERTIFICATE: &str = r"
mutation AddCertificate($appId: ID!, $hostname: String!) {
  addCertificate(appId: $appId, hostname: $hostname) {
    certificate {
      id hostname check
      dnsValidationInstructions dnsValidationHostname dnsValidationTarget
    }
  }
}";

pub const GET_CERTIFICATE: &str = r"
query Certificate($app: String!, $hostname: String!) {
  app(name: $app) {
    certificate(hostname: $hostname) {
      id hostname check
      dnsValidationInstructions dnsValidationHostname dnsValidationTarget
    }
  }
}";

pub const DELETE_CERTIFICATE: &str = r"
mutation DeleteCertificate($appId: ID!, $hostname: String!) {
  deleteCertificate(appId: $appId, hostname: $hostname) { app { name } }
}";

/// Operation name of a document, for logging.
pub fn operation_name(document: &str) -> &str {
    document
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.split(['(', '{']).next())
        .unwrap_or("anonymous")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_name() {
        assert_eq!(operation_name(SET_SECRETS), "SetSecrets");
        assert_eq!(operation_name(PERSONAL_ORGANIZATION), "PersonalOrganization");
        assert_eq!(operation_name(GET_FULL_APP), "GetFullApp");
        assert_eq!(operation_name(""), "anonymous");
    }
}
