//! OpenStack API types.
//!
//! Only the fields the lookups need are modelled; everything else in the
//! responses is ignored.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default identity domain.
const DEFAULT_DOMAIN: &str = "Default";

/// Default endpoint interface.
const DEFAULT_INTERFACE: &str = "public";

/// Credentials for Keystone v3 password authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Identity endpoint (`OS_AUTH_URL`).
    pub auth_url: String,
    /// User name (`OS_USERNAME`).
    pub username: String,
    /// Password (`OS_PASSWORD`).
    pub password: String,
    /// Project name (`OS_PROJECT_NAME`).
    pub project_name: String,
    /// User domain (`OS_USER_DOMAIN_NAME`).
    pub user_domain_name: String,
    /// Project domain (`OS_PROJECT_DOMAIN_NAME`).
    pub project_domain_name: String,
    /// Region (`OS_REGION_NAME`), if the catalog spans several.
    pub region_name: Option<String>,
    /// Endpoint interface (`OS_INTERFACE`).
    pub interface: String,
}

impl Credentials {
    /// Reads the credentials from the `OS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `MissingEnvVar` if a required variable is unset.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            auth_url: required_env("OS_AUTH_URL")?,
            username: required_env("OS_USERNAME")?,
            password: required_env("OS_PASSWORD")?,
            project_name: required_env("OS_PROJECT_NAME")?,
            user_domain_name: optional_env("OS_USER_DOMAIN_NAME")
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            project_domain_name: optional_env("OS_PROJECT_DOMAIN_NAME")
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            region_name: optional_env("OS_REGION_NAME"),
            interface: optional_env("OS_INTERFACE").unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
        })
    }

    /// Returns the token endpoint derived from the auth URL.
    #[must_use]
    pub fn token_url(&self) -> String {
        let base = self.auth_url.trim_end_matches('/');
        if base.ends_with("/v3") {
            format!("{base}/auth/tokens")
        } else {
            format!("{base}/v3/auth/tokens")
        }
    }
}

fn required_env(name: &str) -> Result<String> {
    optional_env(name).ok_or_else(|| {
        ConfigError::MissingEnvVar {
            name: name.to_string(),
        }
        .into()
    })
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Keystone password authentication request.
#[derive(Debug, Serialize)]
pub(crate) struct AuthRequest<'a> {
    pub auth: Auth<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Auth<'a> {
    pub identity: Identity<'a>,
    pub scope: Scope<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Identity<'a> {
    pub methods: [&'static str; 1],
    pub password: PasswordMethod<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PasswordMethod<'a> {
    pub user: User<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct User<'a> {
    pub name: &'a str,
    pub domain: Domain<'a>,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct Scope<'a> {
    pub project: Project<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Project<'a> {
    pub name: &'a str,
    pub domain: Domain<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Domain<'a> {
    pub name: &'a str,
}

impl<'a> AuthRequest<'a> {
    pub(crate) fn password(credentials: &'a Credentials) -> Self {
        Self {
            auth: Auth {
                identity: Identity {
                    methods: ["password"],
                    password: PasswordMethod {
                        user: User {
                            name: &credentials.username,
                            domain: Domain {
                                name: &credentials.user_domain_name,
                            },
                            password: &credentials.password,
                        },
                    },
                },
                scope: Scope {
                    project: Project {
                        name: &credentials.project_name,
                        domain: Domain {
                            name: &credentials.project_domain_name,
                        },
                    },
                },
            },
        }
    }
}

/// Keystone token response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: Token,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Token {
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
}

/// A service in the Keystone catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    /// Service type (compute, image, network).
    #[serde(rename = "type")]
    pub service_type: String,
    /// Service endpoints.
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

/// A service endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    /// Interface (public, internal, admin).
    pub interface: String,
    /// Region identifier.
    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint URL.
    pub url: String,
}

/// A compute flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    /// Flavor id.
    pub id: String,
    /// Flavor name.
    pub name: String,
    /// Virtual CPUs.
    #[serde(default)]
    pub vcpus: u32,
    /// Memory in MB.
    #[serde(default)]
    pub ram: u64,
    /// Root disk in GB.
    #[serde(default)]
    pub disk: u64,
}

/// A Glance image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Image id.
    pub id: String,
    /// Image name.
    pub name: String,
    /// Image status.
    #[serde(default)]
    pub status: Option<String>,
}

/// A Neutron network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Network id.
    pub id: String,
    /// Network name.
    pub name: String,
    /// Whether the network is external.
    #[serde(default, rename = "router:external")]
    pub external: bool,
}

/// A Neutron router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    /// Router id.
    pub id: String,
    /// Router name.
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FlavorList {
    pub flavors: Vec<Flavor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageList {
    pub images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NetworkList {
    pub networks: Vec<Network>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RouterList {
    pub routers: Vec<Router>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(auth_url: &str) -> Credentials {
        Credentials {
            auth_url: auth_url.to_string(),
            username: String::from("alice"),
            password: String::from("secret"),
            project_name: String::from("demo"),
            user_domain_name: String::from("Default"),
            project_domain_name: String::from("Default"),
            region_name: None,
            interface: String::from("public"),
        }
    }

    #[test]
    fn test_token_url() {
        assert_eq!(
            credentials("https://keystone:5000/v3/").token_url(),
            "https://keystone:5000/v3/auth/tokens"
        );
        assert_eq!(
            credentials("https://keystone:5000").token_url(),
            "https://keystone:5000/v3/auth/tokens"
        );
    }

    #[test]
    fn test_auth_request_shape() {
        let creds = credentials("https://keystone:5000/v3");
        let body = serde_json::to_value(AuthRequest::password(&creds)).unwrap();
        assert_eq!(body["auth"]["identity"]["methods"][0], "password");
        assert_eq!(body["auth"]["identity"]["password"]["user"]["name"], "alice");
        assert_eq!(body["auth"]["scope"]["project"]["domain"]["name"], "Default");
    }

    #[test]
    fn test_network_external_flag() {
        let network: Network =
            serde_json::from_str(r#"{"id": "n1", "name": "public", "router:external": true}"#).unwrap();
        assert!(network.external);
    }
}
