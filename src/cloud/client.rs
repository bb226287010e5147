//! OpenStack catalog client.
//!
//! Authenticates against Keystone v3 with a password, discovers service
//! endpoints from the token's catalog and looks up flavors, images,
//! networks and routers by name.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use crate::error::{CloudError, Result};

use super::types::{
    AuthRequest, CatalogEntry, Credentials, Flavor, FlavorList, Image, ImageList, Network,
    NetworkList, Router, RouterList, TokenResponse,
};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Header carrying the issued token.
const SUBJECT_TOKEN_HEADER: &str = "x-subject-token";

/// Header carrying the token on requests.
const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Name lookups against the cloud.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Finds a flavor by name.
    async fn find_flavor(&self, name: &str) -> Result<Flavor>;

    /// Finds an image by name.
    async fn find_image(&self, name: &str) -> Result<Image>;

    /// Finds a network by name.
    async fn find_network(&self, name: &str) -> Result<Network>;

    /// Finds a router by name.
    async fn find_router(&self, name: &str) -> Result<Router>;
}

/// An authenticated session.
#[derive(Debug)]
struct Session {
    token: String,
    catalog: Vec<CatalogEntry>,
}

/// OpenStack REST client.
#[derive(Debug)]
pub struct OpenStackClient {
    /// HTTP client.
    client: Client,
    /// Credentials.
    credentials: Credentials,
    /// Session, established on first use.
    session: OnceCell<Session>,
}

impl OpenStackClient {
    /// Creates a client; authentication happens on the first lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_timeout(credentials, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(credentials: Credentials, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CloudError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            credentials,
            session: OnceCell::new(),
        })
    }

    /// Creates a client from the `OS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is unset.
    pub fn from_env() -> Result<Self> {
        Self::new(Credentials::from_env()?)
    }

    async fn session(&self) -> Result<&Session> {
        self.session.get_or_try_init(|| self.authenticate()).await
    }

    async fn authenticate(&self) -> Result<Session> {
        let url = self.credentials.token_url();
        debug!("Authenticating against {}", url);

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&AuthRequest::password(&self.credentials))
            .send()
            .await
            .map_err(|e| CloudError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(CloudError::AuthenticationFailed {
                message: format!("Keystone rejected the credentials of {}", self.credentials.username),
            }
            .into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloudError::api_error(status.as_u16(), body).into());
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| CloudError::AuthenticationFailed {
                message: String::from("No token in Keystone response"),
            })?;

        let body: TokenResponse = response.json().await.map_err(|e| CloudError::InvalidResponse {
            message: format!("Failed to parse token: {e}"),
        })?;

        Ok(Session {
            token,
            catalog: body.token.catalog,
        })
    }

    fn endpoint(&self, session: &Session, service_type: &str) -> Result<String> {
        let interface = &self.credentials.interface;
        let region = self.credentials.region_name.as_deref();

        session
            .catalog
            .iter()
            .filter(|entry| entry.service_type == service_type)
            .flat_map(|entry| entry.endpoints.iter())
            .find(|endpoint| {
                endpoint.interface == *interface
                    && region.is_none_or(|r| endpoint.region.as_deref() == Some(r))
            })
            .map(|endpoint| endpoint.url.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                CloudError::EndpointNotFound {
                    service: service_type.to_string(),
                    interface: interface.clone(),
                }
                .into()
            })
    }

    async fn get<T: DeserializeOwned>(&self, service_type: &str, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let session = self.session().await?;
        let url = format!("{}{path}", self.endpoint(session, service_type)?);
        trace!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(AUTH_TOKEN_HEADER, &session.token)
            .query(query)
            .send()
            .await
            .map_err(|e| CloudError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloudError::api_error(status.as_u16(), body).into());
        }

        response.json().await.map_err(|e| {
            CloudError::InvalidResponse {
                message: format!("Failed to parse response from {url}: {e}"),
            }
            .into()
        })
    }
}

/// Picks the single item carrying `name`.
fn select_one<T>(kind: &str, name: &str, items: Vec<T>, item_name: impl Fn(&T) -> &str) -> Result<T> {
    let mut matches: Vec<T> = items.into_iter().filter(|item| item_name(item) == name).collect();
    match matches.len() {
        0 => Err(CloudError::not_found(kind, name).into()),
        1 => Ok(matches.remove(0)),
        count => Err(CloudError::AmbiguousLookup {
            kind: kind.to_string(),
            name: name.to_string(),
            count,
        }
        .into()),
    }
}

#[async_trait]
impl Catalog for OpenStackClient {
    async fn find_flavor(&self, name: &str) -> Result<Flavor> {
        let list: FlavorList = self.get("compute", "/flavors/detail", &[]).await?;
        select_one("Flavor", name, list.flavors, |f| f.name.as_str())
    }

    async fn find_image(&self, name: &str) -> Result<Image> {
        let list: ImageList = self.get("image", "/v2/images", &[("name", name)]).await?;
        select_one("Image", name, list.images, |i| i.name.as_str())
    }

    async fn find_network(&self, name: &str) -> Result<Network> {
        let list: NetworkList = self.get("network", "/v2.0/networks", &[("name", name)]).await?;
        select_one("Network", name, list.networks, |n| n.name.as_str())
    }

    async fn find_router(&self, name: &str) -> Result<Router> {
        let list: RouterList = self.get("network", "/v2.0/routers", &[("name", name)]).await?;
        select_one("Router", name, list.routers, |r| r.name.as_str())
    }
}
