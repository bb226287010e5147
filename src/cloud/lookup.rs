//! Per-run lookup cache.
//!
//! Lookups by name are memoized for the lifetime of one run so that an
//! inventory of many VMs sharing a flavor resolves it once. Failures are
//! logged and returned; they are never cached.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error};

use crate::error::Result;

use super::client::Catalog;
use super::types::{Flavor, Image, Network, Router};

/// Memoizing front of a [`Catalog`].
pub struct LookupCache {
    catalog: Arc<dyn Catalog>,
    flavors: Mutex<HashMap<String, Flavor>>,
    images: Mutex<HashMap<String, Image>>,
    networks: Mutex<HashMap<String, Network>>,
    routers: Mutex<HashMap<String, Router>>,
}

impl std::fmt::Debug for LookupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupCache").finish_non_exhaustive()
    }
}

fn cached<V: Clone>(map: &Mutex<HashMap<String, V>>, key: &str) -> Option<V> {
    map.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .cloned()
}

fn remember<V>(map: &Mutex<HashMap<String, V>>, key: &str, value: V) {
    map.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key.to_string(), value);
}

fn log_failure<T>(kind: &str, name: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        error!("{} {} lookup failed: {}", kind, name, e);
    }
    result
}

impl LookupCache {
    /// Creates an empty cache over a catalog.
    #[must_use]
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            flavors: Mutex::new(HashMap::new()),
            images: Mutex::new(HashMap::new()),
            networks: Mutex::new(HashMap::new()),
            routers: Mutex::new(HashMap::new()),
        }
    }

    /// Looks up a flavor by name.
    ///
    /// # Errors
    ///
    /// Returns `LookupNotFound` or `AmbiguousLookup` from the catalog.
    pub async fn flavor(&self, name: &str) -> Result<Flavor> {
        if let Some(flavor) = cached(&self.flavors, name) {
            return Ok(flavor);
        }
        debug!("Looking up flavor {}", name);
        let flavor = log_failure("Flavor", name, self.catalog.find_flavor(name).await)?;
        remember(&self.flavors, name, flavor.clone());
        Ok(flavor)
    }

    /// Looks up an image by name.
    ///
    /// # Errors
    ///
    /// Returns `LookupNotFound` or `AmbiguousLookup` from the catalog.
    pub async fn image(&self, name: &str) -> Result<Image> {
        if let Some(image) = cached(&self.images, name) {
            return Ok(image);
        }
        debug!("Looking up image {}", name);
        let image = log_failure("Image", name, self.catalog.find_image(name).await)?;
        remember(&self.images, name, image.clone());
        Ok(image)
    }

    /// Looks up a network by name.
    ///
    /// # Errors
    ///
    /// Returns `LookupNotFound` or `AmbiguousLookup` from the catalog.
    pub async fn network(&self, name: &str) -> Result<Network> {
        if let Some(network) = cached(&self.networks, name) {
            return Ok(network);
        }
        debug!("Looking up network {}", name);
        let network = log_failure("Network", name, self.catalog.find_network(name).await)?;
        remember(&self.networks, name, network.clone());
        Ok(network)
    }

    /// Looks up a router by name.
    ///
    /// # Errors
    ///
    /// Returns `LookupNotFound` or `AmbiguousLookup` from the catalog.
    pub async fn router(&self, name: &str) -> Result<Router> {
        if let Some(router) = cached(&self.routers, name) {
            return Ok(router);
        }
        debug!("Looking up router {}", name);
        let router = log_failure("Router", name, self.catalog.find_router(name).await)?;
        remember(&self.routers, name, router.clone());
        Ok(router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::client::MockCatalog;
    use crate::error::CloudError;

    #[tokio::test]
    async fn test_flavor_lookup_is_cached() {
        let mut catalog = MockCatalog::new();
        catalog.expect_find_flavor().times(1).returning(|name| {
            Ok(Flavor {
                id: String::from("f1"),
                name: name.to_string(),
                vcpus: 1,
                ram: 1024,
                disk: 10,
            })
        });

        let cache = LookupCache::new(Arc::new(catalog));
        let first = cache.flavor("m1.small").await;
        assert!(first.is_ok());
        let second = cache.flavor("m1.small").await.unwrap();
        assert_eq!(second.id, "f1");
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_find_image()
            .times(2)
            .returning(|name| Err(CloudError::not_found("Image", name).into()));

        let cache = LookupCache::new(Arc::new(catalog));
        assert!(cache.image("missing").await.is_err());
        assert!(cache.image("missing").await.is_err());
    }
}
