//! Cloud catalog lookups.
//!
//! Resources that already exist in the cloud (flavors, images, routers,
//! externally managed networks) are resolved by name before a program is
//! rendered.

mod client;
mod lookup;
mod types;

#[cfg(test)]
pub use client::MockCatalog;
pub use client::{Catalog, OpenStackClient};
pub use lookup::LookupCache;
pub use types::{CatalogEntry, Credentials, Endpoint, Flavor, Image, Network, Router};
