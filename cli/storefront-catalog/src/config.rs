//! Configuration types for gateway construction.

use std::collections::BTreeMap;

pub const DEFAULT_CATALOG_URL: &str = "http://localhost:5000/api";

/// Configuration for catalog client construction.
#[derive(Debug, Clone)]
pub struct CatalogClientConfig {
    /// Base URL of the item API, e.g. `http://localhost:5000/api`.
    pub catalog_url: String,
    /// Additional headers to include in requests.
    pub extra_headers: BTreeMap<String, String>,
    /// Override the default `storefront/<version>` user agent.
    pub user_agent: Option<String>,
}

impl Default for CatalogClientConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            extra_headers: BTreeMap::new(),
            user_agent: None,
        }
    }
}

/// Configuration for the image object store.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    /// Base URL of the storage bucket,
    /// e.g. `https://firebasestorage.googleapis.com/v0/b/<bucket>`.
    pub storage_url: String,
    /// Override the default `storefront/<version>` user agent.
    pub user_agent: Option<String>,
}
