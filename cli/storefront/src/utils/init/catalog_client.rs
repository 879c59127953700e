use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use storefront_sdk::providers::catalog::{
    CatalogClient,
    CatalogClientConfig,
    Client,
    DEFAULT_CATALOG_URL,
    HttpObjectStore,
    MockClient,
    NoObjectStore,
    ObjectStoreConfig,
    STOREFRONT_CATALOG_MOCK_DATA_VAR,
    Storage,
};
use tracing::debug;

use crate::config::Config;

/// Initialize the catalog client
///
/// - Initialize a mock client if `_STOREFRONT_USE_CATALOG_MOCK` points to a mock data file
/// - Initialize a real client otherwise
pub fn init_catalog_client(config: &Config) -> Result<Client> {
    // if $_STOREFRONT_USE_CATALOG_MOCK is set to a path to mock data, use the mock client
    if let Ok(path_str) = std::env::var(STOREFRONT_CATALOG_MOCK_DATA_VAR) {
        let path = PathBuf::from(path_str);
        if !path.exists() {
            bail!("path to mock data file doesn't exist: {}", path.display());
        }

        debug!(mock_data_path = %path.display(), "using mock catalog client");
        return Ok(MockClient::new(Some(path))?.into());
    }

    let mut extra_headers: BTreeMap<String, String> = BTreeMap::new();

    // Pass in a bool if we are running in CI, so requests can reflect this in the headers
    if std::env::var("CI").is_ok() {
        extra_headers.insert("storefront-ci".to_string(), "true".to_string());
    };

    // If not configured, use the default URL
    let catalog_url = config
        .storefront
        .api_url
        .clone()
        .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string());

    debug!(%catalog_url, "using catalog client");
    let client = CatalogClient::new(CatalogClientConfig {
        catalog_url,
        extra_headers,
        user_agent: None,
    })
    .context("Could not create catalog client")?;
    Ok(client.into())
}

/// Initialize the image object store
///
/// Uploads are disabled unless a storage URL is configured.
pub fn init_object_store(config: &Config) -> Result<Storage> {
    let Some(storage_url) = config.storefront.storage_url.clone() else {
        debug!("no storage url configured, image uploads are disabled");
        return Ok(NoObjectStore.into());
    };

    debug!(%storage_url, "using object store");
    let store = HttpObjectStore::new(ObjectStoreConfig {
        storage_url,
        user_agent: None,
    })
    .context("Could not create object store")?;
    Ok(store.into())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn missing_mock_file_is_an_error() {
        temp_env::with_var(
            STOREFRONT_CATALOG_MOCK_DATA_VAR,
            Some("/does/not/exist.json"),
            || {
                let err = init_catalog_client(&Config::default()).unwrap_err();
                assert!(err.to_string().contains("doesn't exist"));
            },
        );
    }

    #[test]
    #[serial]
    fn mock_file_selects_mock_client() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("mock.json");
        std::fs::write(&path, "[]").unwrap();

        temp_env::with_var(STOREFRONT_CATALOG_MOCK_DATA_VAR, Some(&path), || {
            let client = init_catalog_client(&Config::default()).unwrap();
            assert!(matches!(client, Client::Mock(_)));
        });
    }

    #[test]
    #[serial]
    fn configured_url_selects_real_client() {
        temp_env::with_var_unset(STOREFRONT_CATALOG_MOCK_DATA_VAR, || {
            let mut config = Config::default();
            config.storefront.api_url = Some("http://catalog.example.com/api".to_string());
            let Client::Catalog(client) = init_catalog_client(&config).unwrap() else {
                panic!("expected a real catalog client");
            };
            assert_eq!(client.catalog_url(), "http://catalog.example.com/api");
        });
    }

    #[test]
    fn object_store_requires_storage_url() {
        let store = init_object_store(&Config::default()).unwrap();
        assert!(matches!(store, Storage::Disabled(_)));

        let mut config = Config::default();
        config.storefront.storage_url = Some("https://objects.example.com/b/bucket".to_string());
        let store = init_object_store(&config).unwrap();
        assert!(matches!(store, Storage::Http(_)));
    }
}
