//! HTTP client infrastructure for the storefront item API.
//!
//! This crate provides:
//! - Wire types for catalog items, pagination, filters and sort order
//! - [ClientTrait], the remote catalog gateway, with an HTTP implementation
//!   ([CatalogClient]) and a queued mock ([MockClient])
//! - [ObjectStore], the binary object store used for item images
//! - Common error handling for gateway operations
//!
//! ## Usage
//!
//! ```ignore
//! use storefront_catalog::{CatalogClient, CatalogClientConfig, ClientTrait, SortBy};
//!
//! let config = CatalogClientConfig {
//!     catalog_url: "http://localhost:5000/api".to_string(),
//!     ..Default::default()
//! };
//!
//! let client = CatalogClient::new(config)?;
//! let page = client.list_items(1, DEFAULT_PAGE_SIZE, SortBy::Newest).await?;
//! ```

mod client;
mod config;
mod error;
mod mock;
mod storage;
pub mod types;

pub use client::{CatalogClient, Client, ClientTrait, DEFAULT_PAGE_SIZE};
pub use config::{CatalogClientConfig, ObjectStoreConfig, DEFAULT_CATALOG_URL};
pub use error::{CatalogClientError, MapResponseErrorExt, StorageError};
pub use mock::{
    MockClient,
    MockDataError,
    MockRequest,
    Response as MockResponse,
    STOREFRONT_CATALOG_MOCK_DATA_VAR,
};
pub use storage::{
    object_path,
    HttpObjectStore,
    ImageUpload,
    MockObjectStore,
    NoObjectStore,
    ObjectStore,
    Storage,
};
pub use types::*;
