//! HTTP client for the item API.

use std::fmt::Debug;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use enum_dispatch::enum_dispatch;
use reqwest::header::{self, HeaderMap};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::config::CatalogClientConfig;
use crate::error::{CatalogClientError, MapResponseErrorExt};
use crate::mock::MockClient;
use crate::types::*;

/// Number of items requested per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: NonZeroU32 = NonZeroU32::new(10).unwrap();

const STOREFRONT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Either a client for the actual item API,
/// or a mock client for testing.
#[derive(Debug, Clone)]
#[enum_dispatch(ClientTrait)]
pub enum Client {
    Catalog(CatalogClient),
    Mock(MockClient),
}

// ---------------------------------------------------------------------------
// Catalog trait
// ---------------------------------------------------------------------------

/// The remote catalog gateway.
///
/// Stateless request/response operations for listing, searching and
/// maintaining catalog items.
/// Implementations:
/// - **HTTP**: REST calls to the item API via [CatalogClient]
/// - **Mock**: canned responses without HTTP via [MockClient]
#[enum_dispatch]
#[allow(async_fn_in_trait)]
pub trait ClientTrait {
    /// List a page of items in the given order.
    async fn list_items(
        &self,
        page: u32,
        limit: NonZeroU32,
        sort_by: SortBy,
    ) -> Result<ItemsPage, CatalogClientError>;

    /// Search a page of items matching a free text query and filters.
    async fn search_items(
        &self,
        query: impl AsRef<str> + Send + Sync,
        page: u32,
        limit: NonZeroU32,
        filters: &SearchFilters,
        sort_by: SortBy,
    ) -> Result<ItemsPage, CatalogClientError>;

    /// Get a single item.
    ///
    /// Fails with [CatalogClientError::NotFound] if there is no such item.
    async fn get_item(&self, id: &ItemId) -> Result<CatalogItem, CatalogClientError>;

    /// Create an item, returning it with its assigned id.
    async fn create_item(&self, item: &NewItem) -> Result<CatalogItem, CatalogClientError>;

    /// Apply a partial update to an item.
    async fn update_item(
        &self,
        id: &ItemId,
        patch: &ItemPatch,
    ) -> Result<CatalogItem, CatalogClientError>;

    /// Delete an item.
    async fn delete_item(&self, id: &ItemId) -> Result<(), CatalogClientError>;

    /// Create many items at once, returning the number of created items.
    async fn upload_items(&self, items: &[NewItem]) -> Result<u64, CatalogClientError>;

    /// Fill the catalog with sample data, returning the number of created items.
    async fn seed_database(&self) -> Result<u64, CatalogClientError>;

    /// Remove all items from the catalog.
    async fn clear_database(&self) -> Result<(), CatalogClientError>;

    /// Get the full, unpaginated item list.
    async fn get_all_items(&self) -> Result<Vec<CatalogItem>, CatalogClientError>;
}

/// A client for the item API.
///
/// Clones share the underlying connection pool.
#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: Url,
    config: CatalogClientConfig,
}

impl Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("catalog_url", &self.config.catalog_url)
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    /// Create a new catalog client from configuration.
    pub fn new(config: CatalogClientConfig) -> Result<Self, CatalogClientError> {
        let base_url = parse_base_url(&config.catalog_url)?;
        let http = build_http_client(&config)?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    /// Get the configured catalog URL.
    pub fn catalog_url(&self) -> &str {
        &self.config.catalog_url
    }

    /// Update the client configuration and recreate the client.
    pub fn update_config(
        &mut self,
        update: impl FnOnce(&mut CatalogClientConfig),
    ) -> Result<(), CatalogClientError> {
        let mut modified_config = self.config.clone();
        update(&mut modified_config);
        *self = Self::new(modified_config)?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, CatalogClientError> {
        self.base_url
            .join(path)
            .map_err(|e| CatalogClientError::InvalidUrl(path.to_string(), e))
    }

    fn item_endpoint(&self, id: &ItemId) -> Result<Url, CatalogClientError> {
        self.endpoint(&format!(
            "items/{}",
            url_escape::encode_component(id.as_str())
        ))
    }

    /// Send a request and decode the (possibly enveloped) JSON response.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, CatalogClientError> {
        let response = self
            .send(request)
            .await?
            .bytes()
            .await
            .map_err(CatalogClientError::Network)?;

        let envelope: Envelope<T> =
            serde_json::from_slice(&response).map_err(CatalogClientError::InvalidResponse)?;
        Ok(envelope.into_inner())
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, CatalogClientError> {
        request
            .send()
            .await
            .map_err(CatalogClientError::Network)?
            .map_response_error()
            .await
    }
}

// ---------------------------------------------------------------------------
// ClientTrait implementation for CatalogClient
// ---------------------------------------------------------------------------

impl ClientTrait for CatalogClient {
    #[instrument(skip(self), fields(progress = "Loading items"))]
    async fn list_items(
        &self,
        page: u32,
        limit: NonZeroU32,
        sort_by: SortBy,
    ) -> Result<ItemsPage, CatalogClientError> {
        let request = self.http.get(self.endpoint("items")?).query(&[
            ("page", page.to_string()),
            ("limit", limit.to_string()),
            ("sortBy", sort_by.to_string()),
        ]);

        let page: ItemsPage = self.send_json(request).await?;
        debug!(
            n_items = page.items.len(),
            current_page = page.pagination.current_page,
            has_next_page = page.pagination.has_next_page,
            "received item page"
        );
        Ok(page)
    }

    #[instrument(skip_all, fields(
        query = %query.as_ref(),
        page,
        progress = format!("Searching for items matching '{}'", query.as_ref())))]
    async fn search_items(
        &self,
        query: impl AsRef<str> + Send + Sync,
        page: u32,
        limit: NonZeroU32,
        filters: &SearchFilters,
        sort_by: SortBy,
    ) -> Result<ItemsPage, CatalogClientError> {
        debug!(?filters, %sort_by, "sending search request");

        let mut params = vec![
            ("q", query.as_ref().to_string()),
            ("page", page.to_string()),
            ("limit", limit.to_string()),
            ("sortBy", sort_by.to_string()),
        ];
        params.extend(filters.query_pairs());

        let request = self.http.get(self.endpoint("items/search")?).query(&params);

        let page: ItemsPage = self.send_json(request).await?;
        debug!(
            n_items = page.items.len(),
            total_items = page.pagination.total_items,
            "received search results"
        );
        Ok(page)
    }

    #[instrument(skip(self), fields(%id))]
    async fn get_item(&self, id: &ItemId) -> Result<CatalogItem, CatalogClientError> {
        let request = self.http.get(self.item_endpoint(id)?);
        self.send_json(request)
            .await
            .map_err(CatalogClientError::into_not_found)
    }

    #[instrument(skip_all, fields(name = %item.name))]
    async fn create_item(&self, item: &NewItem) -> Result<CatalogItem, CatalogClientError> {
        let request = self.http.post(self.endpoint("items")?).json(item);
        let created: CatalogItem = self.send_json(request).await?;
        debug!(id = %created.id, "created item");
        Ok(created)
    }

    #[instrument(skip(self, patch), fields(%id))]
    async fn update_item(
        &self,
        id: &ItemId,
        patch: &ItemPatch,
    ) -> Result<CatalogItem, CatalogClientError> {
        let request = self.http.put(self.item_endpoint(id)?).json(patch);
        self.send_json(request)
            .await
            .map_err(CatalogClientError::into_not_found)
    }

    #[instrument(skip(self), fields(%id))]
    async fn delete_item(&self, id: &ItemId) -> Result<(), CatalogClientError> {
        let request = self.http.delete(self.item_endpoint(id)?);
        self.send(request)
            .await
            .map_err(CatalogClientError::into_not_found)?;
        debug!("deleted item");
        Ok(())
    }

    #[instrument(skip_all, fields(n_items = items.len()))]
    async fn upload_items(&self, items: &[NewItem]) -> Result<u64, CatalogClientError> {
        let request = self
            .http
            .post(self.endpoint("items/upload")?)
            .json(&serde_json::json!({ "items": items }));
        let CountResponse { count } = self.send_json(request).await?;
        debug!(count, "uploaded items");
        Ok(count)
    }

    #[instrument(skip_all)]
    async fn seed_database(&self) -> Result<u64, CatalogClientError> {
        let request = self.http.post(self.endpoint("items/seed")?);
        let CountResponse { count } = self.send_json(request).await?;
        debug!(count, "seeded catalog");
        Ok(count)
    }

    #[instrument(skip_all)]
    async fn clear_database(&self) -> Result<(), CatalogClientError> {
        let request = self.http.delete(self.endpoint("items/clear")?);
        self.send(request).await?;
        debug!("cleared catalog");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn get_all_items(&self) -> Result<Vec<CatalogItem>, CatalogClientError> {
        let request = self.http.get(self.endpoint("items/all")?);
        let items: ItemList = self.send_json(request).await?;
        Ok(items.into())
    }
}

// ---------------------------------------------------------------------------
// HTTP client builder
// ---------------------------------------------------------------------------

/// Parse the configured base URL so that relative endpoints extend its path.
///
/// [Url::join] replaces the last path segment unless the path ends in `/`.
pub(crate) fn parse_base_url(url: &str) -> Result<Url, CatalogClientError> {
    let mut base_url =
        Url::parse(url).map_err(|e| CatalogClientError::InvalidUrl(url.to_string(), e))?;
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }
    Ok(base_url)
}

/// Build the HTTP client for the item API.
fn build_http_client(config: &CatalogClientConfig) -> Result<reqwest::Client, CatalogClientError> {
    let mut headers = HeaderMap::new();

    for (key, value) in &config.extra_headers {
        headers.insert(
            header::HeaderName::from_str(key).map_err(
                |e: reqwest::header::InvalidHeaderName| CatalogClientError::Other(e.to_string()),
            )?,
            header::HeaderValue::from_str(value).map_err(
                |e: reqwest::header::InvalidHeaderValue| CatalogClientError::Other(e.to_string()),
            )?,
        );
    }

    debug!(
        catalog_url = %config.catalog_url,
        extra_headers = config.extra_headers.len(),
        "building catalog HTTP client"
    );

    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| format!("storefront/{STOREFRONT_VERSION}"));

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(60))
        .user_agent(user_agent)
        .build()
        .map_err(|e| CatalogClientError::Other(e.to_string()))
}
