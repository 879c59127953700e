//! A catalog client that replays queued responses.

use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::{Arc, Mutex};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::client::ClientTrait;
use crate::error::CatalogClientError;
use crate::types::*;

/// Points at a JSON file holding a list of [Response]s.
/// If set, the binary uses a [MockClient] seeded with them.
pub const STOREFRONT_CATALOG_MOCK_DATA_VAR: &str = "_STOREFRONT_USE_CATALOG_MOCK";

// Arc allows pushing responses from outside the client, e.g. while a request is pending
// Mutex allows sharing across threads (necessary because of tokio)
type MockField<T> = Arc<Mutex<T>>;

/// A canned gateway response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Page(ItemsPage),
    Item(CatalogItem),
    Items(Vec<CatalogItem>),
    Count(u64),
    Empty,
    Error { status: u16, message: String },
}

/// A request received by the [MockClient], recorded in order.
#[derive(Debug, Clone, PartialEq)]
pub enum MockRequest {
    List {
        page: u32,
        limit: NonZeroU32,
        sort_by: SortBy,
    },
    Search {
        query: String,
        page: u32,
        limit: NonZeroU32,
        filters: SearchFilters,
        sort_by: SortBy,
    },
    Get(ItemId),
    Create(NewItem),
    Update(ItemId, ItemPatch),
    Delete(ItemId),
    Upload(Vec<NewItem>),
    Seed,
    Clear,
    All,
}

#[derive(Debug, Error)]
pub enum MockDataError {
    /// Failed to read the file pointed at by the mock data variable
    #[error("failed to read mock response file")]
    ReadMockFile(#[source] std::io::Error),
    /// Failed to parse the contents of the mock data file as JSON
    #[error("failed to parse mock data as JSON")]
    ParseJson(#[source] serde_json::Error),
}

/// Reads a list of mock responses from disk.
fn read_mock_responses(path: impl AsRef<Path>) -> Result<VecDeque<Response>, MockDataError> {
    let contents = std::fs::read_to_string(path).map_err(MockDataError::ReadMockFile)?;
    let deserialized: Vec<Response> =
        serde_json::from_str(&contents).map_err(MockDataError::ParseJson)?;
    Ok(deserialized.into())
}

/// A catalog client that can be seeded with mock responses.
///
/// Every call pops the next response from the front of the queue,
/// an empty queue or a response of the wrong shape fails the call.
#[derive(Debug, Default, Clone)]
pub struct MockClient {
    pub mock_responses: MockField<VecDeque<Response>>,
    requests: MockField<Vec<MockRequest>>,
}

impl MockClient {
    /// Create a new mock client, potentially reading mock responses from disk
    pub fn new(mock_data_path: Option<impl AsRef<Path>>) -> Result<Self, MockDataError> {
        let mock_responses = match mock_data_path {
            Some(path) => read_mock_responses(path)?,
            None => VecDeque::new(),
        };
        Ok(Self {
            mock_responses: Arc::new(Mutex::new(mock_responses)),
            requests: Default::default(),
        })
    }

    /// Push a new response into the list of mock responses
    pub fn push_response(&self, resp: Response) {
        self.mock_responses
            .lock()
            .expect("couldn't acquire mock lock")
            .push_back(resp);
    }

    /// Push a page of items into the list of mock responses
    pub fn push_page(&self, page: ItemsPage) {
        self.push_response(Response::Page(page));
    }

    /// Push a single item into the list of mock responses
    pub fn push_item(&self, item: CatalogItem) {
        self.push_response(Response::Item(item));
    }

    /// Push an API error into the list of mock responses
    pub fn push_error(&self, status: u16, message: impl Into<String>) {
        self.push_response(Response::Error {
            status,
            message: message.into(),
        });
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests
            .lock()
            .expect("couldn't acquire mock lock")
            .clone()
    }

    /// Number of responses that have not been consumed yet.
    pub fn pending_responses(&self) -> usize {
        self.mock_responses
            .lock()
            .expect("couldn't acquire mock lock")
            .len()
    }

    fn next_response(&self, request: MockRequest) -> Result<Response, CatalogClientError> {
        debug!(?request, "mock catalog request");
        self.requests
            .lock()
            .expect("couldn't acquire mock lock")
            .push(request);

        let response = self
            .mock_responses
            .lock()
            .expect("couldn't acquire mock lock")
            .pop_front();

        match response {
            Some(Response::Error { status, message }) => {
                let status = StatusCode::from_u16(status).map_err(|_| {
                    CatalogClientError::Other(format!("invalid mock status code {status}"))
                })?;
                Err(CatalogClientError::Request { status, message })
            },
            Some(response) => Ok(response),
            None => Err(CatalogClientError::Other(
                "no mock response queued".to_string(),
            )),
        }
    }
}

fn unexpected(expected: &str, found: Response) -> CatalogClientError {
    CatalogClientError::Other(format!("expected {expected} response, found {found:?}"))
}

impl ClientTrait for MockClient {
    async fn list_items(
        &self,
        page: u32,
        limit: NonZeroU32,
        sort_by: SortBy,
    ) -> Result<ItemsPage, CatalogClientError> {
        match self.next_response(MockRequest::List {
            page,
            limit,
            sort_by,
        })? {
            Response::Page(page) => Ok(page),
            other => Err(unexpected("page", other)),
        }
    }

    async fn search_items(
        &self,
        query: impl AsRef<str> + Send + Sync,
        page: u32,
        limit: NonZeroU32,
        filters: &SearchFilters,
        sort_by: SortBy,
    ) -> Result<ItemsPage, CatalogClientError> {
        match self.next_response(MockRequest::Search {
            query: query.as_ref().to_string(),
            page,
            limit,
            filters: filters.clone(),
            sort_by,
        })? {
            Response::Page(page) => Ok(page),
            other => Err(unexpected("page", other)),
        }
    }

    async fn get_item(&self, id: &ItemId) -> Result<CatalogItem, CatalogClientError> {
        match self
            .next_response(MockRequest::Get(id.clone()))
            .map_err(CatalogClientError::into_not_found)?
        {
            Response::Item(item) => Ok(item),
            other => Err(unexpected("item", other)),
        }
    }

    async fn create_item(&self, item: &NewItem) -> Result<CatalogItem, CatalogClientError> {
        match self.next_response(MockRequest::Create(item.clone()))? {
            Response::Item(item) => Ok(item),
            other => Err(unexpected("item", other)),
        }
    }

    async fn update_item(
        &self,
        id: &ItemId,
        patch: &ItemPatch,
    ) -> Result<CatalogItem, CatalogClientError> {
        match self
            .next_response(MockRequest::Update(id.clone(), patch.clone()))
            .map_err(CatalogClientError::into_not_found)?
        {
            Response::Item(item) => Ok(item),
            other => Err(unexpected("item", other)),
        }
    }

    async fn delete_item(&self, id: &ItemId) -> Result<(), CatalogClientError> {
        match self
            .next_response(MockRequest::Delete(id.clone()))
            .map_err(CatalogClientError::into_not_found)?
        {
            Response::Empty => Ok(()),
            other => Err(unexpected("empty", other)),
        }
    }

    async fn upload_items(&self, items: &[NewItem]) -> Result<u64, CatalogClientError> {
        match self.next_response(MockRequest::Upload(items.to_vec()))? {
            Response::Count(count) => Ok(count),
            other => Err(unexpected("count", other)),
        }
    }

    async fn seed_database(&self) -> Result<u64, CatalogClientError> {
        match self.next_response(MockRequest::Seed)? {
            Response::Count(count) => Ok(count),
            other => Err(unexpected("count", other)),
        }
    }

    async fn clear_database(&self) -> Result<(), CatalogClientError> {
        match self.next_response(MockRequest::Clear)? {
            Response::Empty => Ok(()),
            other => Err(unexpected("empty", other)),
        }
    }

    async fn get_all_items(&self) -> Result<Vec<CatalogItem>, CatalogClientError> {
        match self.next_response(MockRequest::All)? {
            Response::Items(items) => Ok(items),
            other => Err(unexpected("items", other)),
        }
    }
}
