//! Client side retrieval state of the item catalog.
//!
//! [QueryState] owns the search query, filters, sort order and pagination
//! of a browsing session. Every transition mutates the state synchronously
//! and yields at most one [FetchRequest]. The request is sent through a
//! [ClientTrait] and its result is merged back with [QueryState::apply].
//!
//! Each request doubles as the tag of the response it expects.
//! Only the response to the most recently issued request is merged,
//! responses to superseded requests are discarded without touching the state.
//!
//! [CatalogBrowser] couples a [QueryState] with a client for callers that
//! don't need to drive overlapping requests themselves.

use std::num::NonZeroU32;

use storefront_catalog::{
    CatalogClientError,
    CatalogItem,
    ClientTrait,
    DEFAULT_PAGE_SIZE,
    ItemsPage,
    SearchFilters,
    SortBy,
};
use tracing::{debug, instrument};

use crate::utils::display_chain;

/// Which endpoint a request is served by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Mode {
    #[default]
    #[display("browse")]
    Browse,
    #[display("search")]
    Search,
}

/// A request derived from a state transition.
///
/// Besides the request parameters it carries a sequence number,
/// which makes every issued request distinct even if its parameters
/// equal those of an earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    seq: u64,
    pub mode: Mode,
    /// Trimmed search query, empty in browse mode
    pub query: String,
    /// Filters at the time of issuance, only sent in search mode
    pub filters: SearchFilters,
    pub sort_by: SortBy,
    pub page: u32,
    pub limit: NonZeroU32,
    /// Whether a successful response is appended to
    /// or replaces the current items
    pub append: bool,
}

impl FetchRequest {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Send the request through the given gateway.
    #[instrument(skip_all, fields(seq = self.seq, mode = %self.mode, page = self.page))]
    pub async fn send(&self, client: &impl ClientTrait) -> Result<ItemsPage, CatalogClientError> {
        match self.mode {
            Mode::Browse => client.list_items(self.page, self.limit, self.sort_by).await,
            Mode::Search => {
                client
                    .search_items(
                        &self.query,
                        self.page,
                        self.limit,
                        &self.filters,
                        self.sort_by,
                    )
                    .await
            },
        }
    }
}

/// What happened to a response passed to [QueryState::apply].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page was merged into the items
    Applied,
    /// The request failed and the error was recorded
    Failed,
    /// The response belonged to a superseded request and was ignored
    Discarded,
}

#[derive(Debug, Clone)]
pub struct QueryState {
    items: Vec<CatalogItem>,
    loading: bool,
    error: Option<String>,
    search_query: String,
    filters: SearchFilters,
    sort_by: SortBy,
    current_page: u32,
    has_next_page: bool,
    total_items: u64,
    page_size: NonZeroU32,
    mounted: bool,
    next_seq: u64,
    expected: Option<FetchRequest>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            search_query: String::new(),
            filters: SearchFilters::default(),
            sort_by: SortBy::default(),
            current_page: 1,
            has_next_page: false,
            total_items: 0,
            page_size: DEFAULT_PAGE_SIZE,
            mounted: false,
            next_seq: 0,
            expected: None,
        }
    }
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the filters before the initial load.
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Seed the sort order before the initial load.
    pub fn with_sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn with_page_size(mut self, page_size: NonZeroU32) -> Self {
        self.page_size = page_size;
        self
    }

    // region: accessors

    /// Items in arrival order across all merged pages.
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// [Mode::Search] iff the search query is non-empty.
    pub fn mode(&self) -> Mode {
        if self.search_query.is_empty() {
            Mode::Browse
        } else {
            Mode::Search
        }
    }

    pub fn filters(&self) -> &SearchFilters {
        &self.filters
    }

    pub fn sort_by(&self) -> SortBy {
        self.sort_by
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn has_next_page(&self) -> bool {
        self.has_next_page
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn page_size(&self) -> NonZeroU32 {
        self.page_size
    }

    /// The request whose response would currently be merged.
    pub fn pending(&self) -> Option<&FetchRequest> {
        self.expected.as_ref()
    }

    // endregion

    // region: transitions

    /// Load the first browse page, once per session.
    ///
    /// Only fires if nothing was loaded or requested yet.
    pub fn initial_load(&mut self) -> Option<FetchRequest> {
        if self.mounted {
            debug!("already mounted, skipping initial load");
            return None;
        }
        self.mounted = true;

        if !self.items.is_empty() || self.loading || self.mode() != Mode::Browse {
            debug!(mode = %self.mode(), loading = self.loading, "skipping initial load");
            return None;
        }

        Some(self.issue(1, false))
    }

    /// Change the search query.
    ///
    /// An unchanged (trimmed) query is a no-op.
    /// An empty query switches to browse mode with no items and no request,
    /// the browse list is only reloaded by [Self::browse_all].
    pub fn set_search(&mut self, query: &str) -> Option<FetchRequest> {
        let query = query.trim();
        if query == self.search_query {
            debug!(query, "search query unchanged");
            return None;
        }

        self.search_query = query.to_string();
        self.clear_results();

        if self.search_query.is_empty() {
            self.abandon();
            return None;
        }

        Some(self.issue(1, false))
    }

    /// Replace the filters and reload the first page of the current mode.
    pub fn set_filters(&mut self, filters: SearchFilters) -> Option<FetchRequest> {
        self.filters = filters;
        self.clear_results();
        Some(self.issue(1, false))
    }

    /// Replace the sort order and reload the first page of the current mode.
    pub fn set_sort_by(&mut self, sort_by: SortBy) -> Option<FetchRequest> {
        self.sort_by = sort_by;
        self.clear_results();
        Some(self.issue(1, false))
    }

    /// Request the next page of the current mode.
    ///
    /// Rejected while a request is in flight or if there is no next page.
    pub fn load_more(&mut self) -> Option<FetchRequest> {
        if self.loading || !self.has_next_page {
            debug!(
                loading = self.loading,
                has_next_page = self.has_next_page,
                "not loading more"
            );
            return None;
        }

        let Some(next_page) = self.current_page.checked_add(1) else {
            debug!(
                current_page = self.current_page,
                "no page follows the last representable page"
            );
            return None;
        };

        Some(self.issue(next_page, true))
    }

    /// Leave search mode and reload the first browse page,
    /// keeping filters and sort order.
    pub fn browse_all(&mut self) -> Option<FetchRequest> {
        self.search_query.clear();
        self.clear_results();
        Some(self.issue(1, false))
    }

    // endregion

    /// Merge the result of a request into the state.
    ///
    /// Results of requests other than [Self::pending] are discarded.
    pub fn apply(
        &mut self,
        request: &FetchRequest,
        result: Result<ItemsPage, CatalogClientError>,
    ) -> FetchOutcome {
        if self.expected.as_ref() != Some(request) {
            debug!(
                seq = request.seq,
                expected = ?self.expected.as_ref().map(FetchRequest::seq),
                "discarding stale response"
            );
            return FetchOutcome::Discarded;
        }
        self.expected = None;
        self.loading = false;

        match result {
            Ok(page) => {
                debug!(
                    seq = request.seq,
                    append = request.append,
                    n_items = page.items.len(),
                    current_page = page.pagination.current_page,
                    "merging page"
                );
                if request.append {
                    self.items.extend(page.items);
                } else {
                    self.items = page.items;
                }
                self.current_page = page.pagination.current_page;
                self.has_next_page = page.pagination.has_next_page;
                self.total_items = page.pagination.total_items;
                self.error = None;
                FetchOutcome::Applied
            },
            Err(err) => {
                let message = display_chain(&err);
                debug!(seq = request.seq, error = %message, "request failed");
                self.error = Some(message);
                FetchOutcome::Failed
            },
        }
    }

    /// Record a new expected request and mark the state as loading.
    fn issue(&mut self, page: u32, append: bool) -> FetchRequest {
        let request = FetchRequest {
            seq: self.next_seq,
            mode: self.mode(),
            query: self.search_query.clone(),
            filters: self.filters.clone(),
            sort_by: self.sort_by,
            page,
            limit: self.page_size,
            append,
        };
        self.next_seq += 1;

        debug!(
            seq = request.seq,
            mode = %request.mode,
            query = %request.query,
            page,
            append,
            sort_by = %request.sort_by,
            "issuing request"
        );

        self.loading = true;
        self.error = None;
        self.expected = Some(request.clone());
        request
    }

    /// Forget the expected request, its response will be discarded.
    fn abandon(&mut self) {
        if let Some(request) = self.expected.take() {
            debug!(seq = request.seq, "abandoning request");
        }
        self.loading = false;
        self.error = None;
    }

    fn clear_results(&mut self) {
        self.items.clear();
        self.current_page = 1;
        self.has_next_page = false;
        self.total_items = 0;
    }
}

/// A [QueryState] bound to a gateway.
///
/// Each method runs the transition of the same name,
/// awaits the derived request, if any, and merges its result.
/// `None` means the transition didn't issue a request.
#[derive(Debug)]
pub struct CatalogBrowser<C> {
    client: C,
    state: QueryState,
}

impl<C: ClientTrait> CatalogBrowser<C> {
    pub fn new(client: C) -> Self {
        Self::with_state(client, QueryState::default())
    }

    pub fn with_state(client: C, state: QueryState) -> Self {
        Self { client, state }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn initial_load(&mut self) -> Option<FetchOutcome> {
        let request = self.state.initial_load();
        self.run(request).await
    }

    pub async fn set_search(&mut self, query: &str) -> Option<FetchOutcome> {
        let request = self.state.set_search(query);
        self.run(request).await
    }

    pub async fn set_filters(&mut self, filters: SearchFilters) -> Option<FetchOutcome> {
        let request = self.state.set_filters(filters);
        self.run(request).await
    }

    pub async fn set_sort_by(&mut self, sort_by: SortBy) -> Option<FetchOutcome> {
        let request = self.state.set_sort_by(sort_by);
        self.run(request).await
    }

    pub async fn load_more(&mut self) -> Option<FetchOutcome> {
        let request = self.state.load_more();
        self.run(request).await
    }

    pub async fn browse_all(&mut self) -> Option<FetchOutcome> {
        let request = self.state.browse_all();
        self.run(request).await
    }

    async fn run(&mut self, request: Option<FetchRequest>) -> Option<FetchOutcome> {
        let request = request?;
        let result = request.send(&self.client).await;
        Some(self.state.apply(&request, result))
    }
}
