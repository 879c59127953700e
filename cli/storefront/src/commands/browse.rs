use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use indoc::indoc;
use storefront_sdk::models::browse::{CatalogBrowser, FetchOutcome, FetchRequest, Mode, QueryState};
use storefront_sdk::models::debounce::Debouncer;
use storefront_sdk::models::suggestions::{query_from_image_name, suggestions};
use storefront_sdk::providers::catalog::{
    CatalogClientError,
    Client,
    ClientTrait,
    ItemId,
    ItemsPage,
    SearchFilters,
    SortBy,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, instrument};

use super::Storefront;
use crate::utils::display::{
    DisplayItem,
    DisplayItems,
    format_suggestions,
    results_summary,
    stdout_is_styled,
};
use crate::utils::message;

/// Options shared by `browse` and `search`
#[derive(Debug, Bpaf, Clone)]
pub struct QueryArgs {
    /// Sort by 'relevance', 'price-low', 'price-high', 'name' or 'newest'
    #[bpaf(long("sort"), argument("ORDER"), fallback(SortBy::default()))]
    sort_by: SortBy,

    /// Only show items of a category
    #[bpaf(long("category"), argument("CATEGORY"))]
    category: Option<String>,

    /// Only show items in a price range, e.g. 'under-50'
    #[bpaf(long("price-range"), argument("RANGE"))]
    price_range: Option<String>,

    /// Only show items that are in stock
    #[bpaf(long("in-stock"))]
    in_stock: bool,

    /// Number of pages to load
    #[bpaf(long("pages"), argument("N"), fallback(NonZeroU32::MIN))]
    pages: NonZeroU32,

    /// Print items as a JSON array
    #[bpaf(long)]
    json: bool,
}

impl QueryArgs {
    fn filters(&self) -> SearchFilters {
        SearchFilters {
            category: self.category.clone(),
            price_range: self.price_range.clone(),
            in_stock: self.in_stock.then_some(true),
        }
    }

    fn browser(&self, storefront: Storefront) -> CatalogBrowser<Client> {
        let state = QueryState::new()
            .with_filters(self.filters())
            .with_sort_by(self.sort_by)
            .with_page_size(storefront.page_size);
        CatalogBrowser::with_state(storefront.catalog_client, state)
    }

    /// Load the remaining pages and print the result.
    async fn finish(&self, mut browser: CatalogBrowser<Client>) -> Result<()> {
        for _ in 1..self.pages.get() {
            if browser.state().error().is_some() || browser.load_more().await.is_none() {
                break;
            }
        }

        let state = browser.state();
        if let Some(error) = state.error() {
            bail!("{error}");
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(state.items())?);
            return Ok(());
        }

        print_items(state, 0);
        Ok(())
    }
}

// List catalog items
#[derive(Debug, Bpaf, Clone)]
pub struct Browse {
    #[bpaf(external(query_args))]
    query: QueryArgs,
}

impl Browse {
    #[instrument(name = "browse", skip_all, fields(sort_by = %self.query.sort_by, pages = self.query.pages.get()))]
    pub async fn handle(self, storefront: Storefront) -> Result<()> {
        if !self.query.filters().is_empty() {
            message::warning("Filters only apply to searches and are ignored when browsing");
        }

        let mut browser = self.query.browser(storefront);
        browser.initial_load().await;
        self.query.finish(browser).await
    }
}

/// Search query derived from the file name of an image.
fn image_query(path: &Path) -> Result<String> {
    let Some(file_name) = path.file_name() else {
        bail!("Image path '{}' has no file name", path.display());
    };
    let query = query_from_image_name(&file_name.to_string_lossy());
    if query.is_empty() {
        bail!("The file name of '{}' contains no search terms", path.display());
    }
    Ok(query)
}

#[derive(Debug, Bpaf, Clone)]
enum SearchTerm {
    Image(
        /// Search for the words of an image's file name, e.g. 'red_shoes.jpg'
        #[bpaf(long("image"), argument("PATH"))]
        PathBuf,
    ),
    Text(
        /// Text to search for in names, descriptions and categories
        #[bpaf(positional("QUERY"))]
        String,
    ),
}

impl SearchTerm {
    fn query(&self) -> Result<String> {
        match self {
            SearchTerm::Text(text) => Ok(text.clone()),
            SearchTerm::Image(path) => {
                let query = image_query(path)?;
                message::plain(format!("Searching for '{query}'"));
                Ok(query)
            },
        }
    }
}

// Search the catalog
#[derive(Debug, Bpaf, Clone)]
pub struct Search {
    #[bpaf(external(query_args))]
    query: QueryArgs,

    #[bpaf(external(search_term))]
    search_term: SearchTerm,
}

impl Search {
    #[instrument(name = "search", skip_all, fields(search_term = ?self.search_term, pages = self.query.pages.get()))]
    pub async fn handle(self, storefront: Storefront) -> Result<()> {
        let search_term = self.search_term.query()?;
        let mut browser = self.query.browser(storefront);
        if browser.set_search(&search_term).await.is_none() {
            bail!("Search query must not be empty");
        }
        self.query.finish(browser).await
    }
}

// Show a single item
#[derive(Debug, Bpaf, Clone)]
pub struct Show {
    /// Print the item as JSON
    #[bpaf(long)]
    json: bool,

    /// Id of the item
    #[bpaf(positional("ID"))]
    id: String,
}

impl Show {
    #[instrument(name = "show", skip_all, fields(id = self.id))]
    pub async fn handle(self, storefront: Storefront) -> Result<()> {
        let item = match storefront
            .catalog_client
            .get_item(&ItemId::from(self.id.as_str()))
            .await
        {
            Err(CatalogClientError::NotFound) => bail!("Item '{}' not found", self.id),
            result => result.context("Could not get item")?,
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&item)?);
        } else {
            println!("{}", DisplayItem(&item));
        }
        Ok(())
    }
}

const EXPLORE_HELP: &str = indoc! {"
    Type to search, an empty line clears the search.

    Commands:
      :more              load the next page
      :all               leave the search and list all items
      :sort <order>      relevance, price-low, price-high, name or newest
      :filter <key>=<v>  set 'category', 'price-range' or 'in-stock',
                         an empty value removes the filter
      :clear             remove all filters
      :image <path>      search for the words of an image's file name
      :help              show this help
      :quit              exit"};

// Interactively search and browse the catalog
#[derive(Debug, Bpaf, Clone)]
pub struct Explore {}

impl Explore {
    #[instrument(name = "explore", skip_all)]
    pub async fn handle(self, storefront: Storefront) -> Result<()> {
        message::plain(EXPLORE_HELP);

        let state = QueryState::new().with_page_size(storefront.page_size);
        let mut explorer = Explorer::new(
            storefront.catalog_client,
            state,
            Debouncer::new(storefront.search_debounce),
        );
        explorer.run(BufReader::new(tokio::io::stdin())).await
    }
}

/// A line entered in `explore`
#[derive(Debug, Clone, PartialEq)]
enum ExploreInput {
    Text(String),
    More,
    All,
    Sort(SortBy),
    Filter(FilterChange),
    ClearFilters,
    Image(PathBuf),
    Help,
    Quit,
}

impl ExploreInput {
    fn parse(line: &str) -> Result<Self> {
        let Some(command) = line.trim().strip_prefix(':') else {
            return Ok(ExploreInput::Text(line.to_string()));
        };
        let (command, argument) = match command.split_once(char::is_whitespace) {
            Some((command, argument)) => (command, argument.trim()),
            None => (command, ""),
        };

        let input = match command {
            "more" | "m" => ExploreInput::More,
            "all" | "a" => ExploreInput::All,
            "sort" | "s" => ExploreInput::Sort(argument.parse()?),
            "filter" | "f" => ExploreInput::Filter(argument.parse()?),
            "clear" | "c" => ExploreInput::ClearFilters,
            "image" | "i" if argument.is_empty() => bail!("Expected the path of an image"),
            "image" | "i" => ExploreInput::Image(PathBuf::from(argument)),
            "help" | "h" => ExploreInput::Help,
            "quit" | "q" => ExploreInput::Quit,
            _ => bail!("Unknown command ':{command}', type ':help' to list commands"),
        };
        Ok(input)
    }
}

/// A single filter to set or remove.
#[derive(Debug, Clone, PartialEq)]
enum FilterChange {
    Category(Option<String>),
    PriceRange(Option<String>),
    InStock(Option<bool>),
}

impl std::str::FromStr for FilterChange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some((key, value)) = s.split_once('=') else {
            bail!("Expected a filter in the form '<key>=<value>'");
        };
        let value = Some(value.trim()).filter(|v| !v.is_empty());

        let change = match key.trim() {
            "category" => FilterChange::Category(value.map(str::to_string)),
            "price-range" | "priceRange" => FilterChange::PriceRange(value.map(str::to_string)),
            "in-stock" | "inStock" => FilterChange::InStock(
                value
                    .map(|v| v.parse::<bool>())
                    .transpose()
                    .context("'in-stock' must be 'true' or 'false'")?,
            ),
            other => bail!("Unknown filter '{other}', expected 'category', 'price-range' or 'in-stock'"),
        };
        Ok(change)
    }
}

impl FilterChange {
    fn apply(self, mut filters: SearchFilters) -> SearchFilters {
        match self {
            FilterChange::Category(category) => filters.category = category,
            FilterChange::PriceRange(price_range) => filters.price_range = price_range,
            FilterChange::InStock(in_stock) => filters.in_stock = in_stock,
        }
        filters
    }
}

type FetchResult = (FetchRequest, Result<ItemsPage, CatalogClientError>);

/// Drives a [QueryState] from lines of input.
///
/// Requests run as local tasks, so input keeps being read while they are
/// in flight. Responses are merged as they arrive, the state discards
/// those of superseded requests.
struct Explorer {
    client: Client,
    state: QueryState,
    debouncer: Debouncer<String>,
    in_flight: JoinSet<FetchResult>,
}

impl Explorer {
    fn new(client: Client, state: QueryState, debouncer: Debouncer<String>) -> Self {
        Self {
            client,
            state,
            debouncer,
            in_flight: JoinSet::new(),
        }
    }

    /// Process input until `:quit`, or until the input ended
    /// and all pending work finished.
    ///
    /// Must run within a [tokio::task::LocalSet].
    async fn run(&mut self, input: impl AsyncBufRead + Unpin) -> Result<()> {
        let request = self.state.initial_load();
        self.dispatch(request);

        let mut lines = input.lines();
        let mut input_open = true;

        loop {
            if !input_open && !self.debouncer.is_pending() && self.in_flight.is_empty() {
                debug!("input closed and nothing pending");
                break;
            }

            tokio::select! {
                line = lines.next_line(), if input_open => {
                    match line.context("Could not read input")? {
                        Some(line) => {
                            if self.handle_line(&line).is_break() {
                                break;
                            }
                        },
                        None => input_open = false,
                    }
                },
                query = self.debouncer.settled() => {
                    let request = self.state.set_search(&query);
                    self.dispatch(request);
                },
                Some(joined) = self.in_flight.join_next() => {
                    let (request, result) = joined?;
                    self.merge(&request, result);
                },
            }
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> ControlFlow<()> {
        let input = match ExploreInput::parse(line) {
            Ok(input) => input,
            Err(err) => {
                message::error(format!("{err:#}"));
                return ControlFlow::Continue(());
            },
        };
        debug!(?input, "explore input");

        match input {
            ExploreInput::Quit => return ControlFlow::Break(()),
            ExploreInput::Help => message::plain(EXPLORE_HELP),
            ExploreInput::Text(text) => self.input_text(text),
            ExploreInput::More => match self.state.load_more() {
                Some(request) => self.dispatch(Some(request)),
                None if self.state.is_loading() => {
                    message::plain("Still loading, try again in a moment")
                },
                None => message::plain("No more items to load"),
            },
            ExploreInput::All => {
                self.debouncer.cancel();
                let request = self.state.browse_all();
                self.dispatch(request);
            },
            ExploreInput::Sort(sort_by) => {
                let request = self.state.set_sort_by(sort_by);
                self.dispatch(request);
            },
            ExploreInput::Filter(change) => {
                let filters = change.apply(self.state.filters().clone());
                let request = self.state.set_filters(filters);
                self.dispatch(request);
            },
            ExploreInput::ClearFilters => {
                let request = self.state.set_filters(SearchFilters::default());
                self.dispatch(request);
            },
            ExploreInput::Image(path) => match image_query(&path) {
                Ok(query) => {
                    self.debouncer.cancel();
                    message::plain(format!("Searching for '{query}'"));
                    let request = self.state.set_search(&query);
                    self.dispatch(request);
                },
                Err(err) => message::error(format!("{err:#}")),
            },
        }
        ControlFlow::Continue(())
    }

    /// Show suggestions right away, search once typing paused.
    ///
    /// Clearing the search is not debounced.
    fn input_text(&mut self, text: String) {
        if text.trim().is_empty() {
            self.debouncer.cancel();
            let was_searching = self.state.mode() == Mode::Search;
            self.state.set_search("");
            if was_searching {
                message::plain("Search cleared, use ':all' to list all items");
            }
            return;
        }

        let found = suggestions(&text);
        if !found.is_empty() {
            message::plain(format!("Suggestions:\n{}", format_suggestions(&found)));
        }
        self.debouncer.push(text);
    }

    fn dispatch(&mut self, request: Option<FetchRequest>) {
        let Some(request) = request else {
            return;
        };
        let client = self.client.clone();
        self.in_flight.spawn_local(async move {
            let result = request.send(&client).await;
            (request, result)
        });
    }

    fn merge(&mut self, request: &FetchRequest, result: Result<ItemsPage, CatalogClientError>) {
        let already_shown = if request.append {
            self.state.items().len()
        } else {
            0
        };

        match self.state.apply(request, result) {
            FetchOutcome::Applied => print_items(&self.state, already_shown),
            FetchOutcome::Failed => {
                if let Some(error) = self.state.error() {
                    message::error(error);
                }
            },
            FetchOutcome::Discarded => {
                debug!(seq = request.seq(), "ignoring response to superseded request");
            },
        }
    }
}

/// Print the items after the first `skip` and a summary of the state.
fn print_items(state: &QueryState, skip: usize) {
    if state.items().is_empty() {
        message::plain("No items found");
        return;
    }

    let items = &state.items()[skip.min(state.items().len())..];
    if !items.is_empty() {
        println!("{}", DisplayItems::new(items, stdout_is_styled()));
    }
    message::plain(results_summary(state));
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use storefront_sdk::providers::catalog::test_helpers::{page_of, page_with_total};
    use storefront_sdk::providers::catalog::{DEFAULT_PAGE_SIZE, MockClient, MockRequest};
    use tokio::task::LocalSet;

    use super::*;
    use crate::commands::test_helpers::mock_storefront;

    fn query_args() -> QueryArgs {
        QueryArgs {
            sort_by: SortBy::default(),
            category: None,
            price_range: None,
            in_stock: false,
            pages: NonZeroU32::MIN,
            json: false,
        }
    }

    fn ids(state: &QueryState) -> Vec<&str> {
        state.items().iter().map(|item| item.id.as_str()).collect()
    }

    fn explorer(client: &MockClient) -> Explorer {
        Explorer::new(
            client.clone().into(),
            QueryState::new(),
            Debouncer::new(Duration::from_millis(300)),
        )
    }

    #[tokio::test]
    async fn browse_loads_requested_pages() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, _) = mock_storefront(tempdir.path());
        client.push_page(page_of(&["1", "2"], 1, true));
        client.push_page(page_of(&["3"], 2, false));

        let browse = Browse {
            query: QueryArgs {
                pages: NonZeroU32::new(5).unwrap(),
                sort_by: SortBy::Newest,
                ..query_args()
            },
        };
        browse.handle(storefront).await.unwrap();

        // the second page has no successor, so no third request
        assert_eq!(client.requests(), vec![
            MockRequest::List {
                page: 1,
                limit: DEFAULT_PAGE_SIZE,
                sort_by: SortBy::Newest,
            },
            MockRequest::List {
                page: 2,
                limit: DEFAULT_PAGE_SIZE,
                sort_by: SortBy::Newest,
            },
        ]);
    }

    #[tokio::test]
    async fn browse_reports_errors() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, _) = mock_storefront(tempdir.path());
        client.push_error(500, "database unavailable");

        let err = Browse { query: query_args() }
            .handle(storefront)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("database unavailable"), "{err}");
    }

    #[tokio::test]
    async fn search_sends_filters() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, _) = mock_storefront(tempdir.path());
        client.push_page(page_of(&["1"], 1, false));

        let search = Search {
            query: QueryArgs {
                category: Some("electronics".to_string()),
                in_stock: true,
                ..query_args()
            },
            search_term: SearchTerm::Text("  headphones ".to_string()),
        };
        search.handle(storefront).await.unwrap();

        assert_eq!(client.requests(), vec![MockRequest::Search {
            query: "headphones".to_string(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            filters: SearchFilters {
                category: Some("electronics".to_string()),
                price_range: None,
                in_stock: Some(true),
            },
            sort_by: SortBy::Relevance,
        }]);
    }

    #[tokio::test]
    async fn search_by_image_file_name() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, _) = mock_storefront(tempdir.path());
        client.push_page(page_of(&["1"], 1, false));

        let search = Search {
            query: query_args(),
            search_term: SearchTerm::Image(PathBuf::from("photos/red_running-shoes.JPG")),
        };
        search.handle(storefront).await.unwrap();

        assert_eq!(client.requests(), vec![MockRequest::Search {
            query: "red running shoes".to_string(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            filters: SearchFilters::default(),
            sort_by: SortBy::Relevance,
        }]);
    }

    #[test]
    fn image_without_search_terms_is_rejected() {
        assert!(image_query(Path::new("photos/.png")).is_err());
        assert!(image_query(Path::new("/")).is_err());
        assert_eq!(
            image_query(Path::new("garden_chair.webp")).unwrap(),
            "garden chair"
        );
    }

    #[tokio::test]
    async fn empty_search_is_rejected() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, _) = mock_storefront(tempdir.path());

        let search = Search {
            query: query_args(),
            search_term: SearchTerm::Text("   ".to_string()),
        };
        assert!(search.handle(storefront).await.is_err());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn show_missing_item() {
        let tempdir = tempfile::tempdir().unwrap();
        let (storefront, client, _) = mock_storefront(tempdir.path());
        client.push_error(404, "Item not found");

        let err = Show {
            json: false,
            id: "nope".to_string(),
        }
        .handle(storefront)
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Item 'nope' not found");
    }

    #[test]
    fn parse_explore_input() {
        assert_eq!(
            ExploreInput::parse("red shoes").unwrap(),
            ExploreInput::Text("red shoes".to_string())
        );
        assert_eq!(ExploreInput::parse(" :more ").unwrap(), ExploreInput::More);
        assert_eq!(
            ExploreInput::parse(":sort price-high").unwrap(),
            ExploreInput::Sort(SortBy::PriceHigh)
        );
        assert_eq!(
            ExploreInput::parse(":filter category=toys").unwrap(),
            ExploreInput::Filter(FilterChange::Category(Some("toys".to_string())))
        );
        assert_eq!(
            ExploreInput::parse(":filter in-stock=").unwrap(),
            ExploreInput::Filter(FilterChange::InStock(None))
        );
        assert!(ExploreInput::parse(":sort cheapest").is_err());
        assert!(ExploreInput::parse(":filter colour=red").is_err());
        assert!(ExploreInput::parse(":filter in-stock=maybe").is_err());
        assert_eq!(
            ExploreInput::parse(":image ~/photos/desk_lamp.png").unwrap(),
            ExploreInput::Image(PathBuf::from("~/photos/desk_lamp.png"))
        );
        assert!(ExploreInput::parse(":image").is_err());
        assert!(ExploreInput::parse(":frobnicate").is_err());
    }

    #[test]
    fn filter_changes_keep_other_filters() {
        let filters = SearchFilters {
            category: Some("toys".to_string()),
            price_range: Some("under-50".to_string()),
            in_stock: None,
        };
        let filters = FilterChange::InStock(Some(true)).apply(filters);
        let filters = FilterChange::Category(None).apply(filters);
        assert_eq!(filters, SearchFilters {
            category: None,
            price_range: Some("under-50".to_string()),
            in_stock: Some(true),
        });
    }

    #[tokio::test(start_paused = true)]
    async fn explore_searches_debounced_text() {
        let client = MockClient::default();
        client.push_page(page_of(&["1", "2"], 1, false));
        client.push_page(page_with_total(&["7"], 1, false, 1));

        let mut explorer = explorer(&client);
        LocalSet::new()
            .run_until(explorer.run(&b"l\nla\nlamp\n"[..]))
            .await
            .unwrap();

        assert_eq!(explorer.state.search_query(), "lamp");
        assert_eq!(ids(&explorer.state), vec!["7"]);

        // only the last text of the burst is searched
        let searches = client
            .requests()
            .into_iter()
            .filter(|request| matches!(request, MockRequest::Search { .. }))
            .count();
        assert_eq!(searches, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn explore_discards_superseded_responses() {
        let client = MockClient::default();
        client.push_page(page_of(&["stale"], 1, false));
        client.push_page(page_of(&["fresh"], 1, false));

        let mut explorer = explorer(&client);
        LocalSet::new()
            .run_until(explorer.run(&b":sort price-low\n"[..]))
            .await
            .unwrap();

        assert_eq!(ids(&explorer.state), vec!["fresh"]);
        assert_eq!(explorer.state.sort_by(), SortBy::PriceLow);
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn explore_searches_image_file_name_immediately() {
        let client = MockClient::default();
        client.push_page(page_of(&["1"], 1, false));
        client.push_page(page_of(&["shoe"], 1, false));

        let mut explorer = explorer(&client);
        LocalSet::new()
            .run_until(explorer.run(&b"red\n:image blue_suede-shoes.png\n"[..]))
            .await
            .unwrap();

        // the pending free text is superseded by the image search
        assert_eq!(explorer.state.search_query(), "blue suede shoes");
        assert_eq!(ids(&explorer.state), vec!["shoe"]);
        let searches = client
            .requests()
            .into_iter()
            .filter(|request| matches!(request, MockRequest::Search { .. }))
            .collect::<Vec<_>>();
        assert_eq!(searches.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn explore_loads_more_and_quits() {
        let client = MockClient::default();
        client.push_page(page_of(&["1", "2"], 1, true));
        client.push_page(page_of(&["3"], 2, false));

        let mut explorer = explorer(&client);
        LocalSet::new()
            .run_until(async {
                let (mut writer, reader) = tokio::io::duplex(64);
                let run = explorer.run(BufReader::new(reader));
                let input = async {
                    use tokio::io::AsyncWriteExt;
                    // let the initial load finish before asking for more
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    writer.write_all(b":more\n").await.unwrap();
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    writer.write_all(b":quit\n").await.unwrap();
                };
                let (result, ()) = tokio::join!(run, input);
                result.unwrap();
            })
            .await;

        assert_eq!(ids(&explorer.state), vec!["1", "2", "3"]);
        assert_eq!(explorer.state.current_page(), 2);
    }
}
