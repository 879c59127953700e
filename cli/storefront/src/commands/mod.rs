mod admin;
mod browse;

use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use bpaf::Bpaf;
use indoc::{formatdoc, indoc};
use storefront_sdk::models::session::{AdminCredentials, Session};
use storefront_sdk::providers::catalog::{Client, Storage};
use storefront_sdk::providers::token_store::FileTokenStore;
use tracing::debug;

use crate::config::Config;
use crate::utils::init::{init_catalog_client, init_object_store};
use crate::utils::message;

pub const STOREFRONT_VERSION: &str = env!("CARGO_PKG_VERSION");

static STOREFRONT_DESCRIPTION: &'_ str = indoc! {"
    Browse, search and maintain the items of a storefront catalog."
};

fn vec_len<T>(x: Vec<T>) -> usize {
    Vec::len(&x)
}

#[derive(Bpaf, Clone, Copy, Debug)]
pub enum Verbosity {
    Verbose(
        /// Increase logging verbosity
        ///
        /// Invoke multiple times for increasing detail.
        #[bpaf(short('v'), long("verbose"), req_flag(()), many, map(vec_len))]
        usize,
    ),

    /// Silence logs except for errors
    #[bpaf(short, long)]
    Quiet,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Verbose(0)
    }
}

#[derive(Bpaf)]
#[bpaf(options, descr(STOREFRONT_DESCRIPTION))]
pub struct StorefrontCli(#[bpaf(external(storefront_args))] pub StorefrontArgs);

/// Main storefront args parser
///
/// To parse the storefront CLI, use [`StorefrontCli`] instead using [`storefront_cli()`].
#[derive(Debug, Bpaf)]
#[bpaf(ignore_rustdoc)]
pub struct StorefrontArgs {
    /// Verbose mode
    ///
    /// Invoke multiple times for increasing detail.
    #[bpaf(external, fallback(Default::default()))]
    pub verbosity: Verbosity,

    /// Print the version of the program
    #[bpaf(long, short('V'))]
    version: bool,

    #[bpaf(external(commands), optional)]
    command: Option<Commands>,
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command")
    }
}

/// Everything a command needs to talk to the catalog.
#[derive(Debug)]
pub struct Storefront {
    /// Directory of persistent state, e.g. the admin token
    pub data_dir: PathBuf,
    pub catalog_client: Client,
    pub object_store: Storage,
    pub page_size: NonZeroU32,
    pub search_debounce: Duration,
    pub admin_credentials: AdminCredentials,
}

impl Storefront {
    /// Restore the admin session persisted in the data directory.
    pub fn session(&self) -> Session<FileTokenStore> {
        Session::bootstrap(
            FileTokenStore::new(&self.data_dir),
            self.admin_credentials.clone(),
        )
    }
}

impl StorefrontArgs {
    pub async fn handle(self, config: Config) -> Result<()> {
        if self.version {
            println!("Version: {STOREFRONT_VERSION}");
            return Ok(());
        }

        // Given no command, skip initialization and print welcome message
        let Some(command) = self.command else {
            print_welcome_message();
            return Ok(());
        };

        tokio::fs::create_dir_all(&config.storefront.data_dir)
            .await
            .with_context(|| {
                format!(
                    "Could not create data directory: {:?}",
                    config.storefront.data_dir
                )
            })?;

        let storefront = Storefront {
            data_dir: config.storefront.data_dir.clone(),
            catalog_client: init_catalog_client(&config)?,
            object_store: init_object_store(&config)?,
            page_size: config.storefront.page_size(),
            search_debounce: config.storefront.search_debounce(),
            admin_credentials: config.storefront.admin_credentials(),
        };
        debug!(?storefront, "initialized storefront");

        let signal_handler = async { tokio::signal::ctrl_c().await };

        let cli_worker = async move {
            match command {
                Commands::Discover(args) => args.handle(storefront).await,
                Commands::Admin(args) => args.handle(storefront).await,
            }
        };

        // Wait for either an interrupting signal or completion of the cli work.
        // Commands may spawn local tasks, so both run on a LocalSet.
        tokio::task::LocalSet::new()
            .run_until(async {
                tokio::select! {
                    _ = tokio::task::spawn_local(signal_handler) => {
                        Err(anyhow!("user interrupted process"))
                    }
                    result = tokio::task::spawn_local(cli_worker) => result?
                }
            })
            .await
    }
}

/// Print general welcome message with short usage instructions
fn print_welcome_message() {
    message::plain(formatdoc! {"
        storefront version {STOREFRONT_VERSION}

        Usage: storefront OPTIONS (browse|search|show|explore|login|...) [--help]

        Use 'storefront --help' for full list of commands and more information
    "});
}

#[derive(Bpaf, Clone)]
enum Commands {
    Discover(#[bpaf(external(discover_commands))] DiscoverCommands),
    Admin(#[bpaf(external(admin_commands))] AdminCommands),
}

/// Discover items
#[derive(Bpaf, Clone)]
enum DiscoverCommands {
    /// List catalog items
    #[bpaf(command, short('l'), long("list"))]
    Browse(#[bpaf(external(browse::browse))] browse::Browse),

    /// Search the catalog
    #[bpaf(command)]
    Search(#[bpaf(external(browse::search))] browse::Search),

    /// Show all details of a single item
    #[bpaf(command)]
    Show(#[bpaf(external(browse::show))] browse::Show),

    /// Interactively search and browse the catalog
    #[bpaf(
        command,
        header(indoc! {"
            Free text is searched for once typing paused.
            Lines starting with ':' are commands, type ':help' to list them.
        "})
    )]
    Explore(#[bpaf(external(browse::explore))] browse::Explore),
}

impl DiscoverCommands {
    async fn handle(self, storefront: Storefront) -> Result<()> {
        match self {
            DiscoverCommands::Browse(args) => args.handle(storefront).await?,
            DiscoverCommands::Search(args) => args.handle(storefront).await?,
            DiscoverCommands::Show(args) => args.handle(storefront).await?,
            DiscoverCommands::Explore(args) => args.handle(storefront).await?,
        }
        Ok(())
    }
}

/// Maintain the catalog
#[derive(Bpaf, Clone)]
enum AdminCommands {
    /// Log in as the catalog admin
    #[bpaf(command)]
    Login(#[bpaf(external(admin::login))] admin::Login),

    /// End the admin session
    #[bpaf(command)]
    Logout(#[bpaf(external(admin::logout))] admin::Logout),

    /// Show whether an admin session is active
    #[bpaf(command)]
    Status(#[bpaf(external(admin::status))] admin::Status),

    /// Create an item
    #[bpaf(command)]
    Create(#[bpaf(external(admin::create))] admin::Create),

    /// Change fields of an item
    #[bpaf(command)]
    Edit(#[bpaf(external(admin::edit))] admin::Edit),

    /// Delete an item
    #[bpaf(command)]
    Delete(#[bpaf(external(admin::delete))] admin::Delete),

    /// Create items from a JSON file
    #[bpaf(command)]
    Upload(#[bpaf(external(admin::upload))] admin::Upload),

    /// Fill the catalog with sample items
    #[bpaf(command)]
    Seed(#[bpaf(external(admin::seed))] admin::Seed),

    /// Delete all items of the catalog
    #[bpaf(command)]
    Clear(#[bpaf(external(admin::clear))] admin::Clear),
}

impl AdminCommands {
    async fn handle(self, storefront: Storefront) -> Result<()> {
        match self {
            AdminCommands::Login(args) => args.handle(storefront)?,
            AdminCommands::Logout(args) => args.handle(storefront)?,
            AdminCommands::Status(args) => args.handle(storefront),
            AdminCommands::Create(args) => args.handle(storefront).await?,
            AdminCommands::Edit(args) => args.handle(storefront).await?,
            AdminCommands::Delete(args) => args.handle(storefront).await?,
            AdminCommands::Upload(args) => args.handle(storefront).await?,
            AdminCommands::Seed(args) => args.handle(storefront).await?,
            AdminCommands::Clear(args) => args.handle(storefront).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use std::path::Path;

    use storefront_sdk::models::debounce::DEFAULT_DEBOUNCE;
    use storefront_sdk::providers::catalog::{DEFAULT_PAGE_SIZE, MockClient, MockObjectStore};

    use super::*;

    /// A [Storefront] backed by a mock client, which is returned for
    /// queueing responses and inspecting requests.
    pub(crate) fn mock_storefront(data_dir: &Path) -> (Storefront, MockClient, MockObjectStore) {
        let client = MockClient::default();
        let object_store = MockObjectStore::default();
        let storefront = Storefront {
            data_dir: data_dir.to_path_buf(),
            catalog_client: client.clone().into(),
            object_store: object_store.clone().into(),
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce: DEFAULT_DEBOUNCE,
            admin_credentials: AdminCredentials::default(),
        };
        (storefront, client, object_store)
    }

    /// Like [mock_storefront], with an admin session already logged in.
    pub(crate) fn logged_in_storefront(
        data_dir: &Path,
    ) -> (Storefront, MockClient, MockObjectStore) {
        let (storefront, client, object_store) = mock_storefront(data_dir);
        storefront
            .session()
            .login("admin", "admin123")
            .expect("default credentials should log in");
        (storefront, client, object_store)
    }
}

#[cfg(test)]
mod tests {
    use bpaf::Args;

    use super::*;

    #[test]
    fn parses_verbosity_and_command() {
        let StorefrontCli(args) = storefront_cli()
            .run_inner(Args::from(&["-vv", "search", "--sort", "price-low", "lamp"]))
            .unwrap();
        assert!(matches!(args.verbosity, Verbosity::Verbose(2)));
        assert!(matches!(
            args.command,
            Some(Commands::Discover(DiscoverCommands::Search(_)))
        ));
    }

    #[test]
    fn rejects_unknown_sort_order() {
        let result = storefront_cli().run_inner(Args::from(&["browse", "--sort", "cheapest"]));
        assert!(result.is_err());
    }

    #[test]
    fn no_command_is_allowed() {
        let StorefrontCli(args) = storefront_cli().run_inner(Args::from(&["-q"])).unwrap();
        assert!(matches!(args.verbosity, Verbosity::Quiet));
        assert!(args.command.is_none());
    }
}
