use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use anyhow::{Context, Result};
use config::{Config as HierarchicalConfig, Environment};
use serde::{Deserialize, Serialize};
use storefront_sdk::models::debounce::DEFAULT_DEBOUNCE;
use storefront_sdk::models::session::AdminCredentials;
use storefront_sdk::providers::catalog::DEFAULT_PAGE_SIZE;
use tracing::debug;
use xdg::BaseDirectories;

/// Name of storefront managed directories (config, data, cache)
const STOREFRONT_DIR_NAME: &str = "storefront";
const STOREFRONT_CONFIG_DIR_VAR: &str = "STOREFRONT_CONFIG_DIR";
pub const STOREFRONT_CONFIG_FILE: &str = "storefront.toml";

#[derive(Clone, Debug, Deserialize, Default, Serialize)]
pub struct Config {
    /// storefront configuration options
    #[serde(default, flatten)]
    pub storefront: StorefrontConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct StorefrontConfig {
    /// Directory where storefront should store ephemeral data (default:
    /// `$XDG_CACHE_HOME/storefront`)
    pub cache_dir: PathBuf,
    /// Directory where storefront should store persistent data,
    /// such as the admin session token (default: `$XDG_DATA_HOME/storefront`)
    pub data_dir: PathBuf,
    /// Directory where storefront should load its configuration file (default:
    /// `$XDG_CONFIG_HOME/storefront`)
    pub config_dir: PathBuf,

    /// The URL of the catalog API
    // Kept as a String, parsing and normalizing happens in the client.
    pub api_url: Option<String>,

    /// The URL of the object store images are uploaded to
    pub storage_url: Option<String>,

    /// How many items are requested per page
    pub page_size: Option<NonZeroU32>,

    /// How long free text input has to stay unchanged before it is searched
    pub search_debounce_ms: Option<u64>,

    /// Credentials admin logins are checked against
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl StorefrontConfig {
    pub fn page_size(&self) -> NonZeroU32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn search_debounce(&self) -> Duration {
        self.search_debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE)
    }

    /// Configured credentials, falling back to the defaults per field.
    pub fn admin_credentials(&self) -> AdminCredentials {
        let defaults = AdminCredentials::default();
        AdminCredentials {
            username: self.admin_username.clone().unwrap_or(defaults.username),
            password: self.admin_password.clone().unwrap_or(defaults.password),
        }
    }
}

impl Config {
    fn raw_config() -> Result<HierarchicalConfig> {
        let storefront_dirs = BaseDirectories::with_prefix(STOREFRONT_DIR_NAME);

        let cache_dir = storefront_dirs
            .get_cache_home()
            .context("Could not determine cache directory, is $HOME set?")?;
        let data_dir = storefront_dirs
            .get_data_home()
            .context("Could not determine data directory, is $HOME set?")?;

        let config_dir: PathBuf = match env::var(STOREFRONT_CONFIG_DIR_VAR) {
            Ok(v) => {
                debug!("`${STOREFRONT_CONFIG_DIR_VAR}` set: {v}");
                v.into()
            },
            Err(_) => {
                let config_dir = storefront_dirs
                    .get_config_home()
                    .context("Could not determine config directory, is $HOME set?")?;
                debug!("`${STOREFRONT_CONFIG_DIR_VAR}` not set, using {config_dir:?}");
                config_dir
            },
        };
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Could not create config directory: {config_dir:?}"))?;

        let mut builder = HierarchicalConfig::builder()
            .set_default("cache_dir", path_str(&cache_dir)?)?
            .set_default("data_dir", path_str(&data_dir)?)?
            // Config dir is added to the config for completeness;
            // the config file cannot change the config dir.
            .set_override("config_dir", path_str(&config_dir)?)?;

        // read from /etc
        builder = builder.add_source(
            config::File::from(PathBuf::from("/etc").join(STOREFRONT_CONFIG_FILE))
                .format(config::FileFormat::Toml)
                .required(false),
        );

        // look for files in XDG_CONFIG_DIRS locations
        for file in storefront_dirs.find_config_files(STOREFRONT_CONFIG_FILE) {
            builder = builder.add_source(config::File::from(file).format(config::FileFormat::Toml));
        }

        // Add explicit STOREFRONT_CONFIG_DIR file last
        builder = builder.add_source(
            config::File::from(config_dir.join(STOREFRONT_CONFIG_FILE))
                .format(config::FileFormat::Toml)
                .required(false),
        );

        // override via env variables
        builder = builder.add_source(Environment::with_prefix("STOREFRONT").try_parsing(true));

        Ok(builder.build()?)
    }

    /// Creates a [Config] from the environment and config files
    pub fn parse() -> Result<Config> {
        let final_config = Self::raw_config()?;
        let cli_config: Config = final_config
            .try_deserialize()
            .context("Could not parse config")?;
        debug!(config = ?cli_config, "parsed config");
        Ok(cli_config)
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("Path is not valid unicode: {path:?}"))
}
