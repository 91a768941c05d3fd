use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::grid_controller::{ColumnDef, GridOptions};
use crate::utils::app_paths::AppPaths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid: GridConfig,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Delay after the last keystroke before a search applies
    pub debounce_ms: u64,

    /// How long a fetch may take before it is abandoned
    pub request_timeout_ms: u64,

    pub default_page_size: usize,

    /// Choices offered by the page-size selector
    pub page_size_options: Vec<usize>,

    /// Optional cap on rows considered after filtering and sorting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,

    /// Send search text to the server instead of filtering locally
    pub server_search: bool,

    /// Session files untouched for longer than this are deleted at start-up
    pub session_retention_days: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Default endpoint when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Namespace for persisted grid state
    pub table_key: String,

    pub columns: Vec<ColumnDef>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 250,
            request_timeout_ms: 30_000,
            default_page_size: 10,
            page_size_options: vec![10, 25, 50, 100],
            max_results: None,
            server_search: false,
            session_retention_days: 7,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            table_key: "grid".to_string(),
            columns: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from the default location, writing defaults on first run
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            let default_config = Self::default();
            default_config.save()?;
            return Ok(default_config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(target: "config", "Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        AppPaths::config_file()
    }

    /// Library options for one grid over `url`
    pub fn grid_options(&self, url: &str) -> GridOptions {
        GridOptions::new(self.source.table_key.clone(), url)
            .with_columns(self.source.columns.clone())
            .with_debounce(Duration::from_millis(self.grid.debounce_ms))
            .with_timeout(Duration::from_millis(self.grid.request_timeout_ms))
            .with_default_page_size(self.grid.default_page_size)
            .with_max_results(self.grid.max_results)
            .with_server_search(self.grid.server_search)
            .with_page_size_options(self.grid.page_size_options.clone())
    }

    pub fn session_retention(&self) -> Duration {
        Duration::from_secs(self.grid.session_retention_days * 24 * 60 * 60)
    }

    /// A default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# datagrid configuration file
# Location: ~/.config/datagrid/config.toml (Linux)
#           ~/Library/Application Support/datagrid/config.toml (macOS)
#           %APPDATA%\datagrid\config.toml (Windows)

[grid]
# Milliseconds to wait after the last keystroke before a search is applied
debounce_ms = 250

# Abandon a fetch that takes longer than this
request_timeout_ms = 30000

# Rows per page on first use
default_page_size = 10

# Choices for the page size selector
page_size_options = [10, 25, 50, 100]

# Hard limit on rows considered after filtering and sorting
# max_results = 1000

# Send the search text to the server as ?search=... instead of filtering locally
server_search = false

# Delete saved session state not used for this many days
session_retention_days = 7

[source]
# Endpoint returning a JSON array of row objects
# url = "http://localhost:5000/api/users"

# Namespace for session state; give each grid its own
table_key = "grid"

# Declared columns; only sortable ones react to `sort <property>`
# [[source.columns]]
# property = "name"
# header = "Name"
# sortable = true
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.grid.debounce_ms, 250);
        assert_eq!(config.grid.default_page_size, 10);
        assert_eq!(config.source.table_key, "grid");
        assert!(config.source.url.is_none());
    }

    #[test]
    fn test_commented_template_parses_to_defaults() {
        let config: Config = toml::from_str(&Config::create_default_with_comments()).unwrap();
        assert_eq!(config.grid.request_timeout_ms, 30_000);
        assert_eq!(config.grid.page_size_options, vec![10, 25, 50, 100]);
        assert_eq!(config.grid.session_retention_days, 7);
        assert_eq!(
            config.session_retention(),
            Duration::from_secs(7 * 24 * 60 * 60)
        );
        assert!(config.source.columns.is_empty());
    }

    #[test]
    fn test_partial_file_and_columns() {
        let config: Config = toml::from_str(
            r#"
            [grid]
            default_page_size = 25
            max_results = 500

            [source]
            table_key = "users"

            [[source.columns]]
            property = "name"
            header = "Name"

            [[source.columns]]
            property = "email"
            sortable = false
            "#,
        )
        .unwrap();

        assert_eq!(config.grid.debounce_ms, 250);
        assert_eq!(config.grid.max_results, Some(500));
        assert_eq!(config.source.columns.len(), 2);
        assert!(config.source.columns[0].sortable);
        assert!(!config.source.columns[1].sortable);
        assert_eq!(config.source.columns[1].header(), "email");

        let options = config.grid_options("http://localhost/users");
        assert_eq!(options.table_key, "users");
        assert_eq!(options.default_page_size, 25);
        assert_eq!(options.max_results, Some(500));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.grid.server_search = true;
        config.source.url = Some("http://example.test/rows".to_string());

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.grid.server_search);
        assert_eq!(loaded.source.url, config.source.url);
    }
}
