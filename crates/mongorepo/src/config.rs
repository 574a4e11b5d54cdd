//! Client and repository configuration
//!
//! `ClientConfig` and `MongoSettings` are plain serde structs so that a
//! service can keep its MongoDB setup in YAML or JSON:
//!
//! ```yaml
//! clients:
//!   - alias: default
//!     uri: mongodb://localhost:27017/app
//!     max_pool_size: 20
//!   - alias: audit
//!     uri: mongodb://audit-host:27017/audit
//!     monitor_commands: true
//! ```

use std::path::Path;
use std::time::Duration;

use bson::Document;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clients::{register_client, DEFAULT_ALIAS};
use crate::{RepoError, Result};

/// Default per-query timeout applied by repositories
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(120);

/// Driver client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Minimum number of connections in the pool
    pub min_pool_size: Option<u32>,
    /// Maximum number of connections in the pool
    pub max_pool_size: Option<u32>,
    /// Maximum time a connection can remain idle before being closed, in seconds
    pub max_idle_time: Option<u64>,
    /// Connection timeout in seconds (default: 10)
    pub connect_timeout: Option<u64>,
    /// Server selection timeout in seconds (default: 30)
    pub server_selection_timeout: Option<u64>,
    /// Application name for server logs
    pub app_name: Option<String>,
    /// Pin the stable API (V1)
    pub stable_api: bool,
    /// Log every started/succeeded/failed command through `tracing`
    pub monitor_commands: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            min_pool_size: None,
            max_pool_size: None,
            max_idle_time: None,
            connect_timeout: Some(10),
            server_selection_timeout: Some(30),
            app_name: Some("mongorepo".to_string()),
            stable_api: false,
            monitor_commands: false,
        }
    }
}

impl ClientConfig {
    pub fn max_idle_time(&self) -> Option<Duration> {
        self.max_idle_time.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout.map(Duration::from_secs)
    }

    pub fn server_selection_timeout(&self) -> Option<Duration> {
        self.server_selection_timeout.map(Duration::from_secs)
    }

    /// Enable command monitoring.
    pub fn with_command_monitor(mut self) -> Self {
        self.monitor_commands = true;
        self
    }
}

/// Repository behaviour shared by every call on one repository
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryConfig {
    /// Upper bound for each call; `None` leaves calls unbounded
    pub query_timeout: Option<Duration>,
    /// Sort used by find calls that do not carry their own
    pub default_sort: Option<Document>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            query_timeout: Some(DEFAULT_QUERY_TIMEOUT),
            default_sort: None,
        }
    }
}

impl RepositoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn without_query_timeout(mut self) -> Self {
        self.query_timeout = None;
        self
    }

    pub fn default_sort(mut self, sort: Document) -> Self {
        self.default_sort = Some(sort);
        self
    }
}

/// One registry entry in a settings file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_alias")]
    pub alias: String,
    pub uri: String,
    #[serde(flatten)]
    pub config: ClientConfig,
}

fn default_alias() -> String {
    DEFAULT_ALIAS.to_string()
}

/// Settings for every client a process registers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoSettings {
    #[serde(default)]
    pub clients: Vec<ClientSettings>,
}

impl MongoSettings {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load settings from a `.yaml`/`.yml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let parse: fn(&str) -> Result<Self> = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str,
            Some("json") => Self::from_json_str,
            _ => {
                return Err(RepoError::Configuration(format!(
                    "unsupported settings file extension: {}",
                    path.display()
                )))
            }
        };
        let content = std::fs::read_to_string(path)?;
        parse(&content)
    }

    /// Look up one entry by alias.
    pub fn client(&self, alias: &str) -> Option<&ClientSettings> {
        self.clients.iter().find(|c| c.alias == alias)
    }

    /// Register every configured client, in file order.
    pub async fn register_all(&self) -> Result<Vec<String>> {
        let mut aliases = Vec::with_capacity(self.clients.len());
        for entry in &self.clients {
            register_client(&entry.alias, &entry.uri, &entry.config).await?;
            aliases.push(entry.alias.clone());
        }
        info!(count = aliases.len(), "Registered MongoDB clients from settings");
        Ok(aliases)
    }
}
