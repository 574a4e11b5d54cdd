//! Driver client construction and a thin connection handle

use bson::doc;
use mongodb::{
    event::{command::CommandEvent, EventHandler},
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Collection, Database,
};
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::{RepoError, Result};

/// Create a driver client from a connection string and configuration.
///
/// Returns the client together with the options it was built from.
pub async fn create_client(uri: &str, config: &ClientConfig) -> Result<(Client, ClientOptions)> {
    create_client_with(uri, config, |_| {}).await
}

/// Like [`create_client`], but lets the caller adjust the driver options last.
#[instrument(skip(uri, config, customize), fields(app_name = ?config.app_name))]
pub async fn create_client_with<F>(
    uri: &str,
    config: &ClientConfig,
    customize: F,
) -> Result<(Client, ClientOptions)>
where
    F: FnOnce(&mut ClientOptions),
{
    if uri.is_empty() {
        return Err(RepoError::Connection(
            "Connection URI cannot be empty".to_string(),
        ));
    }

    let mut client_options = ClientOptions::parse(uri)
        .await
        .map_err(|e| RepoError::Connection(format!("Invalid connection URI: {}", e)))?;

    apply_config(&mut client_options, config);
    customize(&mut client_options);

    let client = Client::with_options(client_options.clone()).map_err(|e| {
        RepoError::Connection(format!("Failed to initialize MongoDB client: {}", e))
    })?;

    debug!(hosts = client_options.hosts.len(), "MongoDB client created");
    Ok((client, client_options))
}

fn apply_config(client_options: &mut ClientOptions, config: &ClientConfig) {
    if let Some(min) = config.min_pool_size {
        client_options.min_pool_size = Some(min);
    }
    if let Some(max) = config.max_pool_size {
        client_options.max_pool_size = Some(max);
    }
    if let Some(idle) = config.max_idle_time() {
        client_options.max_idle_time = Some(idle);
    }
    if let Some(connect) = config.connect_timeout() {
        client_options.connect_timeout = Some(connect);
    }
    if let Some(server_sel) = config.server_selection_timeout() {
        client_options.server_selection_timeout = Some(server_sel);
    }
    if let Some(app) = &config.app_name {
        client_options.app_name = Some(app.clone());
    }
    if config.stable_api {
        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);
    }
    if config.monitor_commands {
        client_options.command_event_handler = Some(command_monitor());
    }
}

/// Command monitor that logs each command through `tracing`.
pub fn command_monitor() -> EventHandler<CommandEvent> {
    EventHandler::callback(|event: CommandEvent| match event {
        CommandEvent::Started(e) => {
            debug!(
                target: "mongorepo::command",
                request_id = e.request_id,
                database = %e.db,
                command = %e.command,
                "{} started",
                e.command_name
            );
        }
        CommandEvent::Succeeded(e) => {
            debug!(
                target: "mongorepo::command",
                request_id = e.request_id,
                duration_ms = e.duration.as_millis() as u64,
                reply = %e.reply,
                "{} succeeded",
                e.command_name
            );
        }
        CommandEvent::Failed(e) => {
            warn!(
                target: "mongorepo::command",
                request_id = e.request_id,
                duration_ms = e.duration.as_millis() as u64,
                error = %e.failure,
                "{} failed",
                e.command_name
            );
        }
        _ => {}
    })
}

/// A driver client plus the options it was built with
#[derive(Clone, Debug)]
pub struct Connection {
    client: Client,
    options: ClientOptions,
}

impl Connection {
    /// Connect with the given configuration
    pub async fn new(uri: &str, config: &ClientConfig) -> Result<Self> {
        let (client, options) = create_client(uri, config).await?;
        Ok(Self { client, options })
    }

    /// Wrap an already-built client
    pub fn from_parts(client: Client, options: ClientOptions) -> Self {
        Self { client, options }
    }

    /// Get a reference to the client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the options the client was built with
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn database(&self, name: &str) -> Database {
        self.client.database(name)
    }

    /// The database named in the connection string, if any
    pub fn default_database(&self) -> Option<Database> {
        self.client.default_database()
    }

    /// Get a typed collection
    pub fn collection<T: Send + Sync>(&self, database: &str, name: &str) -> Collection<T> {
        self.client.database(database).collection(name)
    }

    /// Check if the connection is healthy by pinging the server
    pub async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| RepoError::Connection(format!("Ping failed: {}", e)))?;
        Ok(())
    }

    /// List all database names on the server
    pub async fn list_database_names(&self) -> Result<Vec<String>> {
        let names = self.client.list_database_names().await?;
        Ok(names)
    }
}
