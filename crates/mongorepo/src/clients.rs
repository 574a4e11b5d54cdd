//! Process-wide client registry keyed by alias
//!
//! Services usually talk to one cluster under [`DEFAULT_ALIAS`], sometimes a
//! few more under their own names. Registering an alias that already exists
//! replaces the earlier client.

use std::collections::HashMap;

use mongodb::{options::ClientOptions, Client};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::info;

use crate::config::ClientConfig;
use crate::connection::{create_client_with, Connection};
use crate::{RepoError, Result};

/// Alias used when none is given
pub const DEFAULT_ALIAS: &str = "default";

static CLIENTS: Lazy<RwLock<HashMap<String, Connection>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Create a client and register it under [`DEFAULT_ALIAS`].
pub async fn setup_default_client(uri: &str, config: &ClientConfig) -> Result<Client> {
    register_client(DEFAULT_ALIAS, uri, config).await
}

/// Create a client and register it under `alias`.
pub async fn register_client(alias: &str, uri: &str, config: &ClientConfig) -> Result<Client> {
    register_client_with(alias, uri, config, |_| {}).await
}

/// Create a client, letting the caller adjust the driver options, and register it.
pub async fn register_client_with<F>(
    alias: &str,
    uri: &str,
    config: &ClientConfig,
    customize: F,
) -> Result<Client>
where
    F: FnOnce(&mut ClientOptions),
{
    let (client, options) = create_client_with(uri, config, customize).await?;
    insert_client(alias, client.clone(), options);
    Ok(client)
}

/// Register an already-built client.
pub fn insert_client(alias: &str, client: Client, options: ClientOptions) {
    let replaced = CLIENTS
        .write()
        .insert(alias.to_string(), Connection::from_parts(client, options))
        .is_some();
    info!(alias, replaced, "Registered MongoDB client");
}

/// Client registered under `alias`.
pub fn get_client(alias: &str) -> Option<Client> {
    CLIENTS.read().get(alias).map(|conn| conn.client().clone())
}

/// Client registered under `alias`, or `RepoError::ClientNotRegistered`.
pub fn require_client(alias: &str) -> Result<Client> {
    get_client(alias).ok_or_else(|| RepoError::ClientNotRegistered(alias.to_string()))
}

pub fn default_client() -> Option<Client> {
    get_client(DEFAULT_ALIAS)
}

/// Options the client under `alias` was built with.
pub fn get_client_options(alias: &str) -> Option<ClientOptions> {
    CLIENTS.read().get(alias).map(|conn| conn.options().clone())
}

pub fn default_client_options() -> Option<ClientOptions> {
    get_client_options(DEFAULT_ALIAS)
}

/// Connection handle (client + options) registered under `alias`.
pub fn get_connection(alias: &str) -> Option<Connection> {
    CLIENTS.read().get(alias).cloned()
}

/// Drop the registry entry. Clones handed out earlier keep working.
pub fn remove_client(alias: &str) -> Option<Client> {
    CLIENTS
        .write()
        .remove(alias)
        .map(|conn| conn.client().clone())
}

/// Registered aliases, sorted.
pub fn registered_aliases() -> Vec<String> {
    let mut aliases: Vec<String> = CLIENTS.read().keys().cloned().collect();
    aliases.sort();
    aliases
}
