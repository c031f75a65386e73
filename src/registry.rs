use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{Client, ClientConfig, Result};

/// Holds at most one [`Client`] per SDK key.
///
/// Clients are expensive (each one may run a poller thread), so applications that create clients
/// on demand should share them through a registry instead of creating a new one every time.
///
/// ```
/// # use std::{collections::HashMap, sync::Arc};
/// # use configcat::{ClientConfig, ClientRegistry, FlagOverrides, OverrideBehaviour, OverrideDataSource};
/// let registry = ClientRegistry::new();
/// let config = ClientConfig::from_sdk_key("local").overrides(FlagOverrides::new(
///     OverrideDataSource::Map(HashMap::new()),
///     OverrideBehaviour::LocalOnly,
/// ));
/// let client = registry.get_or_create(config.clone()).unwrap();
/// assert!(Arc::ptr_eq(&client, &registry.get_or_create(config).unwrap()));
/// registry.close_all();
/// ```
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<String, Arc<Client>>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> ClientRegistry {
        ClientRegistry::default()
    }

    /// Return the client registered for the config's SDK key, creating it if there is none.
    ///
    /// If a client already exists, `config` is ignored.
    pub fn get_or_create(&self, config: ClientConfig) -> Result<Arc<Client>> {
        let mut clients = self.lock();
        if let Some(client) = clients.get(config.sdk_key()) {
            log::warn!(target: "configcat", event_id = 3000;
                "There is an existing client instance for the specified SDK Key. No new client instance will be created and the specified configuration is ignored. Returning the existing client instance. SDK Key: '{}'.",
                config.sdk_key());
            return Ok(client.clone());
        }

        let sdk_key = config.sdk_key().to_owned();
        let client = Arc::new(config.to_client()?);
        clients.insert(sdk_key, client.clone());
        Ok(client)
    }

    /// Client registered for `sdk_key`.
    pub fn get(&self, sdk_key: &str) -> Option<Arc<Client>> {
        self.lock().get(sdk_key).cloned()
    }

    /// Close and unregister the client of `sdk_key`. Returns `false` if there was none.
    pub fn close(&self, sdk_key: &str) -> bool {
        let client = self.lock().remove(sdk_key);
        match client {
            Some(client) => {
                client.close();
                true
            }
            None => false,
        }
    }

    /// Close and unregister every client.
    pub fn close_all(&self) {
        let clients: Vec<_> = self.lock().drain().map(|(_, client)| client).collect();
        for client in clients {
            client.close();
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Client>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
