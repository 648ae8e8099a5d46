use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::config::ManagerConfig;
use crate::engine::cookies::CookieStoreHandle;
use crate::engine::errors::CookieError;
use crate::engine::handle::CookieManagerHandle;
use crate::engine::worker::EngineWorker;

/// Owns the configuration and the backing store until the engines are started.
pub struct CookieManager {
    /// Configuration for all engines.
    config: ManagerConfig,
    /// Durable storage shared by all engines (each engine has its own slot).
    store: CookieStoreHandle,
}

impl CookieManager {
    /// Create a new cookie manager.
    ///
    /// If `config` is `None`, [`ManagerConfig::default`] is used.
    ///
    /// ```
    /// # use std::sync::Arc;
    /// use gosub_cookies::cookies::InMemoryCookieStore;
    /// use gosub_cookies::CookieManager;
    ///
    /// let manager = CookieManager::new(None, Arc::new(InMemoryCookieStore::new()));
    /// ```
    pub fn new(config: Option<ManagerConfig>, store: CookieStoreHandle) -> Self {
        Self {
            config: config.unwrap_or_default(),
            store,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Loads every configured engine's jar from the store and spawns one worker
    /// per engine. Returns the handle and the workers' join handles.
    ///
    /// Must be called from within a Tokio runtime. Loading the jars reads the
    /// store on the calling thread; after that, all store I/O runs on the
    /// runtime's blocking pool.
    pub fn start(self) -> Result<(CookieManagerHandle, Vec<JoinHandle<()>>), CookieError> {
        let mut senders = BTreeMap::new();
        let mut workers = Vec::new();

        for engine in self.config.engines() {
            let jar = self.store.jar_for(engine, self.config.write_mode)?;
            let (cmd_tx, cmd_rx) = mpsc::channel(self.config.channel_capacity);

            let worker = EngineWorker::new(engine, jar, cmd_rx, self.config.purge_expired_on_read);
            workers.push(tokio::spawn(worker.run()));
            senders.insert(engine, cmd_tx);
        }

        log::info!(
            "Cookie manager started with engines [{}] in {:?} write mode",
            senders.keys().map(|e| e.as_str()).collect::<Vec<_>>().join(", "),
            self.config.write_mode
        );

        Ok((CookieManagerHandle::new(senders, self.store), workers))
    }
}
