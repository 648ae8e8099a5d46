//! JSON-backed cookie store.
//!
//! `JsonCookieStore` persists the jars of **all engines** in a single JSON file
//! on disk. It returns per-engine jars wrapped in [`PersistentCookieJar`], so
//! mutations are written back to this store.
//!
//! ### Design
//! - One file for all engines (`CookieStoreFile { engines: { "http": jar, "webkit": jar } }`).
//! - In-memory cache: `jars: RwLock<HashMap<CookieEngineKind, CookieJarHandle>>`.
//! - The store keeps a weak self handle (`store_self`) so the persistent jars
//!   can call back into `persist_engine_from_snapshot`.
//!
//! ### I/O characteristics
//! - Every persist **reads then rewrites** the whole file, under `io_lock` so two
//!   engines persisting at once cannot lose each other's update.
//! - Writes go to a temporary file in the same directory which then replaces
//!   the store file, so a crash never leaves a half-written store behind.
//! - A file that exists but does not parse is a storage error; it is never
//!   silently replaced.
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, Weak};

use serde::{Deserialize, Serialize};

use crate::engine::config::{CookieEngineKind, WriteMode};
use crate::engine::cookies::cookie_jar::DefaultCookieJar;
use crate::engine::cookies::persistent_cookie_jar::PersistentCookieJar;
use crate::engine::cookies::store::CookieStore;
use crate::engine::cookies::CookieJarHandle;
use crate::engine::errors::CookieError;

/// On-disk representation of all engines' cookie jars.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CookieStoreFile {
    engines: BTreeMap<String, DefaultCookieJar>,
}

/// A JSON-based cookie store that persists cookies across sessions.
pub struct JsonCookieStore {
    /// Path to the JSON file where cookies are stored.
    path: PathBuf,

    /// Cookie jars handed out, per engine
    jars: RwLock<HashMap<CookieEngineKind, CookieJarHandle>>,

    /// Serializes read-modify-write cycles on the file.
    io_lock: Mutex<()>,

    /// Self handle, so `PersistentCookieJar` can call back into this store.
    store_self: Weak<JsonCookieStore>,
}

impl JsonCookieStore {
    /// Creates (or opens) a JSON cookie store at `path`.
    ///
    /// If the file does not exist, an empty structure is written to disk.
    pub fn new(path: PathBuf) -> Result<Arc<Self>, CookieError> {
        let store = Arc::new_cyclic(|store_self| Self {
            path,
            jars: RwLock::new(HashMap::new()),
            io_lock: Mutex::new(()),
            store_self: store_self.clone(),
        });

        if !store.path.exists() {
            log::info!("Creating cookie store file {}", store.path.display());
            store.save_file(&CookieStoreFile::default())?;
        } else {
            // fail early on a corrupt file rather than on the first write
            store.load_file()?;
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and deserializes the full cookie store file.
    fn load_file(&self) -> Result<CookieStoreFile, CookieError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            CookieError::storage(format!("cannot read {}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            CookieError::storage(format!("cannot parse {}: {e}", self.path.display()))
        })
    }

    /// Serializes and atomically replaces the full cookie store file.
    fn save_file(&self, store_file: &CookieStoreFile) -> Result<(), CookieError> {
        let contents = serde_json::to_vec_pretty(store_file).map_err(CookieError::storage)?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(CookieError::storage)?;
        tmp.write_all(&contents).map_err(CookieError::storage)?;
        tmp.as_file().sync_all().map_err(CookieError::storage)?;
        tmp.persist(&self.path).map_err(|e| CookieError::storage(e.error))?;
        Ok(())
    }

    fn update_file(&self, f: impl FnOnce(&mut CookieStoreFile)) -> Result<(), CookieError> {
        let _guard = self.io_lock.lock().map_err(|_| CookieError::Poisoned)?;
        let mut file = self.load_file()?;
        f(&mut file);
        self.save_file(&file)
    }
}

impl CookieStore for JsonCookieStore {
    /// Returns the cached jar for `engine`, or loads it from disk and wraps it
    /// in a [`PersistentCookieJar`] bound to this store.
    fn jar_for(&self, engine: CookieEngineKind, mode: WriteMode) -> Result<CookieJarHandle, CookieError> {
        {
            // Fast path: already in memory
            let jars = self.jars.read().map_err(|_| CookieError::Poisoned)?;
            if let Some(jar) = jars.get(&engine) {
                return Ok(jar.clone());
            }
        }

        let jar = {
            let _guard = self.io_lock.lock().map_err(|_| CookieError::Poisoned)?;
            self.load_file()?.engines.remove(engine.as_str()).unwrap_or_default()
        };
        log::debug!("Loaded {} cookies for the {engine} engine from {}", jar.len(), self.path.display());

        let store_self: Weak<dyn CookieStore + Send + Sync> = self.store_self.clone();
        let persistent: CookieJarHandle =
            Arc::new(RwLock::new(PersistentCookieJar::new(engine, jar, store_self, mode)));

        let mut jars = self.jars.write().map_err(|_| CookieError::Poisoned)?;
        Ok(jars.entry(engine).or_insert(persistent).clone())
    }

    fn persist_engine_from_snapshot(&self, engine: CookieEngineKind, snapshot: &DefaultCookieJar) -> Result<(), CookieError> {
        self.update_file(|file| {
            file.engines.insert(engine.as_str().to_string(), snapshot.clone());
        })
    }

    /// Snapshots **all** jars handed out by this store and writes them in one go.
    fn persist_all(&self) -> Result<(), CookieError> {
        let snapshots: Vec<(CookieEngineKind, DefaultCookieJar)> = {
            let jars = self.jars.read().map_err(|_| CookieError::Poisoned)?;
            jars.iter()
                .map(|(engine, jar)| {
                    let jar = jar.read().map_err(|_| CookieError::Poisoned)?;
                    Ok((*engine, jar.snapshot()))
                })
                .collect::<Result<_, CookieError>>()?
        };

        self.update_file(|file| {
            for (engine, snapshot) in snapshots {
                file.engines.insert(engine.as_str().to_string(), snapshot);
            }
        })
    }
}
