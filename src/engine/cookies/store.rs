//! Cookie store infrastructure.
//!
//! A **cookie store** is the durable storage behind the cookie engines. It
//! provisions one jar per [`CookieEngineKind`] and persists jar snapshots.
//! - An engine worker only *holds a [`CookieJarHandle`]*, never a store.
//! - The manager asks the store for each engine's jar once, at start-up.
//!
//! This module exports three implementations:
//! - [`InMemoryCookieStore`]: no persistence, cookies live as long as the process.
//! - [`JsonCookieStore`]: file-backed JSON store (good for simple setups).
//! - [`SqliteCookieStore`]: SQLite-backed store (behind the `sqlite_cookie_store` feature).
//!
//! ## Design notes
//! - `CookieStore::jar_for(engine, mode)` returns the *same logical jar* for an
//!   engine for the lifetime of the store, so all holders observe one state.
//! - Engines never share state: each has its own slot in the store.
//! - Every method is fallible; storage failures surface as
//!   [`CookieError::Storage`] and are never swallowed.
//!
//! ## Example
//! ```rust,no_run
//! use gosub_cookies::cookies::{CookieStoreHandle, JsonCookieStore};
//! use gosub_cookies::CookieManager;
//!
//! # async fn run() -> Result<(), gosub_cookies::CookieError> {
//! let store: CookieStoreHandle = JsonCookieStore::new("cookies.json".into())?;
//! let (handle, _workers) = CookieManager::new(None, store).start()?;
//! handle.flush().await?;
//! # Ok(()) }
//! ```
mod in_memory;
mod json;
#[cfg(feature = "sqlite_cookie_store")]
mod sqlite;

use crate::engine::config::{CookieEngineKind, WriteMode};
use crate::engine::cookies::cookie_jar::DefaultCookieJar;
use crate::engine::cookies::cookies::CookieJarHandle;
use crate::engine::errors::CookieError;

/// In-memory cookie store, no persistence.
pub use in_memory::InMemoryCookieStore;
/// File-backed JSON cookie store (one file for all engines).
pub use json::JsonCookieStore;
/// SQLite-backed cookie store (one database for all engines).
#[cfg(feature = "sqlite_cookie_store")]
pub use sqlite::SqliteCookieStore;

/// A cookie **store** provisions per-engine cookie **jars** and persists them.
///
/// Implementations must be `Send + Sync` and safe for concurrent use.
pub trait CookieStore: Send + Sync {
    /// Returns (or creates and returns) the cookie jar handle for `engine`.
    ///
    /// Persistent stores load the engine's saved cookies on first request and
    /// wrap them so that mutations are written back according to `mode`.
    ///
    /// The jar is cached per engine, so `mode` only takes effect on the first
    /// call for an engine; later calls return the cached jar in whatever mode
    /// it was created with. The manager asks once per engine at start-up.
    fn jar_for(&self, engine: CookieEngineKind, mode: WriteMode) -> Result<CookieJarHandle, CookieError>;

    /// Replaces the persisted state of `engine` with `snapshot`.
    fn persist_engine_from_snapshot(&self, engine: CookieEngineKind, snapshot: &DefaultCookieJar) -> Result<(), CookieError>;

    /// Persists every jar this store handed out.
    ///
    /// Called at explicit flush points and during shutdown.
    fn persist_all(&self) -> Result<(), CookieError>;
}
