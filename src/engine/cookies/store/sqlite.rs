//! SQLite-backed cookie store.
//!
//! `SqliteCookieStore` persists the jars of **all engines** in a single SQLite
//! database and returns per-engine jars wrapped in a [`PersistentCookieJar`].
//!
//! ## Design
//! - One **table** (`cookies`) for all engines; each row is a single cookie and
//!   the primary key is the cookie identity `(engine, domain, path, name)`.
//! - In-memory cache: `jars: RwLock<HashMap<CookieEngineKind, CookieJarHandle>>`.
//! - Database access is via an `r2d2` pool for safe multi-threaded use.
//! - `save_engine` **rewrites** the cookies of one engine (DELETE + INSERT) in a
//!   single transaction.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::rusqlite::{params, OpenFlags};
use r2d2_sqlite::SqliteConnectionManager;

use crate::engine::config::{CookieEngineKind, WriteMode};
use crate::engine::cookies::cookie_jar::DefaultCookieJar;
use crate::engine::cookies::dates;
use crate::engine::cookies::persistent_cookie_jar::PersistentCookieJar;
use crate::engine::cookies::store::CookieStore;
use crate::engine::cookies::{Cookie, CookieJarHandle};
use crate::engine::errors::CookieError;

/// A SQLite-based cookie store that persists cookies across sessions.
pub struct SqliteCookieStore {
    /// Connection pool for SQLite database (so it can run multithreaded)
    pool: Pool<SqliteConnectionManager>,
    /// Cookie jars per engine
    jars: RwLock<HashMap<CookieEngineKind, CookieJarHandle>>,
    /// Self handle provided to persistent jars for callback persistence.
    store_self: Weak<SqliteCookieStore>,
}

impl SqliteCookieStore {
    /// Opens (or creates) a SQLite database at `path` and ensures the schema exists.
    pub fn new(path: impl AsRef<Path>) -> Result<Arc<Self>, CookieError> {
        let manager = SqliteConnectionManager::file(path.as_ref())
            .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI)
            .with_init(|c| {
                c.busy_timeout(Duration::from_millis(500))?;
                c.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
                c.execute_batch(
                    "CREATE TABLE IF NOT EXISTS cookies (
                        engine TEXT NOT NULL,
                        domain TEXT NOT NULL,
                        path TEXT NOT NULL,
                        name TEXT NOT NULL,
                        value TEXT NOT NULL,
                        version TEXT,
                        expires TEXT,
                        secure INTEGER NOT NULL,
                        http_only INTEGER NOT NULL,
                        PRIMARY KEY (engine, domain, path, name)
                    );",
                )?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(4)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)
            .map_err(|e| CookieError::storage(format!("cannot open cookie database: {e}")))?;

        Ok(Arc::new_cyclic(|store_self| Self {
            pool,
            jars: RwLock::new(HashMap::new()),
            store_self: store_self.clone(),
        }))
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().context("cannot get a cookie database connection")
    }

    /// Loads all cookies for `engine` into a new [`DefaultCookieJar`].
    fn load_engine(&self, engine: CookieEngineKind) -> Result<DefaultCookieJar> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, value, domain, path, version, expires, secure, http_only
             FROM cookies WHERE engine = ?1",
        )?;

        let rows = stmt.query_map([engine.as_str()], |row| {
            Ok((
                Cookie {
                    name: row.get(0)?,
                    value: row.get(1)?,
                    domain: row.get(2)?,
                    path: row.get(3)?,
                    version: row.get(4)?,
                    expires: None,
                    secure: row.get::<_, i64>(6)? != 0,
                    http_only: row.get::<_, i64>(7)? != 0,
                },
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut jar = DefaultCookieJar::new();
        for row in rows {
            let (mut cookie, expires) = row?;
            if let Some(raw) = expires {
                cookie.expires = Some(
                    dates::parse_iso8601(&raw).with_context(|| format!("bad expiry for cookie {}", cookie.name))?,
                );
            }
            jar.entries.entry(cookie.domain.clone()).or_default().push(cookie);
        }

        Ok(jar)
    }

    /// Replaces all cookies for `engine` with the contents of `jar` in a transaction.
    fn save_engine(&self, engine: CookieEngineKind, jar: &DefaultCookieJar) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("cannot begin transaction")?;

        tx.execute("DELETE FROM cookies WHERE engine = ?1", [engine.as_str()])?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO cookies (engine, domain, path, name, value, version, expires, secure, http_only)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;

            for cookie in jar.entries.values().flatten() {
                let expires = cookie.expires.map(dates::format_iso8601).transpose()?;
                stmt.execute(params![
                    engine.as_str(),
                    cookie.domain,
                    cookie.path,
                    cookie.name,
                    cookie.value,
                    cookie.version,
                    expires,
                    cookie.secure as i64,
                    cookie.http_only as i64,
                ])?;
            }
        }

        tx.commit().context("cannot commit cookies")?;
        Ok(())
    }
}

impl CookieStore for SqliteCookieStore {
    fn jar_for(&self, engine: CookieEngineKind, mode: WriteMode) -> Result<CookieJarHandle, CookieError> {
        {
            let jars = self.jars.read().map_err(|_| CookieError::Poisoned)?;
            if let Some(jar) = jars.get(&engine) {
                return Ok(jar.clone());
            }
        }

        let jar = self.load_engine(engine).map_err(|e| CookieError::storage(format!("{e:#}")))?;
        log::debug!("Loaded {} cookies for the {engine} engine from sqlite", jar.len());

        let store_self: Weak<dyn CookieStore + Send + Sync> = self.store_self.clone();
        let persistent: CookieJarHandle =
            Arc::new(RwLock::new(PersistentCookieJar::new(engine, jar, store_self, mode)));

        let mut jars = self.jars.write().map_err(|_| CookieError::Poisoned)?;
        Ok(jars.entry(engine).or_insert(persistent).clone())
    }

    fn persist_engine_from_snapshot(&self, engine: CookieEngineKind, snapshot: &DefaultCookieJar) -> Result<(), CookieError> {
        self.save_engine(engine, snapshot).map_err(|e| {
            log::error!("Persisting {engine} cookies failed: {e:#}");
            CookieError::storage(format!("{e:#}"))
        })
    }

    fn persist_all(&self) -> Result<(), CookieError> {
        let jars = self.jars.read().map_err(|_| CookieError::Poisoned)?;

        for (engine, jar) in jars.iter() {
            let snapshot = jar.read().map_err(|_| CookieError::Poisoned)?.snapshot();
            self.persist_engine_from_snapshot(*engine, &snapshot)?;
        }
        Ok(())
    }
}
