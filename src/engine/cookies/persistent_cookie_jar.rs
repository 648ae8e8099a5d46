use std::sync::{Arc, RwLock, Weak};

use http::HeaderMap;
use url::Url;

use crate::engine::config::{CookieEngineKind, WriteMode};
use crate::engine::cookies::cookie_jar::DefaultCookieJar;
use crate::engine::cookies::store::CookieStore;
use crate::engine::cookies::{Cookie, CookieJar};
use crate::engine::errors::CookieError;

/// A `CookieJar` decorator that pushes snapshots to a [`CookieStore`].
///
/// Reads are passed through. In [`WriteMode::Immediate`] a mutation is applied
/// to a copy of the jar, the copy is persisted, and only then does it replace
/// the live state: a failed write leaves the jar untouched. In
/// [`WriteMode::Buffered`] the jar is mutated in place and marked dirty until
/// the next [`flush`](CookieJar::flush).
///
/// The store is held weakly: the store caches this jar, so a strong reference
/// would keep both alive forever.
pub struct PersistentCookieJar {
    /// Engine whose slot in the store this jar writes to.
    engine: CookieEngineKind,
    /// Inner cookie jar that holds the actual cookie state.
    inner: Arc<RwLock<DefaultCookieJar>>,
    store: Weak<dyn CookieStore + Send + Sync>,
    write_mode: WriteMode,
    dirty: bool,
}

impl PersistentCookieJar {
    pub fn new(
        engine: CookieEngineKind,
        jar: DefaultCookieJar,
        store: Weak<dyn CookieStore + Send + Sync>,
        write_mode: WriteMode,
    ) -> Self {
        Self {
            engine,
            inner: Arc::new(RwLock::new(jar)),
            store,
            write_mode,
            dirty: false,
        }
    }

    /// Whether there are changes not yet written to the store.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn read_inner(&self) -> Result<std::sync::RwLockReadGuard<'_, DefaultCookieJar>, CookieError> {
        self.inner.read().map_err(|_| CookieError::Poisoned)
    }

    fn write_inner(&self) -> Result<std::sync::RwLockWriteGuard<'_, DefaultCookieJar>, CookieError> {
        self.inner.write().map_err(|_| CookieError::Poisoned)
    }

    /// Writes `snapshot` to the backing store.
    fn persist(&self, snapshot: &DefaultCookieJar) -> Result<(), CookieError> {
        let store = self
            .store
            .upgrade()
            .ok_or_else(|| CookieError::storage("cookie store has been dropped"))?;
        store.persist_engine_from_snapshot(self.engine, snapshot)
    }

    /// Applies `f` according to the write mode. `changed` tells whether the
    /// outcome touched the jar; unchanged outcomes are never written.
    fn mutate<T>(
        &mut self,
        f: impl FnOnce(&mut DefaultCookieJar) -> Result<T, CookieError>,
        changed: impl FnOnce(&T) -> bool,
    ) -> Result<T, CookieError> {
        match self.write_mode {
            WriteMode::Immediate => {
                let mut next = self.read_inner()?.clone();
                let outcome = f(&mut next)?;
                if changed(&outcome) {
                    self.persist(&next)?;
                    *self.write_inner()? = next;
                }
                Ok(outcome)
            }
            WriteMode::Buffered => {
                let outcome = f(&mut *self.write_inner()?)?;
                if changed(&outcome) {
                    self.dirty = true;
                }
                Ok(outcome)
            }
        }
    }
}

impl CookieJar for PersistentCookieJar {
    fn set_cookie(&mut self, cookie: Cookie) -> Result<(), CookieError> {
        self.mutate(|jar| jar.set_cookie(cookie), |_| true)
    }

    fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap) -> Result<usize, CookieError> {
        self.mutate(|jar| jar.store_response_cookies(url, headers), |stored| *stored > 0)
    }

    fn cookies_for_url(&self, url: &Url) -> Vec<Cookie> {
        self.read_inner().map(|jar| jar.cookies_for_url(url)).unwrap_or_default()
    }

    fn all_cookies(&self) -> Vec<Cookie> {
        self.read_inner().map(|jar| jar.all_cookies()).unwrap_or_default()
    }

    fn purge_expired(&mut self) -> Result<usize, CookieError> {
        self.mutate(|jar| jar.purge_expired(), |purged| *purged > 0)
    }

    fn remove_cookie(&mut self, url: &Url, name: &str) -> Result<usize, CookieError> {
        self.mutate(|jar| jar.remove_cookie(url, name), |removed| *removed > 0)
    }

    fn remove_session_cookies(&mut self) -> Result<usize, CookieError> {
        self.mutate(|jar| jar.remove_session_cookies(), |removed| *removed > 0)
    }

    fn clear(&mut self) -> Result<(), CookieError> {
        self.mutate(|jar| jar.clear(), |_| true)
    }

    /// Persists buffered changes. On failure the jar stays dirty so a later
    /// flush retries.
    fn flush(&mut self) -> Result<(), CookieError> {
        if self.dirty {
            log::debug!("Flushing buffered {} cookie jar", self.engine);
            let snapshot = self.read_inner()?.clone();
            self.persist(&snapshot)?;
            self.dirty = false;
        }
        Ok(())
    }

    fn snapshot(&self) -> DefaultCookieJar {
        self.read_inner().map(|jar| jar.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cookies::InMemoryCookieStore;
    use crate::engine::cookies::CookieStoreHandle;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Records every snapshot it is asked to persist.
    #[derive(Default)]
    struct RecordingStore {
        writes: Mutex<Vec<(CookieEngineKind, usize)>>,
        fail: AtomicBool,
    }

    impl CookieStore for RecordingStore {
        fn jar_for(&self, _engine: CookieEngineKind, _mode: WriteMode) -> Result<crate::engine::cookies::CookieJarHandle, CookieError> {
            Ok(DefaultCookieJar::new().into_handle())
        }

        fn persist_engine_from_snapshot(&self, engine: CookieEngineKind, snapshot: &DefaultCookieJar) -> Result<(), CookieError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CookieError::storage("disk full"));
            }
            self.writes.lock().unwrap().push((engine, snapshot.len()));
            Ok(())
        }

        fn persist_all(&self) -> Result<(), CookieError> {
            Ok(())
        }
    }

    fn jar_with(store: &Arc<RecordingStore>, mode: WriteMode) -> PersistentCookieJar {
        let handle: CookieStoreHandle = store.clone();
        PersistentCookieJar::new(CookieEngineKind::Http, DefaultCookieJar::new(), Arc::downgrade(&handle), mode)
    }

    fn url() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[test]
    fn immediate_mode_persists_every_change() {
        let store = Arc::new(RecordingStore::default());
        let mut jar = jar_with(&store, WriteMode::Immediate);

        jar.set_cookie(Cookie::new("a", "1", "example.com")).unwrap();
        jar.set_cookie(Cookie::new("b", "2", "example.com")).unwrap();
        assert!(!jar.is_dirty());

        // nothing removed, nothing written
        jar.remove_cookie(&url(), "missing").unwrap();

        let writes = store.writes.lock().unwrap().clone();
        assert_eq!(writes, vec![(CookieEngineKind::Http, 1), (CookieEngineKind::Http, 2)]);
    }

    #[test]
    fn buffered_mode_waits_for_flush() {
        let store = Arc::new(RecordingStore::default());
        let mut jar = jar_with(&store, WriteMode::Buffered);

        jar.set_cookie(Cookie::new("a", "1", "example.com")).unwrap();
        jar.set_cookie(Cookie::new("b", "2", "example.com")).unwrap();
        assert!(jar.is_dirty());
        assert!(store.writes.lock().unwrap().is_empty());

        jar.flush().unwrap();
        assert!(!jar.is_dirty());
        assert_eq!(store.writes.lock().unwrap().clone(), vec![(CookieEngineKind::Http, 2)]);

        // clean flush is a no-op
        jar.flush().unwrap();
        assert_eq!(store.writes.lock().unwrap().len(), 1);
    }

    #[test]
    fn failed_immediate_write_leaves_the_jar_untouched() {
        let store = Arc::new(RecordingStore::default());
        let mut jar = jar_with(&store, WriteMode::Immediate);
        jar.set_cookie(Cookie::new("a", "1", "example.com")).unwrap();

        store.fail.store(true, Ordering::SeqCst);
        let err = jar.set_cookie(Cookie::new("b", "2", "example.com")).unwrap_err();
        assert_eq!(err.code(), "StorageError");
        assert_eq!(jar.clear().unwrap_err().code(), "StorageError");
        assert_eq!(jar.remove_cookie(&url(), "a").unwrap_err().code(), "StorageError");

        assert_eq!(jar.all_cookies(), vec![Cookie::new("a", "1", "example.com")]);
        assert!(!jar.is_dirty());
    }

    #[test]
    fn failed_flush_keeps_the_jar_dirty() {
        let store = Arc::new(RecordingStore::default());
        let mut jar = jar_with(&store, WriteMode::Buffered);
        jar.set_cookie(Cookie::new("a", "1", "example.com")).unwrap();

        store.fail.store(true, Ordering::SeqCst);
        assert_eq!(jar.flush().unwrap_err().code(), "StorageError");
        assert!(jar.is_dirty());

        store.fail.store(false, Ordering::SeqCst);
        jar.flush().unwrap();
        assert!(!jar.is_dirty());
        assert_eq!(store.writes.lock().unwrap().clone(), vec![(CookieEngineKind::Http, 1)]);
    }

    #[test]
    fn dropped_store_is_a_storage_error() {
        let store: CookieStoreHandle = Arc::new(InMemoryCookieStore::new());
        let weak = Arc::downgrade(&store);
        drop(store);

        let mut jar = PersistentCookieJar::new(CookieEngineKind::Http, DefaultCookieJar::new(), weak, WriteMode::Immediate);
        let err = jar.clear().unwrap_err();
        assert_eq!(err.code(), "StorageError");
    }
}
