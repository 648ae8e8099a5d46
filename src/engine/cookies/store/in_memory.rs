use std::collections::HashMap;
use std::sync::RwLock;

use crate::engine::config::{CookieEngineKind, WriteMode};
use crate::engine::cookies::cookie_jar::DefaultCookieJar;
use crate::engine::cookies::store::CookieStore;
use crate::engine::cookies::CookieJarHandle;
use crate::engine::errors::CookieError;

/// Cookie store without persistence. Jars are plain [`DefaultCookieJar`]s and
/// the write mode is irrelevant.
#[derive(Default)]
pub struct InMemoryCookieStore {
    /// Cookie jars per engine
    jars: RwLock<HashMap<CookieEngineKind, CookieJarHandle>>,
}

impl InMemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieStore for InMemoryCookieStore {
    fn jar_for(&self, engine: CookieEngineKind, _mode: WriteMode) -> Result<CookieJarHandle, CookieError> {
        let mut jars = self.jars.write().map_err(|_| CookieError::Poisoned)?;
        Ok(jars
            .entry(engine)
            .or_insert_with(|| DefaultCookieJar::new().into_handle())
            .clone())
    }

    fn persist_engine_from_snapshot(&self, _engine: CookieEngineKind, _snapshot: &DefaultCookieJar) -> Result<(), CookieError> {
        Ok(())
    }

    fn persist_all(&self) -> Result<(), CookieError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cookies::{Cookie, CookieJar};
    use std::sync::Arc;

    #[test]
    fn same_engine_returns_same_handle() {
        let store = InMemoryCookieStore::new();

        let a = store.jar_for(CookieEngineKind::Http, WriteMode::Immediate).unwrap();
        let b = store.jar_for(CookieEngineKind::Http, WriteMode::Buffered).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        a.write().unwrap().set_cookie(Cookie::new("a", "1", "example.com")).unwrap();
        assert_eq!(b.read().unwrap().all_cookies().len(), 1);
    }

    #[test]
    fn different_engines_get_different_handles() {
        let store = InMemoryCookieStore::new();

        let a = store.jar_for(CookieEngineKind::Http, WriteMode::Immediate).unwrap();
        let b = store.jar_for(CookieEngineKind::WebKit, WriteMode::Immediate).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
