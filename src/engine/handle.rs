use std::collections::BTreeMap;
use std::sync::Arc;

use http::HeaderMap;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::engine::config::CookieEngineKind;
use crate::engine::cookies::{parse_set_cookie, validate, CookieDescriptor, CookieMap, CookieStoreHandle};
use crate::engine::errors::CookieError;
use crate::engine::events::{CookieCommand, Reply};

/// Cloneable front end of a running [`CookieManager`](crate::CookieManager).
///
/// Every method validates its arguments, sends one command to the selected
/// engine's worker and awaits the reply. Dropping a returned future after the
/// command was sent does not cancel the command.
#[derive(Clone)]
pub struct CookieManagerHandle {
    engines: Arc<BTreeMap<CookieEngineKind, mpsc::Sender<CookieCommand>>>,
    store: CookieStoreHandle,
}

impl CookieManagerHandle {
    pub(crate) fn new(engines: BTreeMap<CookieEngineKind, mpsc::Sender<CookieCommand>>, store: CookieStoreHandle) -> Self {
        Self {
            engines: Arc::new(engines),
            store,
        }
    }

    /// Engines that are running, in a stable order.
    pub fn engines(&self) -> Vec<CookieEngineKind> {
        self.engines.keys().copied().collect()
    }

    /// Sets a cookie for `url` in the selected engine.
    ///
    /// Resolves `true` once the write was accepted by the engine (and persisted
    /// in [`WriteMode::Immediate`](crate::config::WriteMode::Immediate)).
    pub async fn set(&self, url: &str, cookie: CookieDescriptor, use_webkit: bool) -> Result<bool, CookieError> {
        let engine = self.select(use_webkit)?;
        let url = validate::parse_url(url)?;
        let cookie = cookie.into_cookie(&url)?;
        self.request(engine, |reply| CookieCommand::Set { cookie, reply }).await
    }

    /// Parses a single `Set-Cookie` header value received from `url` and stores
    /// it in the HTTP engine.
    pub async fn set_from_response(&self, url: &str, set_cookie: &str) -> Result<bool, CookieError> {
        let url = validate::parse_url(url)?;
        let cookie = parse_set_cookie(set_cookie, &url, OffsetDateTime::now_utc())?;
        self.request(CookieEngineKind::Http, |reply| CookieCommand::Set { cookie, reply }).await
    }

    /// Stores every `Set-Cookie` header of a response from `url` in the HTTP
    /// engine. Malformed headers are skipped; returns the number stored.
    pub async fn store_response_headers(&self, url: &Url, headers: HeaderMap) -> Result<usize, CookieError> {
        let url = validate::parse_url(url.as_str())?;
        self.request(CookieEngineKind::Http, |reply| CookieCommand::StoreResponse { url, headers, reply })
            .await
    }

    /// Cookies of the selected engine that are visible to `url`.
    pub async fn get(&self, url: &str, use_webkit: bool) -> Result<CookieMap, CookieError> {
        let engine = self.select(use_webkit)?;
        let url = validate::parse_url(url)?;
        self.request(engine, |reply| CookieCommand::Get { url, reply }).await
    }

    /// All non-expired cookies of the selected engine.
    pub async fn get_all(&self, use_webkit: bool) -> Result<CookieMap, CookieError> {
        let engine = self.select(use_webkit)?;
        self.request(engine, |reply| CookieCommand::GetAll { reply }).await
    }

    /// Removes every cookie named `name` visible to `url`. Resolves `true` even
    /// when nothing matched.
    pub async fn clear_by_name(&self, url: &str, name: &str, use_webkit: bool) -> Result<bool, CookieError> {
        let engine = self.select(use_webkit)?;
        let url = validate::parse_url(url)?;
        let name = name.to_string();
        self.request(engine, |reply| CookieCommand::ClearByName { url, name, reply }).await
    }

    /// Removes all cookies of the selected engine.
    pub async fn clear_all(&self, use_webkit: bool) -> Result<bool, CookieError> {
        let engine = self.select(use_webkit)?;
        self.request(engine, |reply| CookieCommand::ClearAll { reply }).await
    }

    /// Removes every session cookie from every running engine. Resolves `true`
    /// if anything was removed.
    pub async fn remove_session_cookies(&self) -> Result<bool, CookieError> {
        let mut removed = 0;
        for engine in self.engines() {
            removed += self.request(engine, |reply| CookieCommand::RemoveSessionCookies { reply }).await?;
        }
        Ok(removed > 0)
    }

    /// Writes buffered changes of every engine to the store.
    pub async fn flush(&self) -> Result<(), CookieError> {
        for engine in self.engines() {
            self.request(engine, |reply| CookieCommand::Flush { reply }).await?;
        }
        Ok(())
    }

    /// Flushes and stops every engine worker, then persists the store.
    ///
    /// Engines whose worker already stopped are skipped. Other handles fail
    /// with [`CookieError::ChannelClosed`] afterwards.
    pub async fn shutdown(&self) -> Result<(), CookieError> {
        for engine in self.engines() {
            match self.request(engine, |reply| CookieCommand::Shutdown { reply }).await {
                Ok(()) | Err(CookieError::ChannelClosed) => {}
                Err(e) => return Err(e),
            }
        }

        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.persist_all())
            .await
            .map_err(|e| CookieError::Internal(e.to_string()))??;
        log::info!("Cookie manager shut down");
        Ok(())
    }

    fn select(&self, use_webkit: bool) -> Result<CookieEngineKind, CookieError> {
        let engine = CookieEngineKind::from_use_webkit(use_webkit);
        if self.engines.contains_key(&engine) {
            Ok(engine)
        } else {
            Err(CookieError::UnsupportedEngine(engine))
        }
    }

    async fn request<T>(
        &self,
        engine: CookieEngineKind,
        command: impl FnOnce(Reply<T>) -> CookieCommand,
    ) -> Result<T, CookieError> {
        let cmd_tx = self.engines.get(&engine).ok_or(CookieError::UnsupportedEngine(engine))?;

        let (tx, rx) = oneshot::channel();
        cmd_tx.send(command(tx)).await.map_err(|_| CookieError::ChannelClosed)?;
        rx.await.map_err(|_| CookieError::ChannelClosed)?
    }
}
