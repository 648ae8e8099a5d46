//! Engine worker: the serialization point of one cookie engine.
//!
//! Each running engine gets exactly one [`EngineWorker`] task. It owns the
//! receiving end of that engine's command channel and is the only writer of the
//! engine's jar, so commands for one engine are applied strictly in the order
//! they were received.
//!
//! Jar access may hit the backing store (file or database I/O), so every
//! command runs on tokio's blocking pool. The worker awaits it before taking
//! the next command, which keeps the order while never blocking the runtime
//! threads of the callers.

use tokio::sync::mpsc;

use crate::engine::config::CookieEngineKind;
use crate::engine::cookies::{cookie_map, CookieJar, CookieJarHandle, CookieMap};
use crate::engine::errors::CookieError;
use crate::engine::events::CookieCommand;

pub struct EngineWorker {
    jar: EngineJar,
    cmd_rx: mpsc::Receiver<CookieCommand>,
}

/// The synchronous half of a worker: one engine's jar and the rules for
/// answering commands against it.
#[derive(Clone)]
struct EngineJar {
    engine: CookieEngineKind,
    jar: CookieJarHandle,
    purge_expired_on_read: bool,
}

impl EngineWorker {
    pub fn new(
        engine: CookieEngineKind,
        jar: CookieJarHandle,
        cmd_rx: mpsc::Receiver<CookieCommand>,
        purge_expired_on_read: bool,
    ) -> Self {
        Self {
            jar: EngineJar {
                engine,
                jar,
                purge_expired_on_read,
            },
            cmd_rx,
        }
    }

    /// Processes commands until a `Shutdown` arrives or every sender is dropped.
    /// Either way the jar is flushed before the worker exits.
    pub async fn run(mut self) {
        let engine = self.jar.engine;
        log::debug!("Cookie worker for the {engine} engine started");

        loop {
            let Some(cmd) = self.cmd_rx.recv().await else {
                log::debug!("All handles to the {engine} engine dropped");
                if let Err(e) = self.blocking(EngineJar::flush).await {
                    log::error!("Final flush of the {engine} engine failed: {e}");
                }
                break;
            };

            if let CookieCommand::Shutdown { reply } = cmd {
                let _ = reply.send(self.blocking(EngineJar::flush).await);
                break;
            }

            let jar = self.jar.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || jar.handle_command(cmd)).await {
                // the reply sender was dropped with the task, the caller sees ChannelClosed
                log::error!("Cookie command on the {engine} engine panicked: {e}");
            }
        }

        log::debug!("Cookie worker for the {engine} engine stopped");
    }

    async fn blocking<T: Send + 'static>(
        &self,
        f: impl FnOnce(&EngineJar) -> Result<T, CookieError> + Send + 'static,
    ) -> Result<T, CookieError> {
        let jar = self.jar.clone();
        tokio::task::spawn_blocking(move || f(&jar))
            .await
            .map_err(|e| CookieError::Internal(e.to_string()))?
    }
}

impl EngineJar {
    fn handle_command(&self, cmd: CookieCommand) {
        log::trace!("{} engine: {cmd:?}", self.engine);

        match cmd {
            CookieCommand::Set { cookie, reply } => {
                let res = self.with_jar_mut(|jar| jar.set_cookie(cookie)).map(|_| true);
                let _ = reply.send(res);
            }
            CookieCommand::StoreResponse { url, headers, reply } => {
                let res = self.with_jar_mut(|jar| jar.store_response_cookies(&url, &headers));
                let _ = reply.send(res);
            }
            CookieCommand::ClearByName { url, name, reply } => {
                let res = self.with_jar_mut(|jar| jar.remove_cookie(&url, &name)).map(|removed| {
                    log::debug!("Removed {removed} cookies named {name} for {url}");
                    true
                });
                let _ = reply.send(res);
            }
            CookieCommand::ClearAll { reply } => {
                let res = self.with_jar_mut(|jar| jar.clear()).map(|_| true);
                let _ = reply.send(res);
            }
            CookieCommand::RemoveSessionCookies { reply } => {
                let res = self.with_jar_mut(|jar| jar.remove_session_cookies());
                let _ = reply.send(res);
            }
            CookieCommand::Get { url, reply } => {
                let res = self.with_jar(|jar| cookie_map(jar.cookies_for_url(&url)));
                let _ = reply.send(res);
            }
            CookieCommand::GetAll { reply } => {
                let _ = reply.send(self.get_all());
            }
            CookieCommand::Flush { reply } => {
                let _ = reply.send(self.flush());
            }
            CookieCommand::Shutdown { reply } => {
                // handled by the run loop
                let _ = reply.send(self.flush());
            }
        }
    }

    fn get_all(&self) -> Result<CookieMap, CookieError> {
        if self.purge_expired_on_read {
            // a failed purge does not invalidate the answer, expired cookies are filtered anyway
            match self.with_jar_mut(|jar| jar.purge_expired()) {
                Ok(0) => {}
                Ok(purged) => log::debug!("Purged {purged} expired cookies from the {} engine", self.engine),
                Err(e) => log::warn!("Purging expired cookies from the {} engine failed: {e}", self.engine),
            }
        }

        self.with_jar(|jar| cookie_map(jar.all_cookies()))
    }

    fn flush(&self) -> Result<(), CookieError> {
        self.with_jar_mut(|jar| jar.flush())
    }

    fn with_jar<T>(&self, f: impl FnOnce(&(dyn CookieJar + Send + Sync + 'static)) -> T) -> Result<T, CookieError> {
        let jar = self.jar.read().map_err(|_| CookieError::Poisoned)?;
        Ok(f(&*jar))
    }

    fn with_jar_mut<T>(
        &self,
        f: impl FnOnce(&mut (dyn CookieJar + Send + Sync + 'static)) -> Result<T, CookieError>,
    ) -> Result<T, CookieError> {
        let mut jar = self.jar.write().map_err(|_| CookieError::Poisoned)?;
        f(&mut *jar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cookies::{Cookie, DefaultCookieJar};
    use http::HeaderMap;
    use std::sync::{Arc, RwLock};
    use std::time::{Duration, Instant};
    use tokio::sync::oneshot;
    use url::Url;

    /// A jar whose writes take as long as a slow disk.
    struct SlowJar(DefaultCookieJar);

    impl CookieJar for SlowJar {
        fn set_cookie(&mut self, cookie: Cookie) -> Result<(), CookieError> {
            std::thread::sleep(Duration::from_millis(300));
            self.0.set_cookie(cookie)
        }

        fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap) -> Result<usize, CookieError> {
            self.0.store_response_cookies(url, headers)
        }

        fn cookies_for_url(&self, url: &Url) -> Vec<Cookie> {
            self.0.cookies_for_url(url)
        }

        fn all_cookies(&self) -> Vec<Cookie> {
            self.0.all_cookies()
        }

        fn purge_expired(&mut self) -> Result<usize, CookieError> {
            self.0.purge_expired()
        }

        fn remove_cookie(&mut self, url: &Url, name: &str) -> Result<usize, CookieError> {
            self.0.remove_cookie(url, name)
        }

        fn remove_session_cookies(&mut self) -> Result<usize, CookieError> {
            self.0.remove_session_cookies()
        }

        fn clear(&mut self) -> Result<(), CookieError> {
            self.0.clear()
        }

        fn snapshot(&self) -> DefaultCookieJar {
            self.0.clone()
        }
    }

    fn spawn_worker(jar: CookieJarHandle) -> (mpsc::Sender<CookieCommand>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(8);
        let worker = EngineWorker::new(CookieEngineKind::Http, jar, rx, true);
        (tx, tokio::spawn(worker.run()))
    }

    #[tokio::test]
    async fn commands_are_applied_in_order() {
        let (tx, task) = spawn_worker(DefaultCookieJar::new().into_handle());

        for value in ["1", "2", "3"] {
            let (reply, _rx) = oneshot::channel();
            tx.send(CookieCommand::Set { cookie: Cookie::new("a", value, "example.com"), reply })
                .await
                .unwrap();
        }

        let (reply, rx) = oneshot::channel();
        tx.send(CookieCommand::GetAll { reply }).await.unwrap();
        let all = rx.await.unwrap().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["a"].value, "3");

        let (reply, rx) = oneshot::channel();
        tx.send(CookieCommand::Shutdown { reply }).await.unwrap();
        rx.await.unwrap().unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn worker_exits_when_senders_are_dropped() {
        let (tx, task) = spawn_worker(DefaultCookieJar::new().into_handle());
        drop(tx);
        task.await.unwrap();
    }

    // current_thread runtime: a write on the runtime thread would stall the timer task
    #[tokio::test]
    async fn slow_writes_do_not_block_the_runtime() {
        let jar: CookieJarHandle = Arc::new(RwLock::new(SlowJar(DefaultCookieJar::new())));
        let (tx, _task) = spawn_worker(jar);

        let start = Instant::now();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            start.elapsed()
        });

        let (reply, rx) = oneshot::channel();
        tx.send(CookieCommand::Set { cookie: Cookie::new("a", "1", "example.com"), reply })
            .await
            .unwrap();
        assert!(rx.await.unwrap().unwrap());

        assert!(timer.await.unwrap() < Duration::from_millis(200));
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
