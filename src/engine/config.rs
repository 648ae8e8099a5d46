//! Cookie manager configuration.
//!
//! [`ManagerConfig`] decides which cookie engines are started, how eagerly the
//! jars write to their backing store and how large the command queues are.
//! It provides defaults via [`Default`] and a fluent [`ManagerConfig::builder()`]
//! that validates on `build()`.
//!
//! ```rust
//! use gosub_cookies::config::{ManagerConfig, WriteMode};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = ManagerConfig::builder()
//!     .has_secure_web_engine(true)
//!     .write_mode(WriteMode::Buffered)
//!     .channel_capacity(32)
//!     .build()?;
//! assert!(cfg.has_secure_web_engine);
//! # Ok(()) }
//! ```

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::engine::errors::ConfigError;
use crate::engine::DEFAULT_CHANNEL_CAPACITY;

/// The platform cookie engines a caller can address.
///
/// Some platforms keep two independent cookie engines side by side: the shared
/// HTTP cookie storage and the one used by the secure web view. They can hold
/// diverging state for the same domain; the manager never merges them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieEngineKind {
    /// Shared HTTP cookie storage.
    Http,
    /// Cookie storage of the secure web view engine.
    WebKit,
}

impl CookieEngineKind {
    pub const ALL: [CookieEngineKind; 2] = [CookieEngineKind::Http, CookieEngineKind::WebKit];

    /// Maps the bridge's `useWebKitEngine` flag onto an engine.
    pub fn from_use_webkit(use_webkit: bool) -> Self {
        if use_webkit {
            CookieEngineKind::WebKit
        } else {
            CookieEngineKind::Http
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CookieEngineKind::Http => "http",
            CookieEngineKind::WebKit => "webkit",
        }
    }
}

impl Display for CookieEngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a persistent jar pushes its state to the backing store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Persist after every mutation. A mutation resolves once the write is durable.
    #[default]
    Immediate,
    /// Mark the jar dirty and persist on `flush` or shutdown.
    Buffered,
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Whether the secure web view engine exists on this platform. When `false`
    /// only the HTTP engine is started.
    pub has_secure_web_engine: bool,
    pub write_mode: WriteMode,
    /// Capacity of each engine's command queue.
    pub channel_capacity: usize,
    /// Drop expired cookies from the jar (and the store) while answering `get_all`.
    pub purge_expired_on_read: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            has_secure_web_engine: false,
            write_mode: WriteMode::Immediate,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            purge_expired_on_read: true,
        }
    }
}

impl ManagerConfig {
    pub fn builder() -> ManagerConfigBuilder {
        ManagerConfigBuilder::default()
    }

    /// Engines that get a worker when the manager starts.
    pub fn engines(&self) -> Vec<CookieEngineKind> {
        CookieEngineKind::ALL
            .into_iter()
            .filter(|kind| *kind == CookieEngineKind::Http || self.has_secure_web_engine)
            .collect()
    }
}

/// Builder for [`ManagerConfig`].
#[derive(Debug, Clone, Default)]
pub struct ManagerConfigBuilder {
    inner: ManagerConfig,
}

impl ManagerConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut ManagerConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn has_secure_web_engine(self, on: bool) -> Self { self.map(|c| c.has_secure_web_engine = on) }
    pub fn write_mode(self, mode: WriteMode) -> Self { self.map(|c| c.write_mode = mode) }
    pub fn channel_capacity(self, n: usize) -> Self { self.map(|c| c.channel_capacity = n) }
    pub fn purge_expired_on_read(self, on: bool) -> Self { self.map(|c| c.purge_expired_on_read = on) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<ManagerConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

fn validate(c: &ManagerConfig) -> Result<(), ConfigError> {
    if c.channel_capacity == 0 {
        return Err(ConfigError::ZeroChannelCapacity);
    }
    Ok(())
}
