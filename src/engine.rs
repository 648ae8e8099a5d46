//! Cookie manager engine: configuration, cookie storage, per-engine workers
//! and the bridge to the scripting runtime.

pub mod bridge;
pub mod config;
pub mod cookies;
pub mod errors;
pub mod events;

mod engine;
mod handle;
mod worker;

pub use engine::CookieManager;
pub use errors::{ConfigError, CookieError};
pub use handle::CookieManagerHandle;

/// Default capacity of each engine's command queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;
