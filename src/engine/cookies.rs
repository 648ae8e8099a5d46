// src/engine/cookies.rs
//! Cookies: [`Cookie`], [`CookieJar`], [`CookieStore`] and backends.

mod cookies;
mod cookie_jar;
mod persistent_cookie_jar;
mod set_cookie;
mod store;

pub mod dates;
pub mod validate;

pub use cookies::cookie_map;
pub use cookies::Cookie;
pub use cookies::CookieDescriptor;
pub use cookies::CookieJarHandle;
pub use cookies::CookieMap;
pub use cookies::CookieStoreHandle;

pub use cookie_jar::CookieJar;
pub use cookie_jar::DefaultCookieJar;
pub use persistent_cookie_jar::PersistentCookieJar;
pub use set_cookie::parse_set_cookie;

pub use store::CookieStore;
pub use store::InMemoryCookieStore;
pub use store::JsonCookieStore;
#[cfg(feature = "sqlite_cookie_store")]
pub use store::SqliteCookieStore;
