use std::sync::Arc;

use gosub_cookies::bridge;
use gosub_cookies::config::{ManagerConfig, WriteMode};
use gosub_cookies::cookies::{CookieDescriptor, CookieStoreHandle, JsonCookieStore};
use gosub_cookies::CookieManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Cookies of both engines end up in a single JSON file. Run the demo twice to
    // see the persisted cookies come back.
    let path = std::env::temp_dir().join("gosub-cookie-demo.json");
    let store: CookieStoreHandle = JsonCookieStore::new(path.clone())?;

    // Pretend we run on a platform that has a secure web view, and only write to
    // disk on flush.
    let cfg = ManagerConfig::builder()
        .has_secure_web_engine(true)
        .write_mode(WriteMode::Buffered)
        .build()?;

    let (handle, workers) = CookieManager::new(Some(cfg), Arc::clone(&store)).start()?;

    println!("Cookies from the last run: {:?}", handle.get_all(false).await?.keys().collect::<Vec<_>>());

    handle
        .set(
            "https://example.com/account",
            CookieDescriptor::new("session", "abc123").http_only(true),
            false,
        )
        .await?;
    handle
        .set_from_response("https://example.com/", "theme=dark; Path=/; Max-Age=3600")
        .await?;
    handle
        .set("https://example.com", CookieDescriptor::new("webview", "only-here"), true)
        .await?;

    for (name, cookie) in handle.get("https://example.com/account", false).await? {
        println!("http   {name} = {cookie}");
    }
    for (name, cookie) in handle.get_all(true).await? {
        println!("webkit {name} = {cookie}");
    }

    // The same calls, the way the scripting side would make them.
    let calls = [
        r#"{"method":"getAll"}"#,
        r#"{"method":"clearByName","url":"https://example.com","name":"theme"}"#,
        r#"{"method":"getAll","useWebKitEngine":true}"#,
        r#"{"method":"getFromResponse","url":"https://example.com"}"#,
    ];
    for call in calls {
        println!("{call}\n  -> {}", bridge::dispatch_json(&handle, call).await);
    }

    handle.shutdown().await?;
    for worker in workers {
        worker.await?;
    }

    println!("Cookies saved to {}", path.display());
    Ok(())
}
