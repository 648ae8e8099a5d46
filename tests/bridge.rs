use std::sync::Arc;

use gosub_cookies::bridge::dispatch_json;
use gosub_cookies::config::ManagerConfig;
use gosub_cookies::cookies::InMemoryCookieStore;
use gosub_cookies::{CookieManager, CookieManagerHandle};
use serde_json::{json, Value};

fn start(has_secure_web_engine: bool) -> CookieManagerHandle {
    let _ = env_logger::builder().is_test(true).try_init();

    let cfg = ManagerConfig::builder()
        .has_secure_web_engine(has_secure_web_engine)
        .build()
        .unwrap();
    let (handle, _workers) = CookieManager::new(Some(cfg), Arc::new(InMemoryCookieStore::new()))
        .start()
        .unwrap();
    handle
}

async fn call(handle: &CookieManagerHandle, call: Value) -> Value {
    let reply = dispatch_json(handle, &call.to_string()).await;
    serde_json::from_str(&reply).unwrap()
}

#[tokio::test]
async fn session_cookie_round_trip() {
    let handle = start(false);

    let reply = call(
        &handle,
        json!({
            "method": "set",
            "url": "https://example.com",
            "cookie": { "name": "session", "value": "abc123", "domain": "example.com", "path": "/" },
            "useWebKitEngine": false
        }),
    )
    .await;
    assert_eq!(reply, json!({ "ok": true, "value": true }));

    let reply = call(&handle, json!({ "method": "getAll", "useWebKitEngine": false })).await;
    assert_eq!(
        reply,
        json!({
            "ok": true,
            "value": {
                "session": {
                    "name": "session",
                    "value": "abc123",
                    "domain": "example.com",
                    "path": "/",
                    "secure": false,
                    "httpOnly": false
                }
            }
        })
    );
}

#[tokio::test]
async fn second_set_overwrites_the_first() {
    let handle = start(false);

    for value in ["1", "2"] {
        let set = json!({ "method": "set", "url": "https://example.com", "cookie": { "name": "a", "value": value } });
        assert_eq!(call(&handle, set).await["ok"], true);
    }

    let reply = call(&handle, json!({ "method": "getAll" })).await;
    let value = reply["value"].as_object().unwrap();
    assert_eq!(value.len(), 1);
    assert_eq!(value["a"]["value"], "2");
}

#[tokio::test]
async fn get_clear_and_flush() {
    let handle = start(false);

    let set = json!({ "method": "setFromResponse", "url": "https://example.com/a/b", "cookie": "x=1; Path=/a" });
    assert_eq!(call(&handle, set).await, json!({ "ok": true, "value": true }));

    let reply = call(&handle, json!({ "method": "get", "url": "https://example.com/a/c" })).await;
    assert_eq!(reply["value"]["x"]["path"], "/a");
    let reply = call(&handle, json!({ "method": "get", "url": "https://example.com/b" })).await;
    assert_eq!(reply["value"], json!({}));

    let clear = json!({ "method": "clearByName", "url": "https://example.com/a", "name": "x" });
    assert_eq!(call(&handle, clear).await["value"], true);
    assert_eq!(call(&handle, json!({ "method": "getAll" })).await["value"], json!({}));

    assert_eq!(call(&handle, json!({ "method": "flush" })).await, json!({ "ok": true, "value": null }));
    assert_eq!(
        call(&handle, json!({ "method": "removeSessionCookies" })).await,
        json!({ "ok": true, "value": false })
    );
}

#[tokio::test]
async fn errors_carry_codes() {
    let handle = start(false);

    let reply = call(&handle, json!({ "method": "getFromResponse", "url": "https://example.com" })).await;
    assert_eq!(reply["ok"], false);
    assert_eq!(reply["error"]["code"], "NotFoundError");

    let reply = call(&handle, json!({ "method": "getAll", "useWebKitEngine": true })).await;
    assert_eq!(reply["error"]["code"], "UnsupportedEngineError");

    let reply = call(&handle, json!({ "method": "set", "url": "example.com", "cookie": { "name": "a", "value": "1" } })).await;
    assert_eq!(reply["error"]["code"], "ValidationError");
    assert_eq!(
        reply["error"]["message"],
        "Invalid URL: It may be missing a protocol (ex. http:// or https://)."
    );

    let reply = call(&handle, json!({ "method": "clearByName", "url": "https://example.com" })).await;
    assert_eq!(reply["error"]["code"], "ValidationError");
}

#[tokio::test]
async fn webkit_alias_selects_the_secure_engine() {
    let handle = start(true);

    let set = json!({ "method": "set", "url": "https://example.com", "cookie": { "name": "w", "value": "1" }, "useWebKit": true });
    assert_eq!(call(&handle, set).await["ok"], true);

    assert_eq!(call(&handle, json!({ "method": "getAll" })).await["value"], json!({}));
    let reply = call(&handle, json!({ "method": "getAll", "useWebKitEngine": true })).await;
    assert_eq!(reply["value"]["w"]["value"], "1");
}
