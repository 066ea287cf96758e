use wasm_bindgen::JsValue;
use web_sys::Window;

use inkroom_shared::{is_valid_session_id, SessionId};

pub fn websocket_url(window: &Window) -> Result<String, JsValue> {
    let location = window.location();
    let protocol = location.protocol()?;
    let host = location.host()?;
    let scheme = if protocol == "https:" { "wss" } else { "ws" };
    Ok(format!("{scheme}://{host}/ws"))
}

/// Session id and password from a shareable `/s/<id>?password=...` link.
pub fn session_from_location(window: &Window) -> Option<(SessionId, Option<String>)> {
    let location = window.location();
    let path = location.pathname().ok()?;
    let session_id = session_id_from_path(&path)?;
    let search = location.search().ok().unwrap_or_default();
    let password = password_from_query(&search).and_then(|raw| {
        js_sys::decode_uri_component(&raw)
            .ok()
            .and_then(|value| value.as_string())
    });
    Some((session_id, password))
}

fn session_id_from_path(path: &str) -> Option<SessionId> {
    let mut parts = path.trim_matches('/').split('/');
    if parts.next()? != "s" {
        return None;
    }
    let session_id = parts.next()?;
    is_valid_session_id(session_id).then(|| session_id.to_string())
}

fn password_from_query(search: &str) -> Option<String> {
    search
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "password")
        .map(|(_, value)| value.replace('+', " "))
        .filter(|value| !value.is_empty())
}
