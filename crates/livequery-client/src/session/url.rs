//! Server URL resolution
//!
//! Chooses the websocket endpoint a client connects to. An explicitly
//! configured LiveQuery URL wins and must already be a websocket URL.
//! Without one, the REST endpoint is rewritten (`http` to `ws`, `https`
//! to `wss`), keeping host, port, and path.

use livequery_core::{LiveQueryError, LiveQueryResult};
use url::Url;

/// Check that `server_url` parses as a `ws://` or `wss://` URL
pub fn validate_server_url(server_url: &str) -> LiveQueryResult<()> {
    match Url::parse(server_url) {
        Ok(parsed) if matches!(parsed.scheme(), "ws" | "wss") => Ok(()),
        _ => Err(LiveQueryError::InvalidServerUrl),
    }
}

/// Resolve the websocket URL from configured settings.
///
/// A configured URL is returned verbatim after validation, so nothing
/// the caller wrote is normalized away.
pub fn resolve_server_url(
    configured: Option<&str>,
    rest_endpoint: &str,
) -> LiveQueryResult<String> {
    match configured {
        Some(configured) if !configured.is_empty() => {
            validate_server_url(configured)?;
            Ok(configured.to_string())
        }
        _ => derive_from_rest_endpoint(rest_endpoint),
    }
}

fn derive_from_rest_endpoint(rest_endpoint: &str) -> LiveQueryResult<String> {
    let mut parsed = Url::parse(rest_endpoint).map_err(|_| LiveQueryError::InvalidServerUrl)?;
    let scheme = match parsed.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return Err(LiveQueryError::InvalidServerUrl),
    };
    parsed
        .set_scheme(scheme)
        .map_err(|()| LiveQueryError::InvalidServerUrl)?;
    Ok(parsed.to_string())
}
