use tiny_http::{Response, Server};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

/// Serves the redirect URI on loopback until the authorization server
/// redirects back, then returns the authorization code.
///
/// Blocks the calling thread; use [`capture_code`] from async code.
pub fn wait_for_code(redirect_uri: &Url, expected_state: &str) -> Result<String> {
    let host = redirect_uri
        .host_str()
        .ok_or_else(|| Error::Config(format!("redirect uri {redirect_uri} has no host")))?;
    let port = redirect_uri
        .port_or_known_default()
        .ok_or_else(|| Error::Config(format!("redirect uri {redirect_uri} has no port")))?;
    let addr = format!("{host}:{port}");

    let server = Server::http(addr.as_str()).map_err(|e| {
        Error::Config(format!(
            "failed to start callback server, check {addr} is free: {e}"
        ))
    })?;
    debug!("waiting for authorization redirect on {addr}");

    for request in server.incoming_requests() {
        let parsed = Url::parse(&format!("http://{addr}{}", request.url()))
            .map_err(|e| Error::AuthExchange(format!("malformed redirect: {e}")))?;
        if parsed.path() != redirect_uri.path() {
            let _ = request.respond(Response::from_string("Not found").with_status_code(404));
            continue;
        }

        let param = |key: &str| {
            parsed
                .query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        };

        if let Some(reason) = param("error") {
            let _ = request.respond(
                Response::from_string(format!("Authorization failed: {reason}"))
                    .with_status_code(400),
            );
            return Err(Error::AuthExchange(format!("authorization denied: {reason}")));
        }

        return match (param("code"), param("state")) {
            (Some(code), Some(state)) if state == expected_state => {
                let _ = request.respond(Response::from_string(
                    "Logged in! You can close this window.",
                ));
                Ok(code)
            }
            (Some(_), _) => {
                warn!("authorization redirect carried a mismatched state");
                let _ = request.respond(
                    Response::from_string("Invalid state parameter").with_status_code(400),
                );
                Err(Error::AuthExchange("CSRF state mismatch".to_string()))
            }
            (None, _) => {
                let _ = request
                    .respond(Response::from_string("Missing code").with_status_code(400));
                Err(Error::AuthExchange("redirect carried no code".to_string()))
            }
        };
    }

    Err(Error::AuthExchange(
        "callback server stopped before a redirect arrived".to_string(),
    ))
}

pub async fn capture_code(redirect_uri: Url, expected_state: String) -> Result<String> {
    tokio::task::spawn_blocking(move || wait_for_code(&redirect_uri, &expected_state))
        .await
        .map_err(|e| Error::AuthExchange(format!("callback listener died: {e}")))?
}
