use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use tiny_http::{Header, Response, Server};
use url::Url;

use scanplay::api::ApiClient;
use scanplay::auth::{AuthFlow, Credential, MemoryTokenStore, TokenStore};
use scanplay::transport::ReqwestTransport;
use scanplay::{Config, Error};

struct Seen {
    method: String,
    path: String,
    bearer: Option<String>,
    body: String,
}

/// Serves `count` requests on an ephemeral port, answering with `respond`.
fn serve(
    count: usize,
    respond: impl Fn(&str, Option<&str>) -> (u16, &'static str) + Send + 'static,
) -> (String, thread::JoinHandle<Vec<Seen>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for mut request in server.incoming_requests().take(count) {
            let bearer = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Authorization"))
                .map(|h| h.value.as_str().trim_start_matches("Bearer ").to_string());
            let mut body = String::new();
            request.as_reader().read_to_string(&mut body).unwrap();
            let path = request.url().to_string();

            let (status, reply) = respond(&path, bearer.as_deref());
            seen.push(Seen {
                method: request.method().to_string(),
                path,
                bearer,
                body,
            });
            let json = Header::from_bytes("Content-Type", "application/json").unwrap();
            request
                .respond(
                    Response::from_string(reply)
                        .with_status_code(status)
                        .with_header(json),
                )
                .unwrap();
        }
        seen
    });
    (format!("http://{addr}"), handle)
}

fn client_for(base: &str, store: Arc<MemoryTokenStore>) -> ApiClient {
    let mut config = Config::new("client-abc").unwrap();
    config.auth_base = Url::parse(base).unwrap();
    config.api_base = Url::parse(&format!("{base}/v1")).unwrap();
    let config = Arc::new(config);
    let transport = Arc::new(ReqwestTransport::new());
    let auth = Arc::new(AuthFlow::new(config.clone(), store, transport.clone()));
    ApiClient::new(config, auth, transport)
}

fn store_with(access: &str) -> Arc<MemoryTokenStore> {
    let store = Arc::new(MemoryTokenStore::new());
    store
        .save_credential(&Credential {
            access_token: access.to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        })
        .unwrap();
    store
}

#[tokio::test]
async fn rejected_token_is_refreshed_and_request_retried_once() {
    let (base, server) = serve(3, |path, bearer| match (path, bearer) {
        ("/v1/me/player", Some("stale")) => (401, r#"{"error":{"status":401}}"#),
        ("/api/token", _) => (200, r#"{"access_token":"fresh","expires_in":3600}"#),
        ("/v1/me/player", Some("fresh")) => (200, r#"{"is_playing":true}"#),
        _ => (500, "unexpected"),
    });
    let store = store_with("stale");
    let client = client_for(&base, store.clone());

    assert!(client.is_playing().await.unwrap());

    let seen = server.join().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[1].method, "POST");
    assert_eq!(seen[1].path, "/api/token");
    assert!(seen[1].body.contains("grant_type=refresh_token"));
    assert!(seen[1].body.contains("refresh_token=refresh-1"));
    assert_eq!(seen[1].bearer, None);
    assert_eq!(seen[2].bearer.as_deref(), Some("fresh"));

    let credential = store.credential().unwrap().unwrap();
    assert_eq!(credential.access_token, "fresh");
    assert_eq!(credential.refresh_token, "refresh-1");
}

#[tokio::test]
async fn second_rejection_surfaces_as_api_error() {
    let (base, server) = serve(3, |path, _| match path {
        "/api/token" => (200, r#"{"access_token":"also-bad","expires_in":3600}"#),
        _ => (401, r#"{"error":{"status":401}}"#),
    });
    let client = client_for(&base, store_with("stale"));

    let err = client.devices().await.unwrap_err();

    assert!(matches!(err, Error::Api { status, .. } if status.as_u16() == 401));
    let seen = server.join().unwrap();
    assert_eq!(
        seen.iter().map(|s| s.path.as_str()).collect::<Vec<_>>(),
        vec!["/v1/me/player/devices", "/api/token", "/v1/me/player/devices"]
    );
}
