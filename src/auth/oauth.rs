use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use url::Url;

use super::pkce::{PkceMaterial, generate_state};
use super::token::{Credential, StoreKey, TokenStore};
use crate::config::{Config, SCOPES};
use crate::error::{Error, Result};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    SignedOut,
    Authorized,
}

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

/// PKCE authorization-code flow plus refresh, backed by a [`TokenStore`].
///
/// Every successful exchange or refresh is published as
/// [`AuthStatus::Authorized`] on the channel returned by [`AuthFlow::subscribe`].
pub struct AuthFlow {
    pub(super) config: Arc<Config>,
    pub(super) store: Arc<dyn TokenStore>,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) status: watch::Sender<AuthStatus>,
}

impl AuthFlow {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let initial = match store.credential() {
            Ok(Some(_)) => AuthStatus::Authorized,
            _ => AuthStatus::SignedOut,
        };
        let (status, _) = watch::channel(initial);
        Self {
            config,
            store,
            transport,
            status,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    pub fn credential(&self) -> Result<Option<Credential>> {
        self.store.credential()
    }

    pub fn has_credential(&self) -> bool {
        matches!(self.store.credential(), Ok(Some(_)))
    }

    /// Prepares the redirect to the authorization endpoint. No network call.
    pub fn begin_authorization(&self) -> Result<AuthorizationRequest> {
        let pkce = PkceMaterial::generate();
        self.store.set(StoreKey::PkceVerifier, &pkce.verifier)?;
        let state = generate_state();

        let url = Url::parse_with_params(
            &self.config.authorize_endpoint(),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("code_challenge_method", "S256"),
                ("code_challenge", pkce.challenge.as_str()),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| Error::Config(format!("bad authorize endpoint: {e}")))?;

        debug!("prepared authorization request");
        Ok(AuthorizationRequest { url, state })
    }

    pub async fn exchange_code(&self, code: &str) -> Result<Credential> {
        let verifier = self
            .store
            .get(StoreKey::PkceVerifier)?
            .ok_or_else(|| Error::AuthExchange("no pending code verifier".to_string()))?;

        let request = HttpRequest::new(Method::Post, self.config.token_endpoint()).form(&[
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", verifier.as_str()),
        ]);
        let resp = self.transport.send(request).await?;
        if !resp.is_success() {
            error!(status = %resp.status, "token exchange rejected");
            return Err(Error::AuthExchange(describe(&resp)));
        }

        let token: TokenResponse = resp
            .json()
            .map_err(|e| Error::AuthExchange(format!("unreadable token response: {e}")))?;
        let refresh_token = token.refresh_token.clone().unwrap_or_else(|| {
            warn!("token response carried no refresh token, session cannot be renewed");
            String::new()
        });

        let credential = self.store_token(token, refresh_token)?;
        self.store.remove(StoreKey::PkceVerifier)?;
        info!("authorization code exchanged");
        Ok(credential)
    }

    /// Clears every stored key, including the refresh token.
    pub fn logout(&self) -> Result<()> {
        self.store.clear()?;
        self.status.send_replace(AuthStatus::SignedOut);
        info!("logged out");
        Ok(())
    }

    pub(super) fn store_token(
        &self,
        token: TokenResponse,
        refresh_token: String,
    ) -> Result<Credential> {
        let credential = Credential {
            access_token: token.access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        };
        self.store.save_credential(&credential)?;
        self.status.send_replace(AuthStatus::Authorized);
        Ok(credential)
    }
}

pub(super) fn describe(resp: &HttpResponse) -> String {
    if resp.body.is_empty() {
        resp.status.to_string()
    } else {
        format!("{}: {}", resp.status, resp.body)
    }
}

/// Hands the authorization URL to the system browser, falling back to
/// printing it so it can be opened on another device.
pub fn open_in_browser(request: &AuthorizationRequest) {
    if let Err(e) = webbrowser::open(request.url.as_str()) {
        warn!("could not launch a browser: {e}");
        println!("Open this URL to log in:\n{}", request.url);
    }
}
