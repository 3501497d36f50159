use tracing::{debug, error, info};

use super::oauth::{AuthFlow, TokenResponse, describe};
use super::token::Credential;
use crate::error::{Error, Result};
use crate::transport::{HttpRequest, Method};

impl AuthFlow {
    /// Trades the stored refresh token for a new access token.
    ///
    /// The server may omit a new refresh token; the previous one is kept then.
    pub async fn refresh(&self) -> Result<Credential> {
        let refresh_token = match self.store.credential()? {
            Some(c) if !c.refresh_token.is_empty() => c.refresh_token,
            _ => return Err(Error::AuthRefresh("no refresh token stored".to_string())),
        };

        let request = HttpRequest::new(Method::Post, self.config.token_endpoint()).form(&[
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ]);
        let resp = self.transport.send(request).await?;
        if !resp.is_success() {
            error!(status = %resp.status, "token refresh rejected");
            return Err(Error::AuthRefresh(describe(&resp)));
        }

        let token: TokenResponse = resp
            .json()
            .map_err(|e| Error::AuthRefresh(format!("unreadable token response: {e}")))?;
        let next_refresh = match token.refresh_token.clone() {
            Some(rotated) => rotated,
            None => {
                debug!("refresh response kept the previous refresh token");
                refresh_token
            }
        };

        let credential = self.store_token(token, next_refresh)?;
        info!(expires_at = %credential.expires_at, "access token refreshed");
        Ok(credential)
    }

    /// Returns a credential that is safe to use right now, refreshing first if
    /// it is within the expiry margin.
    pub async fn ensure_fresh(&self) -> Result<Credential> {
        match self.store.credential()? {
            Some(credential) if !credential.is_expired() => Ok(credential),
            Some(_) => {
                debug!("stored access token expired, refreshing before use");
                self.refresh().await
            }
            None => Err(Error::AuthRefresh("not logged in".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::auth::token::{MemoryTokenStore, TokenStore};
    use crate::config::Config;
    use crate::transport::Body;
    use crate::transport::mock::ScriptedTransport;

    fn flow_with(expires_in: i64) -> (AuthFlow, Arc<MemoryTokenStore>, Arc<ScriptedTransport>) {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .save_credential(&Credential {
                access_token: "old-access".to_string(),
                refresh_token: "old-refresh".to_string(),
                expires_at: Utc::now() + Duration::seconds(expires_in),
            })
            .unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let config = Arc::new(Config::new("client").unwrap());
        (
            AuthFlow::new(config, store.clone(), transport.clone()),
            store,
            transport,
        )
    }

    #[tokio::test]
    async fn refresh_keeps_previous_refresh_token_when_omitted() {
        let (flow, store, transport) = flow_with(-60);
        transport.respond(200, r#"{"access_token":"new-access","expires_in":3600}"#);

        let credential = flow.refresh().await.unwrap();

        assert_eq!(credential.access_token, "new-access");
        assert_eq!(credential.refresh_token, "old-refresh");
        assert_eq!(store.credential().unwrap(), Some(credential));

        let sent = &transport.requests()[0];
        assert_eq!(
            sent.body,
            Body::Form(vec![
                ("client_id".to_string(), "client".to_string()),
                ("grant_type".to_string(), "refresh_token".to_string()),
                ("refresh_token".to_string(), "old-refresh".to_string()),
            ])
        );
    }

    #[tokio::test]
    async fn refresh_adopts_rotated_refresh_token() {
        let (flow, _store, transport) = flow_with(-60);
        transport.respond(
            200,
            r#"{"access_token":"new-access","refresh_token":"new-refresh","expires_in":3600}"#,
        );

        let credential = flow.refresh().await.unwrap();
        assert_eq!(credential.refresh_token, "new-refresh");
    }

    #[tokio::test]
    async fn rejected_refresh_is_fatal_and_leaves_store_untouched() {
        let (flow, store, transport) = flow_with(-60);
        transport.respond(400, r#"{"error":"invalid_grant"}"#);

        let err = flow.refresh().await.unwrap_err();

        assert!(matches!(err, Error::AuthRefresh(_)));
        assert!(err.is_fatal_auth());
        let kept = store.credential().unwrap().unwrap();
        assert_eq!(kept.refresh_token, "old-refresh");
    }

    #[tokio::test]
    async fn ensure_fresh_skips_refresh_for_valid_token() {
        let (flow, _store, transport) = flow_with(3600);
        let credential = flow.ensure_fresh().await.unwrap();
        assert_eq!(credential.access_token, "old-access");
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn ensure_fresh_refreshes_inside_margin() {
        let (flow, _store, transport) = flow_with(10);
        transport.respond(200, r#"{"access_token":"new-access","expires_in":3600}"#);

        let credential = flow.ensure_fresh().await.unwrap();

        assert_eq!(credential.access_token, "new-access");
        assert_eq!(transport.requests().len(), 1);
    }
}
