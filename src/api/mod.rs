mod calls;
mod models;

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::AuthFlow;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

pub use models::{Device, PlaybackState, TrackId};

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body: None,
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Bearer-authenticated access to the playback API.
///
/// A 401 triggers exactly one refresh and exactly one retry of the same
/// request. The stored credential may change across any `call`.
pub struct ApiClient {
    config: Arc<Config>,
    auth: Arc<AuthFlow>,
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(config: Arc<Config>, auth: Arc<AuthFlow>, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            auth,
            transport,
        }
    }

    pub async fn call(&self, request: &ApiRequest) -> Result<HttpResponse> {
        let credential = self.auth.ensure_fresh().await?;
        let resp = self.send(request, &credential.access_token).await?;
        if resp.status != StatusCode::UNAUTHORIZED {
            return finish(request, resp);
        }

        warn!(path = %request.path, "access token rejected, refreshing once");
        self.auth.refresh().await?;
        // read back what the refresh stored rather than trusting a local copy
        let access_token = self
            .auth
            .credential()?
            .map(|c| c.access_token)
            .ok_or_else(|| Error::AuthRefresh("credential vanished after refresh".to_string()))?;
        let resp = self.send(request, &access_token).await?;
        finish(request, resp)
    }

    async fn send(&self, request: &ApiRequest, access_token: &str) -> Result<HttpResponse> {
        let mut http = HttpRequest::new(request.method, self.config.api_url(&request.path))
            .bearer(access_token);
        if let Some(ref body) = request.body {
            http = http.json(body.clone());
        }
        let resp = self.transport.send(http).await?;
        debug!(path = %request.path, status = %resp.status, "api call");
        Ok(resp)
    }
}

fn finish(request: &ApiRequest, resp: HttpResponse) -> Result<HttpResponse> {
    if resp.is_success() {
        Ok(resp)
    } else {
        warn!(path = %request.path, status = %resp.status, "api call failed");
        Err(Error::Api {
            status: resp.status,
            body: resp.body,
        })
    }
}
