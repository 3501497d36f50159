use reqwest::StatusCode;
use serde_json::json;

use crate::api::{ApiClient, ApiRequest, PlaybackState, TrackId};
use crate::error::Result;

impl ApiClient {
    /// Starts `track` from the beginning on the active device.
    pub async fn start_playback(&self, track: &TrackId) -> Result<()> {
        let request = ApiRequest::put("me/player/play").json(json!({
            "uris": [track.uri()],
            "position_ms": 0,
        }));
        self.call(&request).await?;
        Ok(())
    }

    pub async fn resume_playback(&self) -> Result<()> {
        self.call(&ApiRequest::put("me/player/play")).await?;
        Ok(())
    }

    pub async fn pause_playback(&self) -> Result<()> {
        self.call(&ApiRequest::put("me/player/pause")).await?;
        Ok(())
    }

    /// `None` when the server reports no active playback (204 No Content).
    pub async fn playback_state(&self) -> Result<Option<PlaybackState>> {
        let resp = self.call(&ApiRequest::get("me/player")).await?;
        if resp.status == StatusCode::NO_CONTENT || resp.body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(resp.json()?))
    }

    pub async fn is_playing(&self) -> Result<bool> {
        Ok(self
            .playback_state()
            .await?
            .is_some_and(|state| state.is_playing))
    }
}

#[cfg(test)]
mod tests {
    use crate::api::tests::client;
    use crate::transport::{Body, Method};

    use super::*;

    #[tokio::test]
    async fn start_playback_sends_track_uri_from_zero() {
        let (client, _store, transport) = client();
        transport.respond(204, "");

        let track = TrackId::parse("4uLU6hMCjMI75M1A2tKUQC").unwrap();
        client.start_playback(&track).await.unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::Put);
        assert!(sent.url.ends_with("/v1/me/player/play"));
        assert_eq!(
            sent.body,
            Body::Json(json!({
                "uris": ["spotify:track:4uLU6hMCjMI75M1A2tKUQC"],
                "position_ms": 0,
            }))
        );
    }

    #[tokio::test]
    async fn no_content_means_nothing_is_playing() {
        let (client, _store, transport) = client();
        transport.respond(204, "");
        assert!(!client.is_playing().await.unwrap());

        transport.respond(200, r#"{"is_playing":true,"progress_ms":1200}"#);
        assert!(client.is_playing().await.unwrap());
    }
}
