use std::sync::Arc;

use tracing::{debug, info, warn};

use super::commands::PlayerCommand;
use crate::api::{ApiClient, Device, TrackId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackIntent {
    Playing,
    Paused,
}

/// Drives remote playback and keeps a local belief of whether it is playing.
///
/// The belief only changes after a call succeeds; resume and pause ask the
/// server first and skip the mutating call when it already agrees.
pub struct PlaybackController {
    api: Arc<ApiClient>,
    intent: PlaybackIntent,
    current_track: Option<TrackId>,
}

impl PlaybackController {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            intent: PlaybackIntent::Paused,
            current_track: None,
        }
    }

    pub fn intent(&self) -> PlaybackIntent {
        self.intent
    }

    pub fn current_track(&self) -> Option<&TrackId> {
        self.current_track.as_ref()
    }

    pub async fn play_track(&mut self, track: &TrackId) -> Result<()> {
        self.api
            .start_playback(track)
            .await
            .map_err(|e| playback_error("start playback", e))?;
        self.intent = PlaybackIntent::Playing;
        self.current_track = Some(track.clone());
        info!(%track, "playback started");
        Ok(())
    }

    pub async fn resume(&mut self) -> Result<()> {
        if self.api.is_playing().await? {
            debug!("server already playing, nothing to resume");
        } else {
            self.api
                .resume_playback()
                .await
                .map_err(|e| playback_error("resume", e))?;
            info!("playback resumed");
        }
        self.intent = PlaybackIntent::Playing;
        Ok(())
    }

    pub async fn pause(&mut self) -> Result<()> {
        if self.api.is_playing().await? {
            self.api
                .pause_playback()
                .await
                .map_err(|e| playback_error("pause", e))?;
            info!("playback paused");
        } else {
            debug!("server already paused, nothing to pause");
        }
        self.intent = PlaybackIntent::Paused;
        Ok(())
    }

    pub async fn devices(&self) -> Result<Vec<Device>> {
        self.api.devices().await
    }

    pub async fn transfer_to(&self, device_id: &str) -> Result<()> {
        self.api.transfer_playback(device_id).await.inspect_err(|e| {
            warn!(device_id, "could not change device: {e}");
        })
    }

    pub async fn execute(&mut self, command: PlayerCommand) -> Result<()> {
        match command {
            PlayerCommand::Play(track) => self.play_track(&track).await,
            PlayerCommand::Pause => self.pause().await,
            PlayerCommand::Resume => self.resume().await,
            PlayerCommand::TransferDevice(id) => self.transfer_to(&id).await,
        }
    }
}

// fatal auth failures must reach the session untouched
fn playback_error(action: &str, e: Error) -> Error {
    if e.is_fatal_auth() {
        e
    } else {
        warn!("cannot {action}: {e}");
        Error::Playback(format!("cannot {action}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::client;
    use crate::transport::Method;
    use crate::transport::mock::ScriptedTransport;

    const TRACK: &str = "4uLU6hMCjMI75M1A2tKUQC";

    fn controller() -> (PlaybackController, Arc<ScriptedTransport>) {
        let (api, _store, transport) = client();
        (PlaybackController::new(Arc::new(api)), transport)
    }

    fn mutating_calls(transport: &ScriptedTransport) -> usize {
        transport
            .requests()
            .iter()
            .filter(|r| r.method == Method::Put)
            .count()
    }

    #[tokio::test]
    async fn play_track_marks_playing() {
        let (mut controller, transport) = controller();
        transport.respond(204, "");

        controller
            .play_track(&TrackId::parse(TRACK).unwrap())
            .await
            .unwrap();

        assert_eq!(controller.intent(), PlaybackIntent::Playing);
        assert_eq!(controller.current_track().map(|t| t.as_str()), Some(TRACK));
    }

    #[tokio::test]
    async fn failed_play_keeps_belief() {
        let (mut controller, transport) = controller();
        transport.respond(404, r#"{"error":{"status":404,"message":"No active device"}}"#);

        let err = controller
            .play_track(&TrackId::parse(TRACK).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Playback(_)));
        assert_eq!(controller.intent(), PlaybackIntent::Paused);
        assert_eq!(controller.current_track(), None);
    }

    #[tokio::test]
    async fn resume_while_playing_makes_no_mutating_call() {
        let (mut controller, transport) = controller();
        transport.respond(200, r#"{"is_playing":true}"#);

        controller.resume().await.unwrap();

        assert_eq!(mutating_calls(&transport), 0);
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(controller.intent(), PlaybackIntent::Playing);
    }

    #[tokio::test]
    async fn pause_while_paused_makes_no_mutating_call() {
        let (mut controller, transport) = controller();
        transport
            .respond(200, r#"{"is_playing":false}"#)
            .respond(204, "");

        controller.pause().await.unwrap();
        controller.pause().await.unwrap();

        assert_eq!(mutating_calls(&transport), 0);
        assert_eq!(controller.intent(), PlaybackIntent::Paused);
    }

    #[tokio::test]
    async fn resume_and_pause_mutate_when_server_disagrees() {
        let (mut controller, transport) = controller();
        transport
            .respond(200, r#"{"is_playing":false}"#)
            .respond(204, "")
            .respond(200, r#"{"is_playing":true}"#)
            .respond(204, "");

        controller.execute(PlayerCommand::Resume).await.unwrap();
        assert_eq!(controller.intent(), PlaybackIntent::Playing);
        controller.execute(PlayerCommand::Pause).await.unwrap();
        assert_eq!(controller.intent(), PlaybackIntent::Paused);

        let puts: Vec<String> = transport
            .requests()
            .into_iter()
            .filter(|r| r.method == Method::Put)
            .map(|r| r.url)
            .collect();
        assert_eq!(puts.len(), 2);
        assert!(puts[0].ends_with("/me/player/play"));
        assert!(puts[1].ends_with("/me/player/pause"));
    }

    #[tokio::test]
    async fn failed_pause_is_playback_error_and_keeps_belief() {
        let (mut controller, transport) = controller();
        transport
            .respond(204, "")
            .respond(200, r#"{"is_playing":true}"#)
            .respond(403, "restricted");

        controller
            .play_track(&TrackId::parse(TRACK).unwrap())
            .await
            .unwrap();
        let err = controller.pause().await.unwrap_err();

        assert!(matches!(err, Error::Playback(_)));
        assert_eq!(controller.intent(), PlaybackIntent::Playing);
    }

    #[tokio::test]
    async fn revoked_refresh_token_is_not_wrapped() {
        let (mut controller, transport) = controller();
        transport.respond(401, "").respond(400, r#"{"error":"invalid_grant"}"#);

        let err = controller
            .play_track(&TrackId::parse(TRACK).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AuthRefresh(_)));
    }
}
