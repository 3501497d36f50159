use crate::api::TrackId;

/// User intents the presentation layer sends to the playback controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    Play(TrackId),
    Pause,
    Resume,
    TransferDevice(String),
}
