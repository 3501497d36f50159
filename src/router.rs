use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenState {
    Login,
    Start,
    Scan,
    Play,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenEvent {
    TokenAcquired,
    ScanRequested,
    ScanSucceeded,
    ScanCancelled,
    PlaybackClosed,
}

impl ScreenEvent {
    pub const ALL: [ScreenEvent; 5] = [
        ScreenEvent::TokenAcquired,
        ScreenEvent::ScanRequested,
        ScreenEvent::ScanSucceeded,
        ScreenEvent::ScanCancelled,
        ScreenEvent::PlaybackClosed,
    ];
}

pub fn transition(from: ScreenState, event: ScreenEvent) -> Option<ScreenState> {
    use ScreenEvent::*;
    use ScreenState::*;

    match (from, event) {
        (Login, TokenAcquired) => Some(Start),
        (Start, ScanRequested) => Some(Scan),
        (Scan, ScanSucceeded) => Some(Play),
        (Scan, ScanCancelled) => Some(Start),
        (Play, PlaybackClosed) => Some(Start),
        _ => None,
    }
}

/// Holds the single active screen and publishes every change.
pub struct ScreenRouter {
    state: watch::Sender<ScreenState>,
}

impl ScreenRouter {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ScreenState::Login);
        Self { state }
    }

    pub fn state(&self) -> ScreenState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScreenState> {
        self.state.subscribe()
    }

    /// Applies `event`; returns false (and changes nothing) when it is not
    /// valid from the current screen.
    pub fn apply(&self, event: ScreenEvent) -> bool {
        let from = self.state();
        match transition(from, event) {
            Some(to) => {
                self.state.send_replace(to);
                info!(?from, ?to, "screen changed");
                true
            }
            None => {
                debug!(?from, ?event, "ignoring stale screen event");
                false
            }
        }
    }

    /// Tears the session view back down to the login screen.
    pub fn reset(&self) {
        let from = self.state.send_replace(ScreenState::Login);
        if from != ScreenState::Login {
            info!(?from, "screen reset to login");
        }
    }
}

impl Default for ScreenRouter {
    fn default() -> Self {
        Self::new()
    }
}
