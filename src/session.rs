//! The session context: created at startup, torn down at logout.
//!
//! A [`Session`] owns the screen router and the playback controller and is
//! the only place screen transitions are triggered from. Any fatal auth error
//! that surfaces through it logs the user out and resets to the login screen.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::api::{ApiClient, Device, TrackId};
use crate::auth::{AuthFlow, TokenStore};
use crate::config::Config;
use crate::error::Result;
use crate::player::{PlaybackController, PlayerCommand};
use crate::router::{ScreenEvent, ScreenRouter, ScreenState};
use crate::scan::{Decoder, FrameSource, ScanHandler, ScanLoop, ScanOutcome, Ticker};
use crate::transport::Transport;

pub struct Session {
    auth: Arc<AuthFlow>,
    controller: PlaybackController,
    router: ScreenRouter,
    devices: Vec<Device>,
}

impl Session {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let auth = Arc::new(AuthFlow::new(config.clone(), store, transport.clone()));
        let api = Arc::new(ApiClient::new(config, auth.clone(), transport));
        Self {
            auth,
            controller: PlaybackController::new(api),
            router: ScreenRouter::new(),
            devices: Vec::new(),
        }
    }

    pub fn auth(&self) -> &Arc<AuthFlow> {
        &self.auth
    }

    pub fn router(&self) -> &ScreenRouter {
        &self.router
    }

    pub fn screen(&self) -> ScreenState {
        self.router.state()
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    /// Startup: exchange a pending redirect code if there is one, make sure
    /// the stored credential is usable, fetch devices, and leave the login
    /// screen. Without a credential the session stays on Login.
    pub async fn start(&mut self, pending_code: Option<&str>) -> Result<ScreenState> {
        if let Some(code) = pending_code {
            let exchanged = self.auth.exchange_code(code).await;
            self.guard(exchanged)?;
        }
        if !self.auth.has_credential() {
            info!("no stored credential, login required");
            return Ok(self.screen());
        }

        let fresh = self.auth.ensure_fresh().await;
        self.guard(fresh)?;

        self.refresh_devices().await?;
        self.router.apply(ScreenEvent::TokenAcquired);
        Ok(self.screen())
    }

    /// Re-fetches the device list. Non-fatal failures leave the old list.
    pub async fn refresh_devices(&mut self) -> Result<&[Device]> {
        let listed = self.controller.devices().await;
        match self.guard(listed) {
            Ok(devices) => self.devices = devices,
            Err(e) if e.is_fatal_auth() => return Err(e),
            Err(e) => warn!("could not list devices: {e}"),
        }
        Ok(&self.devices)
    }

    /// Start → Scan, then scans until a scanned track starts playing (→ Play)
    /// or the loop is stopped through [`ScanLoop::handle`] (→ Start).
    ///
    /// Returns `Ok(None)` when a scan cannot be requested from the current screen.
    pub async fn scan<S, D, T>(
        &mut self,
        scan: &mut ScanLoop<S, D>,
        ticker: &mut T,
    ) -> Result<Option<ScanOutcome>>
    where
        S: FrameSource,
        D: Decoder,
        T: Ticker + ?Sized,
    {
        if !self.router.apply(ScreenEvent::ScanRequested) {
            return Ok(None);
        }

        let mut handler = PlayOnScan {
            controller: &mut self.controller,
        };
        let result = scan.run(ticker, &mut handler).await;

        match result {
            Ok(ScanOutcome::Accepted(payload)) => {
                self.router.apply(ScreenEvent::ScanSucceeded);
                Ok(Some(ScanOutcome::Accepted(payload)))
            }
            Ok(ScanOutcome::Cancelled) => {
                self.router.apply(ScreenEvent::ScanCancelled);
                Ok(Some(ScanOutcome::Cancelled))
            }
            Err(e) if e.is_fatal_auth() => self.guard(Err(e)),
            Err(e) => {
                self.router.apply(ScreenEvent::ScanCancelled);
                Err(e)
            }
        }
    }

    /// Play → Start, pausing playback on the way out.
    pub async fn close_playback(&mut self) -> Result<()> {
        if self.screen() != ScreenState::Play {
            return Ok(());
        }
        let paused = self.controller.pause().await;
        self.guard(paused)?;
        self.router.apply(ScreenEvent::PlaybackClosed);
        Ok(())
    }

    pub async fn command(&mut self, command: PlayerCommand) -> Result<()> {
        let done = self.controller.execute(command).await;
        self.guard(done)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.devices.clear();
        self.router.reset();
        self.auth.logout()
    }

    // resets to a consistent login screen on any fatal auth error
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            if e.is_fatal_auth() {
                warn!("fatal auth error, logging out: {e}");
                if let Err(clear) = self.logout() {
                    warn!("could not clear credentials: {clear}");
                }
            }
        }
        result
    }
}

/// Plays every scanned track id; anything unplayable keeps the scan going.
struct PlayOnScan<'a> {
    controller: &'a mut PlaybackController,
}

#[async_trait]
impl ScanHandler for PlayOnScan<'_> {
    async fn on_payload(&mut self, payload: &str) -> Result<bool> {
        let Some(track) = TrackId::parse(payload) else {
            info!(payload, "scanned code is not a track, continuing");
            return Ok(false);
        };
        match self.controller.play_track(&track).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_fatal_auth() => Err(e),
            Err(e) => {
                warn!(%track, "scanned track did not start, continuing: {e}");
                Ok(false)
            }
        }
    }
}
