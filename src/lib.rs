//! Scan a QR code, play the track.
//!
//! A PKCE-authenticated Spotify session ([`auth`], [`api`]) combined with a
//! frame-by-frame QR scan loop ([`scan`]) that starts playback of whatever
//! track it finds ([`player`]). [`session::Session`] ties them together and
//! drives the screen state machine in [`router`].

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod player;
pub mod router;
pub mod scan;
pub mod session;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};
pub use session::Session;
