//! Error taxonomy shared by every component of the controller.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The token endpoint rejected an authorization-code exchange.
    #[error("authorization code exchange failed: {0}")]
    AuthExchange(String),

    /// The token endpoint rejected a refresh. Fatal: the user must log in again.
    #[error("token refresh failed: {0}")]
    AuthRefresh(String),

    /// Non-2xx response that one refresh-and-retry did not resolve.
    #[error("API request failed with {status}: {body}")]
    Api { status: StatusCode, body: String },

    /// A mutating playback call failed; local playback belief is unchanged.
    #[error("playback error: {0}")]
    Playback(String),

    /// The frame source could not be opened.
    #[error("media access error: {0}")]
    MediaAccess(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("token store error: {0}")]
    Store(String),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Errors after which the session cannot continue without a fresh login.
    pub fn is_fatal_auth(&self) -> bool {
        matches!(self, Error::AuthExchange(_) | Error::AuthRefresh(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
