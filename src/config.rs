use std::path::PathBuf;

use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";
pub const DEFAULT_AUTH_BASE: &str = "https://accounts.spotify.com";
pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";
pub const DEFAULT_TOKEN_PATH: &str = "token.json";
pub const SCOPES: &str = "user-read-playback-state user-modify-playback-state";

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub redirect_uri: Url,
    pub auth_base: Url,
    pub api_base: Url,
    pub token_path: PathBuf,
}

impl Config {
    pub fn new(client_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client_id: client_id.into(),
            redirect_uri: parse_url("redirect uri", DEFAULT_REDIRECT_URI)?,
            auth_base: parse_url("auth base", DEFAULT_AUTH_BASE)?,
            api_base: parse_url("api base", DEFAULT_API_BASE)?,
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
        })
    }

    // reads .env first, then the process environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let client_id = std::env::var("SCANPLAY_CLIENT_ID")
            .map_err(|_| Error::Config("SCANPLAY_CLIENT_ID is not set".to_string()))?;
        let mut config = Self::new(client_id)?;

        if let Ok(v) = std::env::var("SCANPLAY_REDIRECT_URI") {
            config.redirect_uri = parse_url("SCANPLAY_REDIRECT_URI", &v)?;
        }
        if let Ok(v) = std::env::var("SCANPLAY_AUTH_BASE") {
            config.auth_base = parse_url("SCANPLAY_AUTH_BASE", &v)?;
        }
        if let Ok(v) = std::env::var("SCANPLAY_API_BASE") {
            config.api_base = parse_url("SCANPLAY_API_BASE", &v)?;
        }
        if let Ok(v) = std::env::var("SCANPLAY_TOKEN_PATH") {
            config.token_path = PathBuf::from(v);
        }
        Ok(config)
    }

    pub fn authorize_endpoint(&self) -> String {
        join(&self.auth_base, "authorize")
    }

    pub fn token_endpoint(&self) -> String {
        join(&self.auth_base, "api/token")
    }

    pub fn api_url(&self, path: &str) -> String {
        join(&self.api_base, path)
    }
}

fn join(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn parse_url(name: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| Error::Config(format!("{name} is not a valid url: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_without_double_slashes() {
        let mut config = Config::new("client").unwrap();
        config.api_base = Url::parse("http://127.0.0.1:9000/v1/").unwrap();

        assert_eq!(
            config.token_endpoint(),
            "https://accounts.spotify.com/api/token"
        );
        assert_eq!(
            config.api_url("/me/player"),
            "http://127.0.0.1:9000/v1/me/player"
        );
    }
}
