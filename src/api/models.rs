use std::fmt;

use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Device {
    // restricted devices may come back without an id
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_restricted: bool,
}

impl Device {
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.kind)
    }

    pub fn is_selectable(&self) -> bool {
        self.id.is_some() && !self.is_restricted
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
}

const TRACK_ID_LEN: usize = 22;
const TRACK_URI_PREFIX: &str = "spotify:track:";

/// A base62 track id recognised in a scanned payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackId(String);

impl TrackId {
    /// Accepts a bare id, a `spotify:track:` URI, or an open.spotify.com link.
    pub fn parse(payload: &str) -> Option<Self> {
        let payload = payload.trim();
        let candidate = if let Some(id) = payload.strip_prefix(TRACK_URI_PREFIX) {
            id.to_string()
        } else if payload.starts_with("http://") || payload.starts_with("https://") {
            track_id_from_link(payload)?
        } else {
            payload.to_string()
        };

        let valid = candidate.len() == TRACK_ID_LEN
            && candidate.chars().all(|c| c.is_ascii_alphanumeric());
        valid.then_some(Self(candidate))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn uri(&self) -> String {
        format!("{TRACK_URI_PREFIX}{}", self.0)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn track_id_from_link(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    if url.host_str() != Some("open.spotify.com") {
        return None;
    }
    let segments: Vec<&str> = url.path_segments()?.collect();
    // links may carry a locale segment, e.g. /intl-de/track/<id>
    let pos = segments.iter().position(|s| *s == "track")?;
    segments.get(pos + 1).map(|s| s.to_string())
}
