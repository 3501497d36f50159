use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::error::{Error, Result};

/// Credentials are treated as expired this long before the server says so.
pub(crate) const EXPIRY_MARGIN_SECS: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    AccessToken,
    RefreshToken,
    ExpiresAt,
    PkceVerifier,
}

impl StoreKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKey::AccessToken => "accessToken",
            StoreKey::RefreshToken => "refreshToken",
            StoreKey::ExpiresAt => "expiresAt",
            StoreKey::PkceVerifier => "pkceVerifier",
        }
    }
}

/// Key-value persistence for the credential set and the transient PKCE verifier.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: StoreKey) -> Result<Option<String>>;
    fn set(&self, key: StoreKey, value: &str) -> Result<()>;
    fn remove(&self, key: StoreKey) -> Result<()>;
    fn clear(&self) -> Result<()>;

    fn credential(&self) -> Result<Option<Credential>> {
        let Some(access_token) = self.get(StoreKey::AccessToken)? else {
            return Ok(None);
        };
        let refresh_token = self.get(StoreKey::RefreshToken)?.unwrap_or_default();
        let expires_at = match self.get(StoreKey::ExpiresAt)? {
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| Error::Store(format!("bad expiresAt {raw:?}: {e}")))?
                .with_timezone(&Utc),
            // unknown expiry: force a refresh before first use
            None => DateTime::<Utc>::MIN_UTC,
        };
        Ok(Some(Credential {
            access_token,
            refresh_token,
            expires_at,
        }))
    }

    fn save_credential(&self, credential: &Credential) -> Result<()> {
        self.set(StoreKey::AccessToken, &credential.access_token)?;
        self.set(StoreKey::RefreshToken, &credential.refresh_token)?;
        self.set(StoreKey::ExpiresAt, &credential.expires_at.to_rfc3339())
    }
}

/// JSON file on disk; survives restarts.
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(data) if data.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(data) => serde_json::from_str(&data)
                .map_err(|e| Error::Store(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(Error::Store(format!("{}: {e}", self.path.display()))),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        fs::write(&self.path, serde_json::to_string_pretty(map)?)
            .map_err(|e| Error::Store(format!("{}: {e}", self.path.display())))
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Store("token store lock poisoned".to_string()))?;
        let mut map = self.read_map()?;
        f(&mut map);
        self.write_map(&map)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>> {
        Ok(self.read_map()?.remove(key.as_str()))
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<()> {
        self.update(|map| {
            map.insert(key.as_str().to_string(), value.to_string());
        })
    }

    fn remove(&self, key: StoreKey) -> Result<()> {
        self.update(|map| {
            map.remove(key.as_str());
        })
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Store(format!("{}: {e}", self.path.display()))),
        }
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    values: Mutex<HashMap<StoreKey, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> Result<std::sync::MutexGuard<'_, HashMap<StoreKey, String>>> {
        self.values
            .lock()
            .map_err(|_| Error::Store("token store lock poisoned".to_string()))
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>> {
        Ok(self.values()?.get(&key).cloned())
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<()> {
        self.values()?.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> Result<()> {
        self.values()?.remove(&key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.values()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(expires_at: DateTime<Utc>) -> Credential {
        Credential {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
        }
    }

    #[test]
    fn expiry_applies_ten_second_margin() {
        let now = Utc::now();
        assert!(credential(now - Duration::seconds(1)).is_expired_at(now));
        assert!(credential(now + Duration::seconds(10)).is_expired_at(now));
        assert!(!credential(now + Duration::seconds(11)).is_expired_at(now));
        assert!(!credential(now + Duration::hours(1)).is_expired_at(now));
    }

    #[test]
    fn memory_store_round_trips_credential() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.credential().unwrap(), None);

        let expires_at = DateTime::parse_from_rfc3339("2030-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        store.save_credential(&credential(expires_at)).unwrap();

        assert_eq!(store.credential().unwrap(), Some(credential(expires_at)));
    }

    #[test]
    fn missing_expiry_reads_as_expired() {
        let store = MemoryTokenStore::new();
        store.set(StoreKey::AccessToken, "access").unwrap();
        let cred = store.credential().unwrap().unwrap();
        assert!(cred.is_expired());
        assert_eq!(cred.refresh_token, "");
    }

    #[test]
    fn file_store_survives_reopen_and_clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");

        let store = FileTokenStore::new(&path);
        store.set(StoreKey::PkceVerifier, "verifier").unwrap();
        store.set(StoreKey::RefreshToken, "refresh").unwrap();
        store.remove(StoreKey::PkceVerifier).unwrap();

        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.get(StoreKey::PkceVerifier).unwrap(), None);
        assert_eq!(
            reopened.get(StoreKey::RefreshToken).unwrap().as_deref(),
            Some("refresh")
        );

        reopened.clear().unwrap();
        assert!(!path.exists());
        assert_eq!(store.get(StoreKey::RefreshToken).unwrap(), None);
        reopened.clear().unwrap();
    }

    #[test]
    fn file_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileTokenStore::new(&path);
        assert!(matches!(
            store.get(StoreKey::AccessToken),
            Err(Error::Store(_))
        ));
    }
}
