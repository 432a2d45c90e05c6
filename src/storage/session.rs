//! File-backed Kite session storage
//!
//! Holds exactly one `SessionRecord`. Saves go to a sibling temp file that
//! is renamed over the target, so a reader sees either the old record or
//! the new one. Writers inside this process are serialized by a mutex.

use crate::brokers::kite_time;
use crate::error::Result;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Persisted Kite session
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub api_key: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub enctoken: String,
    #[serde(default)]
    pub public_token: String,
    #[serde(default)]
    pub request_token: String,
    #[serde(with = "kite_time::datetime")]
    pub generated_at: NaiveDateTime,
}

impl SessionRecord {
    /// A record is usable only when both halves of the auth header exist
    pub fn is_usable(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.access_token.trim().is_empty()
    }
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("api_key", &self.api_key)
            .field("generated_at", &self.generated_at)
            .finish_non_exhaustive()
    }
}

/// Single-record session store
pub struct SessionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Replace the stored session
    pub fn save(&self, record: &SessionRecord) -> Result<()> {
        let data = serde_json::to_vec_pretty(record)?;

        let _guard = self.write_lock.lock();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, &data)?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        tracing::debug!("Session written to {:?}", self.path);
        Ok(())
    }

    /// Load the stored session.
    ///
    /// `Ok(None)` when no session has been saved yet; `Err` when the file
    /// exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<SessionRecord>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(serde_json::from_slice(&data)?))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn record(access_token: &str) -> SessionRecord {
        SessionRecord {
            api_key: "key".to_string(),
            access_token: access_token.to_string(),
            refresh_token: "refresh".to_string(),
            enctoken: "enc".to_string(),
            public_token: "pub".to_string(),
            request_token: "req".to_string(),
            generated_at: NaiveDate::from_ymd_opt(2024, 3, 5)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_missing_file_is_no_session() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        assert!(store.load().unwrap().is_none());
        assert!(!store.exists());
    }

    #[test]
    fn test_save_overwrites_previous() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));

        store.save(&record("first")).unwrap();
        store.save(&record("second")).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "second");
        assert!(!dir.path().join("session.json.tmp").exists());

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["generated_at"], "2024-03-05 08:30:00");
    }

    #[test]
    fn test_corrupt_file_is_distinguishable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, b"{ not json").unwrap();

        let err = SessionStore::new(&path).load().unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested/state/session.json"));
        store.save(&record("tok")).unwrap();
        assert!(store.exists());
    }

    #[test]
    fn test_unusable_record() {
        let mut rec = record("tok");
        assert!(rec.is_usable());
        rec.access_token = "  ".to_string();
        assert!(!rec.is_usable());
        assert!(!format!("{:?}", record("hidden")).contains("hidden"));
    }
}
