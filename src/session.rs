use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{CarteiraError, Result};
use crate::models::User;
use crate::settings::config_dir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    #[serde(default)]
    pub user: Option<User>,
}

impl Drop for StoredSession {
    fn drop(&mut self) {
        self.access_token.zeroize();
    }
}

pub trait TokenStore {
    fn load(&self) -> Result<Option<StoredSession>>;
    fn save(&self, session: &StoredSession) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// `session.json` in the config directory, readable by the owner only.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_config_dir() -> Self {
        Self::new(config_dir().join("session.json"))
    }
}

#[cfg(unix)]
fn open_private(path: &std::path::Path) -> Result<std::fs::File> {
    use std::fs::{OpenOptions, Permissions};
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    // An existing file keeps its old mode on open; tighten it before the token lands.
    if path.exists() {
        std::fs::set_permissions(path, Permissions::from_mode(0o600))?;
    }
    Ok(OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?)
}

#[cfg(not(unix))]
fn open_private(path: &std::path::Path) -> Result<std::fs::File> {
    Ok(std::fs::File::create(path)?)
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<StoredSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                log::warn!("discarding unreadable session at {}: {e}", self.path.display());
                Ok(None)
            }
        }
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::to_string_pretty(session)?;
        let mut file = open_private(&self.path)?;
        let written = file.write_all(json.as_bytes());
        json.zeroize();
        written?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Process-local store.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryTokenStore {
    inner: std::sync::Mutex<Option<StoredSession>>,
}

#[cfg(test)]
impl MemoryTokenStore {
    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<StoredSession>>> {
        self.inner
            .lock()
            .map_err(|_| CarteiraError::Other("session store lock poisoned".to_string()))
    }
}

#[cfg(test)]
impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<StoredSession>> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        *self.slot()? = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Init,
    Authenticated(StoredSession),
    Unauthenticated,
    Cleared,
}

/// Who is logged in, and with which bearer token. Handed explicitly to
/// whoever needs it.
pub struct Session<S: TokenStore> {
    store: S,
    state: SessionState,
}

impl<S: TokenStore> Session<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: SessionState::Init,
        }
    }

    /// Leave `Init` by reading whatever the store holds.
    pub fn restore(&mut self) -> Result<&SessionState> {
        self.state = match self.store.load()? {
            Some(stored) if !stored.access_token.is_empty() => SessionState::Authenticated(stored),
            _ => SessionState::Unauthenticated,
        };
        Ok(&self.state)
    }

    pub fn authenticate(&mut self, access_token: String, user: Option<User>) -> Result<()> {
        let stored = StoredSession { access_token, user };
        self.store.save(&stored)?;
        self.state = SessionState::Authenticated(stored);
        Ok(())
    }

    pub fn set_user(&mut self, user: User) -> Result<()> {
        if let SessionState::Authenticated(ref mut stored) = self.state {
            stored.user = Some(user);
            self.store.save(stored)?;
        }
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.clear()?;
        self.state = SessionState::Cleared;
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    pub fn token(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated(stored) => Some(stored.access_token.as_str()),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            SessionState::Authenticated(stored) => stored.user.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl<S: TokenStore> Session<S> {
        fn state(&self) -> &SessionState {
            &self.state
        }
    }

    fn user() -> User {
        User {
            id: 1,
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            roles: vec!["admin".to_string()],
            is_active: true,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_lifecycle_in_memory() {
        let mut session = Session::new(MemoryTokenStore::default());
        assert_eq!(session.state(), &SessionState::Init);
        assert_eq!(session.restore().unwrap(), &SessionState::Unauthenticated);
        assert!(session.token().is_none());

        session.authenticate("tok".to_string(), None).unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.token(), Some("tok"));
        assert!(session.user().is_none());

        session.set_user(user()).unwrap();
        assert_eq!(session.user().map(|u| u.name.as_str()), Some("Admin"));

        session.clear().unwrap();
        assert_eq!(session.state(), &SessionState::Cleared);
        assert!(session.token().is_none());
    }

    #[test]
    fn test_set_user_ignored_when_not_authenticated() {
        let mut session = Session::new(MemoryTokenStore::default());
        session.restore().unwrap();
        session.set_user(user()).unwrap();
        assert!(session.user().is_none());
    }

    #[test]
    fn test_file_store_roundtrip_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut session = Session::new(FileTokenStore::new(&path));
        session.authenticate("abc".to_string(), Some(user())).unwrap();
        assert!(path.exists());

        let mut again = Session::new(FileTokenStore::new(&path));
        again.restore().unwrap();
        assert_eq!(again.token(), Some("abc"));
        assert_eq!(again.user().map(|u| u.id), Some(1));

        again.clear().unwrap();
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let fresh = dir.path().join("session.json");
        let store = FileTokenStore::new(&fresh);
        store
            .save(&StoredSession {
                access_token: "abc".to_string(),
                user: None,
            })
            .unwrap();
        let mode = std::fs::metadata(&fresh).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        // A world-readable leftover is tightened, not reused as is.
        let stale = dir.path().join("old-session.json");
        std::fs::write(&stale, "{}").unwrap();
        std::fs::set_permissions(&stale, std::fs::Permissions::from_mode(0o644)).unwrap();
        FileTokenStore::new(&stale)
            .save(&StoredSession {
                access_token: "def".to_string(),
                user: None,
            })
            .unwrap();
        let mode = std::fs::metadata(&stale).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(std::fs::read_to_string(&stale).unwrap().contains("def"));
    }

    #[test]
    fn test_poisoned_memory_store_reports_error() {
        let store = MemoryTokenStore::default();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.inner.lock().unwrap();
            panic!("writer died");
        }));
        assert!(store.load().is_err());
        assert!(store.clear().is_err());
        let mut session = Session::new(store);
        assert!(session.authenticate("tok".to_string(), None).is_err());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_corrupt_session_file_is_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        let mut session = Session::new(FileTokenStore::new(&path));
        assert_eq!(session.restore().unwrap(), &SessionState::Unauthenticated);
    }
}
