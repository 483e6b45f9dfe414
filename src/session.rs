//! Explicit authenticated session.
//!
//! The session is created at startup, handed to the gateway by reference,
//! and cleared on logout. Nothing reads the credential from ambient state.
//!
//! Key properties:
//! - The bearer token lives in memory only inside `Credential`, zeroed on drop
//! - `SessionStore` persists the token between runs (load at startup,
//!   save on sign-in, delete on logout)
//! - Clearing the session drops the credential and the signed-in user together

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use zeroize::Zeroize;

use crate::config;
use crate::models::{AuthUser, UserRole};

// ═══════════════════════════════════════════════════════════
// Credential (zeroed on drop)
// ═══════════════════════════════════════════════════════════

/// Bearer token, zeroed on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
struct Credential {
    token: String,
}

impl Credential {
    fn new(token: &str) -> Self {
        Self {
            token: token.trim().to_string(),
        }
    }
}

struct SessionState {
    credential: Credential,
    user: Option<AuthUser>,
}

// ═══════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════

/// Current credential and user, shared by reference with the gateway.
///
/// A session can hold a token without a user: that is the state between
/// loading a persisted token and confirming it against the profile endpoint.
pub struct Session {
    state: RwLock<Option<SessionState>>,
}

impl Session {
    /// An empty (signed-out) session.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
        }
    }

    /// A session holding a token whose user is not yet known.
    pub fn with_token(token: &str) -> Self {
        let session = Self::new();
        session.set_token(token);
        session
    }

    /// Load the persisted token, if any.
    pub fn load(store: &SessionStore) -> Result<Self, SessionError> {
        Ok(match store.load_token()? {
            Some(token) => Self::with_token(&token),
            None => Self::new(),
        })
    }

    /// Replace the credential; forgets any previously confirmed user.
    /// Blank tokens sign the session out.
    pub fn set_token(&self, token: &str) {
        let next = if token.trim().is_empty() {
            None
        } else {
            Some(SessionState {
                credential: Credential::new(token),
                user: None,
            })
        };
        if let Ok(mut state) = self.state.write() {
            *state = next;
        }
    }

    /// Attach the confirmed user to the current credential.
    pub fn set_user(&self, user: AuthUser) -> Result<(), SessionError> {
        let mut state = self.state.write().map_err(|_| SessionError::LockPoisoned)?;
        let current = state.as_mut().ok_or(SessionError::NoCredential)?;
        current.user = Some(user);
        Ok(())
    }

    /// Install a fresh credential and its user in one step (sign-in).
    pub fn establish(&self, token: &str, user: AuthUser) -> Result<(), SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::NoCredential);
        }
        let mut state = self.state.write().map_err(|_| SessionError::LockPoisoned)?;
        *state = Some(SessionState {
            credential: Credential::new(token),
            user: Some(user),
        });
        Ok(())
    }

    /// `Authorization` header value for outgoing calls.
    pub fn bearer(&self) -> Option<String> {
        let state = self.state.read().ok()?;
        state
            .as_ref()
            .map(|s| format!("Bearer {}", s.credential.token))
    }

    pub fn has_credential(&self) -> bool {
        self.state
            .read()
            .map(|state| state.is_some())
            .unwrap_or(false)
    }

    pub fn user(&self) -> Option<AuthUser> {
        let state = self.state.read().ok()?;
        state.as_ref().and_then(|s| s.user.clone())
    }

    pub fn role(&self) -> Option<UserRole> {
        self.user().map(|u| u.user_role)
    }

    /// Credential present and confirmed against a user.
    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    /// Drop credential and user (logout). The token is zeroed via Drop.
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.write() {
            *state = None;
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("has_credential", &self.has_credential())
            .field("user", &self.user())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════
// SessionStore (persisted credential)
// ═══════════════════════════════════════════════════════════

/// File-backed token persistence.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.labflow/credential`.
    pub fn default_location() -> Result<Self, SessionError> {
        config::credential_file()
            .map(Self::new)
            .ok_or(SessionError::NoHomeDirectory)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted token. A missing or blank file means signed out.
    pub fn load_token(&self) -> Result<Option<String>, SessionError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SessionError::Io(e)),
        }
    }

    /// Persist the token, owner-readable only on unix.
    pub fn save_token(&self, token: &str) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token.trim())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        tracing::debug!(path = %self.path.display(), "Credential persisted");
        Ok(())
    }

    /// Delete the persisted token. Deleting an absent file is not an error.
    pub fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Io(e)),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════════════════════

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No credential in session")]
    NoCredential,
    #[error("Cannot determine home directory")]
    NoHomeDirectory,
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Credential store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lab_staff() -> AuthUser {
        AuthUser {
            id: "u-1".into(),
            name: "Nimal Perera".into(),
            email: "nimal@lab.example".into(),
            user_role: UserRole::LabStaff,
        }
    }

    #[test]
    fn new_session_is_signed_out() {
        let session = Session::new();
        assert!(!session.has_credential());
        assert!(!session.is_authenticated());
        assert!(session.bearer().is_none());
        assert!(session.role().is_none());
    }

    #[test]
    fn token_without_user_is_not_authenticated() {
        let session = Session::with_token("abc123");
        assert!(session.has_credential());
        assert!(!session.is_authenticated());
        assert_eq!(session.bearer().unwrap(), "Bearer abc123");
    }

    #[test]
    fn set_user_requires_credential() {
        let session = Session::new();
        assert!(matches!(
            session.set_user(lab_staff()),
            Err(SessionError::NoCredential)
        ));
    }

    #[test]
    fn establish_sets_token_and_user() {
        let session = Session::new();
        session.establish(" tok ", lab_staff()).unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.role(), Some(UserRole::LabStaff));
        assert_eq!(session.bearer().unwrap(), "Bearer tok");
    }

    #[test]
    fn establish_rejects_blank_token() {
        let session = Session::new();
        assert!(session.establish("  ", lab_staff()).is_err());
        assert!(!session.has_credential());
    }

    #[test]
    fn replacing_token_forgets_user() {
        let session = Session::new();
        session.establish("first", lab_staff()).unwrap();
        session.set_token("second");
        assert!(!session.is_authenticated());
        assert_eq!(session.bearer().unwrap(), "Bearer second");
    }

    #[test]
    fn clear_signs_out() {
        let session = Session::new();
        session.establish("tok", lab_staff()).unwrap();
        session.clear();
        assert!(!session.has_credential());
        assert!(session.user().is_none());
    }

    #[test]
    fn debug_does_not_leak_token() {
        let session = Session::with_token("very-secret");
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("has_credential: true"));
    }

    #[test]
    fn store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("credential"));

        assert!(store.load_token().unwrap().is_none());
        store.save_token("tok-42\n").unwrap();
        assert_eq!(store.load_token().unwrap().as_deref(), Some("tok-42"));

        let session = Session::load(&store).unwrap();
        assert_eq!(session.bearer().unwrap(), "Bearer tok-42");

        store.clear().unwrap();
        assert!(store.load_token().unwrap().is_none());
        // Second clear is a no-op
        store.clear().unwrap();
    }

    #[test]
    fn blank_store_loads_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("credential"));
        std::fs::write(store.path(), "   ").unwrap();
        let session = Session::load(&store).unwrap();
        assert!(!session.has_credential());
    }

    #[cfg(unix)]
    #[test]
    fn saved_token_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("credential"));
        store.save_token("tok").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
