//! User identity, credentials and the persisted identity store
//!
//! The identity is the only thing the client persists between runs. Secrets
//! (the session token and passwords) are zeroized when dropped and are never
//! shown by `Debug`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// File name of the cached identity
const IDENTITY_FILE_NAME: &str = "identity.json";

/// Directory under the platform data dir
const DATA_DIR_NAME: &str = "sitedesk";

/// Opaque bearer token issued by the backend
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token for the `Authorization` header
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Identity of a signed-in user, as returned by sign-in or sign-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Backend user id
    #[serde(alias = "id")]
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    /// Session token (may be empty for backends that use cookies)
    #[serde(default = "empty_token")]
    pub token: SessionToken,
}

fn empty_token() -> SessionToken {
    SessionToken::new(String::new())
}

impl UserIdentity {
    /// Name to greet the user with, falling back to the email
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

/// Sign-in request body
#[derive(Clone, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Sign-up request body
#[derive(Clone, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// File-backed cache of the signed-in identity
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    /// Store backed by an explicit file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform default location
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    /// `<data dir>/sitedesk/identity.json`
    pub fn default_path() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|dir| dir.join(DATA_DIR_NAME).join(IDENTITY_FILE_NAME))
            .ok_or(Error::NoDataDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached identity, `None` when nobody is signed in
    pub fn load(&self) -> Result<Option<UserIdentity>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let identity: UserIdentity = serde_json::from_str(&content)?;
        Ok(Some(identity))
    }

    /// Persist the identity, replacing any previous one
    pub fn save(&self, identity: &UserIdentity) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(identity)?;
        std::fs::write(&self.path, content)?;
        debug!("Saved identity for {} to {:?}", identity.email, self.path);
        Ok(())
    }

    /// Discard the cached identity. A missing file is not an error.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed cached identity at {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn identity() -> UserIdentity {
        UserIdentity {
            user_id: "u-1".to_string(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            token: SessionToken::new("secret-token"),
        }
    }

    #[test]
    fn test_store_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = IdentityStore::new(dir.path().join("nested").join("identity.json"));

        assert!(store.load().unwrap().is_none());
        store.save(&identity()).unwrap();
        assert_eq!(store.load().unwrap(), Some(identity()));
    }

    #[test]
    fn test_store_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = IdentityStore::new(dir.path().join("identity.json"));

        store.save(&identity()).unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", identity());
        assert!(!rendered.contains("secret-token"));

        let creds = Credentials::new("ada@example.com", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[test]
    fn test_identity_accepts_id_alias() {
        let json = r#"{"id": "abc", "email": "b@example.com", "token": "t"}"#;
        let parsed: UserIdentity = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.user_id, "abc");
        assert_eq!(parsed.display_name(), "b@example.com");
        assert_eq!(parsed.token.expose(), "t");
    }
}
