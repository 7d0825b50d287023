//! Password hashing and session persistence.
//!
//! Hashes are salted SHA-256 stored as `saltHex$digestHex`. Verification
//! re-derives the digest with the stored salt and compares; a hash that does
//! not parse simply fails verification rather than erroring, so callers can
//! funnel every failure into the same credential error.

use std::fmt;
use std::sync::Mutex;

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::RecordId;

const SALT_LEN: usize = 16;
const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password with a fresh random salt.
///
/// Fails with `InvalidInput` when the password is shorter than eight
/// characters.
pub fn hash_password(password: &str) -> Result<String> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    Ok(format!("{}${}", to_hex(&salt), digest_hex(&salt, password)))
}

/// Check a password against a stored hash.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest)) = stored.split_once('$') else {
        return false;
    };
    let Some(salt) = from_hex(salt_hex) else {
        return false;
    };
    digest_hex(&salt, password) == digest
}

fn digest_hex(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    to_hex(&hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    use fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
        out
    })
}

fn from_hex(raw: &str) -> Option<Vec<u8>> {
    if raw.len() % 2 != 0 {
        return None;
    }
    (0..raw.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&raw[i..i + 2], 16).ok())
        .collect()
}

/// An authenticated local session
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// The signed-in user
    pub user_id: RecordId,
    /// Opaque session token
    pub token: String,
}

impl Session {
    /// Start a session for a user with a fresh random token
    #[must_use]
    pub fn start(user_id: RecordId) -> Self {
        let mut token = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut token);
        Self {
            user_id,
            token: to_hex(&token),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Where the active session lives between launches.
///
/// The data layer only defines the seam; each platform brings its own secure
/// storage behind it.
pub trait SessionStore: Send + Sync {
    /// Load the persisted session, if any
    fn load(&self) -> Result<Option<Session>>;

    /// Persist the session, replacing any previous one
    fn save(&self, session: &Session) -> Result<()>;

    /// Forget the persisted session
    fn clear(&self) -> Result<()>;
}

/// In-memory session store for tests and headless use
#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        let guard = self
            .session
            .lock()
            .map_err(|_| Error::StorageInit("session store poisoned".into()))?;
        Ok(guard.clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        let mut guard = self
            .session
            .lock()
            .map_err(|_| Error::StorageInit("session store poisoned".into()))?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .session
            .lock()
            .map_err(|_| Error::StorageInit("session store poisoned".into()))?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(verify_password("hunter2hunter2", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_password("hunter2hunter2").unwrap();
        let second = hash_password("hunter2hunter2").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn short_password_is_rejected() {
        assert!(matches!(
            hash_password("short"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn malformed_hash_fails_closed() {
        assert!(!verify_password("anything", "not-a-hash"));
        assert!(!verify_password("anything", "zz$zz"));
    }

    #[test]
    fn session_debug_redacts_token() {
        let session = Session::start(RecordId::new());
        let debug = format!("{session:?}");
        assert!(!debug.contains(&session.token));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemorySessionStore::new();
        assert!(store.load().unwrap().is_none());

        let session = Session::start(RecordId::new());
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
