//! Account portal: registration, login and session restoration.
//!
//! This is a local convenience gate, not a security boundary. Passwords are
//! stored as an unsalted SHA-256 digest so the plain text never lands on
//! disk, nothing more.

use crate::error::{FintracksError, ValidationError};
use crate::store::{self, KeyValueStore, UserAccount, SESSION_KEY};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Explicit handle for the signed-in user.
///
/// Every ledger operation goes through a [`crate::ledger::Ledger`] opened
/// for one session; nothing reads the active user from ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    username: String,
}

impl Session {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn require_fields<'a>(username: &'a str, password: &str) -> Result<&'a str, ValidationError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ValidationError::MissingFields);
    }
    Ok(username)
}

/// Create an account with an empty ledger and sign in as it.
pub fn register(
    store: &dyn KeyValueStore,
    username: &str,
    password: &str,
) -> Result<Session, FintracksError> {
    let username = require_fields(username, password)?;
    if store::load_account(store, username)?.is_some() {
        return Err(ValidationError::UserExists.into());
    }

    store::save_account(
        store,
        &UserAccount {
            username: username.to_string(),
            password_hash: hash_password(password),
            ..Default::default()
        },
    )?;
    info!("Registered account '{}'", username);
    start_session(store, username)
}

/// Check credentials and sign in.
///
/// An unknown user and a wrong password are deliberately the same error.
pub fn login(
    store: &dyn KeyValueStore,
    username: &str,
    password: &str,
) -> Result<Session, FintracksError> {
    let username = require_fields(username, password)?;
    match store::load_account(store, username)? {
        Some(account) if account.password_hash == hash_password(password) => {
            start_session(store, username)
        }
        _ => Err(ValidationError::InvalidCredentials.into()),
    }
}

pub fn logout(store: &dyn KeyValueStore) -> Result<(), FintracksError> {
    store.remove(SESSION_KEY)?;
    debug!("Session cleared");
    Ok(())
}

/// The session saved by the last login, if its account still exists.
///
/// A session pointing at a vanished account is cleared.
pub fn restore_session(store: &dyn KeyValueStore) -> Result<Option<Session>, FintracksError> {
    let Some(username) = store::get_json::<String>(store, SESSION_KEY)? else {
        return Ok(None);
    };
    if store::load_account(store, &username)?.is_none() {
        debug!("Stale session for '{}' removed", username);
        store.remove(SESSION_KEY)?;
        return Ok(None);
    }
    Ok(Some(Session::new(username)))
}

/// Like [`restore_session`], but a missing session is an error.
pub fn require_session(store: &dyn KeyValueStore) -> Result<Session, FintracksError> {
    restore_session(store)?.ok_or_else(|| ValidationError::NotLoggedIn.into())
}

fn start_session(store: &dyn KeyValueStore, username: &str) -> Result<Session, FintracksError> {
    store::set_json(store, SESSION_KEY, &username)?;
    Ok(Session::new(username))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn validation(err: FintracksError) -> ValidationError {
        match err {
            FintracksError::Validation(v) => v,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn register_then_login() {
        let store = MemoryStore::new();
        let s = register(&store, "  ada ", "pw").unwrap();
        assert_eq!(s.username(), "ada");
        logout(&store).unwrap();
        assert_eq!(restore_session(&store).unwrap(), None);
        let s = login(&store, "ada", "pw").unwrap();
        assert_eq!(restore_session(&store).unwrap(), Some(s));
    }

    #[test]
    fn portal_errors() {
        let store = MemoryStore::new();
        assert_eq!(
            validation(register(&store, "", "pw").unwrap_err()),
            ValidationError::MissingFields
        );
        assert_eq!(
            validation(login(&store, "ada", "").unwrap_err()),
            ValidationError::MissingFields
        );
        register(&store, "ada", "pw").unwrap();
        assert_eq!(
            validation(register(&store, "ada", "other").unwrap_err()),
            ValidationError::UserExists
        );
        assert_eq!(
            validation(login(&store, "ada", "wrong").unwrap_err()),
            ValidationError::InvalidCredentials
        );
        assert_eq!(
            validation(login(&store, "nobody", "pw").unwrap_err()),
            ValidationError::InvalidCredentials
        );
    }

    #[test]
    fn password_is_not_stored_in_clear() {
        let store = MemoryStore::new();
        register(&store, "ada", "hunter2").unwrap();
        let raw = store.get("user:ada").unwrap().unwrap();
        assert!(!raw.contains("hunter2"));
    }

    #[test]
    fn stale_session_is_cleared() {
        let store = MemoryStore::new();
        register(&store, "ada", "pw").unwrap();
        store.remove("user:ada").unwrap();
        assert_eq!(restore_session(&store).unwrap(), None);
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);
        assert_eq!(
            validation(require_session(&store).unwrap_err()),
            ValidationError::NotLoggedIn
        );
    }
}
