//! Durable store for the logged-in shopper's session.
//!
//! The session lives in memory behind a lock and is mirrored to
//! `session.json` in the data directory. Display preferences are kept in a
//! separate document (see [`super::preferences`]) so invalidating the
//! session never touches them.

use std::path::Path;
use std::sync::{PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info, instrument, warn};

use cartsync_core::{Money, UserId};

use crate::models::Session;
use crate::models::session::SessionRecord;
use crate::services::persist::{JsonFile, PersistError};
use crate::services::token;

/// File name of the session document inside the data directory.
pub const SESSION_FILE: &str = "session.json";

/// Session store.
///
/// An absent token means logged out. All fields are written together, so
/// readers never observe a token without the identity that goes with it.
#[derive(Debug)]
pub struct SessionStore {
    file: Option<JsonFile>,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Open the store backed by `data_dir/session.json`.
    ///
    /// A missing or unreadable document starts the store logged out.
    #[must_use]
    pub fn open(data_dir: &Path) -> Self {
        let file = JsonFile::new(data_dir.join(SESSION_FILE));
        let current = match file.load::<SessionRecord>() {
            Ok(Some(record)) => {
                debug!(path = %file.path().display(), "Restored session");
                Some(Session::from(record))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session document");
                None
            }
        };
        Self {
            file: Some(file),
            current: RwLock::new(current),
        }
    }

    /// A store that lives only in memory.
    #[must_use]
    pub const fn ephemeral() -> Self {
        Self {
            file: None,
            current: RwLock::new(None),
        }
    }

    /// Record a fresh login.
    ///
    /// # Errors
    ///
    /// Returns an error if the session document cannot be written. The
    /// in-memory session is left unchanged in that case.
    #[instrument(skip_all, fields(user_id = %session.user_id))]
    pub fn persist(&self, session: Session) -> Result<(), PersistError> {
        if let Some(file) = &self.file {
            file.store(&SessionRecord::from(&session))?;
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        info!("Session stored");
        Ok(())
    }

    /// Log out: drop the session from memory and disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the session document cannot be removed. Memory is
    /// cleared regardless.
    #[instrument(skip_all)]
    pub fn invalidate(&self) -> Result<(), PersistError> {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(file) = &self.file {
            file.remove()?;
        }
        if previous.is_some() {
            info!("Session invalidated");
        }
        Ok(())
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.read(|session| session.token.clone())
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.read(|session| session.user_id.clone())
    }

    #[must_use]
    pub fn balance(&self) -> Option<Money> {
        self.read(|session| session.wallet_balance)
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.read(|_| ()).is_some()
    }

    /// Whether the stored token is missing or past its expiry.
    #[must_use]
    pub fn is_token_expired(&self) -> bool {
        self.read(|session| token::is_expired(session.token.expose_secret()))
            .unwrap_or(true)
    }

    /// Subtract `amount` from the wallet balance after a placed order.
    ///
    /// The new balance is applied in memory first; a failed write is logged
    /// because the order has already been accepted upstream. No floor is
    /// applied. Returns the new balance, or `None` when logged out.
    #[instrument(skip(self), fields(amount = %amount))]
    pub(crate) fn debit(&self, amount: Money) -> Option<Money> {
        let updated = {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let session = guard.as_mut()?;
            session.wallet_balance = session.wallet_balance - amount;
            session.clone()
        };
        if let Some(file) = &self.file
            && let Err(e) = file.store(&SessionRecord::from(&updated))
        {
            error!(error = %e, "Failed to persist wallet balance");
        }
        Some(updated.wallet_balance)
    }

    fn read<T>(&self, f: impl FnOnce(&Session) -> T) -> Option<T> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(f)
    }
}
