//! The logged-in shopper's identity.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use cartsync_core::{Money, UserId};

use crate::gateway::LoginResult;

/// Identity and wallet figures for the logged-in shopper.
///
/// `Debug` redacts the token.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer token attached to authenticated requests.
    pub token: SecretString,
    pub user_id: UserId,
    pub email: String,
    pub username: String,
    pub wallet_balance: Money,
}

impl From<LoginResult> for Session {
    fn from(login: LoginResult) -> Self {
        Self {
            token: login.token,
            user_id: login.user_id,
            email: login.email,
            username: login.username,
            wallet_balance: login.wallet_balance,
        }
    }
}

/// On-disk shape of a [`Session`].
#[derive(Serialize, Deserialize)]
pub(crate) struct SessionRecord {
    token: String,
    #[serde(rename = "userId")]
    user_id: UserId,
    email: String,
    username: String,
    balance: Money,
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        Self {
            token: session.token.expose_secret().to_owned(),
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            username: session.username.clone(),
            balance: session.wallet_balance,
        }
    }
}

impl From<SessionRecord> for Session {
    fn from(record: SessionRecord) -> Self {
        Self {
            token: SecretString::from(record.token),
            user_id: record.user_id,
            email: record.email,
            username: record.username,
            wallet_balance: record.balance,
        }
    }
}
