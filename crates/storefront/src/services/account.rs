//! Account service.
//!
//! Login, registration and logout, the route guard, and the read-only
//! account views (profile and order history).

use std::sync::Arc;

use tracing::{debug, info, instrument};

use cartsync_core::{Email, Order, Password, UserId, UserProfile, Username};

use crate::error::{Result, StoreError, ValidationError};
use crate::events::{EventSink, Route};
use crate::gateway::StoreGateway;
use crate::models::Session;
use crate::services::session::SessionStore;

/// Account operations for the current shopper.
pub struct AccountService<G> {
    gateway: G,
    session: Arc<SessionStore>,
    events: EventSink,
}

impl<G: StoreGateway> AccountService<G> {
    #[must_use]
    pub const fn new(gateway: G, session: Arc<SessionStore>, events: EventSink) -> Self {
        Self {
            gateway,
            session,
            events,
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Log in and persist the resulting session.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed email or blank password,
    /// the service's message for rejected credentials, or a storage error if
    /// the session cannot be written.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let email = Email::parse(email)
            .map_err(|e| self.fail("log in", ValidationError::from(e).into()))?;
        let password = Password::for_login(password)
            .map_err(|e| self.fail("log in", ValidationError::from(e).into()))?;

        let session = Session::from(
            self.gateway
                .login(&email, &password)
                .await
                .map_err(|e| self.fail("log in", e))?,
        );
        self.session
            .persist(session.clone())
            .map_err(|e| self.fail("log in", e.into()))?;

        info!(user_id = %session.user_id, "Logged in");
        self.events.success("Logged in successfully");
        self.events.navigate(Route::Products);
        Ok(session)
    }

    /// Create an account. The shopper still has to log in afterwards.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the username, email or password is
    /// unacceptable or the confirmation does not match, otherwise any
    /// gateway error.
    #[instrument(skip(self, password, confirm))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> Result<()> {
        let (username, email, password) = validate_registration(username, email, password, confirm)
            .map_err(|e| self.fail("register", e.into()))?;

        self.gateway
            .register(&username, &email, &password)
            .await
            .map_err(|e| self.fail("register", e))?;

        info!(%username, "Registered");
        self.events.success("Registered successfully");
        self.events.navigate(Route::Login);
        Ok(())
    }

    /// End the session. Preferences are kept.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the session file cannot be removed.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<()> {
        self.session
            .invalidate()
            .map_err(|e| self.fail("log out", e.into()))?;
        self.events.info("Logged out");
        self.events.navigate(Route::Home);
        Ok(())
    }

    /// Guard for screens that need a live session.
    ///
    /// Without a session the shopper is sent to the login screen. With an
    /// expired token the session is cleared first.
    ///
    /// # Errors
    ///
    /// Returns `NotLoggedIn` or `Unauthenticated` respectively.
    pub fn require_session(&self) -> Result<Session> {
        let Some(session) = self.session.current() else {
            debug!("No session; redirecting to login");
            self.events.navigate(Route::Login);
            return Err(ValidationError::NotLoggedIn.into());
        };
        if self.session.is_token_expired() {
            let err = StoreError::unauthenticated("Token expired");
            self.events.surface(&err, &self.session);
            return Err(err);
        }
        Ok(session)
    }

    // =========================================================================
    // Account views
    // =========================================================================

    /// Past orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if logged out or the gateway call fails.
    #[instrument(skip(self))]
    pub async fn orders(&self) -> Result<Vec<Order>> {
        self.user_id("fetch orders")?;
        let mut orders = self
            .gateway
            .list_orders()
            .await
            .map_err(|e| self.fail("fetch orders", e))?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// # Errors
    ///
    /// Returns an error if logged out or the gateway call fails.
    #[instrument(skip(self))]
    pub async fn profile(&self) -> Result<UserProfile> {
        let user_id = self.user_id("fetch your profile")?;
        self.gateway
            .get_user(&user_id)
            .await
            .map_err(|e| self.fail("fetch your profile", e))
    }

    /// Delete the account and end the session.
    ///
    /// # Errors
    ///
    /// Returns an error if logged out or the service refuses. The session is
    /// only cleared once the service has confirmed the deletion.
    #[instrument(skip(self))]
    pub async fn delete_account(&self) -> Result<()> {
        let user_id = self.user_id("delete your account")?;
        self.gateway
            .delete_user(&user_id)
            .await
            .map_err(|e| self.fail("delete your account", e))?;

        info!(%user_id, "Account deleted");
        self.session
            .invalidate()
            .map_err(|e| self.fail("delete your account", e.into()))?;
        self.events.success("Account deleted");
        self.events.navigate(Route::Home);
        Ok(())
    }

    fn user_id(&self, action: &str) -> Result<UserId> {
        self.session
            .user_id()
            .ok_or_else(|| self.fail(action, ValidationError::NotLoggedIn.into()))
    }

    fn fail(&self, action: &str, err: StoreError) -> StoreError {
        self.events.surface_in(action, &err, &self.session);
        err
    }
}

fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
    confirm: &str,
) -> std::result::Result<(Username, Email, Password), ValidationError> {
    Ok((
        Username::parse(username)?,
        Email::parse(email)?,
        Password::for_registration(password, confirm)?,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use tokio::sync::mpsc;

    use cartsync_core::{CredentialError, Money};

    use super::*;
    use crate::events::UiEvent;
    use crate::testing::{FakeGateway, Failure, Op, jwt, logged_in_session};

    fn service(
        session: Arc<SessionStore>,
    ) -> (
        FakeGateway,
        AccountService<FakeGateway>,
        mpsc::UnboundedReceiver<UiEvent>,
    ) {
        let gateway = FakeGateway::default();
        let (sink, rx) = EventSink::channel();
        let account = AccountService::new(gateway.clone(), session, sink);
        (gateway, account, rx)
    }

    fn last_route(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Option<Route> {
        let mut route = None;
        while let Ok(event) = rx.try_recv() {
            if let UiEvent::Navigate(r) = event {
                route = Some(r);
            }
        }
        route
    }

    #[tokio::test]
    async fn test_login_persists_session() {
        let session = Arc::new(SessionStore::ephemeral());
        let (_, account, mut rx) = service(Arc::clone(&session));

        let logged_in = account
            .login("crio@example.com", "learnwithcrio")
            .await
            .unwrap();

        assert_eq!(logged_in.wallet_balance, Money::from_minor(5000));
        assert!(session.is_logged_in());
        assert!(!session.is_token_expired());
        assert_eq!(last_route(&mut rx), Some(Route::Products));
    }

    #[tokio::test]
    async fn test_login_rejected_keeps_logged_out() {
        let session = Arc::new(SessionStore::ephemeral());
        let (_, account, _rx) = service(Arc::clone(&session));

        let err = account
            .login("crio@example.com", "wrong")
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Incorrect email or password");
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn test_login_validates_before_calling_service() {
        let (gateway, account, _rx) = service(Arc::new(SessionStore::ephemeral()));

        let err = account.login("not-an-email", "pw").await.unwrap_err();

        assert!(matches!(err.validation(), Some(ValidationError::Email(_))));
        assert_eq!(gateway.calls().login, 0);
    }

    #[tokio::test]
    async fn test_register_password_mismatch() {
        let (gateway, account, _rx) = service(Arc::new(SessionStore::ephemeral()));

        let err = account
            .register("crio.do", "crio@example.com", "learnwithcrio", "learnwithcri0")
            .await
            .unwrap_err();

        assert_eq!(
            err.validation(),
            Some(&ValidationError::Credential(CredentialError::PasswordMismatch))
        );
        assert_eq!(gateway.calls().register, 0);
    }

    #[tokio::test]
    async fn test_register_navigates_to_login() {
        let (gateway, account, mut rx) = service(Arc::new(SessionStore::ephemeral()));

        account
            .register("crio.do", "crio@example.com", "learnwithcrio", "learnwithcrio")
            .await
            .unwrap();

        assert_eq!(gateway.calls().register, 1);
        assert_eq!(last_route(&mut rx), Some(Route::Login));
    }

    #[tokio::test]
    async fn test_logout() {
        let session = logged_in_session(100);
        let (_, account, mut rx) = service(Arc::clone(&session));

        account.logout().unwrap();

        assert!(!session.is_logged_in());
        assert_eq!(last_route(&mut rx), Some(Route::Home));
    }

    #[test]
    fn test_require_session_without_login() {
        let (_, account, mut rx) = service(Arc::new(SessionStore::ephemeral()));

        let err = account.require_session().unwrap_err();

        assert_eq!(err.validation(), Some(&ValidationError::NotLoggedIn));
        assert_eq!(last_route(&mut rx), Some(Route::Login));
    }

    #[test]
    fn test_require_session_with_expired_token() {
        let session = Arc::new(SessionStore::ephemeral());
        session
            .persist(Session {
                token: SecretString::from(jwt(1_000)),
                user_id: UserId::new("u1"),
                email: "crio@example.com".into(),
                username: "crio.do".into(),
                wallet_balance: Money::from_minor(100),
            })
            .unwrap();
        let (_, account, mut rx) = service(Arc::clone(&session));

        let err = account.require_session().unwrap_err();

        assert!(err.is_unauthenticated());
        assert!(!session.is_logged_in());
        assert_eq!(last_route(&mut rx), Some(Route::Login));
    }

    #[test]
    fn test_require_session_live() {
        let (_, account, _rx) = service(logged_in_session(100));
        assert!(account.require_session().is_ok());
    }

    #[tokio::test]
    async fn test_delete_account_failure_keeps_session() {
        let session = logged_in_session(100);
        let (gateway, account, _rx) = service(Arc::clone(&session));
        gateway.fail_once(Op::DeleteUser, Failure::Application("Cannot delete user"));

        account.delete_account().await.unwrap_err();
        assert!(session.is_logged_in());

        account.delete_account().await.unwrap();
        assert!(gateway.is_deleted());
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn test_profile_requires_login() {
        let (gateway, account, _rx) = service(Arc::new(SessionStore::ephemeral()));

        let err = account.profile().await.unwrap_err();

        assert_eq!(err.validation(), Some(&ValidationError::NotLoggedIn));
        assert_eq!(gateway.calls().get_user, 0);
    }
}
