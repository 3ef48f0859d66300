//! The storefront as one handle.
//!
//! [`Storefront`] owns one instance of every component, wired to a shared
//! gateway, session store and event sink. Front ends hold a `Storefront`
//! and drain the event receiver; they never construct components directly.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};

use crate::cart::CartEngine;
use crate::checkout::CheckoutOrchestrator;
use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::events::EventSink;
use crate::gateway::{HttpGateway, StoreGateway};
use crate::search::ProductSearch;
use crate::services::account::AccountService;
use crate::services::preferences::PreferenceStore;
use crate::services::session::SessionStore;

/// Tunables passed to [`Storefront::assemble`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_line_quantity: u32,
    pub search_debounce: Duration,
}

impl From<&StorefrontConfig> for Limits {
    fn from(config: &StorefrontConfig) -> Self {
        Self {
            max_line_quantity: config.max_line_quantity,
            search_debounce: config.search_debounce,
        }
    }
}

/// Storefront handle shared by the presentation layer.
///
/// Cheaply cloneable via `Arc`.
pub struct Storefront<G = HttpGateway> {
    inner: Arc<StorefrontInner<G>>,
}

impl<G> Clone for Storefront<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct StorefrontInner<G> {
    gateway: G,
    session: Arc<SessionStore>,
    preferences: PreferenceStore,
    events: EventSink,
    search: ProductSearch<G>,
    cart: Arc<CartEngine<G>>,
    checkout: CheckoutOrchestrator<G>,
    account: AccountService<G>,
}

impl Storefront<HttpGateway> {
    /// Open the stores in `config.data_dir` and talk to `config.api_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &StorefrontConfig, events: EventSink) -> Result<Self> {
        let session = Arc::new(SessionStore::open(&config.data_dir));
        let preferences = PreferenceStore::open(&config.data_dir);
        let gateway = HttpGateway::new(config, Arc::clone(&session))?;
        info!(
            api_url = %config.api_url,
            data_dir = %config.data_dir.display(),
            "Storefront opened"
        );
        Ok(Self::assemble(
            gateway,
            session,
            preferences,
            events,
            Limits::from(config),
        ))
    }
}

impl<G: StoreGateway + Clone> Storefront<G> {
    /// Wire the components around an existing gateway and stores.
    #[must_use]
    pub fn assemble(
        gateway: G,
        session: Arc<SessionStore>,
        preferences: PreferenceStore,
        events: EventSink,
        limits: Limits,
    ) -> Self {
        let search = ProductSearch::new(
            gateway.clone(),
            Arc::clone(&session),
            events.clone(),
            limits.search_debounce,
        );
        let cart = Arc::new(CartEngine::new(
            gateway.clone(),
            Arc::clone(&session),
            events.clone(),
            search.subscribe(),
            limits.max_line_quantity,
        ));
        let checkout = CheckoutOrchestrator::new(
            gateway.clone(),
            Arc::clone(&cart),
            Arc::clone(&session),
            events.clone(),
        );
        let account = AccountService::new(gateway.clone(), Arc::clone(&session), events.clone());

        Self {
            inner: Arc::new(StorefrontInner {
                gateway,
                session,
                preferences,
                events,
                search,
                cart,
                checkout,
                account,
            }),
        }
    }

    /// Load the catalog, then the cart when logged in.
    ///
    /// # Errors
    ///
    /// Returns the first failing load. Both failures have already been
    /// surfaced on the event channel.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> Result<()> {
        self.inner.search.load().await?;
        if self.inner.session.is_logged_in() {
            self.inner.cart.refresh().await?;
        }
        Ok(())
    }

    /// Stop applying late results; the views are going away.
    pub fn detach(&self) {
        self.inner.search.detach();
        self.inner.cart.detach();
    }

    // =========================================================================
    // Components
    // =========================================================================

    #[must_use]
    pub fn gateway(&self) -> &G {
        &self.inner.gateway
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn preferences(&self) -> &PreferenceStore {
        &self.inner.preferences
    }

    #[must_use]
    pub fn events(&self) -> &EventSink {
        &self.inner.events
    }

    #[must_use]
    pub fn search(&self) -> &ProductSearch<G> {
        &self.inner.search
    }

    #[must_use]
    pub fn cart(&self) -> &CartEngine<G> {
        &self.inner.cart
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutOrchestrator<G> {
        &self.inner.checkout
    }

    #[must_use]
    pub fn account(&self) -> &AccountService<G> {
        &self.inner.account
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartsync_core::{Money, ProductId, ThemeMode};
    use url::Url;

    use super::*;
    use crate::testing::{FakeGateway, Failure, Op, logged_in_session, product};

    const LIMITS: Limits = Limits {
        max_line_quantity: 10,
        search_debounce: Duration::from_millis(300),
    };

    fn storefront(session: Arc<SessionStore>) -> (FakeGateway, Storefront<FakeGateway>) {
        let gateway = FakeGateway::with_products(vec![
            product("p1", "Running Shoe", "Footwear", 500),
            product("p2", "Hat", "Accessory", 300),
        ]);
        let store = Storefront::assemble(
            gateway.clone(),
            session,
            PreferenceStore::ephemeral(),
            EventSink::detached(),
            LIMITS,
        );
        (gateway, store)
    }

    #[tokio::test]
    async fn test_bootstrap_loads_catalog_then_cart() {
        let (gateway, store) = storefront(logged_in_session(5000));
        gateway.seed_cart(&[("p1", 2)]);

        store.bootstrap().await.unwrap();

        assert_eq!(store.search().catalog().len(), 2);
        assert_eq!(store.cart().compute_total(), Money::from_minor(1000));
    }

    #[tokio::test]
    async fn test_bootstrap_logged_out_skips_cart() {
        let (gateway, store) = storefront(Arc::new(SessionStore::ephemeral()));

        store.bootstrap().await.unwrap();

        assert_eq!(gateway.calls().get_cart, 0);
    }

    #[tokio::test]
    async fn test_catalog_reaches_cart_engine() {
        let (_, store) = storefront(logged_in_session(5000));
        store.search().load().await.unwrap();

        store.cart().add(&ProductId::new("p2"), 1).await.unwrap();

        assert_eq!(store.cart().compute_total(), Money::from_minor(300));
    }

    #[tokio::test]
    async fn test_unauthenticated_keeps_theme() {
        let (gateway, store) = storefront(logged_in_session(5000));
        store.preferences().set_theme(ThemeMode::Dark).unwrap();
        gateway.fail_once(Op::GetCart, Failure::Unauthenticated);

        store.cart().refresh().await.unwrap_err();

        assert!(!store.session().is_logged_in());
        assert_eq!(store.preferences().theme(), ThemeMode::Dark);
    }

    #[tokio::test]
    async fn test_from_config_restores_nothing_in_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorefrontConfig::new(
            Url::parse("http://127.0.0.1:9/api/v1").unwrap(),
            dir.path(),
        );

        let store = Storefront::from_config(&config, EventSink::detached()).unwrap();

        assert!(!store.session().is_logged_in());
        assert_eq!(store.preferences().theme(), ThemeMode::Light);
        assert_eq!(store.gateway().base_url().as_str(), "http://127.0.0.1:9/api/v1/");
    }
}
