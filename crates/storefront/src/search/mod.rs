//! Product catalog and search-as-you-type filtering.
//!
//! The catalog is fetched once and published over a `watch` channel so the
//! cart can resolve its lines against it. Keystrokes are debounced; an
//! explicit submit filters immediately and drops any pending keystroke.

mod debounce;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, instrument};

use cartsync_core::{Product, ProductId};

use crate::error::Result;
use crate::events::{EventSink, InFlight, Liveness};
use crate::gateway::StoreGateway;
use crate::services::session::SessionStore;

pub use debounce::Debouncer;

/// Shown when the service lists no products at all.
pub const EMPTY_CATALOG_MESSAGE: &str = "No products found in the database";

/// Immutable snapshot of the product catalog.
///
/// Cloning shares the underlying list.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Arc<[Product]>,
}

impl Catalog {
    #[must_use]
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: products.into(),
        }
    }

    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    #[must_use]
    pub fn find(&self, id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|p| &p.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Products whose name or category contains `query`, ignoring case.
///
/// A blank query matches everything.
#[must_use]
pub fn filter_products(products: &[Product], query: &str) -> Vec<Product> {
    let needle = query.trim().to_uppercase();
    if needle.is_empty() {
        return products.to_vec();
    }
    products
        .iter()
        .filter(|p| p.matches_upper(&needle))
        .cloned()
        .collect()
}

/// The filtered view most recently computed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub query: String,
    pub products: Vec<Product>,
}

struct SearchState {
    catalog: watch::Sender<Catalog>,
    results: watch::Sender<SearchResults>,
    liveness: Liveness,
}

impl SearchState {
    fn apply(&self, query: &str) -> Vec<Product> {
        let catalog = self.catalog.borrow().clone();
        let products = filter_products(catalog.products(), query);
        if self.liveness.is_live() {
            self.results.send_replace(SearchResults {
                query: query.to_owned(),
                products: products.clone(),
            });
        }
        products
    }

    fn current_query(&self) -> String {
        self.results.borrow().query.clone()
    }
}

/// Catalog holder and debounced filter.
pub struct ProductSearch<G> {
    gateway: G,
    session: Arc<SessionStore>,
    events: EventSink,
    state: Arc<SearchState>,
    debouncer: Debouncer,
    loading: InFlight,
    last_error: RwLock<Option<String>>,
}

impl<G: StoreGateway> ProductSearch<G> {
    #[must_use]
    pub fn new(
        gateway: G,
        session: Arc<SessionStore>,
        events: EventSink,
        debounce: Duration,
    ) -> Self {
        let (catalog, _) = watch::channel(Catalog::default());
        let (results, _) = watch::channel(SearchResults::default());
        Self {
            gateway,
            session,
            events,
            state: Arc::new(SearchState {
                catalog,
                results,
                liveness: Liveness::new(),
            }),
            debouncer: Debouncer::new(debounce),
            loading: InFlight::default(),
            last_error: RwLock::new(None),
        }
    }

    /// Fetch the catalog and re-run the current query against it.
    ///
    /// On failure, or when the service lists nothing, the previous catalog
    /// is kept. Returns the number of products now listed.
    ///
    /// # Errors
    ///
    /// Returns the gateway error after surfacing it.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<usize> {
        let result = {
            let _loading = self.loading.begin();
            self.gateway.list_products().await
        };

        let products = match result {
            Ok(products) => products,
            Err(e) => {
                self.events.surface_in("fetch products", &e, &self.session);
                *self.last_error.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(e.user_message());
                return Err(e);
            }
        };

        if !self.state.liveness.is_live() {
            debug!("Search detached; dropping fetched catalog");
            return Ok(self.catalog().len());
        }

        if products.is_empty() {
            self.events.error(EMPTY_CATALOG_MESSAGE);
            return Ok(self.catalog().len());
        }

        let count = products.len();
        self.state.catalog.send_replace(Catalog::new(products));
        *self.last_error.write().unwrap_or_else(PoisonError::into_inner) = None;
        let query = self.state.current_query();
        self.state.apply(&query);
        info!(count, "Catalog loaded");
        Ok(count)
    }

    /// Filter the full catalog right now.
    pub fn filter(&self, query: &str) -> Vec<Product> {
        self.state.apply(query)
    }

    /// Keystroke: filter once input has been quiet for the debounce window.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_input(&self, query: impl Into<String>) {
        let query = query.into();
        let state = Arc::clone(&self.state);
        self.debouncer.schedule(async move {
            state.apply(&query);
        });
    }

    /// Explicit submit: cancel any pending keystroke and filter now.
    pub fn submit(&self, query: &str) -> Vec<Product> {
        self.debouncer.cancel();
        self.filter(query)
    }

    /// Most recent filtered view.
    #[must_use]
    pub fn results(&self) -> SearchResults {
        self.state.results.borrow().clone()
    }

    #[must_use]
    pub fn catalog(&self) -> Catalog {
        self.state.catalog.borrow().clone()
    }

    /// Receiver that observes every published catalog.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Catalog> {
        self.state.catalog.subscribe()
    }

    /// Receiver that observes every filtered view.
    #[must_use]
    pub fn subscribe_results(&self) -> watch::Receiver<SearchResults> {
        self.state.results.subscribe()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.is_active()
    }

    /// Message from the last failed [`Self::load`], cleared on success.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The owning view is gone: drop pending keystrokes and late results.
    pub fn detach(&self) {
        self.state.liveness.detach();
        self.debouncer.cancel();
    }
}
