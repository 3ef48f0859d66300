//! Client-side cart kept in step with the server cart.
//!
//! Every mutation goes to the service first and is followed by a refresh,
//! so local state only ever holds what the server last reported. Lines are
//! stored by product id and resolved against the catalog at view time.

mod view;

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use cartsync_core::{Money, ProductId};

use crate::error::{Result, StoreError, ValidationError};
use crate::events::{EventSink, InFlight, InFlightGuard, Liveness};
use crate::gateway::{CartItem, StoreGateway};
use crate::search::Catalog;
use crate::services::session::SessionStore;

pub use view::{CartLineView, CartView, EMPTY_CART_MESSAGE};

/// Cart engine.
pub struct CartEngine<G> {
    gateway: G,
    session: Arc<SessionStore>,
    events: EventSink,
    catalog: watch::Receiver<Catalog>,
    liveness: Liveness,
    max_line_quantity: u32,
    lines: RwLock<BTreeMap<ProductId, u32>>,
    pending_adds: Mutex<HashSet<ProductId>>,
    in_flight: InFlight,
    refresh_gate: tokio::sync::Mutex<Fetched>,
    refresh_tickets: AtomicU64,
}

/// Last server cart fetch: the highest refresh ticket it covered and
/// whether it succeeded.
#[derive(Debug, Default)]
struct Fetched {
    covers: u64,
    ok: bool,
}

impl<G: StoreGateway> CartEngine<G> {
    #[must_use]
    pub fn new(
        gateway: G,
        session: Arc<SessionStore>,
        events: EventSink,
        catalog: watch::Receiver<Catalog>,
        max_line_quantity: u32,
    ) -> Self {
        Self {
            gateway,
            session,
            events,
            catalog,
            liveness: Liveness::new(),
            max_line_quantity,
            lines: RwLock::new(BTreeMap::new()),
            pending_adds: Mutex::new(HashSet::new()),
            in_flight: InFlight::default(),
            refresh_gate: tokio::sync::Mutex::new(Fetched::default()),
            refresh_tickets: AtomicU64::new(0),
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Replace local lines with the server cart.
    ///
    /// Refreshes never overlap. A call made while one is in flight waits
    /// for it; calls queued behind the same fetch share the next one. Every
    /// call returns only once a fetch started after the call succeeded, or
    /// with the error of its own fetch, so a write followed by `refresh` is
    /// always reflected when `Ok` comes back.
    ///
    /// # Errors
    ///
    /// Returns the gateway error after surfacing it; local lines are kept.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        let ticket = self.refresh_tickets.fetch_add(1, Ordering::AcqRel) + 1;
        let mut last = self.refresh_gate.lock().await;
        if last.ok && last.covers >= ticket {
            debug!(ticket, "Covered by a completed refresh");
            return Ok(());
        }

        let covers = self.refresh_tickets.load(Ordering::Acquire);
        let fetched = {
            let _loading = self.begin_loading();
            self.gateway.get_cart().await
        };
        last.covers = covers;
        last.ok = fetched.is_ok();
        match fetched {
            Ok(items) => {
                self.apply(items);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn apply(&self, items: Vec<CartItem>) {
        if !self.liveness.is_live() {
            debug!("Cart detached; dropping server cart");
            return;
        }

        let lines: BTreeMap<ProductId, u32> = items
            .into_iter()
            .filter(|item| item.quantity > 0)
            .map(|item| (item.product_id, item.quantity))
            .collect();

        let catalog = self.catalog.borrow().clone();
        let stale = lines.keys().filter(|id| catalog.find(id).is_none()).count();
        if stale > 0 && !catalog.is_empty() {
            warn!(stale, "Cart lines reference products missing from the catalog");
        }

        debug!(lines = lines.len(), "Cart replaced");
        *self.lines.write().unwrap_or_else(PoisonError::into_inner) = lines;
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a product that is not in the cart yet.
    ///
    /// # Errors
    ///
    /// Returns a validation error without calling the service when logged
    /// out, when the product is unknown or already in the cart, or when the
    /// quantity is outside `1..=max_line_quantity`. Gateway errors are
    /// surfaced and returned.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let _pending = self
            .begin_add(product_id, quantity)
            .map_err(|e| self.fail(e.into()))?;

        let written = {
            let _loading = self.begin_loading();
            self.gateway.upsert_cart_item(product_id, quantity).await
        };
        written.map_err(|e| self.fail(e))?;

        info!(quantity, "Added to cart");
        self.refresh().await
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns a validation error without calling the service when logged
    /// out or when `quantity` exceeds `max_line_quantity`. Gateway errors are
    /// surfaced and returned.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn set_quantity(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        self.check_logged_in()
            .and_then(|()| self.check_quantity(quantity, 0))
            .map_err(|e| self.fail(e.into()))?;

        let written = {
            let _loading = self.begin_loading();
            self.gateway.set_cart_item(product_id, quantity).await
        };
        written.map_err(|e| self.fail(e))?;

        debug!(quantity, "Quantity set");
        self.refresh().await
    }

    /// Forget local lines. Used once an order has emptied the server cart.
    pub fn clear(&self) {
        self.lines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// The owning view is gone; late results are ignored from now on.
    pub fn detach(&self) {
        self.liveness.detach();
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[must_use]
    pub fn view(&self) -> CartView {
        let catalog = self.catalog.borrow().clone();
        let lines = self.lines.read().unwrap_or_else(PoisonError::into_inner);
        CartView::resolve(&lines, &catalog)
    }

    /// Sum of `cost * quantity` over lines found in the catalog.
    #[must_use]
    pub fn compute_total(&self) -> Money {
        self.view().total()
    }

    /// Units across lines found in the catalog.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.view().item_count()
    }

    /// Raw quantity the server reported for `product_id`.
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> Option<u32> {
        self.lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(product_id)
            .copied()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_active()
    }

    #[must_use]
    pub const fn max_line_quantity(&self) -> u32 {
        self.max_line_quantity
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn begin_add(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> std::result::Result<PendingAdd<'_>, ValidationError> {
        self.check_logged_in()?;
        self.check_quantity(quantity, 1)?;
        if self.catalog.borrow().find(product_id).is_none() {
            return Err(ValidationError::UnknownProduct(product_id.clone()));
        }

        let in_cart = self
            .lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(product_id);
        let mut pending = self
            .pending_adds
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if in_cart || !pending.insert(product_id.clone()) {
            return Err(ValidationError::AlreadyInCart(product_id.clone()));
        }

        Ok(PendingAdd {
            set: &self.pending_adds,
            product_id: product_id.clone(),
        })
    }

    fn check_logged_in(&self) -> std::result::Result<(), ValidationError> {
        if self.session.is_logged_in() {
            Ok(())
        } else {
            Err(ValidationError::NotLoggedIn)
        }
    }

    fn check_quantity(&self, quantity: u32, min: u32) -> std::result::Result<(), ValidationError> {
        if (min..=self.max_line_quantity).contains(&quantity) {
            Ok(())
        } else {
            Err(ValidationError::QuantityOutOfRange {
                quantity,
                min,
                max: self.max_line_quantity,
            })
        }
    }

    fn begin_loading(&self) -> InFlightGuard<'_> {
        self.in_flight.begin()
    }

    fn fail(&self, err: StoreError) -> StoreError {
        self.events.surface_in("update cart", &err, &self.session);
        err
    }
}

/// Marks a product as being added until the add finishes.
struct PendingAdd<'a> {
    set: &'a Mutex<HashSet<ProductId>>,
    product_id: ProductId,
}

impl Drop for PendingAdd<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.product_id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::events::{Route, UiEvent};
    use crate::testing::{FakeGateway, Failure, Op, logged_in_session, product};

    struct Harness {
        gateway: FakeGateway,
        session: Arc<SessionStore>,
        engine: CartEngine<FakeGateway>,
        events: mpsc::UnboundedReceiver<UiEvent>,
        _catalog: watch::Sender<Catalog>,
    }

    fn harness() -> Harness {
        let gateway = FakeGateway::with_products(vec![
            product("p1", "Running Shoe", "Footwear", 500),
            product("p2", "Hat", "Accessory", 300),
        ]);
        let session = logged_in_session(5000);
        let (catalog_tx, catalog_rx) = watch::channel(Catalog::new(gateway.products()));
        let (sink, events) = EventSink::channel();
        let engine = CartEngine::new(gateway.clone(), Arc::clone(&session), sink, catalog_rx, 10);
        Harness {
            gateway,
            session,
            engine,
            events,
            _catalog: catalog_tx,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn p(id: &str) -> ProductId {
        ProductId::new(id)
    }

    #[tokio::test]
    async fn test_add_then_refresh_shows_line() {
        let h = harness();

        h.engine.add(&p("p1"), 2).await.unwrap();

        assert_eq!(h.engine.quantity_of(&p("p1")), Some(2));
        assert_eq!(h.engine.compute_total(), Money::from_minor(1000));
        assert_eq!(h.engine.item_count(), 2);
        let calls = h.gateway.calls();
        assert_eq!(calls.upsert_cart_item, 1);
        assert_eq!(calls.get_cart, 1);
    }

    #[tokio::test]
    async fn test_duplicate_add_is_rejected() {
        let h = harness();

        h.engine.add(&p("p1"), 1).await.unwrap();
        let err = h.engine.add(&p("p1"), 3).await.unwrap_err();

        assert_eq!(
            err.validation(),
            Some(&ValidationError::AlreadyInCart(p("p1")))
        );
        assert_eq!(h.gateway.calls().upsert_cart_item, 1);
        assert_eq!(h.engine.quantity_of(&p("p1")), Some(1));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_add_sends_one_request() {
        let h = harness();

        let p2 = p("p2");

        let (first, second) = tokio::join!(h.engine.add(&p2, 1), h.engine.add(&p2, 1));

        assert!(first.is_ok() ^ second.is_ok());
        assert_eq!(h.gateway.calls().upsert_cart_item, 1);
    }

    #[tokio::test]
    async fn test_add_requires_login() {
        let mut h = harness();
        h.session.invalidate().unwrap();

        let err = h.engine.add(&p("p1"), 1).await.unwrap_err();

        assert_eq!(err.validation(), Some(&ValidationError::NotLoggedIn));
        assert_eq!(h.gateway.calls().upsert_cart_item, 0);
        assert!(drain(&mut h.events).contains(&UiEvent::Navigate(Route::Login)));
    }

    #[tokio::test]
    async fn test_add_validates_product_and_quantity() {
        let h = harness();

        let unknown = h.engine.add(&p("nope"), 1).await.unwrap_err();
        assert_eq!(
            unknown.validation(),
            Some(&ValidationError::UnknownProduct(p("nope")))
        );

        for quantity in [0, 11] {
            let err = h.engine.add(&p("p1"), quantity).await.unwrap_err();
            assert!(matches!(
                err.validation(),
                Some(ValidationError::QuantityOutOfRange { .. })
            ));
        }
        assert_eq!(h.gateway.calls().upsert_cart_item, 0);
    }

    #[tokio::test]
    async fn test_set_quantity_zero_removes_line() {
        let h = harness();
        h.engine.add(&p("p1"), 2).await.unwrap();

        h.engine.set_quantity(&p("p1"), 0).await.unwrap();

        assert_eq!(h.engine.quantity_of(&p("p1")), None);
        assert!(h.engine.view().is_empty());
        assert_eq!(h.engine.compute_total(), Money::ZERO);
    }

    #[tokio::test]
    async fn test_set_quantity_above_limit_is_rejected() {
        let h = harness();
        h.engine.add(&p("p1"), 2).await.unwrap();

        let err = h.engine.set_quantity(&p("p1"), 11).await.unwrap_err();

        assert!(matches!(
            err.validation(),
            Some(ValidationError::QuantityOutOfRange { max: 10, .. })
        ));
        assert_eq!(h.gateway.calls().set_cart_item, 0);
    }

    #[tokio::test]
    async fn test_unauthenticated_write_logs_out() {
        let mut h = harness();
        h.engine.add(&p("p1"), 1).await.unwrap();
        h.gateway.fail_once(Op::SetCartItem, Failure::Unauthenticated);

        let err = h.engine.set_quantity(&p("p1"), 4).await.unwrap_err();

        assert!(err.is_unauthenticated());
        assert!(!h.session.is_logged_in());
        assert!(drain(&mut h.events).contains(&UiEvent::Navigate(Route::Login)));
        assert_eq!(h.engine.quantity_of(&p("p1")), Some(1));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_good_cart() {
        let h = harness();
        h.engine.add(&p("p1"), 2).await.unwrap();
        h.gateway.fail_once(Op::GetCart, Failure::Transport);

        assert!(h.engine.refresh().await.is_err());

        assert_eq!(h.engine.quantity_of(&p("p1")), Some(2));
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_run_one_at_a_time() {
        let h = harness();
        h.gateway.seed_cart(&[("p1", 1)]);
        let gate = h.gateway.hold_next(Op::GetCart);

        let (first, second, ()) = tokio::join!(h.engine.refresh(), h.engine.refresh(), async {
            tokio::task::yield_now().await;
            assert!(h.engine.is_loading());
            h.gateway.seed_cart(&[("p1", 3)]);
            gate.notify_one();
        });

        first.unwrap();
        second.unwrap();
        assert_eq!(h.gateway.calls().get_cart, 2);
        assert_eq!(h.gateway.max_concurrent_get_cart(), 1);
        assert_eq!(h.engine.quantity_of(&p("p1")), Some(3));
        assert!(!h.engine.is_loading());
    }

    #[tokio::test]
    async fn test_refresh_queued_behind_fetch_shares_next_fetch() {
        let h = harness();
        let gate = h.gateway.hold_next(Op::GetCart);

        let (first, second, third, ()) = tokio::join!(
            h.engine.refresh(),
            h.engine.refresh(),
            h.engine.refresh(),
            async {
                tokio::task::yield_now().await;
                gate.notify_one();
            }
        );

        first.unwrap();
        second.unwrap();
        third.unwrap();
        assert_eq!(h.gateway.calls().get_cart, 2);
    }

    #[tokio::test]
    async fn test_write_during_refresh_is_reflected_on_return() {
        let h = harness();
        h.engine.add(&p("p1"), 2).await.unwrap();
        let gate = h.gateway.hold_next(Op::GetCart);

        let (first, written, ()) = tokio::join!(
            h.engine.refresh(),
            async {
                let result = h.engine.set_quantity(&p("p1"), 0).await;
                (result, h.engine.quantity_of(&p("p1")))
            },
            async {
                tokio::task::yield_now().await;
                gate.notify_one();
            }
        );

        first.unwrap();
        let (result, quantity) = written;
        result.unwrap();
        assert_eq!(quantity, None);
        assert_eq!(h.gateway.max_concurrent_get_cart(), 1);
    }

    #[tokio::test]
    async fn test_write_during_refresh_reports_failed_follow_up() {
        let h = harness();
        let p1 = p("p1");
        h.engine.add(&p1, 2).await.unwrap();
        let gate = h.gateway.hold_next(Op::GetCart);

        let (first, second, ()) = tokio::join!(
            h.engine.refresh(),
            h.engine.set_quantity(&p1, 1),
            async {
                tokio::task::yield_now().await;
                h.gateway.fail_once(Op::GetCart, Failure::Transport);
                gate.notify_one();
            }
        );

        first.unwrap();
        assert!(second.unwrap_err().is_transport());
        assert_eq!(h.gateway.server_cart().get(&p1), Some(&1));
    }

    #[tokio::test]
    async fn test_detached_engine_ignores_results() {
        let h = harness();
        h.gateway.seed_cart(&[("p1", 1)]);
        h.engine.detach();

        h.engine.refresh().await.unwrap();

        assert_eq!(h.engine.quantity_of(&p("p1")), None);
    }

    #[tokio::test]
    async fn test_stale_line_excluded_from_total() {
        let h = harness();
        h.gateway.seed_cart(&[("p1", 2), ("retired", 5)]);

        h.engine.refresh().await.unwrap();

        assert_eq!(h.engine.quantity_of(&p("retired")), Some(5));
        assert_eq!(h.engine.item_count(), 2);
        assert_eq!(h.engine.compute_total(), Money::from_minor(1000));
    }

    #[tokio::test]
    async fn test_clear_empties_view() {
        let h = harness();
        h.engine.add(&p("p2"), 1).await.unwrap();

        h.engine.clear();

        assert!(h.engine.view().is_empty());
    }
}
