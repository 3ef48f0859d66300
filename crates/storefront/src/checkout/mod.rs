//! Order placement.
//!
//! # State machine
//!
//! ```text
//! Idle ──submit──▶ Submitting ──ok──▶ Succeeded
//!   ▲                  │                  │
//!   │                  └──err──▶ Failed   │
//!   └──── (any state but Submitting may submit again) ◀┘
//! ```
//!
//! Preconditions are checked and `Submitting` is entered under one lock,
//! before the first `.await`, so two submissions can never both reach the
//! service.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{Span, field, info, instrument, warn};
use uuid::Uuid;

use cartsync_core::Money;

use crate::cart::CartEngine;
use crate::error::{Result, StoreError, ValidationError};
use crate::events::{EventSink, Route};
use crate::gateway::StoreGateway;
use crate::services::session::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// What a successful submission did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderReceipt {
    pub attempt_id: Uuid,
    /// Cart total at submission time.
    pub total: Money,
    /// Cached wallet balance after the debit.
    pub remaining_balance: Money,
}

struct Attempt {
    id: Uuid,
    total: Money,
}

/// Checkout orchestrator.
pub struct CheckoutOrchestrator<G> {
    gateway: G,
    cart: Arc<CartEngine<G>>,
    session: Arc<SessionStore>,
    events: EventSink,
    state: Mutex<CheckoutState>,
    address: RwLock<Option<String>>,
}

impl<G: StoreGateway> CheckoutOrchestrator<G> {
    #[must_use]
    pub fn new(
        gateway: G,
        cart: Arc<CartEngine<G>>,
        session: Arc<SessionStore>,
        events: EventSink,
    ) -> Self {
        Self {
            gateway,
            cart,
            session,
            events,
            state: Mutex::new(CheckoutState::Idle),
            address: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> CheckoutState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last fetched shipping address.
    #[must_use]
    pub fn address(&self) -> Option<String> {
        self.address
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // =========================================================================
    // Address
    // =========================================================================

    /// Fetch the shopper's shipping address.
    ///
    /// # Errors
    ///
    /// Returns an error if logged out or the gateway call fails.
    #[instrument(skip(self))]
    pub async fn load_address(&self) -> Result<Option<String>> {
        let user_id = self
            .session
            .user_id()
            .ok_or_else(|| self.fail("fetch addresses", ValidationError::NotLoggedIn.into()))?;

        let address = self
            .gateway
            .get_address(&user_id)
            .await
            .map_err(|e| self.fail("fetch addresses", e))?;

        *self.address.write().unwrap_or_else(PoisonError::into_inner) = address.clone();
        Ok(address)
    }

    /// Save a new shipping address and read it back.
    ///
    /// # Errors
    ///
    /// Returns a validation error for blank input, otherwise any error from
    /// the save or the re-fetch.
    #[instrument(skip(self, address))]
    pub async fn save_address(&self, address: &str) -> Result<Option<String>> {
        let address = address.trim();
        if address.is_empty() {
            return Err(self.fail("add a new address", ValidationError::AddressBlank.into()));
        }
        let user_id = self
            .session
            .user_id()
            .ok_or_else(|| self.fail("add a new address", ValidationError::NotLoggedIn.into()))?;

        self.gateway
            .set_address(&user_id, address)
            .await
            .map_err(|e| self.fail("add a new address", e))?;

        self.events.success("Address added");
        self.load_address().await
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Place the order for the current cart.
    ///
    /// On success the cached balance is debited by the cart total, the
    /// shopper is sent to the confirmation view and the local cart is
    /// cleared, in that order.
    ///
    /// # Errors
    ///
    /// Returns a validation error without calling the service when a
    /// submission is already in flight, the cart is empty, no address is
    /// set, or the total exceeds the cached balance. Gateway errors move the
    /// machine to `Failed`.
    #[instrument(skip(self), fields(attempt_id = field::Empty))]
    pub async fn submit(&self) -> Result<OrderReceipt> {
        let attempt = self
            .begin()
            .map_err(|e| self.fail("place the order", e.into()))?;
        Span::current().record("attempt_id", field::display(attempt.id));
        info!(total = %attempt.total, "Placing order");

        match self.gateway.checkout().await {
            Ok(()) => Ok(self.succeed(&attempt)),
            Err(e) => {
                self.set_state(CheckoutState::Failed);
                warn!(error = %e, "Order rejected");
                Err(self.fail("place the order", e))
            }
        }
    }

    fn begin(&self) -> std::result::Result<Attempt, ValidationError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == CheckoutState::Submitting {
            return Err(ValidationError::CheckoutInProgress);
        }
        if !self.session.is_logged_in() {
            return Err(ValidationError::NotLoggedIn);
        }

        let cart = self.cart.view();
        if cart.is_empty() {
            return Err(ValidationError::CartEmpty);
        }
        let total = cart.total();
        let balance = self.session.balance().unwrap_or_default();
        if total > balance {
            return Err(ValidationError::InsufficientBalance { total, balance });
        }
        if self.address().is_none() {
            return Err(ValidationError::AddressRequired);
        }

        *state = CheckoutState::Submitting;
        Ok(Attempt {
            id: Uuid::new_v4(),
            total,
        })
    }

    fn succeed(&self, attempt: &Attempt) -> OrderReceipt {
        let remaining_balance = self.session.debit(attempt.total).unwrap_or_else(|| {
            warn!("Session ended while the order was in flight");
            Money::ZERO
        });
        self.set_state(CheckoutState::Succeeded);
        info!(remaining = %remaining_balance, "Order placed");

        self.events.success("Order placed");
        self.events.navigate(Route::OrderConfirmation);
        self.cart.clear();

        OrderReceipt {
            attempt_id: attempt.id,
            total: attempt.total,
            remaining_balance,
        }
    }

    fn set_state(&self, next: CheckoutState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn fail(&self, action: &str, err: StoreError) -> StoreError {
        self.events.surface_in(action, &err, &self.session);
        err
    }
}
