//! Notices and navigation requests emitted for the presentation layer.
//!
//! Components never render anything themselves. They push [`UiEvent`]s into
//! an [`EventSink`] and whoever owns the receiving end (a terminal, a test)
//! decides what to show.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::{StoreError, ValidationError};
use crate::services::session::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A short message for the shopper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Screens the presentation layer can be asked to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Products,
    Checkout,
    OrderConfirmation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Notify(Notice),
    Navigate(Route),
}

/// Sending half of the UI event channel.
///
/// Sending never blocks and never fails; events sent after the receiver is
/// gone are dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl EventSink {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A sink nobody listens to.
    #[must_use]
    pub fn detached() -> Self {
        Self::channel().0
    }

    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        self.send(UiEvent::Notify(Notice {
            level,
            message: message.into(),
        }));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Success, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Info, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Error, message);
    }

    pub fn navigate(&self, route: Route) {
        self.send(UiEvent::Navigate(route));
    }

    /// Report a failed operation.
    ///
    /// An unauthenticated failure logs the shopper out and sends them to the
    /// login screen. A missing login sends them there too; an empty cart at
    /// checkout sends them back to the products.
    pub fn surface(&self, err: &StoreError, session: &SessionStore) {
        self.report(err, session, None);
    }

    /// Like [`Self::surface`], but transport failures read
    /// "Could not {action}. Please try again!".
    pub fn surface_in(&self, action: &str, err: &StoreError, session: &SessionStore) {
        self.report(err, session, Some(action));
    }

    fn report(&self, err: &StoreError, session: &SessionStore, action: Option<&str>) {
        match err {
            StoreError::Unauthenticated { message } => {
                warn!(%message, "Service rejected credentials; ending session");
                if let Err(e) = session.invalidate() {
                    error!(error = %e, "Failed to clear session");
                }
                self.error(err.user_message());
                self.navigate(Route::Login);
            }
            StoreError::Validation(ValidationError::NotLoggedIn) => {
                debug!("Operation requires login");
                self.error(err.user_message());
                self.navigate(Route::Login);
            }
            StoreError::Validation(ValidationError::CartEmpty) => {
                self.error(err.user_message());
                self.navigate(Route::Products);
            }
            StoreError::Validation(v) => {
                debug!(reason = %v, "Rejected locally");
                self.error(err.user_message());
            }
            StoreError::Http(_) | StoreError::Parse(_) => {
                error!(error = %err, "Request failed");
                match action {
                    Some(action) => self.error(format!("Could not {action}. Please try again!")),
                    None => self.error(err.user_message()),
                }
            }
            StoreError::Application { status, code, .. } => {
                warn!(error = %err, ?status, ?code, "Service reported failure");
                self.error(err.user_message());
            }
            StoreError::Storage(_) => {
                error!(error = %err, "Local storage failure");
                self.error(err.user_message());
            }
        }
    }

    fn send(&self, event: UiEvent) {
        // a closed receiver just means nobody is watching
        let _ = self.tx.send(event);
    }
}

/// Whether the view that started an operation is still around.
///
/// Async completions check this before touching shared state so results
/// arriving after teardown are dropped instead of applied.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn detach(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Number of gateway calls in flight behind a component's loading flag.
#[derive(Debug, Default)]
pub(crate) struct InFlight(AtomicUsize);

impl InFlight {
    /// Count a call until the returned guard drops.
    #[must_use]
    pub(crate) fn begin(&self) -> InFlightGuard<'_> {
        self.0.fetch_add(1, Ordering::AcqRel);
        InFlightGuard(&self.0)
    }

    pub(crate) fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire) > 0
    }
}

pub(crate) struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
