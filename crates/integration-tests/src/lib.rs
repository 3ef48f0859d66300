//! Integration tests for cartsync.
//!
//! [`StubService`] is an in-process `axum` imitation of the remote store
//! service, bound to an ephemeral port. Tests point a real
//! [`Storefront`](cartsync_storefront::Storefront) at it and drive the
//! whole stack over HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartsync-integration-tests
//! ```
//!
//! # Stub Behaviour
//!
//! - Accepts one account (`crio@example.com` / `learnwithcrio`) with a
//!   wallet of 5000 minor units
//! - Rejects any bearer token other than [`TOKEN`] with `401`
//! - Reports an unset address as `ADDRESS_NOT_SET`
//! - Checkout fails with a `{message}` body when the cart is empty, no
//!   address is set, or the wallet is short

use std::collections::BTreeMap;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use cartsync_storefront::config::StorefrontConfig;
use cartsync_storefront::events::{EventSink, UiEvent};
use cartsync_storefront::{Result as StoreResult, Storefront};

pub const USER_ID: &str = "6148f0a1c6f1b2e3a4d5e6f7";
pub const EMAIL: &str = "crio@example.com";
pub const PASSWORD: &str = "learnwithcrio";
pub const STARTING_BALANCE: i64 = 5000;

/// The only bearer token the stub accepts. Expires in 2100.
pub static TOKEN: std::sync::LazyLock<String> = std::sync::LazyLock::new(|| {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{USER_ID}","exp":4102444800}}"#));
    format!("{header}.{payload}.stub")
});

// =============================================================================
// Stub State
// =============================================================================

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RequestCounts {
    pub total: usize,
    pub cart_posts: usize,
    pub checkouts: usize,
}

struct StubState {
    products: Vec<Value>,
    cart: BTreeMap<String, u32>,
    address: Option<String>,
    balance: i64,
    orders: Vec<Value>,
    counts: RequestCounts,
    revoked: bool,
    deleted: bool,
    /// Answer every request with `200 {message}` instead.
    soft_failure: Option<String>,
}

type Shared = Arc<Mutex<StubState>>;

fn lock(state: &Shared) -> MutexGuard<'_, StubState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn product(id: &str, name: &str, category: &str, cost: i64, rating: i64) -> Value {
    json!({
        "_id": id,
        "name": name,
        "category": category,
        "cost": cost,
        "rating": rating,
        "image": format!("https://images.example.com/{id}.png"),
    })
}

/// Catalog served by default: `p1` Running Shoe 500, `p2` Hat 300,
/// `p3` Yoga Mat 4800.
fn default_products() -> Vec<Value> {
    vec![
        product("p1", "Running Shoe", "Footwear", 500, 4),
        product("p2", "Hat", "Accessory", 300, 3),
        product("p3", "Yoga Mat", "Fitness", 4800, 5),
    ]
}

// =============================================================================
// StubService
// =============================================================================

/// Running stub of the remote store service.
pub struct StubService {
    api_url: Url,
    state: Shared,
    server: JoinHandle<()>,
}

impl Drop for StubService {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl StubService {
    /// Bind to an ephemeral local port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn start() -> io::Result<Self> {
        let state: Shared = Arc::new(Mutex::new(StubState {
            products: default_products(),
            cart: BTreeMap::new(),
            address: None,
            balance: STARTING_BALANCE,
            orders: Vec::new(),
            counts: RequestCounts::default(),
            revoked: false,
            deleted: false,
            soft_failure: None,
        }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let api_url = Url::parse(&format!("http://{addr}/v1/")).map_err(io::Error::other)?;
        let app = routes(Arc::clone(&state));
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            api_url,
            state,
            server,
        })
    }

    /// Base URL clients should use.
    #[must_use]
    pub fn api_url(&self) -> Url {
        self.api_url.clone()
    }

    /// Storefront wired to this stub with its data kept in `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn storefront(
        &self,
        data_dir: &Path,
    ) -> StoreResult<(Storefront, mpsc::UnboundedReceiver<UiEvent>)> {
        let config = StorefrontConfig::new(self.api_url(), data_dir);
        let (events, rx) = EventSink::channel();
        Ok((Storefront::from_config(&config, events)?, rx))
    }

    /// Reject every token from now on.
    pub fn revoke_tokens(&self) {
        lock(&self.state).revoked = true;
    }

    /// Answer everything with `200 {"message": ..}`.
    pub fn fail_softly(&self, message: &str) {
        lock(&self.state).soft_failure = Some(message.to_owned());
    }

    pub fn set_products(&self, products: Vec<Value>) {
        lock(&self.state).products = products;
    }

    pub fn seed_cart(&self, lines: &[(&str, u32)]) {
        lock(&self.state).cart = lines
            .iter()
            .map(|(id, quantity)| ((*id).to_owned(), *quantity))
            .collect();
    }

    #[must_use]
    pub fn cart(&self) -> BTreeMap<String, u32> {
        lock(&self.state).cart.clone()
    }

    #[must_use]
    pub fn address(&self) -> Option<String> {
        lock(&self.state).address.clone()
    }

    #[must_use]
    pub fn balance(&self) -> i64 {
        lock(&self.state).balance
    }

    #[must_use]
    pub fn counts(&self) -> RequestCounts {
        lock(&self.state).counts
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        lock(&self.state).deleted
    }
}

// =============================================================================
// Routes
// =============================================================================

fn routes(state: Shared) -> Router {
    Router::new()
        .route("/v1/products", get(list_products))
        .route("/v1/cart", get(get_cart).post(add_to_cart).put(set_cart_line))
        .route("/v1/cart/checkout", put(checkout))
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/register", post(register))
        .route("/v1/orders", get(list_orders))
        .route(
            "/v1/users/{id}",
            get(get_user).put(put_user).delete(delete_user),
        )
        .with_state(state)
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "code": status.as_u16(), "message": message })),
    )
        .into_response()
}

/// Count the request and apply the stub-wide failure switches.
fn enter(state: &Shared) -> Result<(), Response> {
    let mut state = lock(state);
    state.counts.total += 1;
    match &state.soft_failure {
        Some(message) => Err((StatusCode::OK, Json(json!({ "message": message }))).into_response()),
        None => Ok(()),
    }
}

/// Bearer check for authenticated routes.
fn authorize(state: &Shared, headers: &HeaderMap) -> Result<(), Response> {
    enter(state)?;
    let expected = format!("Bearer {}", *TOKEN);
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if presented != Some(expected.as_str()) || lock(state).revoked {
        return Err(error(StatusCode::UNAUTHORIZED, "Please authenticate"));
    }
    Ok(())
}

fn cart_envelope(state: &StubState) -> Value {
    let items: Vec<Value> = state
        .cart
        .iter()
        .map(|(id, quantity)| {
            let product = state
                .products
                .iter()
                .find(|p| p["_id"] == id.as_str())
                .cloned()
                .unwrap_or(Value::Null);
            json!({ "productId": id, "quantity": quantity, "product": product })
        })
        .collect();
    json!({ "cartItems": items })
}

fn cart_total(state: &StubState) -> i64 {
    state
        .cart
        .iter()
        .filter_map(|(id, quantity)| {
            let product = state.products.iter().find(|p| p["_id"] == id.as_str())?;
            Some(product["cost"].as_i64()? * i64::from(*quantity))
        })
        .sum()
}

async fn list_products(State(state): State<Shared>) -> Response {
    if let Err(response) = enter(&state) {
        return response;
    }
    Json(Value::Array(lock(&state).products.clone())).into_response()
}

async fn get_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    Json(cart_envelope(&lock(&state))).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartLine {
    product_id: String,
    quantity: u32,
}

async fn add_to_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(line): Json<CartLine>,
) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    let mut state = lock(&state);
    state.counts.cart_posts += 1;
    if !state.products.iter().any(|p| p["_id"] == line.product_id.as_str()) {
        return error(StatusCode::BAD_REQUEST, "Product doesn't exist");
    }
    if state.cart.contains_key(&line.product_id) {
        return error(
            StatusCode::BAD_REQUEST,
            "Product already in cart. Use the cart sidebar to update or remove product from cart",
        );
    }
    state.cart.insert(line.product_id, line.quantity);
    Json(cart_envelope(&state)).into_response()
}

async fn set_cart_line(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(line): Json<CartLine>,
) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    let mut state = lock(&state);
    if line.quantity == 0 {
        state.cart.remove(&line.product_id);
        return StatusCode::NO_CONTENT.into_response();
    }
    if !state.cart.contains_key(&line.product_id) {
        return error(StatusCode::BAD_REQUEST, "Product not in cart");
    }
    state.cart.insert(line.product_id, line.quantity);
    Json(cart_envelope(&state)).into_response()
}

async fn checkout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    let mut state = lock(&state);
    state.counts.checkouts += 1;
    if state.cart.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Cart is empty");
    }
    if state.address.is_none() {
        return error(StatusCode::BAD_REQUEST, "Address not set");
    }
    let total = cart_total(&state);
    if total > state.balance {
        return error(
            StatusCode::BAD_REQUEST,
            "Wallet balance not sufficient to place order",
        );
    }

    state.balance -= total;
    let items: Vec<Value> = state
        .cart
        .iter()
        .filter_map(|(id, quantity)| {
            let product = state.products.iter().find(|p| p["_id"] == id.as_str())?;
            Some(json!({ "productId": id, "quantity": quantity, "product": product }))
        })
        .collect();
    let order = json!({
        "_id": format!("order-{}", state.orders.len() + 1),
        "createdAt": chrono::Utc::now().to_rfc3339(),
        "orderItems": items,
    });
    state.orders.push(order);
    state.cart.clear();
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn login(State(state): State<Shared>, Json(credentials): Json<Credentials>) -> Response {
    if let Err(response) = enter(&state) {
        return response;
    }
    if credentials.email != EMAIL || credentials.password != PASSWORD {
        return error(StatusCode::UNAUTHORIZED, "Incorrect email or password");
    }
    let state = lock(&state);
    Json(json!({
        "tokens": { "access": { "token": TOKEN.as_str(), "expires": "2100-01-01T00:00:00.000Z" } },
        "user": {
            "_id": USER_ID,
            "email": EMAIL,
            "name": "crio.do",
            "walletMoney": state.balance,
        },
    }))
    .into_response()
}

#[derive(Deserialize)]
struct Registration {
    name: String,
    email: String,
}

async fn register(State(state): State<Shared>, Json(registration): Json<Registration>) -> Response {
    if let Err(response) = enter(&state) {
        return response;
    }
    if registration.email == EMAIL {
        return error(StatusCode::BAD_REQUEST, "Email already taken");
    }
    (
        StatusCode::CREATED,
        Json(json!({ "user": { "name": registration.name, "email": registration.email } })),
    )
        .into_response()
}

async fn list_orders(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    Json(Value::Array(lock(&state).orders.clone())).into_response()
}

#[derive(Deserialize)]
struct UserQuery {
    q: Option<String>,
}

fn own_account(id: &str) -> Result<(), Response> {
    if id == USER_ID {
        Ok(())
    } else {
        Err(error(
            StatusCode::FORBIDDEN,
            "User not authorized to access this resource",
        ))
    }
}

async fn get_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
    Query(query): Query<UserQuery>,
) -> Response {
    if let Err(response) = authorize(&state, &headers).and_then(|()| own_account(&id)) {
        return response;
    }
    let state = lock(&state);
    let address = state.address.clone().unwrap_or_else(|| "ADDRESS_NOT_SET".to_owned());
    if query.q.as_deref() == Some("address") {
        return Json(json!({ "address": address })).into_response();
    }
    Json(json!({
        "_id": USER_ID,
        "name": "crio.do",
        "email": EMAIL,
        "address": address,
        "walletMoney": state.balance,
    }))
    .into_response()
}

#[derive(Deserialize)]
struct AddressUpdate {
    address: String,
}

async fn put_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
    Query(query): Query<UserQuery>,
    Json(update): Json<AddressUpdate>,
) -> Response {
    if let Err(response) = authorize(&state, &headers).and_then(|()| own_account(&id)) {
        return response;
    }
    if query.q.as_deref() != Some("address") {
        return error(StatusCode::BAD_REQUEST, "Unsupported update");
    }
    if update.address.trim().len() < 20 {
        return error(
            StatusCode::BAD_REQUEST,
            "\"address\" length must be at least 20 characters long",
        );
    }
    let mut state = lock(&state);
    state.address = Some(update.address.clone());
    Json(json!({ "address": update.address })).into_response()
}

async fn delete_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
) -> Response {
    if let Err(response) = authorize(&state, &headers).and_then(|()| own_account(&id)) {
        return response;
    }
    lock(&state).deleted = true;
    StatusCode::NO_CONTENT.into_response()
}
