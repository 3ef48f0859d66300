//! REST/JSON gateway implementation.
//!
//! Uses `reqwest` 0.13 for HTTP. The product listing is cached using `moka`
//! for the configured TTL; cart, address and account data are never cached.

use std::sync::Arc;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use cartsync_core::{Email, Order, Password, Product, ProductId, UserId, UserProfile, Username};

use crate::config::StorefrontConfig;
use crate::error::{Result, StoreError};
use crate::gateway::types::{
    AddressBody, AddressUpdate, CartEnvelope, CartItem, CartLineBody, ErrorBody, LoginBody,
    LoginResponse, LoginResult, RegisterBody, WireCartItem,
};
use crate::gateway::{StoreGateway, normalize_address};
use crate::services::session::SessionStore;

const PRODUCTS_CACHE_KEY: &str = "products";
const BODY_PREVIEW_CHARS: usize = 500;

// =============================================================================
// HttpGateway
// =============================================================================

/// Client for the remote store service.
///
/// Cheap to clone; clones share the connection pool and cache.
#[derive(Clone)]
pub struct HttpGateway {
    inner: Arc<HttpGatewayInner>,
}

struct HttpGatewayInner {
    client: reqwest::Client,
    base_url: Url,
    session: Arc<SessionStore>,
    products: Option<Cache<&'static str, Arc<[Product]>>>,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.inner.base_url.as_str())
            .field("cached_products", &self.inner.products.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// Create a gateway for `config.api_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &StorefrontConfig, session: Arc<SessionStore>) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("cartsync/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        let products = (!config.catalog_ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(1)
                .time_to_live(config.catalog_ttl)
                .build()
        });

        Ok(Self {
            inner: Arc::new(HttpGatewayInner {
                client: builder.build()?,
                base_url: config.api_url.clone(),
                session,
                products,
            }),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Drop the cached product listing.
    pub async fn invalidate_products(&self) {
        if let Some(cache) = &self.inner.products {
            cache.invalidate(PRODUCTS_CACHE_KEY).await;
        }
    }

    /// Endpoint URL from path segments. Segments are percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.inner.base_url.clone();
        // http(s) URLs always have a path to extend
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn address_url(&self, user_id: &UserId) -> Url {
        let mut url = self.url(&["users", user_id.as_str()]);
        url.query_pairs_mut().append_pair("q", "address");
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.inner.client.request(method, url)
    }

    /// Request carrying the stored bearer token.
    ///
    /// Fails without touching the network when logged out.
    fn authed(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let token = self
            .inner
            .session
            .token()
            .ok_or_else(|| StoreError::unauthenticated("No session token"))?;
        Ok(self.request(method, url).bearer_auth(token.expose_secret()))
    }

    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String)> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, bytes = body.len(), "Response received");
        Ok((status, body))
    }

    /// Execute a request and decode its JSON body.
    ///
    /// A 2xx body carrying `{message}` is a failure even when it would also
    /// decode as `T`.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let (status, body) = self.send(request).await?;

        if !status.is_success() {
            return Err(failure(status, &body));
        }
        if let Some(err) = structured_failure(status, &body) {
            warn!(status = %status, "Service reported failure in success body");
            return Err(err);
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %preview(&body),
                "Failed to parse service response"
            );
            StoreError::Parse(e)
        })
    }

    /// Execute a request whose success body is not needed.
    ///
    /// `204` and any other 2xx are success unless the body is a structured
    /// `{message}` failure.
    async fn execute_empty(&self, request: RequestBuilder) -> Result<()> {
        let (status, body) = self.send(request).await?;

        if !status.is_success() {
            return Err(failure(status, &body));
        }
        if status != StatusCode::NO_CONTENT
            && let Some(err) = structured_failure(status, &body)
        {
            return Err(err);
        }
        Ok(())
    }
}

impl StoreGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>> {
        if let Some(cache) = &self.inner.products
            && let Some(products) = cache.get(PRODUCTS_CACHE_KEY).await
        {
            debug!("Cache hit for products");
            return Ok(products.to_vec());
        }

        let products: Vec<Product> = self
            .execute(self.request(Method::GET, self.url(&["products"])))
            .await?;

        if let Some(cache) = &self.inner.products {
            cache
                .insert(PRODUCTS_CACHE_KEY, Arc::from(products.as_slice()))
                .await;
        }

        Ok(products)
    }

    #[instrument(skip(self))]
    async fn get_cart(&self) -> Result<Vec<CartItem>> {
        let envelope: CartEnvelope = self
            .execute(self.authed(Method::GET, self.url(&["cart"]))?)
            .await?;

        let total = envelope.cart_items.len();
        let items: Vec<CartItem> = envelope
            .cart_items
            .into_iter()
            .filter_map(WireCartItem::into_item)
            .collect();
        if items.len() != total {
            warn!(
                skipped = total - items.len(),
                "Ignoring cart lines without a product id"
            );
        }
        Ok(items)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn upsert_cart_item(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let request = self
            .authed(Method::POST, self.url(&["cart"]))?
            .json(&CartLineBody {
                product_id,
                quantity,
            });
        self.execute_empty(request).await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn set_cart_item(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let request = self
            .authed(Method::PUT, self.url(&["cart"]))?
            .json(&CartLineBody {
                product_id,
                quantity,
            });
        self.execute_empty(request).await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn get_address(&self, user_id: &UserId) -> Result<Option<String>> {
        let body: AddressBody = self
            .execute(self.authed(Method::GET, self.address_url(user_id))?)
            .await?;
        Ok(normalize_address(body.address))
    }

    #[instrument(skip(self, address), fields(user_id = %user_id))]
    async fn set_address(&self, user_id: &UserId, address: &str) -> Result<()> {
        let request = self
            .authed(Method::PUT, self.address_url(user_id))?
            .json(&AddressUpdate { address });
        self.execute_empty(request).await
    }

    #[instrument(skip(self))]
    async fn checkout(&self) -> Result<()> {
        let request = self.authed(Method::PUT, self.url(&["cart", "checkout"]))?;
        self.execute_empty(request).await
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn login(&self, email: &Email, password: &Password) -> Result<LoginResult> {
        let request = self
            .request(Method::POST, self.url(&["auth", "login"]))
            .json(&LoginBody {
                email: email.as_str(),
                password: password.expose(),
            });
        let response: LoginResponse = self.execute(request).await.map_err(not_a_session_error)?;
        Ok(LoginResult::from(response))
    }

    #[instrument(skip(self, password), fields(username = %username, email = %email))]
    async fn register(&self, username: &Username, email: &Email, password: &Password) -> Result<()> {
        let request = self
            .request(Method::POST, self.url(&["auth", "register"]))
            .json(&RegisterBody {
                name: username.as_str(),
                email: email.as_str(),
                password: password.expose(),
            });
        self.execute_empty(request)
            .await
            .map_err(not_a_session_error)
    }

    #[instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>> {
        self.execute(self.authed(Method::GET, self.url(&["orders"]))?)
            .await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn get_user(&self, user_id: &UserId) -> Result<UserProfile> {
        let mut profile: UserProfile = self
            .execute(self.authed(Method::GET, self.url(&["users", user_id.as_str()]))?)
            .await?;
        profile.address = normalize_address(profile.address);
        Ok(profile)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn delete_user(&self, user_id: &UserId) -> Result<()> {
        let request = self.authed(Method::DELETE, self.url(&["users", user_id.as_str()]))?;
        self.execute_empty(request).await
    }
}

// =============================================================================
// Failure Classification
// =============================================================================

/// Error for a non-success status.
fn failure(status: StatusCode, body: &str) -> StoreError {
    structured_failure(status, body).unwrap_or_else(|| {
        warn!(
            status = %status,
            body = %preview(body),
            "Service returned non-success status"
        );
        classify(status, None, format!("HTTP {}", status.as_u16()))
    })
}

/// Error carried in a `{message, code}` body, if the body is one.
fn structured_failure(status: StatusCode, body: &str) -> Option<StoreError> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let code = parsed.code();
    let message = parsed.message.filter(|m| !m.trim().is_empty())?;
    Some(classify(status, code, message))
}

fn classify(status: StatusCode, code: Option<u16>, message: String) -> StoreError {
    if status == StatusCode::UNAUTHORIZED || code == Some(401) {
        StoreError::Unauthenticated { message }
    } else {
        StoreError::Application {
            status: Some(status.as_u16()),
            code,
            message,
        }
    }
}

/// Login and registration carry no session, so a 401 there is a plain
/// rejection ("wrong password"), not an expired session.
fn not_a_session_error(err: StoreError) -> StoreError {
    match err {
        StoreError::Unauthenticated { message } => StoreError::Application {
            status: Some(StatusCode::UNAUTHORIZED.as_u16()),
            code: Some(401),
            message,
        },
        other => other,
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}
