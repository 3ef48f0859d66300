//! In-memory gateway for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use secrecy::SecretString;
use tokio::sync::Notify;

use cartsync_core::{
    Email, Money, Order, Password, Product, ProductId, Rating, UserId, UserProfile, Username,
};

use crate::error::{Result, StoreError};
use crate::gateway::{CartItem, LoginResult, StoreGateway};
use crate::models::Session;
use crate::services::session::SessionStore;

pub const TEST_USER: &str = "u1";

/// 2100-01-01T00:00:00Z.
pub const FAR_FUTURE: i64 = 4_102_444_800;

/// Unsigned JWT-shaped token expiring at `exp`.
pub fn jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{TEST_USER}","exp":{exp}}}"#));
    format!("{header}.{payload}.sig")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListProducts,
    GetCart,
    UpsertCartItem,
    SetCartItem,
    GetAddress,
    SetAddress,
    Checkout,
    Login,
    Register,
    ListOrders,
    GetUser,
    DeleteUser,
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Transport,
    Unauthenticated,
    Application(&'static str),
}

impl Failure {
    fn into_error(self) -> StoreError {
        match self {
            Self::Transport => {
                StoreError::Parse(serde_json::from_str::<u8>("<html>").unwrap_err())
            }
            Self::Unauthenticated => StoreError::unauthenticated("Please authenticate"),
            Self::Application(message) => StoreError::application(message),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
    pub list_products: usize,
    pub get_cart: usize,
    pub upsert_cart_item: usize,
    pub set_cart_item: usize,
    pub get_address: usize,
    pub set_address: usize,
    pub checkout: usize,
    pub login: usize,
    pub register: usize,
    pub list_orders: usize,
    pub get_user: usize,
    pub delete_user: usize,
}

impl Calls {
    fn bump(&mut self, op: Op) {
        let counter = match op {
            Op::ListProducts => &mut self.list_products,
            Op::GetCart => &mut self.get_cart,
            Op::UpsertCartItem => &mut self.upsert_cart_item,
            Op::SetCartItem => &mut self.set_cart_item,
            Op::GetAddress => &mut self.get_address,
            Op::SetAddress => &mut self.set_address,
            Op::Checkout => &mut self.checkout,
            Op::Login => &mut self.login,
            Op::Register => &mut self.register,
            Op::ListOrders => &mut self.list_orders,
            Op::GetUser => &mut self.get_user,
            Op::DeleteUser => &mut self.delete_user,
        };
        *counter += 1;
    }
}

#[derive(Default)]
struct FakeState {
    products: Vec<Product>,
    cart: BTreeMap<ProductId, u32>,
    address: Option<String>,
    orders: Vec<Order>,
    calls: Calls,
    failures: HashMap<Op, Failure>,
    gates: HashMap<Op, Arc<Notify>>,
    get_cart_active: usize,
    get_cart_max_active: usize,
    deleted: bool,
}

impl FakeState {
    /// Count the call and hand back an injected failure, if any.
    fn enter(&mut self, op: Op) -> Result<Option<Arc<Notify>>> {
        self.calls.bump(op);
        if let Some(failure) = self.failures.remove(&op) {
            return Err(failure.into_error());
        }
        Ok(self.gates.remove(&op))
    }
}

/// Gateway backed by plain in-memory state.
#[derive(Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGateway {
    pub fn with_products(products: Vec<Product>) -> Self {
        let gateway = Self::default();
        gateway.lock().products = products;
        gateway
    }

    pub fn products(&self) -> Vec<Product> {
        self.lock().products.clone()
    }

    pub fn seed_cart(&self, lines: &[(&str, u32)]) {
        self.lock().cart = lines
            .iter()
            .map(|(id, quantity)| (ProductId::new(*id), *quantity))
            .collect();
    }

    pub fn server_cart(&self) -> BTreeMap<ProductId, u32> {
        self.lock().cart.clone()
    }

    pub fn set_address(&self, address: Option<&str>) {
        self.lock().address = address.map(str::to_owned);
    }

    pub fn set_orders(&self, orders: Vec<Order>) {
        self.lock().orders = orders;
    }

    /// Make the next call to `op` fail.
    pub fn fail_once(&self, op: Op, failure: Failure) {
        self.lock().failures.insert(op, failure);
    }

    /// Park the next call to `op` until the returned handle is notified.
    pub fn hold_next(&self, op: Op) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().gates.insert(op, Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Calls {
        self.lock().calls
    }

    pub fn max_concurrent_get_cart(&self) -> usize {
        self.lock().get_cart_max_active
    }

    pub fn is_deleted(&self) -> bool {
        self.lock().deleted
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    async fn pass(&self, op: Op) -> Result<()> {
        let gate = self.lock().enter(op)?;
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(())
    }
}

impl StoreGateway for FakeGateway {
    async fn list_products(&self) -> Result<Vec<Product>> {
        self.pass(Op::ListProducts).await?;
        Ok(self.products())
    }

    async fn get_cart(&self) -> Result<Vec<CartItem>> {
        let gate = {
            let mut state = self.lock();
            let gate = state.enter(Op::GetCart)?;
            state.get_cart_active += 1;
            state.get_cart_max_active = state.get_cart_max_active.max(state.get_cart_active);
            gate
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let mut state = self.lock();
        state.get_cart_active -= 1;
        Ok(state
            .cart
            .iter()
            .map(|(product_id, &quantity)| CartItem {
                product_id: product_id.clone(),
                quantity,
            })
            .collect())
    }

    async fn upsert_cart_item(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        self.pass(Op::UpsertCartItem).await?;
        self.lock().cart.insert(product_id.clone(), quantity);
        Ok(())
    }

    async fn set_cart_item(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        self.pass(Op::SetCartItem).await?;
        let mut state = self.lock();
        if quantity == 0 {
            state.cart.remove(product_id);
        } else {
            state.cart.insert(product_id.clone(), quantity);
        }
        Ok(())
    }

    async fn get_address(&self, _user_id: &UserId) -> Result<Option<String>> {
        self.pass(Op::GetAddress).await?;
        Ok(self.lock().address.clone())
    }

    async fn set_address(&self, _user_id: &UserId, address: &str) -> Result<()> {
        self.pass(Op::SetAddress).await?;
        self.lock().address = Some(address.to_owned());
        Ok(())
    }

    async fn checkout(&self) -> Result<()> {
        self.pass(Op::Checkout).await?;
        self.lock().cart.clear();
        Ok(())
    }

    async fn login(&self, email: &Email, password: &Password) -> Result<LoginResult> {
        self.pass(Op::Login).await?;
        if password.expose() != "learnwithcrio" {
            return Err(StoreError::application("Incorrect email or password"));
        }
        Ok(LoginResult {
            token: SecretString::from(jwt(FAR_FUTURE)),
            user_id: UserId::new(TEST_USER),
            email: email.to_string(),
            username: "crio.do".to_string(),
            wallet_balance: Money::from_minor(5000),
        })
    }

    async fn register(&self, _username: &Username, _email: &Email, _password: &Password) -> Result<()> {
        self.pass(Op::Register).await
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        self.pass(Op::ListOrders).await?;
        Ok(self.lock().orders.clone())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<UserProfile> {
        self.pass(Op::GetUser).await?;
        Ok(UserProfile {
            id: user_id.clone(),
            name: "crio.do".to_string(),
            email: "crio@example.com".to_string(),
            address: self.lock().address.clone(),
            wallet_money: Money::from_minor(5000),
        })
    }

    async fn delete_user(&self, _user_id: &UserId) -> Result<()> {
        self.pass(Op::DeleteUser).await?;
        self.lock().deleted = true;
        Ok(())
    }
}

pub fn product(id: &str, name: &str, category: &str, cost: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        category: category.to_string(),
        cost: Money::from_minor(cost),
        rating: Rating::new(4),
        image_ref: String::new(),
    }
}

pub fn logged_in_session(balance: i64) -> Arc<SessionStore> {
    let store = SessionStore::ephemeral();
    store
        .persist(Session {
            token: SecretString::from(jwt(FAR_FUTURE)),
            user_id: UserId::new(TEST_USER),
            email: "crio@example.com".to_string(),
            username: "crio.do".to_string(),
            wallet_balance: Money::from_minor(balance),
        })
        .unwrap();
    Arc::new(store)
}
